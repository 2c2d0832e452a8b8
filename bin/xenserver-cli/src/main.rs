// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;
use slog::{info, o, warn, Drain, Level, Logger};
use xenapi_client::Session;
use xenserver_provider::{schema, schemas, Diagnostic, Provider};
use xenserver_provider_config::LogLevel;

#[derive(Debug, Parser)]
#[clap(about, version)]
/// Drive the XenServer provider's resources and data sources by hand
struct Opt {
    /// Provider configuration file (TOML); XENSERVER_* variables override it
    #[clap(short, long, action)]
    config: Option<PathBuf>,

    /// Enable debugging
    #[clap(short, long, action)]
    debug: bool,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the schema of a resource or data source type
    Schema {
        /// Type name, e.g. xenserver_network
        #[clap(action)]
        type_name: String,
    },

    /// Run one lifecycle operation of a resource
    Resource {
        /// Resource type name
        #[clap(action)]
        type_name: String,

        #[clap(subcommand)]
        op: ResourceOp,
    },

    /// Query a data source
    DataSource {
        /// Data source type name
        #[clap(action)]
        type_name: String,

        #[clap(subcommand)]
        op: DataSourceOp,
    },
}

#[derive(Debug, Subcommand)]
enum DataSourceOp {
    /// List the entities matching a configuration object
    Read {
        /// File with the JSON configuration object (filters)
        #[clap(long, action)]
        config_object: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
enum ResourceOp {
    /// Create a new entity from a configuration object
    Create {
        #[clap(long, action)]
        plan: PathBuf,
    },

    /// Refresh a persisted state from the pool
    Read {
        #[clap(long, action)]
        state: PathBuf,
    },

    /// Apply a configuration to an existing entity
    Update {
        #[clap(long, action)]
        plan: PathBuf,

        #[clap(long, action)]
        state: PathBuf,
    },

    /// Destroy the entity described by a state
    Delete {
        #[clap(long, action)]
        state: PathBuf,
    },

    /// Adopt an existing entity by UUID
    Import {
        #[clap(action)]
        id: String,
    },

    /// Show what applying a configuration would do, without a connection
    Plan {
        #[clap(long, action)]
        state: Option<PathBuf>,

        #[clap(long, action)]
        plan: Option<PathBuf>,
    },
}

fn parse_json_file<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> anyhow::Result<T> {
    let file = File::open(path)
        .with_context(|| anyhow!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(|e| e.into())
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Surfaces a provider error the way the orchestrating tool would show it.
fn diagnose(e: xenserver_provider::Error) -> anyhow::Error {
    anyhow!("{}", Diagnostic::from(&e))
}

fn create_logger(opt: &Opt, level: LogLevel) -> Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let level = if opt.debug {
        Level::Debug
    } else {
        match level {
            LogLevel::Trace => Level::Trace,
            LogLevel::Debug => Level::Debug,
            LogLevel::Info => Level::Info,
            LogLevel::Warning => Level::Warning,
            LogLevel::Error => Level::Error,
            LogLevel::Critical => Level::Critical,
        }
    };
    let drain = slog::LevelFilter(drain, level).fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    Logger::root(drain, o!())
}

fn plan(
    type_name: &str,
    state: Option<PathBuf>,
    config: Option<PathBuf>,
) -> anyhow::Result<()> {
    let schema = schemas()
        .remove(type_name)
        .ok_or_else(|| anyhow!("unknown resource type {type_name}"))?;
    let prior = state.as_deref().map(parse_json_file::<Value>).transpose()?;
    let config = config.as_deref().map(parse_json_file::<Value>).transpose()?;
    let action = schema::plan(schema, prior.as_ref(), config.as_ref())
        .map_err(diagnose)?;
    print_json(&serde_json::to_value(action)?)
}

async fn run_resource(
    provider: &Provider<Session>,
    type_name: &str,
    op: ResourceOp,
) -> anyhow::Result<()> {
    let resource = provider
        .resource(type_name)
        .ok_or_else(|| anyhow!("unknown resource type {type_name}"))?;

    match op {
        ResourceOp::Create { plan } => {
            let config = parse_json_file(&plan)?;
            let state = resource.create(config).await.map_err(diagnose)?;
            print_json(&state)
        }
        ResourceOp::Read { state } => {
            let state = parse_json_file(&state)?;
            let state = resource.read(state).await.map_err(diagnose)?;
            print_json(&state)
        }
        ResourceOp::Update { plan, state } => {
            let state = resource
                .update(parse_json_file(&plan)?, parse_json_file(&state)?)
                .await
                .map_err(diagnose)?;
            print_json(&state)
        }
        ResourceOp::Delete { state } => {
            resource.delete(parse_json_file(&state)?).await.map_err(diagnose)
        }
        ResourceOp::Import { id } => {
            let state = resource.import(&id).await.map_err(diagnose)?;
            print_json(&state)
        }
        ResourceOp::Plan { state, plan: config } => {
            plan(type_name, state, config)
        }
    }
}

async fn run_data_source(
    provider: &Provider<Session>,
    type_name: &str,
    config: Option<PathBuf>,
) -> anyhow::Result<()> {
    let data_source = provider
        .data_source(type_name)
        .ok_or_else(|| anyhow!("unknown data source type {type_name}"))?;
    let config = match config {
        Some(path) => parse_json_file(&path)?,
        None => Value::Object(Default::default()),
    };
    let listing = data_source.read(config).await.map_err(diagnose)?;
    print_json(&listing)
}

async fn connect(
    config: &xenserver_provider_config::Config,
    source: &str,
    log: &Logger,
) -> anyhow::Result<Arc<Session>> {
    let creds = config.credentials(source)?;
    let session = Session::connect(
        &creds.url,
        &creds.username,
        &creds.password,
        log.new(o!("component" => "xenapi")),
    )
    .await
    .with_context(|| anyhow!("unable to create XenAPI session"))?;
    info!(log, "connected"; "url" => &creds.url);
    Ok(Arc::new(session))
}

async fn disconnect(session: &Session, log: &Logger) {
    if let Err(e) = session.logout().await {
        warn!(log, "failed to log out"; "error" => %e);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();
    let config = xenserver_provider_config::load(opt.config.as_deref())
        .context("failed to load provider configuration")?;
    let log = create_logger(&opt, config.log_level);
    let source = opt
        .config
        .as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "environment".to_string());

    match opt.cmd {
        Command::Schema { type_name } => {
            let schema = schemas()
                .remove(&type_name)
                .ok_or_else(|| anyhow!("unknown type {type_name}"))?;
            print_json(&serde_json::to_value(schema)?)
        }
        // Planning only consults the schema and never opens a session.
        Command::Resource {
            type_name,
            op: ResourceOp::Plan { state, plan: config },
        } => plan(&type_name, state, config),
        Command::Resource { type_name, op } => {
            let session = connect(&config, &source, &log).await?;
            let provider = Provider::new(session.clone(), log.clone());
            let res = run_resource(&provider, &type_name, op).await;
            disconnect(&session, &log).await;
            res
        }
        Command::DataSource {
            type_name,
            op: DataSourceOp::Read { config_object },
        } => {
            let session = connect(&config, &source, &log).await?;
            let provider = Provider::new(session.clone(), log.clone());
            let res =
                run_data_source(&provider, &type_name, config_object).await;
            disconnect(&session, &log).await;
            res
        }
    }
}
