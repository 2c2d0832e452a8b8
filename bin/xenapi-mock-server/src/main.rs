// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::anyhow;
use clap::Parser;
use dropshot::{ConfigDropshot, HandlerTaskMode};
use slog::{info, Drain};
use xenapi_mock_server::Pool;

#[derive(Debug, Parser)]
#[clap(about, version)]
/// A simulated XenServer pool master speaking XenAPI JSON-RPC
enum Args {
    /// Generates the OpenAPI specification.
    OpenApi,
    /// Runs the mock pool master.
    Run {
        #[clap(name = "IP:PORT", action)]
        addr: SocketAddr,

        /// User name accepted at login
        #[clap(long, default_value = Pool::DEFAULT_USERNAME, action)]
        username: String,

        /// Password accepted at login
        #[clap(long, default_value = Pool::DEFAULT_PASSWORD, action)]
        password: String,

        /// Populate the pool with guests, templates and snapshots
        #[clap(long, action)]
        demo: bool,
    },
}

fn build_logger() -> slog::Logger {
    let main_drain = if atty::is(atty::Stream::Stdout) {
        let decorator = slog_term::TermDecorator::new().build();
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        slog_async::Async::new(drain)
            .overflow_strategy(slog_async::OverflowStrategy::Block)
            .build_no_guard()
    } else {
        let drain =
            slog_bunyan::with_name("xenapi-mock-server", std::io::stdout())
                .build()
                .fuse();
        slog_async::Async::new(drain)
            .overflow_strategy(slog_async::OverflowStrategy::Block)
            .build_no_guard()
    };

    let (dtrace_drain, probe_reg) = slog_dtrace::Dtrace::new();

    let filtered_main = slog::LevelFilter::new(main_drain, slog::Level::Info);

    let log = slog::Logger::root(
        slog::Duplicate::new(filtered_main.fuse(), dtrace_drain.fuse()).fuse(),
        slog::o!(),
    );

    if let slog_dtrace::ProbeRegistration::Failed(err) = probe_reg {
        slog::error!(&log, "Error registering slog-dtrace probes: {:?}", err);
    }

    log
}

pub fn run_openapi() -> Result<(), String> {
    xenapi_mock_server::api()
        .openapi("Mock XenAPI Pool Master", "0.0.1")
        .description("JSON-RPC endpoint of a simulated XenServer pool.")
        .write(&mut std::io::stdout())
        .map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args {
        Args::OpenApi => run_openapi()
            .map_err(|e| anyhow!("Cannot generate OpenAPI spec: {}", e)),
        Args::Run { addr, username, password, demo } => {
            let config_dropshot = ConfigDropshot {
                bind_address: addr,
                request_body_max_bytes: 1024 * 1024,
                default_handler_task_mode: HandlerTaskMode::Detached,
                log_headers: vec![],
            };

            let log = build_logger();
            let pool = Arc::new(Pool::with_credentials(
                &username,
                &password,
                log.new(slog::o!("component" => "pool")),
            ));
            if demo {
                pool.seed_demo();
            }

            info!(log, "Starting server..."; "address" => %addr);
            let server = xenapi_mock_server::start(config_dropshot, pool, log)
                .map_err(|error| anyhow!("Failed to start server: {}", error))?;
            server
                .await
                .map_err(|e| anyhow!("Server exited with an error: {}", e))
        }
    }
}
