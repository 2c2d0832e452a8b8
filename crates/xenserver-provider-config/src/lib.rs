// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Provider configuration: where the pool master lives and how to log in.
//!
//! Values come from a TOML file, and each may be overridden from the
//! environment (`XENSERVER_HOST`, `XENSERVER_USERNAME`,
//! `XENSERVER_PASSWORD`).

use std::fmt;
use std::path::Path;

use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

pub const HOST_ENV: &str = "XENSERVER_HOST";
pub const USERNAME_ENV: &str = "XENSERVER_USERNAME";
pub const PASSWORD_ENV: &str = "XENSERVER_PASSWORD";

/// Configuration as written in the provider's config file.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct Config {
    /// Address of the pool master, with or without a URL scheme.
    pub host: Option<String>,

    pub username: Option<String>,

    pub password: Option<String>,

    #[serde(default)]
    pub log_level: LogLevel,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

/// Everything needed to open a session with the pool master.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Config {
    /// Replaces values with those found through `lookup`, which maps an
    /// environment variable name to its value.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(HOST_ENV) {
            self.host = Some(host);
        }
        if let Some(username) = lookup(USERNAME_ENV) {
            self.username = Some(username);
        }
        if let Some(password) = lookup(PASSWORD_ENV) {
            self.password = Some(password);
        }
        self
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Checks that every connection parameter is present. `source` names
    /// where the configuration came from, for error messages.
    pub fn credentials(&self, source: &str) -> Result<Credentials, ParseError> {
        let require = |value: &Option<String>, key: &str, env: &str| {
            value.clone().filter(|v| !v.is_empty()).ok_or_else(|| {
                ParseError::KeyNotFound(
                    key.to_string(),
                    format!("{source} (or ${env})"),
                )
            })
        };
        let host = require(&self.host, "host", HOST_ENV)?;
        let url = if host.contains("://") {
            host
        } else {
            format!("https://{host}")
        };
        Ok(Credentials {
            url,
            username: require(&self.username, "username", USERNAME_ENV)?,
            password: require(&self.password, "password", PASSWORD_ENV)?,
        })
    }
}

/// Errors which may be returned when parsing the provider configuration.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Cannot parse toml: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Key {0} not found in {1}")]
    KeyNotFound(String, String),
}

/// Parses a TOML file into a configuration object.
pub fn parse<P: AsRef<Path>>(path: P) -> Result<Config, ParseError> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let cfg = toml::from_str::<Config>(&contents)?;
    Ok(cfg)
}

/// Reads the configuration file, if any, and applies environment
/// overrides.
pub fn load(path: Option<&Path>) -> Result<Config, ParseError> {
    let cfg = match path {
        Some(path) => parse(path)?,
        None => Config::default(),
    };
    Ok(cfg.with_env_overrides())
}
