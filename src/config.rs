//! Configuration loading and the CLI surface.
//!
//! Configuration is read from a TOML file (default `pkgindexd.toml`, overridable with
//! `--config`), deserialized into a [`ServerConfig`], then overridden field-by-field by any CLI
//! flags the caller supplied — the same "file config, CLI picks the file (and a few overrides)"
//! shape as the registry's own `Opts { config: String }`.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::Error;

fn default_listen_address() -> String {
    "0.0.0.0:8080".to_owned()
}

fn default_read_timeout_secs() -> u64 {
    30
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

fn default_quiet() -> bool {
    false
}

/// The `[server]` table of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the main TCP listener.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    /// Bind address for the admin HTTP surface; absent or empty disables it.
    #[serde(default)]
    pub admin_address: Option<String>,
    /// Suppress all normal log output.
    #[serde(default = "default_quiet")]
    pub quiet: bool,
    /// Per-read deadline applied before each line read, in seconds.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    /// Upper bound on the graceful shutdown wait, in seconds.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            admin_address: None,
            quiet: default_quiet(),
            read_timeout_secs: default_read_timeout_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

/// The top-level configuration file structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// General instance configuration options.
    pub server: ServerConfig,
}

impl ServerConfig {
    /// The main listener's read timeout as a [`Duration`].
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// The graceful shutdown deadline as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Parses [`Self::listen_address`] into a [`SocketAddr`].
    pub fn listen_addr(&self) -> Result<SocketAddr, Error> {
        self.listen_address
            .parse()
            .map_err(|_| Error::BindError {
                addr: self.listen_address.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "invalid listen address",
                ),
            })
    }

    /// Parses [`Self::admin_address`] into a [`SocketAddr`], if the admin surface is enabled.
    pub fn admin_addr(&self) -> Result<Option<SocketAddr>, Error> {
        match &self.admin_address {
            None => Ok(None),
            Some(addr) if addr.is_empty() => Ok(None),
            Some(addr) => addr
                .parse()
                .map(Some)
                .map_err(|_| Error::BindError {
                    addr: addr.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "invalid admin address",
                    ),
                }),
        }
    }
}

impl Config {
    /// Loads and parses a configuration file, then applies CLI overrides from `opts`.
    ///
    /// A missing configuration file is not an error: it is treated as an empty `[server]` table,
    /// i.e. every default. A file that *is* present but malformed TOML, or lacks the required
    /// `[server]` table, is a [`Error::ConfigError`].
    pub async fn load(opts: &Opts) -> Result<Config, Error> {
        let mut config = match tokio::fs::read_to_string(&opts.config).await {
            Ok(contents) => toml::from_str(&contents)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Config {
                server: ServerConfig::default(),
            },
            Err(err) => return Err(Error::IOError(err)),
        };

        opts.apply(&mut config.server);
        Ok(config)
    }
}

/// Command-line options.
///
/// A missing configuration file is not an error: every field has a default, so the server can
/// run unconfigured with `pkgindexd --listen 127.0.0.1:9000`.
#[derive(Debug, Parser)]
#[command(author, version(crate::build::short()), about = "An in-memory package dependency index server")]
pub struct Opts {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "pkgindexd.toml")]
    pub config: String,

    /// Overrides `[server].listen_address`.
    #[arg(long)]
    pub listen: Option<String>,

    /// Overrides `[server].admin_address`.
    #[arg(long = "admin-listen")]
    pub admin_listen: Option<String>,

    /// Overrides `[server].quiet` to `true`.
    #[arg(short, long)]
    pub quiet: bool,

    /// Overrides `[server].read_timeout_secs`.
    #[arg(long)]
    pub read_timeout: Option<u64>,

    /// Overrides `[server].shutdown_timeout_secs`.
    #[arg(long)]
    pub shutdown_timeout: Option<u64>,
}

impl Opts {
    fn apply(&self, server: &mut ServerConfig) {
        if let Some(listen) = &self.listen {
            server.listen_address = listen.clone();
        }
        if let Some(admin_listen) = &self.admin_listen {
            server.admin_address = Some(admin_listen.clone());
        }
        if self.quiet {
            server.quiet = true;
        }
        if let Some(read_timeout) = self.read_timeout {
            server.read_timeout_secs = read_timeout;
        }
        if let Some(shutdown_timeout) = self.shutdown_timeout {
            server.shutdown_timeout_secs = shutdown_timeout;
        }
    }
}
