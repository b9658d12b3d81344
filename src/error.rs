use std::io;

use thiserror::Error;

/// The error type for the `pkgindex` crate.
///
/// It represents any failure that can surface out of `Config::load`, `Server::start` or
/// `Server::shutdown`. Per-request and per-connection failures (malformed lines, missing
/// dependencies, closed sockets) are not represented here: they are recovered locally by the
/// server and never propagate this far (see [`crate::server`]).
#[derive(Error, Debug)]
pub enum Error {
    /// An I/O error (file not found, address already in use, etc...).
    #[error("IO error: {0}")]
    IOError(#[from] io::Error),
    /// The configuration file could not be parsed as valid TOML.
    #[error("invalid configuration: {0}")]
    ConfigError(#[from] toml::de::Error),
    /// The TCP listener could not be bound to the requested address.
    #[error("failed to bind listener on '{addr}': {source}")]
    BindError {
        /// The address that could not be bound.
        addr: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The graceful shutdown deadline elapsed before every worker exited.
    #[error("shutdown timed out after {0:?} with workers still running")]
    ShutdownTimeout(std::time::Duration),
}
