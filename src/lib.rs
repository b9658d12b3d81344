//! `pkgindex` is the library crate backing `pkgindexd`, a concurrent, in-memory package
//! dependency index served over a line-oriented TCP protocol.
//!
//! The crate is organized as a small triad:
//!
//! - [`codec`] parses request lines into [`codec::Command`]s and renders [`codec::Response`]s.
//! - [`engine`] owns the dependency graph and exposes its three atomic operations.
//! - [`server`] multiplexes many TCP clients over one shared [`engine::Engine`].
//!
//! [`metrics`], [`config`] and [`admin`] are the ambient stack around that triad: counters,
//! configuration loading, and a read-only HTTP surface for observability.

#![warn(missing_docs)]

/// Read-only HTTP surface (health, metrics, version, profiling) for operators.
pub mod admin;
/// Configuration loading and the CLI surface.
pub mod config;
/// The line-oriented wire protocol: request parsing and response rendering.
pub mod codec;
/// Error types shared across the crate.
pub mod error;
/// The dependency graph engine.
pub mod engine;
/// Lock-free counters and their snapshot view.
pub mod metrics;
/// The TCP connection server.
pub mod server;
/// Build-time version information.
pub mod build;

pub use error::Error;
