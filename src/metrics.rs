//! Lock-free counters.
//!
//! Five measurements are tracked: `connections_total`, `commands_processed`, `error_count`,
//! `packages_indexed` and `start_time`. Each counter is incremented with a relaxed atomic add; a
//! [`Metrics::snapshot`] reads all of them (each atomically) and computes `uptime` from
//! `start_time`. Concurrent increments and snapshots never tear an individual counter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// The process-wide counters, constructed once at server startup.
#[derive(Debug)]
pub struct Metrics {
    connections_total: AtomicU64,
    commands_processed: AtomicU64,
    error_count: AtomicU64,
    packages_indexed: AtomicU64,
    start_time: SystemTime,
}

/// A consistent, point-in-time read of every counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Snapshot {
    /// Total TCP connections accepted since startup.
    pub connections_total: u64,
    /// Total request lines parsed and dispatched (including malformed ones).
    pub commands_processed: u64,
    /// Total parse errors encountered.
    pub error_count: u64,
    /// Total successful `IndexPackage` calls (a cumulative counter, not a live gauge).
    pub packages_indexed: u64,
    /// Seconds elapsed since the engine started.
    pub uptime_seconds: u64,
}

impl Metrics {
    /// Constructs a fresh set of counters, stamping `start_time` as now.
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            commands_processed: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            packages_indexed: AtomicU64::new(0),
            start_time: SystemTime::now(),
        }
    }

    /// Records one accepted connection.
    pub fn record_connection(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one processed request line (parsed or not).
    pub fn record_command(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one parse error.
    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one successful index operation.
    pub fn record_indexed(&self) {
        self.packages_indexed.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a consistent snapshot of every counter plus derived uptime.
    pub fn snapshot(&self) -> Snapshot {
        let uptime_seconds = self
            .start_time
            .elapsed()
            .unwrap_or(Duration::ZERO)
            .as_secs();

        Snapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            commands_processed: self.commands_processed.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            packages_indexed: self.packages_indexed.load(Ordering::Relaxed),
            uptime_seconds,
        }
    }

    /// The Unix timestamp (seconds) at which this set of counters was created.
    pub fn started_at_unix(&self) -> u64 {
        self.start_time
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
