//! The read-only admin HTTP surface.
//!
//! A small `axum` router, bound to its own listen address, entirely separate from the main TCP
//! protocol listener. Every handler takes a read-only view of the engine and metrics: nothing
//! here ever mutates the graph.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::build;
use crate::engine::Engine;
use crate::metrics::Metrics;
use crate::server::Ready;

/// Shared state handed to every admin route handler.
#[derive(Clone)]
pub struct AdminState {
    engine: Arc<Engine>,
    metrics: Arc<Metrics>,
    ready: watch::Receiver<Option<Ready>>,
}

impl AdminState {
    /// Constructs the state backing the admin router.
    pub fn new(
        engine: Arc<Engine>,
        metrics: Arc<Metrics>,
        ready: watch::Receiver<Option<Ready>>,
    ) -> Self {
        Self {
            engine,
            metrics,
            ready,
        }
    }
}

/// Builds the admin router: `/health`, `/metrics`, `/version`, `/debug/pprof/*`.
pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/version", get(version))
        .route("/debug/pprof/*path", get(pprof_stub))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
}

async fn health(State(state): State<AdminState>) -> impl IntoResponse {
    let is_listening = matches!(*state.ready.borrow(), Some(Ready::Listening(_)));
    if is_listening {
        (StatusCode::OK, Json(HealthBody { status: "up" }))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(HealthBody { status: "down" }))
    }
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
struct MetricsBody {
    connections_total: u64,
    commands_processed: u64,
    error_count: u64,
    packages_indexed: u64,
    uptime_seconds: u64,
    indexed: usize,
    forward_edges: usize,
    reverse_edges: usize,
}

async fn metrics(State(state): State<AdminState>) -> Json<MetricsBody> {
    let snapshot = state.metrics.snapshot();
    let stats = state.engine.stats().await;
    Json(MetricsBody {
        connections_total: snapshot.connections_total,
        commands_processed: snapshot.commands_processed,
        error_count: snapshot.error_count,
        packages_indexed: snapshot.packages_indexed,
        uptime_seconds: snapshot.uptime_seconds,
        indexed: stats.indexed,
        forward_edges: stats.forward_edges,
        reverse_edges: stats.reverse_edges,
    })
}

async fn version() -> Json<build::BuildInfo> {
    Json(build::info())
}

async fn pprof_stub() -> impl IntoResponse {
    (
        StatusCode::NOT_IMPLEMENTED,
        "profiling endpoints are not wired up in this build",
    )
}
