//! The TCP connection server.
//!
//! [`Server`] owns a `tokio::net::TcpListener`, accepts connections, and spawns one worker task
//! per connection. Each worker reads one line at a time under a read deadline, parses it with
//! [`crate::codec`], dispatches into the shared [`crate::engine::Engine`], and writes back the
//! translated response. Shutdown is cooperative: a `CancellationToken` cascades from the server
//! down to every worker, which races its pending read against the token's cancellation in a
//! `select!` so a blocked read is abandoned promptly rather than waited out.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::{self, Response};
use crate::engine::{Engine, IndexOutcome, RemoveOutcome};
use crate::error::Error;
use crate::metrics::Metrics;

/// The observable lifecycle state of a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Constructed, not yet listening.
    New,
    /// Bound and accepting connections.
    Listening,
    /// Shutdown initiated; no new accepts, existing workers still running.
    Draining,
    /// Every worker has exited.
    Stopped,
}

/// The readiness outcome published once `start` returns, success or failure.
#[derive(Debug, Clone)]
pub enum Ready {
    /// The listener bound successfully to this address.
    Listening(SocketAddr),
    /// The listener failed to bind; the contained message describes why.
    Failed(String),
}

/// A concurrent TCP server multiplexing many clients over one shared [`Engine`].
pub struct Server {
    engine: Arc<Engine>,
    metrics: Arc<Metrics>,
    read_timeout: Duration,
    shutdown_timeout: Duration,
    cancel: CancellationToken,
    ready_tx: watch::Sender<Option<Ready>>,
    ready_rx: watch::Receiver<Option<Ready>>,
    next_conn_id: AtomicU64,
    state: std::sync::Mutex<State>,
    workers: tokio::sync::Mutex<JoinSet<()>>,
}

impl Server {
    /// Constructs a new, unstarted server around a shared engine and metrics.
    pub fn new(
        engine: Arc<Engine>,
        metrics: Arc<Metrics>,
        read_timeout: Duration,
        shutdown_timeout: Duration,
    ) -> Self {
        let (ready_tx, ready_rx) = watch::channel(None);
        Self {
            engine,
            metrics,
            read_timeout,
            shutdown_timeout,
            cancel: CancellationToken::new(),
            ready_tx,
            ready_rx,
            next_conn_id: AtomicU64::new(0),
            state: std::sync::Mutex::new(State::New),
            workers: tokio::sync::Mutex::new(JoinSet::new()),
        }
    }

    /// The current lifecycle state.
    pub fn state(&self) -> State {
        *self.state.lock().expect("state mutex poisoned")
    }

    /// A receiver that observes the one-shot readiness transition.
    ///
    /// Idempotent: calling this (or `.borrow()`/`.changed()` on the receiver) after the
    /// transition has already fired never blocks — a `watch` channel always yields its last
    /// published value immediately.
    pub fn ready(&self) -> watch::Receiver<Option<Ready>> {
        self.ready_rx.clone()
    }

    /// Binds `addr` and runs the accept loop until shutdown is signalled.
    ///
    /// Publishes the readiness signal exactly once, whether binding succeeds or fails.
    pub async fn start(self: &Arc<Self>, addr: SocketAddr) -> Result<(), Error> {
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(err) => {
                let _ = self
                    .ready_tx
                    .send(Some(Ready::Failed(err.to_string())));
                return Err(Error::BindError {
                    addr: addr.to_string(),
                    source: err,
                });
            }
        };

        self.run(listener).await
    }

    /// Runs the accept loop around a pre-bound listener.
    ///
    /// Useful for tests that bind to port `0` and read back the OS-assigned address, avoiding a
    /// dependency on a fixed, possibly-occupied port.
    pub async fn from_listener(self: &Arc<Self>, listener: std::net::TcpListener) -> Result<(), Error> {
        listener.set_nonblocking(true).map_err(Error::IOError)?;
        let listener = TcpListener::from_std(listener).map_err(Error::IOError)?;
        self.run(listener).await
    }

    async fn run(self: &Arc<Self>, listener: TcpListener) -> Result<(), Error> {
        let local_addr = listener.local_addr().map_err(Error::IOError)?;
        *self.state.lock().expect("state mutex poisoned") = State::Listening;
        let _ = self.ready_tx.send(Some(Ready::Listening(local_addr)));
        info!(%local_addr, "listening");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("accept loop cancelled");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
                            self.metrics.record_connection();
                            let server = Arc::clone(self);
                            let mut workers = self.workers.lock().await;
                            workers.spawn(async move {
                                server.handle_connection(conn_id, stream, peer_addr).await;
                            });
                        }
                        Err(err) => {
                            if self.cancel.is_cancelled() {
                                break;
                            }
                            warn!(error = %err, "transient accept error");
                        }
                    }
                }
            }
        }

        *self.state.lock().expect("state mutex poisoned") = State::Draining;
        Ok(())
    }

    async fn handle_connection(self: Arc<Self>, conn_id: u64, stream: TcpStream, peer_addr: SocketAddr) {
        debug!(conn_id, %peer_addr, "connection accepted");
        let conn_cancel = self.cancel.child_token();

        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let mut line = String::new();
        loop {
            line.clear();
            let read_result = tokio::select! {
                _ = conn_cancel.cancelled() => {
                    debug!(conn_id, "closing connection for shutdown");
                    break;
                }
                result = tokio::time::timeout(self.read_timeout, reader.read_line(&mut line)) => result,
            };

            let n = match read_result {
                Ok(Ok(n)) => n,
                Ok(Err(err)) => {
                    debug!(conn_id, error = %err, "read error");
                    break;
                }
                Err(_elapsed) => {
                    debug!(conn_id, "read deadline expired");
                    break;
                }
            };

            if n == 0 {
                debug!(conn_id, "connection closed by peer");
                break;
            }

            self.metrics.record_command();
            let response = self.dispatch(&line).await;

            if let Err(err) = write_half.write_all(response.as_bytes()).await {
                warn!(conn_id, error = %err, "write error");
                break;
            }
        }

        let _ = write_half.shutdown().await;
        debug!(conn_id, "connection closed");
    }

    async fn dispatch(&self, line: &str) -> Response {
        let command = match codec::parse(line) {
            Ok(command) => command,
            Err(_) => {
                self.metrics.record_error();
                return Response::Error;
            }
        };

        match command {
            codec::Command::Index { package, deps } => {
                match self.engine.index_package(&package, &deps).await {
                    IndexOutcome::Indexed => {
                        self.metrics.record_indexed();
                        Response::Ok
                    }
                    IndexOutcome::MissingDependency => Response::Fail,
                }
            }
            codec::Command::Remove { package } => match self.engine.remove_package(&package).await {
                RemoveOutcome::Removed | RemoveOutcome::NotIndexed => Response::Ok,
                RemoveOutcome::Blocked => Response::Fail,
            },
            codec::Command::Query { package } => {
                if self.engine.query_package(&package).await {
                    Response::Ok
                } else {
                    Response::Fail
                }
            }
        }
    }

    /// Signals cancellation, closes the listener's accept loop, and waits for every
    /// per-connection worker to exit or for the shutdown deadline to elapse.
    ///
    /// Safe to call on a server that was constructed but never started: there is nothing to
    /// cancel and no workers to wait for, so this returns immediately.
    pub async fn shutdown(&self) -> Result<(), Error> {
        self.cancel.cancel();

        let mut workers = self.workers.lock().await;
        let wait = async {
            while workers.join_next().await.is_some() {}
        };

        match tokio::time::timeout(self.shutdown_timeout, wait).await {
            Ok(()) => {
                *self.state.lock().expect("state mutex poisoned") = State::Stopped;
                Ok(())
            }
            Err(_elapsed) => Err(Error::ShutdownTimeout(self.shutdown_timeout)),
        }
    }
}
