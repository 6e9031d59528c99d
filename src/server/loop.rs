// Accept loop module
// Accepts connections until shutdown, then drains in-flight ones within the grace period

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;

use super::connection::serve_connection;
use super::connector::ConnectionProtocol;
use crate::dispatch::Dispatch;
use crate::logger;

/// Settings fixed for one run of the accept loop
#[derive(Debug, Clone, Copy)]
pub struct AcceptLoopConfig {
    pub protocol: ConnectionProtocol,
    pub grace_period: Duration,
    pub max_connections: Option<usize>,
    pub access_log: bool,
}

/// Outcome of the graceful drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Connections open when the listener closed
    pub in_flight: usize,
    /// Connections that finished within the grace period
    pub completed: usize,
    /// Connections aborted when the grace period ran out
    pub abandoned: usize,
}

/// Decrements the live-connection counter when the connection task ends,
/// including when it is aborted.
struct ConnectionGuard(Arc<AtomicUsize>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Run until `shutdown` fires, then close the listener and drain.
///
/// The listener is dropped before draining starts, so no connection is
/// accepted once shutdown has been signalled.
pub async fn run_accept_loop(
    listener: TcpListener,
    handler: Arc<dyn Dispatch>,
    config: AcceptLoopConfig,
    active_connections: Arc<AtomicUsize>,
    mut shutdown: watch::Receiver<bool>,
) -> DrainReport {
    let local_addr = listener.local_addr().ok();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        // Increment first, then check the limit
                        let prev_count = active_connections.fetch_add(1, Ordering::SeqCst);
                        let guard = ConnectionGuard(Arc::clone(&active_connections));

                        if let Some(max_conn) = config.max_connections {
                            if prev_count >= max_conn {
                                logger::log_connection_rejected(&peer_addr, prev_count, max_conn);
                                drop(guard);
                                drop(stream);
                                continue;
                            }
                        }

                        if config.access_log {
                            logger::log_connection_accepted(&peer_addr);
                        }

                        let handler = Arc::clone(&handler);
                        let conn_shutdown = shutdown.clone();
                        connections.spawn(async move {
                            let _guard = guard;
                            serve_connection(stream, config.protocol, handler, conn_shutdown).await;
                        });
                    }
                    Err(e) => logger::log_accept_error(&e),
                }
            }

            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    logger::log_connection_task_failed(&e);
                }
            }

            _ = shutdown.changed() => break,
        }
    }

    drop(listener);
    if let Some(addr) = local_addr {
        logger::log_listener_closed(&addr);
    }

    drain_connections(connections, config.grace_period, local_addr).await
}

/// Wait for open connections up to `grace_period`, then abort the rest.
async fn drain_connections(
    mut connections: JoinSet<()>,
    grace_period: Duration,
    local_addr: Option<SocketAddr>,
) -> DrainReport {
    let in_flight = connections.len();
    let mut completed = 0;
    let drain_deadline = tokio::time::Instant::now() + grace_period;

    while !connections.is_empty() {
        tokio::select! {
            joined = connections.join_next() => {
                match joined {
                    Some(Ok(())) => completed += 1,
                    Some(Err(e)) => {
                        completed += 1;
                        logger::log_connection_task_failed(&e);
                    }
                    None => break,
                }
            }

            () = tokio::time::sleep_until(drain_deadline) => break,
        }
    }

    let abandoned = connections.len();
    connections.abort_all();

    let report = DrainReport {
        in_flight,
        completed,
        abandoned,
    };
    logger::log_drain_complete(local_addr, &report, grace_period);
    report
}
