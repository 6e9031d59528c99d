//! Logger module
//!
//! Provides logging utilities for the embedded server including:
//! - Subscriber setup from configuration
//! - Server lifecycle logging
//! - Connection and drain logging
//!
//! All lines go through `tracing`; call sites use the functions below so the
//! wording stays in one place.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::server::{DrainReport, RuntimeVariant, ServerEndpoint, ServerState};

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Calling this more
/// than once keeps the first subscriber.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("beanweb={}", config.level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

pub fn log_variant_detected(variant: RuntimeVariant) {
    debug!(%variant, "Connector family detected");
}

pub fn log_probe_failed(reason: &str) {
    debug!(reason, "Capability probe failed, assuming modern connector family");
}

pub fn log_state_transition(from: ServerState, to: ServerState) {
    debug!(%from, %to, "Server state changed");
}

pub fn log_server_started(addr: &SocketAddr, variant: RuntimeVariant) {
    info!("Server listening on http://{addr} ({variant} connector)");
}

pub fn log_bind_failed(endpoint: &ServerEndpoint, err: &impl std::fmt::Display) {
    error!("Failed to bind {endpoint}: {err}");
}

pub fn log_start_failed(err: &impl std::fmt::Display) {
    error!("Server start failed, rolled back to stopped: {err}");
}

pub fn log_stop_requested(addr: Option<&SocketAddr>, grace_period: Duration) {
    match addr {
        Some(addr) => info!(
            "Stopping server on {addr}, draining for up to {}ms",
            grace_period.as_millis()
        ),
        None => info!("Stopping server, draining for up to {}ms", grace_period.as_millis()),
    }
}

pub fn log_server_stopped() {
    info!("Server stopped and resources released");
}

pub fn log_shutdown_error(err: &impl std::fmt::Display) {
    error!("Error during server shutdown: {err}");
}

pub fn log_listener_closed(addr: &SocketAddr) {
    debug!("Listener on {addr} closed, no new connections accepted");
}

pub fn log_drain_complete(addr: Option<SocketAddr>, report: &DrainReport, grace_period: Duration) {
    let addr = addr.map_or_else(|| "-".to_string(), |a| a.to_string());
    if report.abandoned > 0 {
        warn!(
            %addr,
            in_flight = report.in_flight,
            completed = report.completed,
            abandoned = report.abandoned,
            "Grace period of {}ms elapsed, abandoning remaining connections",
            grace_period.as_millis()
        );
    } else {
        debug!(
            %addr,
            in_flight = report.in_flight,
            completed = report.completed,
            "Drain completed"
        );
    }
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    info!("[Connection] Accepted from: {peer_addr}");
}

pub fn log_connection_rejected(peer_addr: &SocketAddr, current: usize, max_conn: usize) {
    warn!("Max connections reached: {current}/{max_conn}. Connection from {peer_addr} rejected.");
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    debug!("Failed to serve connection: {err:?}");
}

pub fn log_connection_task_failed(err: &tokio::task::JoinError) {
    error!("Connection task failed: {err}");
}

pub fn log_accept_error(err: &std::io::Error) {
    error!("Failed to accept connection: {err}");
}
