// Server lifecycle module
// Owns the embedded listener across start/stop cycles

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::watch;

use super::connector::{factory_for, ConnectorFactory};
use super::endpoint::ServerEndpoint;
use super::instance::ServerInstance;
use super::server_loop::AcceptLoopConfig;
use super::state::ServerState;
use super::variant::{detect_variant, CapabilityProbe, RuntimeVariant, SocketProbe};
use crate::config::{Config, ConfigError, DEFAULT_GRACE_PERIOD_MS};
use crate::dispatch::Dispatch;
use crate::error::{ServerError, ServerResult};
use crate::logger;

/// Settings that may only change while stopped
#[derive(Debug, Clone, Copy)]
struct Settings {
    endpoint: ServerEndpoint,
    grace_period: Duration,
    workers: Option<usize>,
    max_connections: Option<usize>,
    access_log: bool,
}

impl Settings {
    const fn new(endpoint: ServerEndpoint) -> Self {
        Self {
            endpoint,
            grace_period: Duration::from_millis(DEFAULT_GRACE_PERIOD_MS),
            workers: None,
            max_connections: None,
            access_log: false,
        }
    }
}

struct Inner {
    settings: Settings,
    instance: Option<ServerInstance>,
}

/// Embedded HTTP server with start/stop lifecycle.
///
/// The connector family is detected once, when the server is constructed.
/// Lifecycle calls are serialized internally, so a `WebServer` can be shared
/// behind an `Arc`. `start`, `stop` and `close` block; inside a tokio runtime
/// prefer calling them from `spawn_blocking`.
///
/// Dropping a running server stops it.
///
/// ```no_run
/// use beanweb::{EchoHandler, WebServer};
///
/// let server = WebServer::new(8082, EchoHandler);
/// server.start()?;
/// // ...
/// server.stop()?;
/// # Ok::<(), beanweb::ServerError>(())
/// ```
pub struct WebServer {
    variant: RuntimeVariant,
    factory: &'static dyn ConnectorFactory,
    handler: Arc<dyn Dispatch>,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<ServerState>,
    active_connections: Arc<AtomicUsize>,
}

impl WebServer {
    /// Listen on all interfaces.
    pub fn new(port: u16, handler: impl Dispatch) -> Self {
        Self::with_address(None, port, handler)
    }

    pub fn with_address(address: Option<IpAddr>, port: u16, handler: impl Dispatch) -> Self {
        Self::with_probe(ServerEndpoint::new(address, port), handler, &SocketProbe)
    }

    /// Construct with a specific capability probe for variant detection.
    pub fn with_probe(
        endpoint: ServerEndpoint,
        handler: impl Dispatch,
        probe: &dyn CapabilityProbe,
    ) -> Self {
        let variant = detect_variant(probe);
        let (state_tx, _) = watch::channel(ServerState::Stopped);

        Self {
            variant,
            factory: factory_for(variant),
            handler: Arc::new(handler),
            inner: Mutex::new(Inner {
                settings: Settings::new(endpoint),
                instance: None,
            }),
            state_tx,
            active_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn from_config(config: &Config, handler: impl Dispatch) -> Result<Self, ConfigError> {
        let server = Self::with_probe(config.server.endpoint()?, handler, &SocketProbe);
        {
            let mut inner = server.lock();
            inner.settings.grace_period = config.server.grace_period();
            inner.settings.workers = config.server.workers;
            inner.settings.max_connections = config.server.max_connections;
            inner.settings.access_log = config.logging.access_log;
        }
        Ok(server)
    }

    /// Bind the connector, attach the handler and start accepting.
    ///
    /// Fails with [`ServerError::IllegalLifecycleState`] unless stopped. Any
    /// other failure rolls back to stopped with nothing left bound.
    pub fn start(&self) -> ServerResult<()> {
        let mut inner = self.lock();

        let state = self.state();
        if state != ServerState::Stopped {
            return Err(ServerError::IllegalLifecycleState {
                operation: "start",
                state,
            });
        }
        inner.settings.endpoint.validate()?;

        self.transition(ServerState::Stopped, ServerState::Starting);
        let settings = inner.settings;
        match run_blocking("start", || self.launch(&settings)) {
            Ok(instance) => {
                if let Some(addr) = instance.local_addr() {
                    logger::log_server_started(&addr, self.variant);
                }
                inner.instance = Some(instance);
                self.transition(ServerState::Starting, ServerState::Running);
                Ok(())
            }
            Err(e) => {
                logger::log_start_failed(&e);
                self.transition(ServerState::Starting, ServerState::Stopped);
                Err(e)
            }
        }
    }

    fn launch(&self, settings: &Settings) -> ServerResult<ServerInstance> {
        let mut instance = ServerInstance::new(settings.workers)?;

        let connector = instance
            .build_connector(self.factory, &settings.endpoint)
            .inspect_err(|e| logger::log_bind_failed(&settings.endpoint, e))?;

        instance.set_handler(Arc::clone(&self.handler));

        let config = AcceptLoopConfig {
            protocol: connector.protocol(),
            grace_period: settings.grace_period,
            max_connections: settings.max_connections,
            access_log: settings.access_log,
        };
        instance.start(connector, config, Arc::clone(&self.active_connections))?;
        Ok(instance)
    }

    /// Stop accepting, drain for up to the grace period, release everything.
    ///
    /// A no-op when already stopped. Teardown errors are returned after the
    /// instance has been released.
    pub fn stop(&self) -> ServerResult<()> {
        let mut inner = self.lock();
        let Some(instance) = inner.instance.take() else {
            return Ok(());
        };
        self.transition(ServerState::Running, ServerState::Stopping);
        logger::log_stop_requested(instance.local_addr().as_ref(), inner.settings.grace_period);

        let result = run_blocking("stop", move || instance.stop());

        self.active_connections.store(0, Ordering::SeqCst);
        self.transition(ServerState::Stopping, ServerState::Stopped);

        match result {
            Ok(_) => {
                logger::log_server_stopped();
                Ok(())
            }
            Err(e) => {
                logger::log_shutdown_error(&e);
                Err(e)
            }
        }
    }

    /// [`Self::stop`] with every failure reported as an [`io::Error`].
    pub fn close(&self) -> io::Result<()> {
        self.stop().map_err(ServerError::into_io_error)
    }

    pub const fn variant(&self) -> RuntimeVariant {
        self.variant
    }

    pub fn state(&self) -> ServerState {
        *self.state_tx.borrow()
    }

    /// Watch lifecycle state changes.
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state_tx.subscribe()
    }

    /// Address actually bound, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock().instance.as_ref().and_then(ServerInstance::local_addr)
    }

    pub fn endpoint(&self) -> ServerEndpoint {
        self.lock().settings.endpoint
    }

    pub fn grace_period(&self) -> Duration {
        self.lock().settings.grace_period
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }

    pub fn set_server_address(&self, address: Option<IpAddr>) -> ServerResult<()> {
        self.reconfigure("change the bind address", |s| s.endpoint.address = address)
    }

    pub fn set_server_port(&self, port: u16) -> ServerResult<()> {
        ServerEndpoint::new(None, port).validate()?;
        self.reconfigure("change the bind port", |s| s.endpoint.port = port)
    }

    pub fn set_grace_period(&self, grace_period: Duration) -> ServerResult<()> {
        self.reconfigure("change the grace period", |s| s.grace_period = grace_period)
    }

    pub fn set_worker_threads(&self, workers: Option<usize>) -> ServerResult<()> {
        self.reconfigure("change the worker count", |s| s.workers = workers)
    }

    pub fn set_max_connections(&self, max_connections: Option<usize>) -> ServerResult<()> {
        self.reconfigure("change the connection limit", |s| {
            s.max_connections = max_connections;
        })
    }

    pub fn set_access_log(&self, enabled: bool) -> ServerResult<()> {
        self.reconfigure("change access logging", |s| s.access_log = enabled)
    }

    fn reconfigure(
        &self,
        operation: &'static str,
        apply: impl FnOnce(&mut Settings),
    ) -> ServerResult<()> {
        let mut inner = self.lock();
        let state = self.state();
        if state.is_active() {
            return Err(ServerError::IllegalLifecycleState { operation, state });
        }
        apply(&mut inner.settings);
        Ok(())
    }

    fn transition(&self, from: ServerState, to: ServerState) {
        debug_assert!(from.can_transition_to(to), "illegal transition {from} -> {to}");
        self.state_tx.send_replace(to);
        logger::log_state_transition(from, to);
    }

    // The guarded data stays consistent across a panic, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for WebServer {
    fn drop(&mut self) {
        // Drop cannot hand its thread back to a runtime, so never block in one
        if Handle::try_current().is_ok() {
            let instance = self
                .inner
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner)
                .instance
                .take();
            if let Some(instance) = instance {
                self.transition(ServerState::Running, ServerState::Stopping);
                instance.abandon();
                self.active_connections.store(0, Ordering::SeqCst);
                self.transition(ServerState::Stopping, ServerState::Stopped);
            }
            return;
        }

        if let Err(e) = self.close() {
            logger::log_shutdown_error(&e);
        }
    }
}

/// Run blocking lifecycle work on whatever thread the caller is on.
///
/// Outside a runtime the work runs in place. A multi-thread runtime worker
/// hands its core off with `block_in_place`, which also runs in place on a
/// `spawn_blocking` thread. A current-thread runtime cannot hand off, so the
/// work moves to a short-lived thread outside any runtime context and the
/// caller waits for it.
fn run_blocking<T, F>(operation: &'static str, work: F) -> ServerResult<T>
where
    T: Send,
    F: FnOnce() -> ServerResult<T> + Send,
{
    let Ok(handle) = Handle::try_current() else {
        return work();
    };

    if handle.runtime_flavor() == RuntimeFlavor::MultiThread {
        return tokio::task::block_in_place(work);
    }

    std::thread::scope(|scope| {
        let helper = std::thread::Builder::new()
            .name(format!("beanweb-{operation}"))
            .spawn_scoped(scope, work)
            .map_err(|source| ServerError::Runtime { source })?;
        helper
            .join()
            .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
    })
}
