// Server instance module
// One start/stop cycle: a dedicated runtime, the attached handler and the accept loop

use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Runtime;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::connector::{Connector, ConnectorFactory};
use super::endpoint::ServerEndpoint;
use super::server_loop::{run_accept_loop, AcceptLoopConfig, DrainReport};
use crate::dispatch::Dispatch;
use crate::error::{ServerError, ServerResult};

/// Upper bound for tearing down the runtime after the drain
const FORCED_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

struct AcceptLoop {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<DrainReport>,
}

/// The embedded server for a single run.
///
/// Never reused: every start builds a fresh instance and every stop consumes it.
pub struct ServerInstance {
    runtime: Runtime,
    handler: Option<Arc<dyn Dispatch>>,
    accept_loop: Option<AcceptLoop>,
}

impl ServerInstance {
    /// Build the runtime that will own the accept loop and connection tasks.
    pub fn new(workers: Option<usize>) -> ServerResult<Self> {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        builder.enable_all().thread_name("beanweb-worker");

        if let Some(workers) = workers.filter(|&w| w > 0) {
            builder.worker_threads(workers);
        }

        let runtime = builder
            .build()
            .map_err(|source| ServerError::Runtime { source })?;

        Ok(Self {
            runtime,
            handler: None,
            accept_loop: None,
        })
    }

    /// Bind a connector inside this instance's runtime.
    pub fn build_connector(
        &self,
        factory: &dyn ConnectorFactory,
        endpoint: &ServerEndpoint,
    ) -> ServerResult<Connector> {
        let _guard = self.runtime.enter();
        factory.build_connector(endpoint)
    }

    /// Attach the dispatch unit. Called once per run, before [`Self::start`].
    pub fn set_handler(&mut self, handler: Arc<dyn Dispatch>) {
        self.handler = Some(handler);
    }

    /// Begin accepting on `connector`.
    pub fn start(
        &mut self,
        connector: Connector,
        config: AcceptLoopConfig,
        active_connections: Arc<AtomicUsize>,
    ) -> ServerResult<SocketAddr> {
        let handler = self.handler.clone().ok_or(ServerError::MissingHandler)?;
        let local_addr = connector.local_addr();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = self.runtime.spawn(run_accept_loop(
            connector.into_listener(),
            handler,
            config,
            active_connections,
            shutdown_rx,
        ));

        self.accept_loop = Some(AcceptLoop {
            local_addr,
            shutdown_tx,
            task,
        });
        Ok(local_addr)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.accept_loop.as_ref().map(|l| l.local_addr)
    }

    /// Close the listener, drain, then halt the runtime.
    ///
    /// Blocks for at most the accept loop's grace period plus the forced
    /// teardown window. The runtime is shut down even when draining fails.
    pub fn stop(mut self) -> ServerResult<DrainReport> {
        self.handler = None;

        let result = match self.accept_loop.take() {
            Some(accept_loop) => {
                let _ = accept_loop.shutdown_tx.send(true);
                self.runtime
                    .block_on(accept_loop.task)
                    .map_err(|e| ServerError::Shutdown {
                        message: format!("accept loop failed: {e}"),
                    })
            }
            None => Ok(DrainReport::default()),
        };

        self.runtime.shutdown_timeout(FORCED_SHUTDOWN_TIMEOUT);
        result
    }

    /// Tear down without blocking, for callers inside an async context.
    pub fn abandon(mut self) {
        self.handler = None;
        if let Some(accept_loop) = self.accept_loop.take() {
            let _ = accept_loop.shutdown_tx.send(true);
        }
        self.runtime.shutdown_background();
    }
}
