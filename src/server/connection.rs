// Connection handling module
// Serves a single accepted TCP connection with the attached dispatch unit

use std::convert::Infallible;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::TcpStream;
use tokio::sync::watch;

use super::connector::ConnectionProtocol;
use crate::dispatch::Dispatch;
use crate::logger;

/// Serve one connection until the client is done or shutdown is signalled.
///
/// On shutdown the connection finishes its in-flight request and then closes;
/// the caller bounds how long that may take.
pub async fn serve_connection(
    stream: TcpStream,
    protocol: ConnectionProtocol,
    handler: Arc<dyn Dispatch>,
    mut shutdown: watch::Receiver<bool>,
) {
    let io = TokioIo::new(stream);
    let service = service_fn(move |req| {
        let handler = Arc::clone(&handler);
        async move { Ok::<_, Infallible>(handler.dispatch(req).await) }
    });

    match protocol {
        ConnectionProtocol::Http1 => {
            let mut builder = http1::Builder::new();
            builder.keep_alive(true);
            let conn = builder.serve_connection(io, service);
            tokio::pin!(conn);

            let result = tokio::select! {
                res = conn.as_mut() => res,
                _ = shutdown.changed() => {
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
            };
            if let Err(err) = result {
                logger::log_connection_error(&err);
            }
        }
        ConnectionProtocol::Auto => {
            let builder = auto::Builder::new(TokioExecutor::new());
            let conn = builder.serve_connection(io, service);
            tokio::pin!(conn);

            let result = tokio::select! {
                res = conn.as_mut() => res,
                _ = shutdown.changed() => {
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
            };
            if let Err(err) = result {
                logger::log_connection_error(&err);
            }
        }
    }
}
