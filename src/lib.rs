//! Embedded HTTP listener for exposing management beans.
//!
//! [`WebServer`] owns the listener lifecycle. The connector family it binds
//! with is picked at construction by probing the host, and the request
//! handler plugs in through [`Dispatch`].

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod logger;
pub mod server;

pub use dispatch::{Dispatch, DispatchFuture};
pub use error::{ServerError, ServerResult};
pub use handler::EchoHandler;
pub use server::{RuntimeVariant, ServerEndpoint, ServerState, WebServer};
