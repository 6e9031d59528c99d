//! Error types for the server lifecycle
//!
//! Capability detection never produces one of these; it falls back to the
//! modern connector family instead.

use std::io;

use thiserror::Error;

use crate::server::{ServerEndpoint, ServerState};

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid bind port {port}: must be between 1 and 65535")]
    InvalidEndpoint { port: u16 },

    #[error("Failed to bind connector on {endpoint}: {source}")]
    ConnectorConstruction {
        endpoint: ServerEndpoint,
        #[source]
        source: io::Error,
    },

    #[error("Cannot {operation} while server is {state}")]
    IllegalLifecycleState {
        operation: &'static str,
        state: ServerState,
    },

    #[error("Failed to build server runtime: {source}")]
    Runtime {
        #[source]
        source: io::Error,
    },

    #[error("No dispatch handler attached before the listener started")]
    MissingHandler,

    #[error("Server shutdown failed: {message}")]
    Shutdown { message: String },
}

impl ServerError {
    /// Whether the error came from the OS refusing the bind.
    pub const fn is_bind_failure(&self) -> bool {
        matches!(self, Self::ConnectorConstruction { .. })
    }

    /// Underlying I/O error kind, if there is one.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::ConnectorConstruction { source, .. } | Self::Runtime { source } => {
                Some(source.kind())
            }
            _ => None,
        }
    }

    /// Collapse into a single I/O error for scoped cleanup call sites.
    pub fn into_io_error(self) -> io::Error {
        match self {
            Self::ConnectorConstruction { source, .. } | Self::Runtime { source } => source,
            other => io::Error::other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_failure_classification() {
        let err = ServerError::ConnectorConstruction {
            endpoint: ServerEndpoint::new(None, 8080),
            source: io::Error::from(io::ErrorKind::AddrInUse),
        };
        assert!(err.is_bind_failure());
        assert_eq!(err.io_kind(), Some(io::ErrorKind::AddrInUse));

        let err = ServerError::InvalidEndpoint { port: 0 };
        assert!(!err.is_bind_failure());
        assert_eq!(err.io_kind(), None);
    }

    #[test]
    fn test_into_io_error_keeps_io_sources() {
        let err = ServerError::Runtime {
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert_eq!(err.into_io_error().kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_into_io_error_wraps_the_rest() {
        let err = ServerError::Shutdown {
            message: "accept loop panicked".to_string(),
        };
        let io_err = err.into_io_error();
        assert_eq!(io_err.kind(), io::ErrorKind::Other);
        assert!(io_err.to_string().contains("accept loop panicked"));
    }

    #[test]
    fn test_illegal_state_message() {
        let err = ServerError::IllegalLifecycleState {
            operation: "start",
            state: ServerState::Running,
        };
        assert_eq!(err.to_string(), "Cannot start while server is running");
    }
}
