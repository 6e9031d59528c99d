// Runtime variant detection module
// Decides which connector family the host supports, once per server instance

use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};

use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;

use crate::logger;

/// Connector implementation family available in this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeVariant {
    /// Classic socket layer: plain bind, HTTP/1.1 only
    Legacy,
    /// Tuned socket2 listener, HTTP/1.1 and HTTP/2 (h2c)
    Modern,
}

impl RuntimeVariant {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Modern => "modern",
        }
    }
}

impl fmt::Display for RuntimeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure while probing. Never leaves this module as an error.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe socket unavailable: {0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Other(String),
}

/// Looks for the capability that only the legacy connector family has.
pub trait CapabilityProbe {
    /// `Ok(true)` when the legacy-only signal is present.
    fn legacy_signal(&self) -> Result<bool, ProbeError>;
}

/// Default probe: checks whether the host only offers the classic socket layer.
///
/// The modern family configures its listener through `socket2`. A platform that
/// rejects those socket options as unsupported only has the classic bind path,
/// which is the legacy signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct SocketProbe;

impl CapabilityProbe for SocketProbe {
    fn legacy_signal(&self) -> Result<bool, ProbeError> {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;

        match socket.set_reuse_address(true) {
            Ok(()) => Ok(false),
            Err(e) if is_unsupported(&e) => Ok(true),
            Err(e) => Err(ProbeError::Io(e)),
        }
    }
}

fn is_unsupported(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Unsupported | io::ErrorKind::InvalidInput
    )
}

/// Run the probe and pick a variant.
///
/// Never fails: a probe error or panic counts as "legacy signal absent", so
/// the result falls back to [`RuntimeVariant::Modern`].
pub fn detect_variant(probe: &dyn CapabilityProbe) -> RuntimeVariant {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| probe.legacy_signal()));

    let variant = match outcome {
        Ok(Ok(true)) => RuntimeVariant::Legacy,
        Ok(Ok(false)) => RuntimeVariant::Modern,
        Ok(Err(e)) => {
            logger::log_probe_failed(&e.to_string());
            RuntimeVariant::Modern
        }
        Err(_) => {
            logger::log_probe_failed("capability probe panicked");
            RuntimeVariant::Modern
        }
    };

    logger::log_variant_detected(variant);
    variant
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe(Result<bool, &'static str>);

    impl CapabilityProbe for FixedProbe {
        fn legacy_signal(&self) -> Result<bool, ProbeError> {
            self.0.map_err(|msg| ProbeError::Other(msg.to_string()))
        }
    }

    struct PanickingProbe;

    impl CapabilityProbe for PanickingProbe {
        fn legacy_signal(&self) -> Result<bool, ProbeError> {
            panic!("probe blew up")
        }
    }

    #[test]
    fn test_signal_present_selects_legacy() {
        assert_eq!(detect_variant(&FixedProbe(Ok(true))), RuntimeVariant::Legacy);
    }

    #[test]
    fn test_signal_absent_selects_modern() {
        assert_eq!(detect_variant(&FixedProbe(Ok(false))), RuntimeVariant::Modern);
    }

    #[test]
    fn test_probe_error_falls_back_to_modern() {
        assert_eq!(
            detect_variant(&FixedProbe(Err("class not found"))),
            RuntimeVariant::Modern
        );
    }

    #[test]
    fn test_probe_panic_falls_back_to_modern() {
        assert_eq!(detect_variant(&PanickingProbe), RuntimeVariant::Modern);
    }

    #[test]
    fn test_socket_probe_always_yields_a_variant() {
        let variant = detect_variant(&SocketProbe);
        assert!(matches!(
            variant,
            RuntimeVariant::Legacy | RuntimeVariant::Modern
        ));
    }

    #[test]
    fn test_unsupported_errors() {
        assert!(is_unsupported(&io::Error::from(io::ErrorKind::Unsupported)));
        assert!(!is_unsupported(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }
}
