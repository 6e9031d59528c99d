// Connector module
// Builds bound listeners for the two connector families

use std::io;
use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;

use super::endpoint::ServerEndpoint;
use super::variant::RuntimeVariant;
use crate::error::{ServerError, ServerResult};

/// Listen backlog for the modern connector
const LISTEN_BACKLOG: i32 = 128;

/// How accepted connections are served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionProtocol {
    /// HTTP/1.1 only
    Http1,
    /// HTTP/1.1 or HTTP/2 prior knowledge, picked per connection
    Auto,
}

/// A bound, listening socket that nothing accepts from yet.
///
/// Owned by exactly one server run; dropping it closes the socket.
#[derive(Debug)]
pub struct Connector {
    listener: TcpListener,
    endpoint: ServerEndpoint,
    local_addr: SocketAddr,
    protocol: ConnectionProtocol,
}

impl Connector {
    fn new(
        listener: TcpListener,
        endpoint: ServerEndpoint,
        protocol: ConnectionProtocol,
    ) -> ServerResult<Self> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| construction_error(endpoint, e))?;
        Ok(Self {
            listener,
            endpoint,
            local_addr,
            protocol,
        })
    }

    pub const fn endpoint(&self) -> ServerEndpoint {
        self.endpoint
    }

    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub const fn protocol(&self) -> ConnectionProtocol {
        self.protocol
    }

    pub(crate) fn into_listener(self) -> TcpListener {
        self.listener
    }
}

/// Builds connectors for one runtime variant.
///
/// Must be called from inside a tokio runtime context.
pub trait ConnectorFactory: Send + Sync {
    fn build_connector(&self, endpoint: &ServerEndpoint) -> ServerResult<Connector>;
}

/// Classic bind through `std::net`, served as HTTP/1.1.
#[derive(Debug, Default, Clone, Copy)]
pub struct LegacyConnectorFactory;

/// `socket2` listener with address reuse and explicit backlog, served as
/// HTTP/1.1 or HTTP/2.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModernConnectorFactory;

static LEGACY_FACTORY: LegacyConnectorFactory = LegacyConnectorFactory;
static MODERN_FACTORY: ModernConnectorFactory = ModernConnectorFactory;

/// Strategy for the detected variant.
pub fn factory_for(variant: RuntimeVariant) -> &'static dyn ConnectorFactory {
    match variant {
        RuntimeVariant::Legacy => &LEGACY_FACTORY,
        RuntimeVariant::Modern => &MODERN_FACTORY,
    }
}

impl ConnectorFactory for LegacyConnectorFactory {
    fn build_connector(&self, endpoint: &ServerEndpoint) -> ServerResult<Connector> {
        endpoint.validate()?;
        let endpoint = *endpoint;

        let listener = bind_classic(endpoint.socket_addr())
            .map_err(|e| construction_error(endpoint, e))?;

        Connector::new(listener, endpoint, ConnectionProtocol::Http1)
    }
}

impl ConnectorFactory for ModernConnectorFactory {
    fn build_connector(&self, endpoint: &ServerEndpoint) -> ServerResult<Connector> {
        endpoint.validate()?;
        let endpoint = *endpoint;

        let listener = bind_tuned(endpoint.socket_addr())
            .map_err(|e| construction_error(endpoint, e))?;

        Connector::new(listener, endpoint, ConnectionProtocol::Auto)
    }
}

fn bind_classic(addr: SocketAddr) -> io::Result<TcpListener> {
    let std_listener = std::net::TcpListener::bind(addr)?;
    std_listener.set_nonblocking(true)?;
    TcpListener::from_std(std_listener)
}

fn bind_tuned(addr: SocketAddr) -> io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    // Rebind through TIME_WAIT after a stop. On Windows this would allow
    // stealing an active port, so it stays off there.
    #[cfg(not(windows))]
    socket.set_reuse_address(true)?;

    if addr.is_ipv6() && addr.ip().is_unspecified() {
        socket.set_only_v6(false)?;
    }

    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}

fn construction_error(endpoint: ServerEndpoint, source: io::Error) -> ServerError {
    ServerError::ConnectorConstruction { endpoint, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn loopback(port: u16) -> ServerEndpoint {
        ServerEndpoint::new(Some(IpAddr::V4(Ipv4Addr::LOCALHOST)), port)
    }

    fn free_port() -> u16 {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_legacy_connector_binds_http1() {
        let port = free_port();
        let connector = factory_for(RuntimeVariant::Legacy)
            .build_connector(&loopback(port))
            .unwrap();

        assert_eq!(connector.protocol(), ConnectionProtocol::Http1);
        assert_eq!(connector.local_addr().port(), port);
        assert!(std::net::TcpStream::connect(("127.0.0.1", port)).is_ok());
    }

    #[tokio::test]
    async fn test_modern_connector_binds_auto() {
        let port = free_port();
        let connector = factory_for(RuntimeVariant::Modern)
            .build_connector(&loopback(port))
            .unwrap();

        assert_eq!(connector.protocol(), ConnectionProtocol::Auto);
        assert_eq!(connector.endpoint(), loopback(port));
    }

    #[tokio::test]
    async fn test_dropping_connector_releases_port() {
        let port = free_port();
        let connector = factory_for(RuntimeVariant::Modern)
            .build_connector(&loopback(port))
            .unwrap();
        drop(connector);

        assert!(std::net::TcpStream::connect(("127.0.0.1", port)).is_err());
    }

    #[tokio::test]
    async fn test_occupied_port_is_construction_error() {
        let occupier = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupier.local_addr().unwrap().port();

        for variant in [RuntimeVariant::Legacy, RuntimeVariant::Modern] {
            let err = factory_for(variant)
                .build_connector(&loopback(port))
                .unwrap_err();
            assert!(err.is_bind_failure(), "{variant}: {err}");
            assert_eq!(err.io_kind(), Some(io::ErrorKind::AddrInUse));
        }
    }

    #[tokio::test]
    async fn test_port_zero_rejected_before_bind() {
        let err = factory_for(RuntimeVariant::Legacy)
            .build_connector(&loopback(0))
            .unwrap_err();
        assert!(matches!(err, ServerError::InvalidEndpoint { port: 0 }));
    }
}
