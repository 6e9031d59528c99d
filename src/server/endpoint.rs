// Endpoint module
// Bind address and port of the embedded listener

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::{ServerError, ServerResult};

/// Where the listener binds.
///
/// An absent address means all interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServerEndpoint {
    pub address: Option<IpAddr>,
    pub port: u16,
}

impl ServerEndpoint {
    pub const fn new(address: Option<IpAddr>, port: u16) -> Self {
        Self { address, port }
    }

    /// Reject port 0; everything else in `u16` is a valid bind port.
    pub const fn validate(&self) -> ServerResult<()> {
        if self.port == 0 {
            return Err(ServerError::InvalidEndpoint { port: self.port });
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        let ip = self.address.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        SocketAddr::new(ip, self.port)
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}
