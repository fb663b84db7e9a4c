use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};

use utilities::tcp_channel::{ChannelTimeouts, TcpChannel};

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("failed to resolve controller address {endpoint}: {source}")]
    Resolve {
        endpoint: ControllerEndpoint,
        source: io::Error,
    },

    #[error("controller address {endpoint} did not resolve to any socket address")]
    NoAddress { endpoint: ControllerEndpoint },

    #[error("failed to connect to controller at {addr}: {source}")]
    Connect { addr: SocketAddr, source: io::Error },
}

/// Where the controller listens. Fixed for the lifetime of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerEndpoint {
    host: String,
    port: u16,
}

impl ControllerEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn resolve(&self) -> Result<SocketAddr, ConnectError> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| ConnectError::Resolve {
                endpoint: self.clone(),
                source,
            })?
            .next()
            .ok_or_else(|| ConnectError::NoAddress {
                endpoint: self.clone(),
            })
    }
}

impl fmt::Display for ControllerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

pub fn connect(
    endpoint: &ControllerEndpoint,
    timeouts: ChannelTimeouts,
) -> Result<TcpChannel, ConnectError> {
    let addr = endpoint.resolve()?;

    let channel = TcpChannel::connect(addr, timeouts)
        .map_err(|source| ConnectError::Connect { addr, source })?;

    tracing::info!("Connected to MachineMotion controller at {}", endpoint);

    Ok(channel)
}
