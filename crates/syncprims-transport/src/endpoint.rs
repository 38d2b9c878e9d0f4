use std::fmt;
use std::net::TcpStream;
#[cfg(unix)]
use std::path::PathBuf;
use std::str::FromStr;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::SyncStream;

/// Where to reach a device link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `tcp://host:port` (or bare `host:port`).
    Tcp(String),
    /// `unix:/path/to/socket`.
    #[cfg(unix)]
    Unix(PathBuf),
}

impl Endpoint {
    /// Connect to the endpoint (blocking).
    pub fn connect(&self) -> Result<SyncStream> {
        match self {
            Endpoint::Tcp(addr) => {
                let stream = TcpStream::connect(addr.as_str()).map_err(|source| {
                    TransportError::Connect {
                        endpoint: self.to_string(),
                        source,
                    }
                })?;
                debug!(%addr, "connected to tcp link");
                SyncStream::from_tcp(stream)
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                let stream = std::os::unix::net::UnixStream::connect(path).map_err(|source| {
                    TransportError::Connect {
                        endpoint: self.to_string(),
                        source,
                    }
                })?;
                debug!(?path, "connected to unix domain socket");
                Ok(SyncStream::from_unix(stream))
            }
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self> {
        let input = input.trim();
        if let Some(addr) = input.strip_prefix("tcp://") {
            return parse_tcp(addr, input);
        }
        if let Some(path) = input.strip_prefix("unix:") {
            #[cfg(unix)]
            {
                if path.is_empty() {
                    return Err(TransportError::InvalidEndpoint(input.to_string()));
                }
                return Ok(Endpoint::Unix(PathBuf::from(path)));
            }
            #[cfg(not(unix))]
            {
                let _ = path;
                return Err(TransportError::InvalidEndpoint(input.to_string()));
            }
        }
        parse_tcp(input, input)
    }
}

fn parse_tcp(addr: &str, original: &str) -> Result<Endpoint> {
    let valid = addr
        .rsplit_once(':')
        .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
        .unwrap_or(false);
    if !valid {
        return Err(TransportError::InvalidEndpoint(original.to_string()));
    }
    Ok(Endpoint::Tcp(addr.to_string()))
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp://{addr}"),
            #[cfg(unix)]
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}
