//! Server address parsing and dialing
//!
//! Accepts `tcp://host:port`, `unix:///path/to.sock`, or a bare
//! `host:port`, which is treated as TCP.

use std::fmt;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use gymlink_utils::{GymError, Result};

/// Trait alias for duplex byte streams an environment can run over
pub trait Stream: Read + Write + Send {}
impl<T: Read + Write + Send> Stream for T {}

/// Where an environment server listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Tcp(String),
    Unix(PathBuf),
}

impl Address {
    pub fn parse(addr: &str) -> Result<Self> {
        if addr.starts_with("tcp://") {
            let url = Url::parse(addr)
                .map_err(|e| GymError::invalid_address(addr, e.to_string()))?;
            let host = url
                .host_str()
                .ok_or_else(|| GymError::invalid_address(addr, "missing host"))?;
            let port = url
                .port()
                .ok_or_else(|| GymError::invalid_address(addr, "missing port"))?;
            Ok(Self::Tcp(format!("{}:{}", host, port)))
        } else if addr.starts_with("unix://") {
            let url = Url::parse(addr)
                .map_err(|e| GymError::invalid_address(addr, e.to_string()))?;
            if url.path().is_empty() || url.path() == "/" {
                return Err(GymError::invalid_address(addr, "missing socket path"));
            }
            Ok(Self::Unix(PathBuf::from(url.path())))
        } else if addr.contains("://") {
            Err(GymError::invalid_address(addr, "unsupported scheme"))
        } else if addr.is_empty() {
            Err(GymError::invalid_address(addr, "empty address"))
        } else {
            Ok(Self::Tcp(addr.to_string()))
        }
    }

    /// Dial the address
    ///
    /// `read_timeout` bounds every blocking read on the returned stream;
    /// the protocol itself has no timeouts.
    pub fn connect(&self, read_timeout: Option<Duration>) -> Result<Box<dyn Stream>> {
        match self {
            Self::Tcp(host) => {
                let stream = TcpStream::connect(host).map_err(|e| {
                    GymError::connection(format!("Failed to connect to {}: {}", host, e))
                })?;
                stream.set_nodelay(true)?;
                stream.set_read_timeout(read_timeout)?;
                Ok(Box::new(stream))
            }
            #[cfg(unix)]
            Self::Unix(path) => {
                let stream = std::os::unix::net::UnixStream::connect(path).map_err(|e| {
                    GymError::connection(format!(
                        "Failed to connect to {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                stream.set_read_timeout(read_timeout)?;
                Ok(Box::new(stream))
            }
            #[cfg(not(unix))]
            Self::Unix(path) => Err(GymError::connection(format!(
                "Unix sockets are not supported on this platform: {}",
                path.display()
            ))),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(host) => write!(f, "tcp://{}", host),
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

impl std::str::FromStr for Address {
    type Err = GymError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
