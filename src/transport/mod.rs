//! # Transport Layer
//!
//! Endpoints, listeners and the [`DuplexPipe`] every connection runs over.
//!
//! ## Endpoints
//! - `Endpoint::Tcp`: a socket address
//! - `Endpoint::Local`: a Unix domain socket path, or a named pipe on Windows
//!
//! Textual form accepted by [`Endpoint::parse`]: `host:port` or
//! `local:<path>`.

pub mod duplex;
#[cfg(unix)]
pub mod local;
pub mod tcp;
#[cfg(windows)]
pub mod windows_pipe;

pub use duplex::DuplexPipe;

use crate::config::TransportConfig;
use crate::error::{ProtocolError, Result};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const LOCAL_PREFIX: &str = "local:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(SocketAddr),
    Local(PathBuf),
}

impl Endpoint {
    pub fn parse(text: &str) -> Result<Self> {
        if let Some(path) = text.strip_prefix(LOCAL_PREFIX) {
            if path.is_empty() {
                return Err(ProtocolError::ConfigError("Local endpoint path is empty".into()));
            }
            return Ok(Endpoint::Local(PathBuf::from(path)));
        }
        text.parse::<SocketAddr>()
            .map(Endpoint::Tcp)
            .map_err(|e| ProtocolError::ConfigError(format!("Invalid endpoint '{text}': {e}")))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "{addr}"),
            Endpoint::Local(path) => write!(f, "{LOCAL_PREFIX}{}", path.display()),
        }
    }
}

impl std::str::FromStr for Endpoint {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Endpoint::parse(s)
    }
}

fn map_connect_error(e: io::Error, endpoint: &Endpoint) -> ProtocolError {
    match e.kind() {
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => {
            ProtocolError::ConnectRefused(endpoint.to_string())
        }
        _ => ProtocolError::Io(e),
    }
}

/// Connect to `endpoint` within `deadline` and start a duplex pipe over it.
///
/// # Errors
/// `ConnectTimeout` when the deadline elapses, `ConnectRefused` when nothing
/// listens at the endpoint.
#[instrument(skip(config), fields(endpoint = %endpoint))]
pub async fn connect(endpoint: &Endpoint, deadline: Duration, config: &TransportConfig) -> Result<DuplexPipe> {
    let attempt = async {
        match endpoint {
            Endpoint::Tcp(addr) => {
                let stream = tcp::connect(*addr).await?;
                Ok::<_, io::Error>(DuplexPipe::new(stream, config, endpoint.to_string()))
            }
            #[cfg(unix)]
            Endpoint::Local(path) => {
                let stream = local::connect(path).await?;
                Ok(DuplexPipe::new(stream, config, endpoint.to_string()))
            }
            #[cfg(windows)]
            Endpoint::Local(path) => {
                let name = windows_pipe::pipe_name(&path.to_string_lossy());
                let client = windows_pipe::connect(&name).await?;
                Ok(DuplexPipe::new(client, config, endpoint.to_string()))
            }
        }
    };

    match tokio::time::timeout(deadline, attempt).await {
        Ok(Ok(pipe)) => {
            debug!("Connected");
            Ok(pipe)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Connect failed");
            Err(map_connect_error(e, endpoint))
        }
        Err(_) => Err(ProtocolError::ConnectTimeout(deadline)),
    }
}

/// A bound endpoint producing one [`DuplexPipe`] per accepted client
pub enum Listener {
    Tcp(tcp::TcpEndpointListener),
    #[cfg(unix)]
    Local(local::LocalListener),
    #[cfg(windows)]
    Pipe(windows_pipe::PipeListener),
}

impl Listener {
    pub async fn bind(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Tcp(addr) => Ok(Listener::Tcp(tcp::TcpEndpointListener::bind(*addr).await?)),
            #[cfg(unix)]
            Endpoint::Local(path) => Ok(Listener::Local(local::LocalListener::bind(path).await?)),
            #[cfg(windows)]
            Endpoint::Local(path) => {
                let name = windows_pipe::pipe_name(&path.to_string_lossy());
                Ok(Listener::Pipe(windows_pipe::PipeListener::bind(&name)?))
            }
        }
    }

    /// The endpoint clients should connect to
    pub fn local_endpoint(&self) -> Result<Endpoint> {
        match self {
            Listener::Tcp(l) => Ok(Endpoint::Tcp(l.local_addr()?)),
            #[cfg(unix)]
            Listener::Local(l) => Ok(Endpoint::Local(l.path().to_path_buf())),
            #[cfg(windows)]
            Listener::Pipe(l) => Ok(Endpoint::Local(PathBuf::from(l.name()))),
        }
    }

    pub async fn accept(&mut self, config: &TransportConfig) -> Result<DuplexPipe> {
        match self {
            Listener::Tcp(l) => {
                let (stream, peer) = l.accept().await?;
                Ok(DuplexPipe::new(stream, config, peer.to_string()))
            }
            #[cfg(unix)]
            Listener::Local(l) => {
                let stream = l.accept().await?;
                let peer = format!("{LOCAL_PREFIX}{}", l.path().display());
                Ok(DuplexPipe::new(stream, config, peer))
            }
            #[cfg(windows)]
            Listener::Pipe(l) => {
                let server = l.accept().await?;
                let peer = l.name().to_string();
                Ok(DuplexPipe::new(server, config, peer))
            }
        }
    }
}
