//! TCP endpoints. Both sides disable Nagle: every request and response is a
//! single flushed write and latency matters more than segment count.

use crate::error::Result;
use std::io;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, instrument};

pub struct TcpEndpointListener {
    listener: TcpListener,
}

impl TcpEndpointListener {
    #[instrument]
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(address = %listener.local_addr()?, "Listening on tcp");
        Ok(Self { listener })
    }

    /// Bound address; resolves port 0 to the assigned port
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        debug!(peer = %peer, "Accepted tcp connection");
        Ok((stream, peer))
    }
}

pub async fn connect(addr: SocketAddr) -> io::Result<TcpStream> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}
