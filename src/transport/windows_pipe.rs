//! # Windows Named Pipes Transport
//!
//! Local endpoints on Windows are served over named pipes. Each accepted
//! client takes ownership of the current pipe instance and a fresh instance
//! is created for the next client.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use duplex_rpc::transport::windows_pipe::{pipe_name, PipeListener};
//!
//! # async fn run() -> duplex_rpc::error::Result<()> {
//! let mut listener = PipeListener::bind(&pipe_name("calc"))?;
//! let client = listener.accept().await?;
//! # drop(client);
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use std::io;
use std::time::Duration;
use tokio::net::windows::named_pipe::{ClientOptions, NamedPipeClient, NamedPipeServer, ServerOptions};
use tracing::{debug, info, instrument};

/// Win32 ERROR_PIPE_BUSY
const ERROR_PIPE_BUSY: i32 = 231;

/// Delay between attempts while every pipe instance is busy
const BUSY_RETRY_DELAY: Duration = Duration::from_millis(20);

pub struct PipeListener {
    name: String,
    server: NamedPipeServer,
}

impl PipeListener {
    /// Create the first instance of `name`
    #[instrument(fields(pipe = %name))]
    pub fn bind(name: &str) -> Result<Self> {
        let server = ServerOptions::new().first_pipe_instance(true).create(name)?;
        info!(pipe = %name, "Named pipe listening");
        Ok(Self {
            name: name.to_string(),
            server,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for a client and hand over the connected instance
    pub async fn accept(&mut self) -> Result<NamedPipeServer> {
        self.server.connect().await?;
        let next = ServerOptions::new().create(&self.name)?;
        debug!(pipe = %self.name, "Pipe client connected");
        Ok(std::mem::replace(&mut self.server, next))
    }
}

/// Open a client end of `name`, retrying while all instances are busy.
///
/// The caller bounds the total wait with its connect deadline.
#[instrument(fields(pipe = %name))]
pub async fn connect(name: &str) -> io::Result<NamedPipeClient> {
    loop {
        match ClientOptions::new().open(name) {
            Ok(client) => return Ok(client),
            Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY) => {
                tokio::time::sleep(BUSY_RETRY_DELAY).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Convert a path-like name to the `\\.\pipe\name` form
pub fn pipe_name(path: &str) -> String {
    if path.starts_with("\\\\.\\pipe\\") {
        return path.to_string();
    }

    let name = path
        .trim_start_matches('/')
        .replace(['/', '\\'], "_");

    let name = if name.is_empty() { "duplex_rpc" } else { &name };

    format!("\\\\.\\pipe\\{name}")
}
