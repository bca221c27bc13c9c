//! Unix domain socket endpoints.
//!
//! The listener removes a stale socket file before binding and removes its
//! own file again when dropped.

use crate::error::Result;
use std::io;
use std::path::{Path, PathBuf};
use tokio::net::{UnixListener, UnixStream};
use tracing::{error, info, instrument};

pub struct LocalListener {
    listener: UnixListener,
    path: PathBuf,
}

impl LocalListener {
    #[instrument(skip(path), fields(socket_path = %path.as_ref().display()))]
    pub async fn bind<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            tokio::fs::remove_file(&path).await.ok();
        }

        let listener = UnixListener::bind(&path)?;
        info!(path = %path.display(), "Listening on unix socket");
        Ok(Self { listener, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _) = self.listener.accept().await?;
        Ok(stream)
    }
}

impl Drop for LocalListener {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                error!(error = %e, path = %self.path.display(), "Failed to remove socket file");
            } else {
                info!(path = %self.path.display(), "Removed socket file");
            }
        }
    }
}

#[instrument(skip(path), fields(socket_path = %path.as_ref().display()))]
pub async fn connect<P: AsRef<Path>>(path: P) -> io::Result<UnixStream> {
    UnixStream::connect(path).await
}
