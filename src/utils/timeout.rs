//! # Timeouts
//!
//! Default deadlines and async wrappers that turn an elapsed deadline into a
//! [`ProtocolError`].

use crate::error::{ProtocolError, Result};
use std::future::Future;
use std::time::Duration;

/// Default deadline for blocking protocol operations
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default connect deadline for a channel
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(2500);

/// Deadline for draining the outbound pump when a pipe closes
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Grace period granted to connections during host shutdown
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Run `fut` with a deadline, mapping expiry to [`ProtocolError::Timeout`].
pub async fn with_timeout_error<F, T>(fut: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::Timeout),
    }
}

/// Run `fut` with a deadline, mapping expiry to a caller-chosen error.
pub async fn with_timeout_or<F, T>(fut: F, duration: Duration, on_elapsed: ProtocolError) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_elapsed),
    }
}
