//! # Error Types
//!
//! Error handling for the RPC runtime.
//!
//! This module defines every error variant that can surface from the codec,
//! the duplex transport, the authentication handshake, the host dispatch loop
//! and the client channel.
//!
//! ## Error Categories
//! - **Connection Errors**: connect deadline, refused connections, closed pipes
//! - **Codec Errors**: malformed payloads, unresolvable type names
//! - **Registry Errors**: duplicate services, non-interface contracts
//! - **Remote Errors**: unknown methods and exceptions raised by the remote side
//! - **Cryptographic Errors**: authentication, encryption, decryption failures
//!
//! Business errors (a remote method failing) are reported per call and leave
//! the connection usable. Framing errors end the connection they occurred on;
//! see [`ProtocolError::is_fatal`].
//!
//! ## Example Usage
//! ```rust
//! use duplex_rpc::error::{ProtocolError, Result};
//! use tracing::{error, info};
//!
//! fn parse_port(raw: &str) -> Result<u16> {
//!     raw.parse::<u16>()
//!         .map_err(|e| ProtocolError::ConfigError(format!("bad port: {e}")))
//! }
//!
//! match parse_port("8098") {
//!     Ok(port) => info!(port, "Parsed port"),
//!     Err(e) => error!(error = %e, "Invalid port"),
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Codec errors
    pub const ERR_TRUNCATED: &str = "Stream ended in the middle of a value";
    pub const ERR_INVALID_UTF8: &str = "Invalid UTF-8 sequence";
    pub const ERR_INVALID_CHAR: &str = "Invalid UTF-8 char encoding";
    pub const ERR_INVALID_LENGTH: &str = "Negative or oversized length prefix";
    pub const ERR_INVALID_VARINT: &str = "7-bit encoded length is too long";
    pub const ERR_INVALID_DECIMAL: &str = "Decimal flags or scale out of range";
    pub const ERR_INVALID_DATETIME: &str = "Unparseable date/time value";
    pub const ERR_UNEXPECTED_TAG: &str = "Tag not valid in this position";

    /// Connection errors
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";
    pub const ERR_TIMEOUT: &str = "Operation timed out";
    pub const ERR_PIPE_CLOSED: &str = "Duplex pipe is closed";

    /// Cryptographic errors
    pub const ERR_ENCRYPTION_FAILED: &str = "Encryption failed";
    pub const ERR_DECRYPTION_FAILED: &str = "Decryption failed";

    /// Compression errors
    pub const ERR_COMPRESSION_FAILED: &str = "Compression failed";
    pub const ERR_DECOMPRESSION_FAILED: &str = "Decompression failed";

    /// Handshake errors
    pub const ERR_UNKNOWN_USER: &str = "No password verifier registered for user";
    pub const ERR_PROOF_MISMATCH: &str = "Client proof does not match";
    pub const ERR_SERVER_PROOF_MISMATCH: &str = "Server proof does not match";
    pub const ERR_WEAK_PUBLIC_KEY: &str = "Peer public key is not contributory";
    pub const ERR_HANDSHAKE_REJECTED: &str = "Host rejected the handshake";
    pub const ERR_HANDSHAKE_OUT_OF_ORDER: &str = "Handshake message received out of order";
    pub const ERR_SERVER_SECRET_NOT_FOUND: &str = "Server ephemeral secret not found";
    pub const ERR_CLIENT_SECRET_NOT_FOUND: &str = "Client ephemeral secret not found";
    pub const ERR_AUTH_REQUIRED: &str = "Host requires authentication before RPC traffic";

    /// Registry errors
    pub const ERR_EMPTY_SERVICE_KEY: &str = "Service key is empty";
    pub const ERR_NO_METHODS: &str = "Contract declares no methods";
    pub const ERR_INVALID_SERVICE_KEY: &str = "Service key contains invalid characters";
}

/// ProtocolError is the primary error type for all runtime operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Connect deadline of {0:?} elapsed")]
    ConnectTimeout(std::time::Duration),

    #[error("Connection refused by {0}")]
    ConnectRefused(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Unknown type on the wire: {0}")]
    UnknownType(String),

    #[error("Service already registered: {0}")]
    DuplicateService(String),

    #[error("Contract is not an interface: {0}")]
    NotAnInterface(String),

    #[error("Service not found on host: {0}")]
    ServiceNotFound(String),

    #[error("Remote method not found: {0}")]
    RemoteMethodNotFound(String),

    #[error("Remote invocation failed: {type_name}: {message}")]
    RemoteInvocationFailed {
        type_name: String,
        message: String,
        stack: Option<String>,
    },

    #[error("Argument mismatch: {0}")]
    ArgumentMismatch(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Deserialize error: {0}")]
    DeserializeError(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Decryption failed")]
    DecryptionFailure,

    #[error("Encryption failed")]
    EncryptionFailure,

    #[error("Compression failed")]
    CompressionFailure,

    #[error("Decompression failed")]
    DecompressionFailure,

    #[error("Unexpected message type: {0}")]
    UnexpectedMessage(i32),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// Whether the error leaves the connection in an unusable state.
    ///
    /// Per-call failures (remote exceptions, unknown methods, argument
    /// conversion) keep the request/response alternation intact.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ProtocolError::RemoteInvocationFailed { .. }
                | ProtocolError::RemoteMethodNotFound(_)
                | ProtocolError::ArgumentMismatch(_)
                | ProtocolError::DuplicateService(_)
                | ProtocolError::NotAnInterface(_)
                | ProtocolError::ConfigError(_)
        )
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        ProtocolError::MalformedPayload(msg.into())
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_failures_are_not_fatal() {
        let err = ProtocolError::RemoteInvocationFailed {
            type_name: "ArgumentException".into(),
            message: "bad".into(),
            stack: None,
        };
        assert!(!err.is_fatal());
        assert!(!ProtocolError::RemoteMethodNotFound("x".into()).is_fatal());
        assert!(ProtocolError::ConnectionClosed.is_fatal());
        assert!(ProtocolError::malformed("tag 200").is_fatal());
    }

    #[test]
    fn test_display_carries_remote_details() {
        let err = ProtocolError::RemoteInvocationFailed {
            type_name: "DivideByZero".into(),
            message: "attempted to divide by zero".into(),
            stack: Some("at calc".into()),
        };
        assert_eq!(
            err.to_string(),
            "Remote invocation failed: DivideByZero: attempted to divide by zero"
        );
    }
}
