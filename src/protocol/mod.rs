//! # Protocol Layer
//!
//! Message framing, the interface sync table, call dispatch and the
//! zero-knowledge password handshake.
//!
//! ## Message Flow
//! ```text
//! Channel                                   Host
//!   |-- ZkInitiate (username) ------------->|   optional
//!   |<------------------ salt, B -----------|
//!   |-- ZkProof (A, M1) ------------------->|
//!   |<------------------ M2 ----------------|   session key established
//!   |-- SyncInterface (service key) ------->|
//!   |<------------------ sync info ---------|
//!   |-- MethodInvocation (idx, id, args) -->|
//!   |<-- ReturnValues | ThrowException | UnknownMethod
//!   |-- TerminateConnection --------------->|
//! ```
//!
//! Every message starts with an `i32` little-endian message type. After the
//! handshake, parameter lists and sync blocks are sealed with
//! XChaCha20-Poly1305 under the session key.

pub mod descriptor;
pub mod dispatcher;
pub mod handshake;
pub mod message;
pub mod zk_repository;

pub use descriptor::{MethodDescriptor, ServiceSyncInfo};
pub use message::{InvocationResult, MessageType, MethodCallEnvelope, RemoteFault};
pub use zk_repository::{MemoryZkRepository, ZkPasswordHash, ZkRepository};

#[cfg(test)]
mod tests;
