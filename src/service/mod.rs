//! # Service Layer
//!
//! - **Registry**: contracts, method thunks and key indices
//! - **Host**: listener, per-connection tasks and graceful shutdown
//! - **Channel**: client connection bound to one service

pub mod channel;
pub mod host;
pub mod registry;

pub use channel::{Channel, ChannelOptions, ZkCredentials};
pub use host::{Host, HostBuilder, HostHandle};
pub use registry::{CallArgs, Fault, InterfaceDef, Invocation, MethodDef, ServiceRegistry};
