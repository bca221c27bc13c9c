//! # duplex-rpc
//!
//! Point-to-point RPC over a single full-duplex byte stream.
//!
//! A [`Host`](service::Host) exposes services described by an
//! [`InterfaceDef`](service::InterfaceDef); a [`Channel`](service::Channel)
//! connects to one service, syncs its method table and invokes methods by id.
//! Parameters travel in a tagged binary codec with optional GZip compression.
//! Hosts can require a zero-knowledge password handshake, after which all
//! payloads are encrypted under the negotiated session key.
//!
//! ```rust,no_run
//! use duplex_rpc::service::{Channel, ChannelOptions, Host, InterfaceDef, MethodDef, ServiceRegistry};
//! use duplex_rpc::transport::Endpoint;
//! use duplex_rpc::values;
//!
//! struct Calculator;
//!
//! # async fn run() -> duplex_rpc::error::Result<()> {
//! let contract = InterfaceDef::new("Demo.ICalculator").method(
//!     MethodDef::new("Min").param::<i32>().param::<i32>().returns::<i32>(),
//!     |_: &Calculator, args| {
//!         let (a, b) = (args.get::<i32>(0)?, args.get::<i32>(1)?);
//!         args.returning(a.min(b))
//!     },
//! );
//! let mut registry = ServiceRegistry::new();
//! registry.register(contract, Calculator)?;
//!
//! let handle = Host::builder(registry).build().bind(&Endpoint::parse("127.0.0.1:0")?).await?;
//!
//! let mut channel = Channel::connect(handle.endpoint(), ChannelOptions::new("Demo.ICalculator")).await?;
//! let min: i32 = channel.call_as("Min", &mut values![4, 2]).await?;
//! assert_eq!(min, 2);
//!
//! channel.close().await?;
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//! - [`core`]: tagged codec, values, object serialization
//! - [`transport`]: endpoints and the duplex pipe
//! - [`protocol`]: message framing, sync info, dispatch, handshake
//! - [`service`]: registry, host and channel
//! - [`utils`]: buffer pool, compression, crypto, logging, metrics, timeouts

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use error::{ProtocolError, Result};
