//! # Utility Modules
//!
//! Supporting utilities shared by the codec, the transport, the host and the
//! channel.
//!
//! ## Components
//! - **Buffer Pool**: RAII buffer leases with debug poisoning
//! - **Compression**: GZip with a strict size threshold and output cap
//! - **Crypto**: XChaCha20-Poly1305 AEAD for established sessions
//! - **Logging**: `tracing-subscriber` setup from configuration
//! - **Metrics**: per-host counters and operation timers
//! - **Timeout**: async deadline wrappers
//!
//! ## Security
//! - Cryptographically secure RNG (getrandom)
//! - Decompression bomb protection (16MB limit)
//! - Memory zeroing for key material (zeroize crate)

pub mod buffer_pool;
pub mod compression;
pub mod crypto;
pub mod logging;
pub mod metrics;
pub mod timeout;

pub use buffer_pool::{BufferLease, BufferPool};
pub use metrics::{HostStats, StatsSnapshot};
