//! # Core Wire Components
//!
//! The tagged parameter codec and the types it moves.
//!
//! ## Components
//! - **Tag**: the closed one-byte type tag set
//! - **Value**: dynamically-typed parameters and typed conversions
//! - **Decimal**: 96-bit mantissa decimal with its 16-byte wire form
//! - **Codec**: parameter list encoding/decoding with GZip compression
//! - **Reader**: async byte sources the codec decodes from
//! - **Serialization**: object payload formats and type-name resolution
//!
//! ## Wire Format
//! ```text
//! [Count(i32 LE)] ([Tag(1)] [Payload(N)])*
//! ```
//!
//! ## Security
//! - Lengths are validated against the 16MB payload cap before allocation
//! - Decompressed payloads are capped at the same limit

pub mod codec;
pub mod decimal;
pub mod reader;
pub mod serialization;
pub mod tag;
pub mod value;

pub use codec::{decode_parameters, encode_parameters, CompressionPolicy};
pub use decimal::Decimal;
pub use reader::{SliceReader, WireRead};
pub use serialization::{ObjectValue, PassthroughResolver, SerializationFormat, TypeRegistry, TypeResolver};
pub use tag::ParameterTag;
pub use value::{FromValue, IntoValue, TypeName, Value, WireType};
