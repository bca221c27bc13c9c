//! # Serialization Formats
//!
//! Object payloads that have no dedicated wire tag, and the service sync
//! table exchanged during interface sync, go through an injected
//! [`SerializationFormat`]. Both sides of a connection must agree on it.
//!
//! ## Formats
//! - **Bincode**: binary compact format (default, fastest)
//! - **JSON**: human-readable, useful for debugging and interop
//! - **MessagePack**: compact self-describing binary
//!
//! ## Type Names
//! Unknown-tag values travel with a type name. Names are normalized by
//! dropping assembly qualifiers (`Version=`, `Culture=`, `PublicKeyToken=`)
//! so peers built against different versions of a contract still agree, and
//! the receiving side asks a [`TypeResolver`] to map the name to a local type.
//!
//! ## Usage
//! ```
//! use duplex_rpc::core::serialization::{ObjectValue, SerializationFormat};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Point { x: i32, y: i32 }
//!
//! let obj = ObjectValue::encode(&Point { x: 1, y: 2 }, SerializationFormat::Json).unwrap();
//! let back: Point = obj.decode(SerializationFormat::Json).unwrap();
//! assert_eq!(back, Point { x: 1, y: 2 });
//! ```

use crate::error::{ProtocolError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Supported serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    /// Binary compact format (default, fastest)
    #[default]
    Bincode,
    /// Human-readable JSON format (debugging, interop)
    Json,
    /// Compact binary format (MessagePack, efficient)
    #[serde(rename = "messagepack")]
    MessagePack,
}

impl SerializationFormat {
    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            SerializationFormat::Bincode => "Bincode",
            SerializationFormat::Json => "JSON",
            SerializationFormat::MessagePack => "MessagePack",
        }
    }

    pub fn serialize<T: Serialize + ?Sized>(self, value: &T) -> Result<Vec<u8>> {
        match self {
            SerializationFormat::Bincode => {
                bincode::serialize(value).map_err(|e| ProtocolError::SerializeError(e.to_string()))
            }
            SerializationFormat::Json => {
                serde_json::to_vec(value).map_err(|e| ProtocolError::SerializeError(e.to_string()))
            }
            SerializationFormat::MessagePack => rmp_serde::to_vec_named(value)
                .map_err(|e| ProtocolError::SerializeError(e.to_string())),
        }
    }

    pub fn deserialize<T: DeserializeOwned>(self, data: &[u8]) -> Result<T> {
        match self {
            SerializationFormat::Bincode => bincode::deserialize(data)
                .map_err(|e| ProtocolError::DeserializeError(e.to_string())),
            SerializationFormat::Json => serde_json::from_slice(data)
                .map_err(|e| ProtocolError::DeserializeError(e.to_string())),
            SerializationFormat::MessagePack => rmp_serde::from_slice(data)
                .map_err(|e| ProtocolError::DeserializeError(e.to_string())),
        }
    }
}

/// Trait for types that support multiple serialization formats
pub trait MultiFormat: Serialize + DeserializeOwned + Sized {
    fn serialize_format(&self, format: SerializationFormat) -> Result<Vec<u8>> {
        format.serialize(self)
    }

    fn deserialize_format(data: &[u8], format: SerializationFormat) -> Result<Self> {
        format.deserialize(data)
    }
}

/// A value carried under the Unknown tag: a normalized type name plus the
/// payload produced by the connection's [`SerializationFormat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectValue {
    pub type_name: String,
    pub payload: Vec<u8>,
}

impl ObjectValue {
    pub fn new(type_name: impl AsRef<str>, payload: Vec<u8>) -> Self {
        Self {
            type_name: normalize_type_name(type_name.as_ref()),
            payload,
        }
    }

    /// Serialize `value`, naming it after its Rust type
    pub fn encode<T: Serialize>(value: &T, format: SerializationFormat) -> Result<Self> {
        Ok(Self::new(type_name_of::<T>(), format.serialize(value)?))
    }

    pub fn decode<T: DeserializeOwned>(&self, format: SerializationFormat) -> Result<T> {
        format.deserialize(&self.payload)
    }
}

/// Normalized wire name of a Rust type
pub fn type_name_of<T: ?Sized>() -> String {
    normalize_type_name(std::any::type_name::<T>())
}

const STRIPPED_QUALIFIERS: [&str; 3] = ["Version=", "Culture=", "PublicKeyToken="];

/// Remove `, Version=…`, `, Culture=…` and `, PublicKeyToken=…` components
/// from a type name. Nested generic brackets are preserved.
pub fn normalize_type_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;
    while let Some(comma) = rest.find(',') {
        out.push_str(&rest[..comma]);
        let after = &rest[comma + 1..];
        let trimmed = after.trim_start();
        if STRIPPED_QUALIFIERS.iter().any(|q| trimmed.starts_with(q)) {
            let end = trimmed.find([',', ']']).unwrap_or(trimmed.len());
            rest = &trimmed[end..];
        } else {
            out.push(',');
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

/// Maps a type name read off the wire to a local canonical name.
///
/// Returning `None` makes the decoder fail with `UnknownType`.
pub trait TypeResolver: Send + Sync {
    fn resolve(&self, wire_name: &str) -> Option<String>;
}

/// Accepts every name as-is (after normalization)
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughResolver;

impl TypeResolver for PassthroughResolver {
    fn resolve(&self, wire_name: &str) -> Option<String> {
        Some(normalize_type_name(wire_name))
    }
}

/// Accepts only explicitly registered names, optionally aliasing a foreign
/// name to a local one
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    names: HashMap<String, String>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the Rust type `T` under its own name
    pub fn register<T: ?Sized>(&mut self) -> &mut Self {
        let name = type_name_of::<T>();
        self.names.insert(name.clone(), name);
        self
    }

    /// Register a wire name that resolves to itself
    pub fn register_name(&mut self, name: &str) -> &mut Self {
        let name = normalize_type_name(name);
        self.names.insert(name.clone(), name);
        self
    }

    /// Resolve `wire_name` to `local_name`
    pub fn alias(&mut self, wire_name: &str, local_name: &str) -> &mut Self {
        self.names
            .insert(normalize_type_name(wire_name), normalize_type_name(local_name));
        self
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl TypeResolver for TypeRegistry {
    fn resolve(&self, wire_name: &str) -> Option<String> {
        self.names.get(&normalize_type_name(wire_name)).cloned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: u64,
        lines: Vec<String>,
    }

    fn order() -> Order {
        Order {
            id: 42,
            lines: vec!["widget".into(), "gadget".into()],
        }
    }

    #[test]
    fn test_every_format_roundtrips_objects() {
        for format in [
            SerializationFormat::Bincode,
            SerializationFormat::Json,
            SerializationFormat::MessagePack,
        ] {
            let obj = ObjectValue::encode(&order(), format).unwrap();
            assert!(obj.type_name.ends_with("Order"));
            assert_eq!(obj.decode::<Order>(format).unwrap(), order());
        }
    }

    #[test]
    fn test_format_mismatch_is_an_error() {
        let obj = ObjectValue::encode(&order(), SerializationFormat::Bincode).unwrap();
        assert!(obj.decode::<Order>(SerializationFormat::Json).is_err());
    }

    #[test]
    fn test_strips_assembly_qualifiers() {
        assert_eq!(
            normalize_type_name("Demo.Order, Demo, Version=1.2.3.4, Culture=neutral, PublicKeyToken=null"),
            "Demo.Order, Demo"
        );
        assert_eq!(
            normalize_type_name(
                "List`1[[Demo.Order, Demo, Version=1.0.0.0, Culture=neutral, PublicKeyToken=abc]], mscorlib, Version=4.0.0.0"
            ),
            "List`1[[Demo.Order, Demo]], mscorlib"
        );
        assert_eq!(normalize_type_name("i32"), "i32");
    }

    #[test]
    fn test_registry_resolves_only_registered() {
        let mut registry = TypeRegistry::new();
        registry.register::<Order>().alias("Legacy.Order, Legacy, Version=2.0.0.0", "app.Order");

        assert_eq!(registry.resolve(&type_name_of::<Order>()), Some(type_name_of::<Order>()));
        assert_eq!(registry.resolve("Legacy.Order, Legacy"), Some("app.Order".to_string()));
        assert_eq!(registry.resolve("Other.Type"), None);
        assert_eq!(PassthroughResolver.resolve("Other.Type"), Some("Other.Type".into()));
    }

    #[test]
    fn test_default_format() {
        assert_eq!(SerializationFormat::default(), SerializationFormat::Bincode);
        assert_eq!(SerializationFormat::MessagePack.name(), "MessagePack");
    }
}
