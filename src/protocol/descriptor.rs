//! Method descriptors and the sync info a host hands to a connecting channel.

use crate::core::serialization::{MultiFormat, SerializationFormat};
use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub id: u32,
    pub name: String,
    pub return_type: String,
    pub parameter_types: Vec<String>,
    pub by_ref: Vec<bool>,
}

impl MethodDescriptor {
    /// Whether this descriptor matches a by-name lookup
    pub fn matches(&self, name: &str, parameter_types: &[String]) -> bool {
        self.name == name && self.parameter_types == parameter_types
    }

    pub fn has_by_ref(&self) -> bool {
        self.by_ref.iter().any(|r| *r)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSyncInfo {
    pub service_key_index: i32,
    pub use_compression: bool,
    pub compression_threshold: usize,
    pub methods: Vec<MethodDescriptor>,
}

impl MultiFormat for ServiceSyncInfo {}

impl ServiceSyncInfo {
    pub fn method(&self, id: u32) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.id == id)
    }

    /// Resolve a method id by name and parameter type names
    pub fn find_method(&self, name: &str, parameter_types: &[String]) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.matches(name, parameter_types))
    }

    /// Resolve by name alone when exactly one overload exists
    pub fn find_unique(&self, name: &str) -> Option<&MethodDescriptor> {
        let mut candidates = self.methods.iter().filter(|m| m.name == name);
        let first = candidates.next()?;
        candidates.next().is_none().then_some(first)
    }

    pub fn to_bytes(&self, format: SerializationFormat) -> Result<Vec<u8>> {
        self.serialize_format(format)
    }

    pub fn from_bytes(data: &[u8], format: SerializationFormat) -> Result<Self> {
        Self::deserialize_format(data, format)
    }
}
