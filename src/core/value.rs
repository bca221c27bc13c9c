//! # Values
//!
//! [`Value`] is the dynamically-typed parameter that travels in a parameter
//! list. There is one variant per uncompressed wire tag; compression is a
//! property of the encoding, never of the value.
//!
//! Typed code converts through [`IntoValue`] and [`FromValue`]. `Option<T>`
//! maps `None` to [`Value::Null`], and `()` is `Null` as well so that methods
//! without a return value fill slot 0 the same way a null return would.

use crate::core::decimal::Decimal;
use crate::core::serialization::ObjectValue;
use crate::core::tag::ParameterTag;
use crate::error::{ProtocolError, Result};
use chrono::{DateTime, FixedOffset};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Byte(u8),
    Char(char),
    Decimal(Decimal),
    Double(f64),
    Float(f32),
    Int(i32),
    Long(i64),
    SByte(i8),
    Short(i16),
    String(String),
    UInt(u32),
    ULong(u64),
    UShort(u16),
    /// A type name
    Type(String),
    Guid(Uuid),
    DateTime(DateTime<FixedOffset>),
    ByteArray(Vec<u8>),
    CharArray(Vec<char>),
    BoolArray(Vec<bool>),
    SByteArray(Vec<i8>),
    DecimalArray(Vec<Decimal>),
    DoubleArray(Vec<f64>),
    FloatArray(Vec<f32>),
    IntArray(Vec<i32>),
    UIntArray(Vec<u32>),
    LongArray(Vec<i64>),
    ULongArray(Vec<u64>),
    ShortArray(Vec<i16>),
    UShortArray(Vec<u16>),
    StringArray(Vec<String>),
    TypeArray(Vec<String>),
    GuidArray(Vec<Uuid>),
    DateTimeArray(Vec<DateTime<FixedOffset>>),
    /// Any value without a dedicated tag
    Object(ObjectValue),
}

impl Value {
    /// Tag used when the value is written uncompressed
    pub fn tag(&self) -> ParameterTag {
        match self {
            Value::Null => ParameterTag::Null,
            Value::Bool(_) => ParameterTag::Bool,
            Value::Byte(_) => ParameterTag::Byte,
            Value::Char(_) => ParameterTag::Char,
            Value::Decimal(_) => ParameterTag::Decimal,
            Value::Double(_) => ParameterTag::Double,
            Value::Float(_) => ParameterTag::Float,
            Value::Int(_) => ParameterTag::Int,
            Value::Long(_) => ParameterTag::Long,
            Value::SByte(_) => ParameterTag::SByte,
            Value::Short(_) => ParameterTag::Short,
            Value::String(_) => ParameterTag::String,
            Value::UInt(_) => ParameterTag::UInt,
            Value::ULong(_) => ParameterTag::ULong,
            Value::UShort(_) => ParameterTag::UShort,
            Value::Type(_) => ParameterTag::Type,
            Value::Guid(_) => ParameterTag::Guid,
            Value::DateTime(_) => ParameterTag::DateTime,
            Value::ByteArray(_) => ParameterTag::ByteArray,
            Value::CharArray(_) => ParameterTag::CharArray,
            Value::BoolArray(_) => ParameterTag::ArrayBool,
            Value::SByteArray(_) => ParameterTag::ArraySByte,
            Value::DecimalArray(_) => ParameterTag::ArrayDecimal,
            Value::DoubleArray(_) => ParameterTag::ArrayDouble,
            Value::FloatArray(_) => ParameterTag::ArrayFloat,
            Value::IntArray(_) => ParameterTag::ArrayInt,
            Value::UIntArray(_) => ParameterTag::ArrayUInt,
            Value::LongArray(_) => ParameterTag::ArrayLong,
            Value::ULongArray(_) => ParameterTag::ArrayULong,
            Value::ShortArray(_) => ParameterTag::ArrayShort,
            Value::UShortArray(_) => ParameterTag::ArrayUShort,
            Value::StringArray(_) => ParameterTag::ArrayString,
            Value::TypeArray(_) => ParameterTag::ArrayType,
            Value::GuidArray(_) => ParameterTag::ArrayGuid,
            Value::DateTimeArray(_) => ParameterTag::ArrayDateTime,
            Value::Object(_) => ParameterTag::Unknown,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short description of the variant for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Byte(_) => "u8",
            Value::Char(_) => "char",
            Value::Decimal(_) => "decimal",
            Value::Double(_) => "f64",
            Value::Float(_) => "f32",
            Value::Int(_) => "i32",
            Value::Long(_) => "i64",
            Value::SByte(_) => "i8",
            Value::Short(_) => "i16",
            Value::String(_) => "string",
            Value::UInt(_) => "u32",
            Value::ULong(_) => "u64",
            Value::UShort(_) => "u16",
            Value::Type(_) => "type",
            Value::Guid(_) => "guid",
            Value::DateTime(_) => "datetime",
            Value::ByteArray(_) => "u8[]",
            Value::CharArray(_) => "char[]",
            Value::BoolArray(_) => "bool[]",
            Value::SByteArray(_) => "i8[]",
            Value::DecimalArray(_) => "decimal[]",
            Value::DoubleArray(_) => "f64[]",
            Value::FloatArray(_) => "f32[]",
            Value::IntArray(_) => "i32[]",
            Value::UIntArray(_) => "u32[]",
            Value::LongArray(_) => "i64[]",
            Value::ULongArray(_) => "u64[]",
            Value::ShortArray(_) => "i16[]",
            Value::UShortArray(_) => "u16[]",
            Value::StringArray(_) => "string[]",
            Value::TypeArray(_) => "type[]",
            Value::GuidArray(_) => "guid[]",
            Value::DateTimeArray(_) => "datetime[]",
            Value::Object(_) => "object",
        }
    }
}

/// A type name carried under the `Type` tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeName(pub String);

impl TypeName {
    pub fn of<T: ?Sized>() -> Self {
        TypeName(crate::core::serialization::type_name_of::<T>())
    }
}

pub trait IntoValue {
    fn into_value(self) -> Value;
}

pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

/// Name used for a Rust type in method descriptors
pub trait WireType {
    fn wire_name() -> String;
}

fn mismatch(expected: &str, found: &Value) -> ProtocolError {
    ProtocolError::ArgumentMismatch(format!("expected {expected}, found {}", found.kind()))
}

macro_rules! value_conversions {
    ($($ty:ty => $variant:ident, $name:literal;)*) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::$variant(self)
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::$variant(inner) => Ok(inner),
                        other => Err(mismatch($name, &other)),
                    }
                }
            }

            impl WireType for $ty {
                fn wire_name() -> String {
                    $name.to_string()
                }
            }
        )*
    };
}

value_conversions! {
    bool => Bool, "bool";
    u8 => Byte, "u8";
    char => Char, "char";
    Decimal => Decimal, "decimal";
    f64 => Double, "f64";
    f32 => Float, "f32";
    i32 => Int, "i32";
    i64 => Long, "i64";
    i8 => SByte, "i8";
    i16 => Short, "i16";
    String => String, "string";
    u32 => UInt, "u32";
    u64 => ULong, "u64";
    u16 => UShort, "u16";
    Uuid => Guid, "guid";
    DateTime<FixedOffset> => DateTime, "datetime";
    Vec<u8> => ByteArray, "u8[]";
    Vec<char> => CharArray, "char[]";
    Vec<bool> => BoolArray, "bool[]";
    Vec<i8> => SByteArray, "i8[]";
    Vec<Decimal> => DecimalArray, "decimal[]";
    Vec<f64> => DoubleArray, "f64[]";
    Vec<f32> => FloatArray, "f32[]";
    Vec<i32> => IntArray, "i32[]";
    Vec<u32> => UIntArray, "u32[]";
    Vec<i64> => LongArray, "i64[]";
    Vec<u64> => ULongArray, "u64[]";
    Vec<i16> => ShortArray, "i16[]";
    Vec<u16> => UShortArray, "u16[]";
    Vec<String> => StringArray, "string[]";
    Vec<Uuid> => GuidArray, "guid[]";
    Vec<DateTime<FixedOffset>> => DateTimeArray, "datetime[]";
    ObjectValue => Object, "object";
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::String(self.to_string())
    }
}

impl IntoValue for TypeName {
    fn into_value(self) -> Value {
        Value::Type(self.0)
    }
}

impl FromValue for TypeName {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Type(name) => Ok(TypeName(name)),
            other => Err(mismatch("type", &other)),
        }
    }
}

impl WireType for TypeName {
    fn wire_name() -> String {
        "type".to_string()
    }
}

impl IntoValue for Vec<TypeName> {
    fn into_value(self) -> Value {
        Value::TypeArray(self.into_iter().map(|t| t.0).collect())
    }
}

impl FromValue for Vec<TypeName> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::TypeArray(names) => Ok(names.into_iter().map(TypeName).collect()),
            other => Err(mismatch("type[]", &other)),
        }
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Null
    }
}

impl FromValue for () {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(()),
            other => Err(mismatch("null", &other)),
        }
    }
}

impl WireType for () {
    fn wire_name() -> String {
        "void".to_string()
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(inner) => inner.into_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: WireType> WireType for Option<T> {
    fn wire_name() -> String {
        format!("{}?", T::wire_name())
    }
}

/// Build a `Vec<Value>` from heterogeneous expressions
///
/// ```
/// use duplex_rpc::values;
/// use duplex_rpc::core::value::Value;
///
/// let args = values![3i32, "abc", None::<i64>];
/// assert_eq!(args[2], Value::Null);
/// ```
#[macro_export]
macro_rules! values {
    ($($value:expr),* $(,)?) => {
        vec![$($crate::core::value::IntoValue::into_value($value)),*]
    };
}
