//! # Parameter Codec
//!
//! Encodes heterogeneous parameter lists into the tagged binary form and back.
//!
//! ## Wire Format
//! ```text
//! [count: i32 LE] ([tag: u8] [payload])*
//! ```
//! - Scalars are fixed-width little-endian; `char` is its UTF-8 sequence.
//! - Strings, type names and date/times use a 7-bit encoded byte length.
//! - Arrays are an `i32` element count followed by each element.
//! - `ByteArray` and every compressed payload are `i32 len + bytes`.
//! - Unknown values are `type name + i32 len + payload`.
//!
//! ## Compression
//! Byte arrays, char arrays, strings, string arrays and unknown values are
//! GZip-compressed when the [`CompressionPolicy`] is enabled and the payload
//! is strictly larger than its threshold. The tag switches to the matching
//! `Compressed*` tag. Scalars are never compressed.
//!
//! ## Decoding
//! Decoding mirrors encoding over any [`WireRead`] source. Unknown tags,
//! truncated input and invalid encodings fail with `MalformedPayload`;
//! type names the [`TypeResolver`] rejects fail with `UnknownType`.

use crate::config::MAX_PAYLOAD_SIZE;
use crate::core::decimal::Decimal;
use crate::core::reader::{checked_len, SliceReader, WireRead};
use crate::core::serialization::{ObjectValue, TypeResolver};
use crate::core::tag::ParameterTag;
use crate::core::value::Value;
use crate::error::{constants, ProtocolError, Result};
use crate::utils::compression;
use bytes::BufMut;
use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat};
use uuid::Uuid;

/// When payloads are compressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionPolicy {
    pub enabled: bool,
    pub threshold: usize,
}

impl CompressionPolicy {
    pub const DISABLED: CompressionPolicy = CompressionPolicy {
        enabled: false,
        threshold: usize::MAX,
    };

    pub fn new(enabled: bool, threshold: usize) -> Self {
        Self { enabled, threshold }
    }

    #[inline]
    fn applies(&self, len: usize) -> bool {
        compression::should_compress(self.enabled, len, self.threshold)
    }
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self::DISABLED
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Append the encoded parameter list to `out`.
pub fn encode_parameters(values: &[Value], policy: CompressionPolicy, out: &mut Vec<u8>) -> Result<()> {
    out.put_i32_le(len_i32(values.len())?);
    for value in values {
        encode_value(value, policy, out)?;
    }
    Ok(())
}

/// Encode the parameter list into a fresh buffer.
pub fn encode_to_vec(values: &[Value], policy: CompressionPolicy) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(64);
    encode_parameters(values, policy, &mut out)?;
    Ok(out)
}

fn len_i32(len: usize) -> Result<i32> {
    if len > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::OversizedPacket(len));
    }
    i32::try_from(len).map_err(|_| ProtocolError::OversizedPacket(len))
}

/// Write a 7-bit encoded (LEB128) length
pub fn put_7bit_len(out: &mut Vec<u8>, len: usize) -> Result<()> {
    let mut value = len_i32(len)? as u32;
    while value >= 0x80 {
        out.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    out.put_u8(value as u8);
    Ok(())
}

/// Write a 7-bit length prefixed UTF-8 string
pub fn put_string(out: &mut Vec<u8>, s: &str) -> Result<()> {
    put_7bit_len(out, s.len())?;
    out.put_slice(s.as_bytes());
    Ok(())
}

/// Write an `i32` length followed by the bytes
pub fn put_len_prefixed(out: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    out.put_i32_le(len_i32(bytes.len())?);
    out.put_slice(bytes);
    Ok(())
}

fn put_char(out: &mut Vec<u8>, c: char) {
    let mut buf = [0u8; 4];
    out.put_slice(c.encode_utf8(&mut buf).as_bytes());
}

fn format_datetime(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn put_compressed(out: &mut Vec<u8>, tag: ParameterTag, raw: &[u8]) -> Result<()> {
    let packed = compression::compress(raw)?;
    out.put_u8(tag.as_byte());
    put_len_prefixed(out, &packed)
}

fn put_array<T>(out: &mut Vec<u8>, tag: ParameterTag, items: &[T], mut each: impl FnMut(&mut Vec<u8>, &T) -> Result<()>) -> Result<()> {
    out.put_u8(tag.as_byte());
    out.put_i32_le(len_i32(items.len())?);
    for item in items {
        each(out, item)?;
    }
    Ok(())
}

fn encode_string_array_body(out: &mut Vec<u8>, items: &[String]) -> Result<()> {
    out.put_i32_le(len_i32(items.len())?);
    for item in items {
        put_string(out, item)?;
    }
    Ok(())
}

fn encode_value(value: &Value, policy: CompressionPolicy, out: &mut Vec<u8>) -> Result<()> {
    use ParameterTag as T;

    macro_rules! scalar {
        ($tag:expr, $put:ident, $v:expr) => {{
            out.put_u8($tag.as_byte());
            out.$put($v);
        }};
    }
    macro_rules! numeric_array {
        ($tag:expr, $put:ident, $items:expr) => {
            put_array(out, $tag, $items, |o, x| {
                o.$put(*x);
                Ok(())
            })?
        };
    }

    match value {
        Value::Null => out.put_u8(T::Null.as_byte()),
        Value::Bool(v) => scalar!(T::Bool, put_u8, u8::from(*v)),
        Value::Byte(v) => scalar!(T::Byte, put_u8, *v),
        Value::SByte(v) => scalar!(T::SByte, put_i8, *v),
        Value::Short(v) => scalar!(T::Short, put_i16_le, *v),
        Value::UShort(v) => scalar!(T::UShort, put_u16_le, *v),
        Value::Int(v) => scalar!(T::Int, put_i32_le, *v),
        Value::UInt(v) => scalar!(T::UInt, put_u32_le, *v),
        Value::Long(v) => scalar!(T::Long, put_i64_le, *v),
        Value::ULong(v) => scalar!(T::ULong, put_u64_le, *v),
        Value::Float(v) => scalar!(T::Float, put_f32_le, *v),
        Value::Double(v) => scalar!(T::Double, put_f64_le, *v),
        Value::Char(c) => {
            out.put_u8(T::Char.as_byte());
            put_char(out, *c);
        }
        Value::Decimal(d) => {
            out.put_u8(T::Decimal.as_byte());
            out.put_slice(&d.to_le_bytes());
        }
        Value::Guid(g) => {
            out.put_u8(T::Guid.as_byte());
            out.put_slice(&g.to_bytes_le());
        }
        Value::DateTime(dt) => {
            out.put_u8(T::DateTime.as_byte());
            put_string(out, &format_datetime(dt))?;
        }
        Value::Type(name) => {
            out.put_u8(T::Type.as_byte());
            put_string(out, name)?;
        }
        Value::String(s) => {
            if policy.applies(s.len()) {
                put_compressed(out, T::CompressedString, s.as_bytes())?;
            } else {
                out.put_u8(T::String.as_byte());
                put_string(out, s)?;
            }
        }
        Value::ByteArray(bytes) => {
            if policy.applies(bytes.len()) {
                put_compressed(out, T::CompressedByteArray, bytes)?;
            } else {
                out.put_u8(T::ByteArray.as_byte());
                put_len_prefixed(out, bytes)?;
            }
        }
        Value::CharArray(chars) => {
            let utf8: String = chars.iter().collect();
            if policy.applies(utf8.len()) {
                put_compressed(out, T::CompressedCharArray, utf8.as_bytes())?;
            } else {
                out.put_u8(T::CharArray.as_byte());
                out.put_i32_le(len_i32(chars.len())?);
                out.put_slice(utf8.as_bytes());
            }
        }
        Value::StringArray(items) => {
            let total: usize = items.iter().map(String::len).sum();
            if policy.applies(total) {
                let mut body = Vec::with_capacity(total + items.len() * 2 + 4);
                encode_string_array_body(&mut body, items)?;
                put_compressed(out, T::CompressedArrayString, &body)?;
            } else {
                out.put_u8(T::ArrayString.as_byte());
                encode_string_array_body(out, items)?;
            }
        }
        Value::BoolArray(items) => put_array(out, T::ArrayBool, items, |o, b| {
            o.put_u8(u8::from(*b));
            Ok(())
        })?,
        Value::SByteArray(items) => numeric_array!(T::ArraySByte, put_i8, items),
        Value::ShortArray(items) => numeric_array!(T::ArrayShort, put_i16_le, items),
        Value::UShortArray(items) => numeric_array!(T::ArrayUShort, put_u16_le, items),
        Value::IntArray(items) => numeric_array!(T::ArrayInt, put_i32_le, items),
        Value::UIntArray(items) => numeric_array!(T::ArrayUInt, put_u32_le, items),
        Value::LongArray(items) => numeric_array!(T::ArrayLong, put_i64_le, items),
        Value::ULongArray(items) => numeric_array!(T::ArrayULong, put_u64_le, items),
        Value::FloatArray(items) => numeric_array!(T::ArrayFloat, put_f32_le, items),
        Value::DoubleArray(items) => numeric_array!(T::ArrayDouble, put_f64_le, items),
        Value::DecimalArray(items) => put_array(out, T::ArrayDecimal, items, |o, d| {
            o.put_slice(&d.to_le_bytes());
            Ok(())
        })?,
        Value::GuidArray(items) => put_array(out, T::ArrayGuid, items, |o, g| {
            o.put_slice(&g.to_bytes_le());
            Ok(())
        })?,
        Value::TypeArray(items) => put_array(out, T::ArrayType, items, |o, name| put_string(o, name))?,
        Value::DateTimeArray(items) => put_array(out, T::ArrayDateTime, items, |o, dt| {
            put_string(o, &format_datetime(dt))
        })?,
        Value::Object(obj) => {
            if policy.applies(obj.payload.len()) {
                let packed = compression::compress(&obj.payload)?;
                out.put_u8(T::CompressedUnknown.as_byte());
                put_string(out, &obj.type_name)?;
                put_len_prefixed(out, &packed)?;
            } else {
                out.put_u8(T::Unknown.as_byte());
                put_string(out, &obj.type_name)?;
                put_len_prefixed(out, &obj.payload)?;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a parameter list from `reader`.
pub async fn decode_parameters<R>(reader: &mut R, resolver: &dyn TypeResolver) -> Result<Vec<Value>>
where
    R: WireRead + ?Sized,
{
    let count = reader.read_len().await?;
    let mut values = Vec::with_capacity(count.min(256));
    for _ in 0..count {
        values.push(decode_value(reader, resolver).await?);
    }
    Ok(values)
}

/// Decode a complete parameter list from a flat buffer, rejecting trailing bytes.
pub async fn decode_from_slice(data: impl Into<bytes::Bytes>, resolver: &dyn TypeResolver) -> Result<Vec<Value>> {
    let mut reader = SliceReader::new(data);
    let values = decode_parameters(&mut reader, resolver).await?;
    reader.finish()?;
    Ok(values)
}

async fn read_array<const N: usize, R: WireRead + ?Sized>(reader: &mut R) -> Result<[u8; N]> {
    let bytes = reader.read_bytes(N).await?;
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Element count for an array whose elements take at least `min_size` bytes
async fn read_count<R: WireRead + ?Sized>(reader: &mut R, min_size: usize) -> Result<usize> {
    let count = reader.read_len().await?;
    if count.saturating_mul(min_size.max(1)) > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::malformed(constants::ERR_INVALID_LENGTH));
    }
    Ok(count)
}

async fn read_char<R: WireRead + ?Sized>(reader: &mut R) -> Result<char> {
    let lead = reader.read_u8().await?;
    let width = match lead {
        0x00..=0x7F => return Ok(char::from(lead)),
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => return Err(ProtocolError::malformed(constants::ERR_INVALID_CHAR)),
    };
    let tail = reader.read_bytes(width - 1).await?;
    let mut buf = [0u8; 4];
    buf[0] = lead;
    buf[1..width].copy_from_slice(&tail);
    std::str::from_utf8(&buf[..width])
        .ok()
        .and_then(|s| s.chars().next())
        .ok_or_else(|| ProtocolError::malformed(constants::ERR_INVALID_CHAR))
}

fn parse_datetime(raw: &str) -> Result<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt);
    }
    // Round-trip strings without an offset are treated as UTC.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc().fixed_offset())
        .map_err(|_| ProtocolError::malformed(constants::ERR_INVALID_DATETIME))
}

fn resolve(resolver: &dyn TypeResolver, wire_name: &str) -> Result<String> {
    resolver
        .resolve(wire_name)
        .ok_or_else(|| ProtocolError::UnknownType(wire_name.to_string()))
}

async fn read_compressed<R: WireRead + ?Sized>(reader: &mut R) -> Result<Vec<u8>> {
    let packed = reader.read_len_prefixed().await?;
    compression::decompress(&packed).map_err(|_| ProtocolError::malformed(constants::ERR_DECOMPRESSION_FAILED))
}

fn utf8(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| ProtocolError::malformed(constants::ERR_INVALID_UTF8))
}

async fn decode_string_array<R: WireRead + ?Sized>(reader: &mut R) -> Result<Vec<String>> {
    let count = read_count(reader, 1).await?;
    let mut items = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        items.push(reader.read_string().await?);
    }
    Ok(items)
}

async fn decode_value<R: WireRead + ?Sized>(reader: &mut R, resolver: &dyn TypeResolver) -> Result<Value> {
    use ParameterTag as T;

    macro_rules! le {
        ($ty:ty) => {
            <$ty>::from_le_bytes(read_array::<{ std::mem::size_of::<$ty>() }, R>(reader).await?)
        };
    }
    macro_rules! numeric_array {
        ($ty:ty) => {{
            let count = read_count(reader, std::mem::size_of::<$ty>()).await?;
            let mut items = Vec::with_capacity(count.min(4096));
            for _ in 0..count {
                items.push(le!($ty));
            }
            items
        }};
    }

    let tag = T::try_from(reader.read_u8().await?)?;
    let value = match tag {
        T::Null => Value::Null,
        T::Bool => Value::Bool(reader.read_u8().await? != 0),
        T::Byte => Value::Byte(reader.read_u8().await?),
        T::SByte => Value::SByte(le!(i8)),
        T::Short => Value::Short(le!(i16)),
        T::UShort => Value::UShort(le!(u16)),
        T::Int => Value::Int(le!(i32)),
        T::UInt => Value::UInt(le!(u32)),
        T::Long => Value::Long(le!(i64)),
        T::ULong => Value::ULong(le!(u64)),
        T::Float => Value::Float(le!(f32)),
        T::Double => Value::Double(le!(f64)),
        T::Char => Value::Char(read_char(reader).await?),
        T::Decimal => Value::Decimal(Decimal::from_le_bytes(read_array::<16, R>(reader).await?)?),
        T::Guid => Value::Guid(Uuid::from_bytes_le(read_array::<16, R>(reader).await?)),
        T::DateTime => Value::DateTime(parse_datetime(&reader.read_string().await?)?),
        T::Type => {
            let wire = reader.read_string().await?;
            Value::Type(resolve(resolver, &wire)?)
        }
        T::String => Value::String(reader.read_string().await?),
        T::CompressedString => Value::String(utf8(read_compressed(reader).await?)?),
        T::ByteArray => Value::ByteArray(reader.read_len_prefixed().await?.to_vec()),
        T::CompressedByteArray => Value::ByteArray(read_compressed(reader).await?),
        T::CharArray => {
            let count = read_count(reader, 1).await?;
            let mut chars = Vec::with_capacity(count.min(4096));
            for _ in 0..count {
                chars.push(read_char(reader).await?);
            }
            Value::CharArray(chars)
        }
        T::CompressedCharArray => Value::CharArray(utf8(read_compressed(reader).await?)?.chars().collect()),
        T::ArrayString => Value::StringArray(decode_string_array(reader).await?),
        T::CompressedArrayString => {
            let mut inner = SliceReader::new(read_compressed(reader).await?);
            let items = decode_string_array(&mut inner).await?;
            inner.finish()?;
            Value::StringArray(items)
        }
        T::ArrayBool => {
            let count = read_count(reader, 1).await?;
            let raw = reader.read_bytes(count).await?;
            Value::BoolArray(raw.iter().map(|b| *b != 0).collect())
        }
        T::ArraySByte => Value::SByteArray(numeric_array!(i8)),
        T::ArrayShort => Value::ShortArray(numeric_array!(i16)),
        T::ArrayUShort => Value::UShortArray(numeric_array!(u16)),
        T::ArrayInt => Value::IntArray(numeric_array!(i32)),
        T::ArrayUInt => Value::UIntArray(numeric_array!(u32)),
        T::ArrayLong => Value::LongArray(numeric_array!(i64)),
        T::ArrayULong => Value::ULongArray(numeric_array!(u64)),
        T::ArrayFloat => Value::FloatArray(numeric_array!(f32)),
        T::ArrayDouble => Value::DoubleArray(numeric_array!(f64)),
        T::ArrayDecimal => {
            let count = read_count(reader, 16).await?;
            let mut items = Vec::with_capacity(count.min(4096));
            for _ in 0..count {
                items.push(Decimal::from_le_bytes(read_array::<16, R>(reader).await?)?);
            }
            Value::DecimalArray(items)
        }
        T::ArrayGuid => {
            let count = read_count(reader, 16).await?;
            let mut items = Vec::with_capacity(count.min(4096));
            for _ in 0..count {
                items.push(Uuid::from_bytes_le(read_array::<16, R>(reader).await?));
            }
            Value::GuidArray(items)
        }
        T::ArrayType => {
            let names = decode_string_array(reader).await?;
            let resolved = names
                .iter()
                .map(|name| resolve(resolver, name))
                .collect::<Result<Vec<_>>>()?;
            Value::TypeArray(resolved)
        }
        T::ArrayDateTime => {
            let raw = decode_string_array(reader).await?;
            let parsed = raw
                .iter()
                .map(|s| parse_datetime(s))
                .collect::<Result<Vec<_>>>()?;
            Value::DateTimeArray(parsed)
        }
        T::Unknown => {
            let wire = reader.read_string().await?;
            let type_name = resolve(resolver, &wire)?;
            let payload = reader.read_len_prefixed().await?.to_vec();
            Value::Object(ObjectValue { type_name, payload })
        }
        T::CompressedUnknown => {
            let wire = reader.read_string().await?;
            let type_name = resolve(resolver, &wire)?;
            let payload = read_compressed(reader).await?;
            Value::Object(ObjectValue { type_name, payload })
        }
    };
    Ok(value)
}

/// Reject lengths outside the payload bounds, for callers reading raw `i32` prefixes
pub fn validate_len(raw: i32) -> Result<usize> {
    checked_len(raw)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::core::serialization::{PassthroughResolver, TypeRegistry};
    use crate::values;

    async fn roundtrip(values: Vec<Value>, policy: CompressionPolicy) -> Vec<Value> {
        let bytes = encode_to_vec(&values, policy).unwrap();
        decode_from_slice(bytes, &PassthroughResolver).await.unwrap()
    }

    #[tokio::test]
    async fn test_scalar_layout() {
        let bytes = encode_to_vec(&values![1i32, true], CompressionPolicy::DISABLED).unwrap();
        assert_eq!(
            bytes,
            vec![2, 0, 0, 0, ParameterTag::Int.as_byte(), 1, 0, 0, 0, ParameterTag::Bool.as_byte(), 1]
        );
    }

    #[tokio::test]
    async fn test_string_uses_7bit_length() {
        let s = "x".repeat(200);
        let bytes = encode_to_vec(&values![s.clone()], CompressionPolicy::DISABLED).unwrap();
        assert_eq!(&bytes[4..7], &[ParameterTag::String.as_byte(), 0xC8, 0x01]);
        assert_eq!(roundtrip(values![s.clone()], CompressionPolicy::DISABLED).await, values![s]);
    }

    #[tokio::test]
    async fn test_multibyte_chars() {
        let chars = vec!['a', 'é', '€', '𝄞'];
        let input = vec![Value::Char('𝄞'), Value::CharArray(chars.clone())];
        assert_eq!(roundtrip(input.clone(), CompressionPolicy::DISABLED).await, input);
    }

    #[tokio::test]
    async fn test_compression_threshold_is_strict() {
        let policy = CompressionPolicy::new(true, 1024);
        let at = encode_to_vec(&[Value::ByteArray(vec![7u8; 1024])], policy).unwrap();
        assert_eq!(at[4], ParameterTag::ByteArray.as_byte());

        let over = encode_to_vec(&[Value::ByteArray(vec![7u8; 1025])], policy).unwrap();
        assert_eq!(over[4], ParameterTag::CompressedByteArray.as_byte());

        let decoded = decode_from_slice(over, &PassthroughResolver).await.unwrap();
        assert_eq!(decoded, vec![Value::ByteArray(vec![7u8; 1025])]);
    }

    #[tokio::test]
    async fn test_compressed_variants_roundtrip() {
        let policy = CompressionPolicy::new(true, 1024);
        let input = vec![
            Value::String("abc".repeat(500)),
            Value::CharArray("xyz".repeat(500).chars().collect()),
            Value::StringArray(vec!["hello world".to_string(); 200]),
            Value::Object(ObjectValue::new("demo.Blob", vec![3u8; 4000])),
        ];
        let bytes = encode_to_vec(&input, policy).unwrap();
        assert!(bytes.len() < 2000);
        let decoded = decode_from_slice(bytes, &PassthroughResolver).await.unwrap();
        assert_eq!(decoded, input);
    }

    #[tokio::test]
    async fn test_disabled_policy_never_compresses() {
        let bytes = encode_to_vec(&[Value::String("a".repeat(1 << 20))], CompressionPolicy::DISABLED).unwrap();
        assert_eq!(bytes[4], ParameterTag::String.as_byte());
    }

    #[tokio::test]
    async fn test_unknown_tag_is_malformed() {
        let mut bytes = 1i32.to_le_bytes().to_vec();
        bytes.push(200);
        let result = decode_from_slice(bytes, &PassthroughResolver).await;
        assert!(matches!(result, Err(ProtocolError::MalformedPayload(_))));
    }

    #[tokio::test]
    async fn test_truncated_stream_is_malformed() {
        let mut bytes = encode_to_vec(&values![123_456i64], CompressionPolicy::DISABLED).unwrap();
        bytes.truncate(bytes.len() - 3);
        let result = decode_from_slice(bytes, &PassthroughResolver).await;
        assert!(matches!(result, Err(ProtocolError::MalformedPayload(_))));
    }

    #[tokio::test]
    async fn test_unresolved_type_fails() {
        let input = vec![Value::Object(ObjectValue::new("demo.Secret", vec![1, 2, 3]))];
        let bytes = encode_to_vec(&input, CompressionPolicy::DISABLED).unwrap();
        let registry = TypeRegistry::new();
        let result = decode_from_slice(bytes, &registry).await;
        assert!(matches!(result, Err(ProtocolError::UnknownType(ref n)) if n == "demo.Secret"));
    }

    #[tokio::test]
    async fn test_datetime_preserves_offset_and_nanos() {
        let dt = DateTime::parse_from_rfc3339("2024-02-29T23:59:59.123456789+05:30").unwrap();
        let utc = DateTime::parse_from_rfc3339("2000-01-01T00:00:00Z").unwrap();
        let input = vec![Value::DateTime(dt), Value::DateTimeArray(vec![utc, dt])];
        assert_eq!(roundtrip(input.clone(), CompressionPolicy::DISABLED).await, input);
    }

    #[tokio::test]
    async fn test_boundary_values_roundtrip() {
        use crate::core::decimal::{MAX_MANTISSA, MAX_SCALE};
        let epoch = DateTime::parse_from_rfc3339("1970-01-01T00:00:00Z").unwrap();
        let west = DateTime::parse_from_rfc3339("1970-01-01T00:00:06.000000100-07:00").unwrap();
        let widest = Decimal::new(-(MAX_MANTISSA as i128), MAX_SCALE).unwrap();

        let input = vec![
            Value::SByte(i8::MIN),
            Value::SByte(i8::MAX),
            Value::Byte(u8::MAX),
            Value::Short(i16::MIN),
            Value::UShort(u16::MAX),
            Value::Int(i32::MIN),
            Value::UInt(u32::MAX),
            Value::Long(i64::MIN),
            Value::ULong(u64::MAX),
            Value::Float(f32::MIN),
            Value::Float(f32::MIN_POSITIVE),
            Value::Double(f64::MAX),
            Value::Double(f64::NEG_INFINITY),
            Value::Char('\0'),
            Value::Char('\u{10FFFF}'),
            Value::Decimal(widest),
            Value::String(String::new()),
            Value::Type(String::new()),
            Value::Guid(Uuid::nil()),
            Value::Guid(Uuid::from_bytes([0xFF; 16])),
            Value::DateTime(epoch),
            Value::DateTime(west),
            Value::ByteArray(Vec::new()),
            Value::CharArray(Vec::new()),
            Value::BoolArray(Vec::new()),
            Value::SByteArray(vec![i8::MIN, 0, i8::MAX]),
            Value::DoubleArray(vec![f64::MIN, f64::EPSILON]),
            Value::FloatArray(vec![f32::MAX]),
            Value::UIntArray(vec![u32::MAX]),
            Value::LongArray(vec![i64::MAX]),
            Value::ULongArray(vec![u64::MAX]),
            Value::ShortArray(vec![i16::MIN]),
            Value::UShortArray(vec![u16::MAX]),
            Value::StringArray(vec![String::new()]),
            Value::TypeArray(Vec::new()),
            Value::GuidArray(vec![Uuid::nil()]),
            Value::DateTimeArray(vec![epoch, west]),
        ];
        let output = roundtrip(input.clone(), CompressionPolicy::DISABLED).await;
        assert_eq!(output, input);
        let Value::DateTime(restored) = &output[21] else {
            panic!("expected a DateTime, got {:?}", output[21]);
        };
        assert_eq!(restored.offset().local_minus_utc(), -7 * 3600);
        assert_eq!(restored.timestamp_subsec_nanos(), 100);
    }

    #[test]
    fn test_offsetless_datetime_is_utc() {
        let parsed = parse_datetime("2021-06-01T12:00:00.5").unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), 0);
        assert!(parse_datetime("yesterday").is_err());
    }

    #[tokio::test]
    async fn test_oversized_count_rejected_before_allocation() {
        let mut bytes = 1i32.to_le_bytes().to_vec();
        bytes.push(ParameterTag::ArrayLong.as_byte());
        bytes.extend_from_slice(&(i32::MAX).to_le_bytes());
        let result = decode_from_slice(bytes, &PassthroughResolver).await;
        assert!(matches!(result, Err(ProtocolError::MalformedPayload(_))));
    }
}
