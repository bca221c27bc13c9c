//! # Parameter Tags
//!
//! The one-byte type tag written before every value in a parameter list.
//!
//! The tag set is closed and the mapping is a single immutable `match`, so
//! every tag byte resolves to exactly one decode routine.

use crate::error::{ProtocolError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ParameterTag {
    Null = 0,
    Bool = 1,
    Byte = 2,
    Char = 3,
    Decimal = 4,
    Double = 5,
    Float = 6,
    Int = 7,
    Long = 8,
    SByte = 9,
    Short = 10,
    String = 11,
    UInt = 12,
    ULong = 13,
    UShort = 14,
    Type = 15,
    Guid = 16,
    DateTime = 17,
    ByteArray = 18,
    CharArray = 19,
    ArrayBool = 20,
    ArraySByte = 21,
    ArrayDecimal = 22,
    ArrayDouble = 23,
    ArrayFloat = 24,
    ArrayInt = 25,
    ArrayUInt = 26,
    ArrayLong = 27,
    ArrayULong = 28,
    ArrayShort = 29,
    ArrayUShort = 30,
    ArrayString = 31,
    ArrayType = 32,
    ArrayGuid = 33,
    ArrayDateTime = 34,
    Unknown = 35,
    CompressedByteArray = 36,
    CompressedCharArray = 37,
    CompressedString = 38,
    CompressedUnknown = 39,
    CompressedArrayString = 40,
}

impl ParameterTag {
    #[inline]
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Whether the payload behind this tag is GZip-compressed
    pub fn is_compressed(self) -> bool {
        matches!(
            self,
            ParameterTag::CompressedByteArray
                | ParameterTag::CompressedCharArray
                | ParameterTag::CompressedString
                | ParameterTag::CompressedUnknown
                | ParameterTag::CompressedArrayString
        )
    }
}

impl TryFrom<u8> for ParameterTag {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self> {
        use ParameterTag::*;
        Ok(match byte {
            0 => Null,
            1 => Bool,
            2 => Byte,
            3 => Char,
            4 => Decimal,
            5 => Double,
            6 => Float,
            7 => Int,
            8 => Long,
            9 => SByte,
            10 => Short,
            11 => String,
            12 => UInt,
            13 => ULong,
            14 => UShort,
            15 => Type,
            16 => Guid,
            17 => DateTime,
            18 => ByteArray,
            19 => CharArray,
            20 => ArrayBool,
            21 => ArraySByte,
            22 => ArrayDecimal,
            23 => ArrayDouble,
            24 => ArrayFloat,
            25 => ArrayInt,
            26 => ArrayUInt,
            27 => ArrayLong,
            28 => ArrayULong,
            29 => ArrayShort,
            30 => ArrayUShort,
            31 => ArrayString,
            32 => ArrayType,
            33 => ArrayGuid,
            34 => ArrayDateTime,
            35 => Unknown,
            36 => CompressedByteArray,
            37 => CompressedCharArray,
            38 => CompressedString,
            39 => CompressedUnknown,
            40 => CompressedArrayString,
            other => {
                return Err(ProtocolError::MalformedPayload(format!(
                    "unknown parameter tag {other}"
                )))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_byte_maps_back() {
        for byte in 0u8..=40 {
            let tag = ParameterTag::try_from(byte).expect("assigned tag");
            assert_eq!(tag.as_byte(), byte);
        }
    }

    #[test]
    fn test_unassigned_bytes_rejected() {
        for byte in [41u8, 99, 200, 255] {
            assert!(matches!(
                ParameterTag::try_from(byte),
                Err(ProtocolError::MalformedPayload(_))
            ));
        }
    }

    #[test]
    fn test_compressed_family() {
        assert!(ParameterTag::CompressedString.is_compressed());
        assert!(!ParameterTag::String.is_compressed());
        assert!(!ParameterTag::Unknown.is_compressed());
    }
}
