//! # Decimal
//!
//! 128-bit decimal with a 96-bit signed mantissa and a base-10 scale of
//! 0..=28, the range carried by the `Decimal` wire tag.
//!
//! ## Wire Layout
//! ```text
//! [lo: u32 LE] [mid: u32 LE] [hi: u32 LE] [flags: u32 LE]
//! flags: bits 16..=23 scale, bit 31 sign, all other bits zero
//! ```
//!
//! Values compare by representation: `1.0` and `1.00` are distinct decimals
//! even though they denote the same number, which keeps a decoded value
//! identical to the one that was encoded.

use crate::error::{constants, ProtocolError, Result};
use std::fmt;
use std::str::FromStr;

/// Largest magnitude representable in 96 bits
pub const MAX_MANTISSA: u128 = (1u128 << 96) - 1;

/// Largest supported scale
pub const MAX_SCALE: u8 = 28;

const SIGN_MASK: u32 = 0x8000_0000;
const SCALE_MASK: u32 = 0x00FF_0000;
const SCALE_SHIFT: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Decimal {
    mantissa: i128,
    scale: u8,
}

impl Decimal {
    pub const ZERO: Decimal = Decimal {
        mantissa: 0,
        scale: 0,
    };

    /// Build `mantissa * 10^-scale`; `None` if either part is out of range.
    pub fn new(mantissa: i128, scale: u8) -> Option<Self> {
        if mantissa.unsigned_abs() > MAX_MANTISSA || scale > MAX_SCALE {
            return None;
        }
        Some(Self { mantissa, scale })
    }

    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }

    pub fn is_negative(&self) -> bool {
        self.mantissa < 0
    }

    /// Encode to the 16-byte wire layout
    pub fn to_le_bytes(&self) -> [u8; 16] {
        let magnitude = self.mantissa.unsigned_abs();
        let lo = magnitude as u32;
        let mid = (magnitude >> 32) as u32;
        let hi = (magnitude >> 64) as u32;
        let mut flags = u32::from(self.scale) << SCALE_SHIFT;
        if self.mantissa < 0 {
            flags |= SIGN_MASK;
        }

        let mut out = [0u8; 16];
        out[0..4].copy_from_slice(&lo.to_le_bytes());
        out[4..8].copy_from_slice(&mid.to_le_bytes());
        out[8..12].copy_from_slice(&hi.to_le_bytes());
        out[12..16].copy_from_slice(&flags.to_le_bytes());
        out
    }

    /// Decode the 16-byte wire layout, rejecting reserved flag bits and scales above 28
    pub fn from_le_bytes(bytes: [u8; 16]) -> Result<Self> {
        let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        let (lo, mid, hi, flags) = (word(0), word(4), word(8), word(12));

        if flags & !(SIGN_MASK | SCALE_MASK) != 0 {
            return Err(ProtocolError::malformed(constants::ERR_INVALID_DECIMAL));
        }
        let scale = ((flags & SCALE_MASK) >> SCALE_SHIFT) as u8;
        if scale > MAX_SCALE {
            return Err(ProtocolError::malformed(constants::ERR_INVALID_DECIMAL));
        }

        let magnitude = u128::from(lo) | (u128::from(mid) << 32) | (u128::from(hi) << 64);
        let mantissa = if flags & SIGN_MASK != 0 {
            -(magnitude as i128)
        } else {
            magnitude as i128
        };
        Ok(Self { mantissa, scale })
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Self {
            mantissa: i128::from(value),
            scale: 0,
        }
    }
}

impl From<u64> for Decimal {
    fn from(value: u64) -> Self {
        Self {
            mantissa: i128::from(value),
            scale: 0,
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa.unsigned_abs().to_string();
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let scale = usize::from(self.scale);
        if scale == 0 {
            return write!(f, "{sign}{digits}");
        }
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{int_part}.{frac_part}")
    }
}

impl FromStr for Decimal {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ProtocolError::DeserializeError(format!("invalid decimal literal: {s:?}"));
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let scale = u8::try_from(frac_part.len()).map_err(|_| invalid())?;
        let mut magnitude: u128 = 0;
        for b in int_part.bytes().chain(frac_part.bytes()) {
            magnitude = magnitude
                .checked_mul(10)
                .and_then(|m| m.checked_add(u128::from(b - b'0')))
                .ok_or_else(invalid)?;
        }
        if magnitude > MAX_MANTISSA {
            return Err(invalid());
        }
        let mantissa = if negative {
            -(magnitude as i128)
        } else {
            magnitude as i128
        };
        Decimal::new(mantissa, scale).ok_or_else(invalid)
    }
}

impl serde::Serialize for Decimal {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Decimal {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_layout_of_negative_scaled_value() {
        let d = Decimal::new(-12345, 2).unwrap();
        let bytes = d.to_le_bytes();
        assert_eq!(&bytes[0..4], &12345u32.to_le_bytes());
        assert_eq!(&bytes[4..12], &[0u8; 8]);
        assert_eq!(&bytes[12..16], &(0x8002_0000u32).to_le_bytes());
        assert_eq!(Decimal::from_le_bytes(bytes).unwrap(), d);
    }

    #[test]
    fn test_extremes_survive_wire() {
        let max = Decimal::new(MAX_MANTISSA as i128, 0).unwrap();
        let min = Decimal::new(-(MAX_MANTISSA as i128), 0).unwrap();
        let tiny = Decimal::new(1, MAX_SCALE).unwrap();
        for d in [max, min, tiny, Decimal::ZERO] {
            assert_eq!(Decimal::from_le_bytes(d.to_le_bytes()).unwrap(), d);
        }
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(Decimal::new(MAX_MANTISSA as i128 + 1, 0).is_none());
        assert!(Decimal::new(1, 29).is_none());

        let mut bytes = Decimal::ZERO.to_le_bytes();
        bytes[14] = 29;
        assert!(Decimal::from_le_bytes(bytes).is_err());
        bytes[14] = 0;
        bytes[12] = 1;
        assert!(Decimal::from_le_bytes(bytes).is_err());
    }

    #[test]
    fn test_display_and_parse() {
        let cases = [
            ("0", Decimal::ZERO),
            ("-1.50", Decimal::new(-150, 2).unwrap()),
            ("0.001", Decimal::new(1, 3).unwrap()),
            ("79228162514264337593543950335", Decimal::new(MAX_MANTISSA as i128, 0).unwrap()),
        ];
        for (text, value) in cases {
            assert_eq!(value.to_string(), text);
            assert_eq!(text.parse::<Decimal>().unwrap(), value);
        }
        assert!("1.2.3".parse::<Decimal>().is_err());
        assert!("".parse::<Decimal>().is_err());
        assert!("79228162514264337593543950336".parse::<Decimal>().is_err());
    }
}
