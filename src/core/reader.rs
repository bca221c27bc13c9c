//! # Wire Readers
//!
//! [`WireRead`] is the byte source the codec decodes from. The duplex pipe
//! implements it over a live connection; [`SliceReader`] implements it over a
//! flat buffer (decrypted payloads, decompressed blocks, tests).
//!
//! Only [`WireRead::read_bytes`] is required. The provided methods cover the
//! primitive encodings shared by every message: little-endian integers,
//! 7-bit encoded lengths and length-prefixed strings.

use crate::config::MAX_PAYLOAD_SIZE;
use crate::error::{constants, ProtocolError, Result};
use async_trait::async_trait;
use bytes::Bytes;

#[async_trait]
pub trait WireRead: Send {
    /// Read exactly `count` bytes.
    async fn read_bytes(&mut self, count: usize) -> Result<Bytes>;

    async fn read_u8(&mut self) -> Result<u8> {
        let bytes = self.read_bytes(1).await?;
        Ok(bytes[0])
    }

    async fn read_i32_le(&mut self) -> Result<i32> {
        let b = self.read_bytes(4).await?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a non-negative `i32` length, bounded by the payload cap
    async fn read_len(&mut self) -> Result<usize> {
        let raw = self.read_i32_le().await?;
        checked_len(raw)
    }

    /// Read a 7-bit encoded (LEB128) length
    async fn read_7bit_len(&mut self) -> Result<usize> {
        let mut value: u32 = 0;
        for shift in (0..35).step_by(7) {
            let byte = self.read_u8().await?;
            value |= u32::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return checked_len(value as i32);
            }
        }
        Err(ProtocolError::malformed(constants::ERR_INVALID_VARINT))
    }

    /// Read a 7-bit length prefixed UTF-8 string
    async fn read_string(&mut self) -> Result<String> {
        let len = self.read_7bit_len().await?;
        let bytes = self.read_bytes(len).await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| ProtocolError::malformed(constants::ERR_INVALID_UTF8))
    }

    /// Read an `i32` length followed by that many bytes
    async fn read_len_prefixed(&mut self) -> Result<Bytes> {
        let len = self.read_len().await?;
        self.read_bytes(len).await
    }
}

pub(crate) fn checked_len(raw: i32) -> Result<usize> {
    usize::try_from(raw)
        .ok()
        .filter(|len| *len <= MAX_PAYLOAD_SIZE)
        .ok_or_else(|| ProtocolError::malformed(constants::ERR_INVALID_LENGTH))
}

/// In-memory [`WireRead`] over a flat buffer
#[derive(Debug, Clone, Default)]
pub struct SliceReader {
    data: Bytes,
}

impl SliceReader {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    /// Fail if unread bytes are left over
    pub fn finish(self) -> Result<()> {
        if self.data.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::MalformedPayload(format!(
                "{} trailing bytes after payload",
                self.data.len()
            )))
        }
    }
}

#[async_trait]
impl WireRead for SliceReader {
    async fn read_bytes(&mut self, count: usize) -> Result<Bytes> {
        if self.data.len() < count {
            return Err(ProtocolError::malformed(constants::ERR_TRUNCATED));
        }
        Ok(self.data.split_to(count))
    }
}
