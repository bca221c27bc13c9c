//! # Compression
//!
//! GZip compression for large codec payloads.
//!
//! The codec only compresses a value when compression is enabled on the
//! connection and the payload is strictly larger than the configured
//! threshold; [`should_compress`] is that single decision point.
//! Decompression is capped at [`MAX_DECOMPRESSION_SIZE`] so a hostile peer
//! cannot expand a small frame into an arbitrarily large allocation.

use crate::config::MAX_PAYLOAD_SIZE;
use crate::error::{ProtocolError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Maximum output size for decompression (align with MAX_PAYLOAD_SIZE to prevent DoS)
pub const MAX_DECOMPRESSION_SIZE: usize = MAX_PAYLOAD_SIZE;

/// Whether a payload of `len` bytes should be compressed
#[inline]
pub fn should_compress(enabled: bool, len: usize, threshold_bytes: usize) -> bool {
    enabled && len > threshold_bytes
}

/// GZip-compress `data`
///
/// # Errors
/// Returns `ProtocolError::CompressionFailure` if the encoder fails
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2 + 64), Compression::default());
    encoder
        .write_all(data)
        .map_err(|_| ProtocolError::CompressionFailure)?;
    encoder.finish().map_err(|_| ProtocolError::CompressionFailure)
}

/// Decompress a GZip stream
///
/// # Errors
/// Returns `ProtocolError::DecompressionFailure` if:
/// - the stream is not valid GZip
/// - the output exceeds MAX_DECOMPRESSION_SIZE
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    decompress_with_limit(data, MAX_DECOMPRESSION_SIZE)
}

/// Decompress a GZip stream, failing once the output exceeds `limit` bytes
pub fn decompress_with_limit(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::with_capacity(data.len().saturating_mul(2).min(limit));
    let mut chunk = [0u8; 8192];
    loop {
        match decoder.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                out.extend_from_slice(&chunk[..n]);
                if out.len() > limit {
                    return Err(ProtocolError::DecompressionFailure);
                }
            }
            Err(_) => return Err(ProtocolError::DecompressionFailure),
        }
    }
    Ok(out)
}
