//! Gzip and Zlib handlers, via `flate2`.
//!
//! Decoding auto-detects which of the two wrappers produced the input by peeking its magic bytes
//! (`1f 8b` ⇒ gzip). On a first-attempt Zlib decode failure, a synthetic two-byte zlib header
//! (`b8 1d`) is prepended and decode is retried once — a documented compatibility shim for a
//! historical non-standard encoder that emits raw deflate streams without the zlib wrapper.

use std::io::{Read, Write};

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

use crate::{CompressError, CompressionHandler, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const SYNTHETIC_ZLIB_HEADER: [u8; 2] = [0xb8, 0x1d];

pub struct Gzip;

impl CompressionHandler for Gzip {
    fn compress_block(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(input)
            .map_err(|e| CompressError::Failed(e.to_string()))?;
        encoder.finish().map_err(|e| CompressError::Failed(e.to_string()))
    }

    fn decompress_block(&self, input: &[u8]) -> Result<Vec<u8>> {
        decode_zlib_auto(input)
    }

    fn upper_bound(&self, input_len: usize) -> usize {
        input_len + input_len / 1000 + 64
    }
}

pub struct Zlib;

impl CompressionHandler for Zlib {
    fn compress_block(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(input)
            .map_err(|e| CompressError::Failed(e.to_string()))?;
        encoder.finish().map_err(|e| CompressError::Failed(e.to_string()))
    }

    fn decompress_block(&self, input: &[u8]) -> Result<Vec<u8>> {
        decode_zlib_auto(input)
    }

    fn upper_bound(&self, input_len: usize) -> usize {
        input_len + input_len / 1000 + 64
    }
}

/// Decodes input that is either gzip- or zlib-wrapped by sniffing its magic bytes, and retries a
/// failed zlib decode once with a synthesized header.
fn decode_zlib_auto(input: &[u8]) -> Result<Vec<u8>> {
    if input.starts_with(&GZIP_MAGIC) {
        let mut decoder = GzDecoder::new(input);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| CompressError::Failed(e.to_string()))?;
        return Ok(out);
    }

    let mut decoder = ZlibDecoder::new(input);
    let mut out = Vec::new();
    match decoder.read_to_end(&mut out) {
        Ok(_) => Ok(out),
        Err(_) => {
            let mut patched = Vec::with_capacity(input.len() + 2);
            patched.extend_from_slice(&SYNTHETIC_ZLIB_HEADER);
            patched.extend_from_slice(input);
            let mut retry = ZlibDecoder::new(patched.as_slice());
            out.clear();
            retry
                .read_to_end(&mut out)
                .map_err(|e| CompressError::Failed(e.to_string()))?;
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zlib_auto_detects_gzip_input() {
        let data = b"cross-wrapper detection".to_vec();
        let gzipped = Gzip.compress_block(&data).unwrap();
        let decoded = Zlib.decompress_block(&gzipped).unwrap();
        assert_eq!(decoded, data);
    }

    /// Mirrors the suite's Gzip auto-detect scenario: a Zlib-compressed payload is decoded with
    /// the Gzip handler (as happens if a peer's meta misreports the compress type) and still comes
    /// back correctly because both handlers sniff the actual wrapper in use.
    #[test]
    fn gzip_handler_decodes_zlib_wrapped_input() {
        let data = b"payload compressed as zlib but labeled gzip".to_vec();
        let zlibbed = Zlib.compress_block(&data).unwrap();
        let decoded = Gzip.decompress_block(&zlibbed).unwrap();
        assert_eq!(decoded, data);
    }
}
