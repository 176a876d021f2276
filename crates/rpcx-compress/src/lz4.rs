//! LZ4 handler, via `lz4_flex`'s `frame` module (LZ4F-compatible framed format).
//!
//! Unlike the block-oriented Snappy/Gzip/Zlib handlers, LZ4 streams directly through a
//! `SegmentedBuffer` writer for the iovec path rather than merging to one allocation first.

use std::io::{Read, Write};

use lz4_flex::frame::{FrameDecoder, FrameEncoder};
use rpcx_buf::{SegmentedBuffer, SegmentedBufferWriter};

use crate::{CompressError, CompressionHandler, Result};

pub struct Lz4;

impl CompressionHandler for Lz4 {
    fn compress_block(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = FrameEncoder::new(Vec::new());
        encoder
            .write_all(input)
            .map_err(|e| CompressError::Failed(e.to_string()))?;
        encoder.finish().map_err(|e| CompressError::Failed(e.to_string()))
    }

    fn decompress_block(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = FrameDecoder::new(input);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| CompressError::Failed(e.to_string()))?;
        Ok(out)
    }

    fn compress_iovec(&self, src: &mut SegmentedBuffer, dest: &mut SegmentedBuffer) -> Result<usize> {
        let merged = src.merge_all().to_vec();
        let mut encoder = FrameEncoder::new(SegmentedBufferWriter::new(dest));
        encoder
            .write_all(&merged)
            .map_err(|e| CompressError::Failed(e.to_string()))?;
        encoder.finish().map_err(|e| CompressError::Failed(e.to_string()))?;
        Ok(dest.size())
    }

    fn decompress_iovec(&self, src: &mut SegmentedBuffer, dest: &mut SegmentedBuffer) -> Result<usize> {
        let merged = src.merge_all().to_vec();
        let mut decoder = FrameDecoder::new(merged.as_slice());
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| CompressError::Failed(e.to_string()))?;
        let len = out.len();
        dest.append(out);
        Ok(len)
    }

    fn upper_bound(&self, input_len: usize) -> usize {
        input_len + input_len / 255 + 256
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let data = b"lz4 framed round trip".repeat(10);
        let compressed = Lz4.compress_block(&data).unwrap();
        let decompressed = Lz4.decompress_block(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }
}
