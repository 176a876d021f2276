//! Snappy handler, via the `snap` crate's block `Encoder`/`Decoder`.

use snap::raw::{Decoder, Encoder};

use crate::{CompressError, CompressionHandler, Result};

pub struct Snappy;

impl CompressionHandler for Snappy {
    fn compress_block(&self, input: &[u8]) -> Result<Vec<u8>> {
        Encoder::new()
            .compress_vec(input)
            .map_err(|e| CompressError::Failed(e.to_string()))
    }

    fn decompress_block(&self, input: &[u8]) -> Result<Vec<u8>> {
        Decoder::new()
            .decompress_vec(input)
            .map_err(|e| CompressError::Failed(e.to_string()))
    }

    fn upper_bound(&self, input_len: usize) -> usize {
        snap::raw::max_compress_len(input_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let data = b"snappy snappy snappy".repeat(8);
        let compressed = Snappy.compress_block(&data).unwrap();
        let decompressed = Snappy.decompress_block(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }
}
