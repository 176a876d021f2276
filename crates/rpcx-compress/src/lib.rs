//! Compression handler registry for the rpcx wire codecs.
//!
//! Mirrors the reference implementation's `CompressHandler`/`RPCCompressor`: a fixed-size table
//! indexed by [`rpcx_proto::status::CompressType`] tag, each slot holding block- and iovec-oriented
//! compress/decompress functions plus an upper-bound size estimator. Bundled handlers cover
//! Snappy, Gzip, Zlib, and LZ4; callers may register additional tags.

mod gzip_zlib;
mod lz4;
mod snappy;

use std::sync::{Arc, OnceLock, RwLock};

use rpcx_buf::SegmentedBuffer;
use rpcx_proto::status::{CompressType, Status, COMPRESS_TYPE_MAX};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompressError {
    #[error("compression/decompression algorithm failed: {0}")]
    Failed(String),
    #[error("compression type not supported or handler missing")]
    Unsupported,
    #[error(transparent)]
    Buffer(#[from] rpcx_buf::BufferError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CompressError {
    /// Maps this error to the shared status taxonomy; `is_request`/`is_compress` select which of
    /// the eight compress/decompress × request/response status codes applies.
    pub fn to_status(&self, is_request: bool) -> Status {
        // Without further context this can only report the not-supported / generic error split;
        // callers that know whether this was a compress or decompress call narrow further via
        // `to_status_detailed`.
        match self {
            CompressError::Unsupported => {
                if is_request {
                    Status::ReqCompressNotSupported
                } else {
                    Status::RespCompressNotSupported
                }
            }
            _ => {
                if is_request {
                    Status::ReqCompressError
                } else {
                    Status::RespCompressError
                }
            }
        }
    }

    pub fn to_status_detailed(&self, is_request: bool, is_compress: bool) -> Status {
        use Status::*;
        match (self, is_request, is_compress) {
            (CompressError::Unsupported, true, true) => ReqCompressNotSupported,
            (CompressError::Unsupported, true, false) => ReqDecompressNotSupported,
            (CompressError::Unsupported, false, true) => RespCompressNotSupported,
            (CompressError::Unsupported, false, false) => RespDecompressNotSupported,
            (_, true, true) => ReqCompressError,
            (_, true, false) => ReqDecompressError,
            (_, false, true) => RespCompressError,
            (_, false, false) => RespDecompressError,
        }
    }
}

pub type Result<T> = std::result::Result<T, CompressError>;

/// The Rust rendering of the reference implementation's four function-pointer slots plus the
/// lease-size estimator, as an object-safe trait stored behind `Arc<dyn CompressionHandler>`.
pub trait CompressionHandler: Send + Sync {
    fn compress_block(&self, input: &[u8]) -> Result<Vec<u8>>;
    fn decompress_block(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Default iovec-oriented compression merges the buffer to one allocation first and delegates
    /// to `compress_block`; handlers with a genuinely streaming implementation (LZ4) override this.
    fn compress_iovec(&self, src: &mut SegmentedBuffer, dest: &mut SegmentedBuffer) -> Result<usize> {
        let merged = src.merge_all().to_vec();
        let out = self.compress_block(&merged)?;
        let len = out.len();
        dest.append(out);
        Ok(len)
    }

    fn decompress_iovec(&self, src: &mut SegmentedBuffer, dest: &mut SegmentedBuffer) -> Result<usize> {
        let merged = src.merge_all().to_vec();
        let out = self.decompress_block(&merged)?;
        let len = out.len();
        dest.append(out);
        Ok(len)
    }

    /// Theoretical upper bound on compressed size for a given input size, used to size-check
    /// callers that pre-allocate (kept even though this crate's buffers always grow on demand, to
    /// preserve the reference implementation's `lease_size` contract and allow pre-flight checks).
    fn upper_bound(&self, input_len: usize) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted,
    Replaced,
}

/// Process-wide table of compression handlers, indexed by [`CompressType`] tag.
pub struct Registry {
    slots: RwLock<[Option<Arc<dyn CompressionHandler>>; COMPRESS_TYPE_MAX]>,
}

impl Registry {
    fn with_bundled_handlers() -> Self {
        let registry = Registry {
            slots: RwLock::new([None, None, None, None, None]),
        };
        registry.add_handler(CompressType::Snappy, Arc::new(snappy::Snappy));
        registry.add_handler(CompressType::Gzip, Arc::new(gzip_zlib::Gzip));
        registry.add_handler(CompressType::Zlib, Arc::new(gzip_zlib::Zlib));
        registry.add_handler(CompressType::Lz4, Arc::new(lz4::Lz4));
        registry
    }

    /// Registers (or replaces) the handler for `ty`. Returns [`AddOutcome::Replaced`] if a handler
    /// was already present for this tag, [`AddOutcome::Inserted`] otherwise — the Rust rendering of
    /// the reference implementation's "0 success / 1 existed and updated" contract.
    pub fn add_handler(&self, ty: CompressType, handler: Arc<dyn CompressionHandler>) -> AddOutcome {
        let mut slots = self.slots.write().unwrap();
        let idx = ty.tag() as usize;
        let outcome = if slots[idx].is_some() {
            AddOutcome::Replaced
        } else {
            AddOutcome::Inserted
        };
        slots[idx] = Some(handler);
        outcome
    }

    pub fn find_handler(&self, ty: CompressType) -> Option<Arc<dyn CompressionHandler>> {
        if ty == CompressType::None {
            return None;
        }
        self.slots.read().unwrap()[ty.tag() as usize].clone()
    }

    pub fn clear(&self) {
        let mut slots = self.slots.write().unwrap();
        for slot in slots.iter_mut() {
            *slot = None;
        }
    }

    pub fn compress_block(&self, ty: CompressType, input: &[u8]) -> Result<Vec<u8>> {
        self.find_handler(ty)
            .ok_or(CompressError::Unsupported)?
            .compress_block(input)
    }

    pub fn decompress_block(&self, ty: CompressType, input: &[u8]) -> Result<Vec<u8>> {
        self.find_handler(ty)
            .ok_or(CompressError::Unsupported)?
            .decompress_block(input)
    }

    pub fn compress_iovec(
        &self,
        ty: CompressType,
        src: &mut SegmentedBuffer,
        dest: &mut SegmentedBuffer,
    ) -> Result<usize> {
        self.find_handler(ty)
            .ok_or(CompressError::Unsupported)?
            .compress_iovec(src, dest)
    }

    pub fn decompress_iovec(
        &self,
        ty: CompressType,
        src: &mut SegmentedBuffer,
        dest: &mut SegmentedBuffer,
    ) -> Result<usize> {
        self.find_handler(ty)
            .ok_or(CompressError::Unsupported)?
            .decompress_iovec(src, dest)
    }

    pub fn upper_bound(&self, ty: CompressType, input_len: usize) -> Result<usize> {
        Ok(self
            .find_handler(ty)
            .ok_or(CompressError::Unsupported)?
            .upper_bound(input_len))
    }
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Returns the process-wide compression registry, initializing it with the bundled Snappy/Gzip/
/// Zlib/LZ4 handlers on first use.
pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::with_bundled_handlers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_bundled_handler_round_trips() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(4);
        for ty in [
            CompressType::Snappy,
            CompressType::Gzip,
            CompressType::Zlib,
            CompressType::Lz4,
        ] {
            let compressed = registry().compress_block(ty, &data).unwrap();
            assert!(compressed.len() <= registry().upper_bound(ty, data.len()).unwrap());
            let decompressed = registry().decompress_block(ty, &compressed).unwrap();
            assert_eq!(decompressed, data, "round trip failed for {ty:?}");
        }
    }

    #[test]
    fn none_and_out_of_range_are_unsupported() {
        assert!(registry().find_handler(CompressType::None).is_none());
    }

    #[test]
    fn replacing_a_handler_reports_replaced() {
        let registry = Registry::with_bundled_handlers();
        let outcome = registry.add_handler(CompressType::Gzip, Arc::new(gzip_zlib::Gzip));
        assert_eq!(outcome, AddOutcome::Replaced);
    }

    #[test]
    fn iovec_round_trip_through_segmented_buffer() {
        let mut src = SegmentedBuffer::new();
        src.write(b"hello ");
        src.write(b"segmented world");
        let mut compressed = SegmentedBuffer::new();
        registry()
            .compress_iovec(CompressType::Lz4, &mut src, &mut compressed)
            .unwrap();
        let mut decompressed = SegmentedBuffer::new();
        registry()
            .decompress_iovec(CompressType::Lz4, &mut compressed, &mut decompressed)
            .unwrap();
        assert_eq!(decompressed.merge_all(), b"hello segmented world");
    }
}
