//! Wire-frame codecs: one type per transport, each driving the same streaming-parser contract.

pub mod brpc;
pub mod srpc;
pub mod thrift_framed;
pub mod trpc;

use rpcx_buf::Chunk;

use crate::Result;

/// Result of feeding bytes to a [`FrameCodec::append`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumed {
    /// The frame isn't complete yet; all of the given bytes were consumed.
    NeedMore,
    /// The frame completed; `used` of the given bytes belonged to it (bytes after that belong to
    /// the next frame and were not consumed).
    Complete { used: usize },
}

/// Common contract every transport's wire-frame codec implements.
pub trait FrameCodec {
    /// Feeds bytes to the streaming parser. May be called repeatedly with arbitrary slices.
    fn append(&mut self, bytes: &[u8]) -> Result<Consumed>;

    /// Serializes this codec's meta structure into its internal meta-bytes buffer.
    fn serialize_meta(&mut self) -> Result<()>;

    /// Parses this codec's internal meta-bytes buffer back into its meta structure.
    fn deserialize_meta(&mut self) -> Result<()>;

    /// Produces the header, meta, and payload (and attachment, where applicable) as chunks
    /// suitable for vectored I/O, merging down to at most `max` chunks.
    fn encode(&self, max: usize) -> Result<Vec<Chunk>>;
}
