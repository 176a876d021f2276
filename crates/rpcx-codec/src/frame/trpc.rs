//! TRPC wire frame: 16-byte header
//! `magic:u16be(0x0930) | frame_type:u8 | frame_state:u8 | total_size:u32be | meta_len:u16be |
//! stream_id:u16be | reserved:4`, where `total_size = HEADER_SIZE + meta_len + payload_len`.
//!
//! On successful parse, [`TrpcFrame::deserialize_meta`] also rewrites `meta.func`'s method
//! component to the trailing segment after the last `/` (`trim_method_prefix`), and the
//! `trans_info` map carries a W3C `traceparent` value under the `"traceparent"` key, parsed into
//! `trace_id`/`span_id` fields exposed via [`TrpcFrame::traceparent`]/`set_traceparent`.

use prost::Message;
use rpcx_buf::{Chunk, SegmentedBuffer};
use rpcx_proto::meta::TrpcMeta;
use rpcx_proto::trace::TraceParent;

use crate::frame::{Consumed, FrameCodec};
use crate::{Error, Result};

pub const HEADER_SIZE: usize = 16;
const MAGIC: u16 = 0x0930;
pub const FRAME_TYPE_UNARY: u8 = 0;
const TRACEPARENT_KEY: &str = "traceparent";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Header,
    Body { meta_len: usize, payload_len: usize },
}

pub struct TrpcFrame {
    pub meta: TrpcMeta,
    pub payload: SegmentedBuffer,
    pub frame_type: u8,
    pub frame_state: u8,
    pub stream_id: u16,
    meta_bytes: Vec<u8>,
    header_buf: Vec<u8>,
    state: ParseState,
    size_limit: usize,
}

impl TrpcFrame {
    pub fn new(size_limit: usize) -> Self {
        Self {
            meta: TrpcMeta::default(),
            payload: SegmentedBuffer::new(),
            frame_type: FRAME_TYPE_UNARY,
            frame_state: 0,
            stream_id: 0,
            meta_bytes: Vec::new(),
            header_buf: Vec::with_capacity(HEADER_SIZE),
            state: ParseState::Header,
            size_limit,
        }
    }

    /// Parses the `traceparent` value from `trans_info`, if present.
    pub fn traceparent(&self) -> Option<TraceParent> {
        self.meta
            .trans_info
            .get(TRACEPARENT_KEY)
            .and_then(|v| TraceParent::parse(v).ok())
    }

    /// Composes and stores a `traceparent` value into `trans_info`.
    pub fn set_traceparent(&mut self, tp: TraceParent) {
        self.meta
            .trans_info
            .insert(TRACEPARENT_KEY.to_string(), tp.to_header());
    }
}

impl FrameCodec for TrpcFrame {
    fn serialize_meta(&mut self) -> Result<()> {
        self.meta_bytes = self.meta.encode_to_vec();
        Ok(())
    }

    fn deserialize_meta(&mut self) -> Result<()> {
        self.meta = TrpcMeta::decode(self.meta_bytes.as_slice()).map_err(|e| {
            log::warn!("failed to decode TRPC meta: {e}");
            Error::Meta(e.to_string())
        })?;
        self.meta.trim_method_prefix();
        Ok(())
    }

    fn encode(&self, max: usize) -> Result<Vec<Chunk>> {
        let payload_len = self.payload.size();
        let total_size = HEADER_SIZE + self.meta_bytes.len() + payload_len;
        if total_size > 0x7FFF_FFFF {
            return Err(Error::MessageTooLarge {
                got: total_size,
                limit: 0x7FFF_FFFF,
            });
        }
        if self.meta_bytes.len() > u16::MAX as usize {
            return Err(Error::Protocol("TRPC meta_len exceeds u16".into()));
        }
        let mut header = Vec::with_capacity(HEADER_SIZE);
        header.extend_from_slice(&MAGIC.to_be_bytes());
        header.push(self.frame_type);
        header.push(self.frame_state);
        header.extend_from_slice(&(total_size as u32).to_be_bytes());
        header.extend_from_slice(&(self.meta_bytes.len() as u16).to_be_bytes());
        header.extend_from_slice(&self.stream_id.to_be_bytes());
        header.extend_from_slice(&[0u8; 4]);

        let mut out = Vec::new();
        out.push(Chunk::Owned(header));
        out.push(Chunk::Owned(self.meta_bytes.clone()));
        out.extend(self.payload.encode(max.saturating_sub(2).max(1)));
        Ok(out)
    }

    fn append(&mut self, mut bytes: &[u8]) -> Result<Consumed> {
        let mut total_used = 0usize;
        loop {
            match self.state {
                ParseState::Header => {
                    let need = HEADER_SIZE - self.header_buf.len();
                    let take = need.min(bytes.len());
                    self.header_buf.extend_from_slice(&bytes[..take]);
                    bytes = &bytes[take..];
                    total_used += take;
                    if self.header_buf.len() < HEADER_SIZE {
                        return Ok(Consumed::NeedMore);
                    }
                    let magic = u16::from_be_bytes(self.header_buf[0..2].try_into().unwrap());
                    if magic != MAGIC {
                        log::warn!("rejecting frame: bad TRPC magic {magic:#06x}");
                        return Err(Error::Protocol("bad TRPC magic".into()));
                    }
                    self.frame_type = self.header_buf[2];
                    self.frame_state = self.header_buf[3];
                    let total_size = u32::from_be_bytes(self.header_buf[4..8].try_into().unwrap()) as usize;
                    let meta_len = u16::from_be_bytes(self.header_buf[8..10].try_into().unwrap()) as usize;
                    self.stream_id = u16::from_be_bytes(self.header_buf[10..12].try_into().unwrap());
                    if total_size < HEADER_SIZE + meta_len {
                        log::warn!("rejecting TRPC frame: total_size {total_size} smaller than header+meta");
                        return Err(Error::Protocol("TRPC total_size smaller than header+meta".into()));
                    }
                    if total_size > self.size_limit {
                        log::warn!(
                            "rejecting TRPC frame: size {total_size} exceeds limit {limit}",
                            limit = self.size_limit
                        );
                        return Err(Error::MessageTooLarge {
                            got: total_size,
                            limit: self.size_limit,
                        });
                    }
                    let payload_len = total_size - HEADER_SIZE - meta_len;
                    self.state = ParseState::Body {
                        meta_len,
                        payload_len,
                    };
                }
                ParseState::Body {
                    meta_len,
                    payload_len,
                } => {
                    let have_meta = self.meta_bytes.len();
                    if have_meta < meta_len {
                        let need = meta_len - have_meta;
                        let take = need.min(bytes.len());
                        self.meta_bytes.extend_from_slice(&bytes[..take]);
                        bytes = &bytes[take..];
                        total_used += take;
                        if self.meta_bytes.len() < meta_len {
                            return Ok(Consumed::NeedMore);
                        }
                    }
                    let have_payload = self.payload.size();
                    if have_payload < payload_len {
                        let need = payload_len - have_payload;
                        let take = need.min(bytes.len());
                        if take > 0 {
                            self.payload.write(&bytes[..take]);
                            bytes = &bytes[take..];
                            total_used += take;
                        }
                        if self.payload.size() < payload_len {
                            return Ok(Consumed::NeedMore);
                        }
                    }
                    return Ok(Consumed::Complete { used: total_used });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_prefix_is_trimmed_after_parse() {
        let mut frame = TrpcFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
        frame.meta.func = "/Example/Echo".into();
        frame.serialize_meta().unwrap();
        let bytes: Vec<u8> = frame
            .encode(usize::MAX)
            .unwrap()
            .iter()
            .flat_map(|c| c.to_vec())
            .collect();

        let mut parsed = TrpcFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
        parsed.append(&bytes).unwrap();
        parsed.deserialize_meta().unwrap();
        assert_eq!(parsed.meta.func, "Echo");
    }

    #[test]
    fn traceparent_round_trips_through_trans_info() {
        let mut frame = TrpcFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
        let tp = TraceParent::parse("00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01").unwrap();
        frame.set_traceparent(tp);
        assert_eq!(frame.traceparent(), Some(tp));
    }

    #[test]
    fn streaming_split_matches_one_shot() {
        let mut frame = TrpcFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
        frame.meta.func = "/A/B".into();
        frame.serialize_meta().unwrap();
        frame.payload.write(b"trpc-payload");
        let bytes: Vec<u8> = frame
            .encode(usize::MAX)
            .unwrap()
            .iter()
            .flat_map(|c| c.to_vec())
            .collect();

        for k in 0..bytes.len() {
            let mut parsed = TrpcFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
            let first = parsed.append(&bytes[..k]).unwrap();
            if k < bytes.len() {
                assert_eq!(first, Consumed::NeedMore);
            }
            let second = parsed.append(&bytes[k..]).unwrap();
            assert_eq!(second, Consumed::Complete { used: bytes.len() - k });
        }
    }
}
