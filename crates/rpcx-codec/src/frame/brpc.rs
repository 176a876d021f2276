//! BRPC wire frame: 12-byte header `"PRPC" | body_len:u32be | meta_len:u32be`, where
//! `body_len = meta_len + payload_len + attachment_len`. BRPC is the only transport in this crate
//! that supports an attachment: when meta reports `attachment_size > 0`, the trailing bytes of the
//! body are split off into a separate buffer on parse, per SPEC_FULL.md §4.3.

use prost::Message;
use rpcx_buf::{Chunk, SegmentedBuffer};
use rpcx_proto::meta::BrpcMeta;

use crate::frame::{Consumed, FrameCodec};
use crate::{Error, Result};

pub const HEADER_SIZE: usize = 12;
const MAGIC: &[u8; 4] = b"PRPC";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Header,
    Body { meta_len: usize, body_len: usize },
}

pub struct BrpcFrame {
    pub meta: BrpcMeta,
    pub payload: SegmentedBuffer,
    pub attachment: SegmentedBuffer,
    meta_bytes: Vec<u8>,
    header_buf: Vec<u8>,
    state: ParseState,
    size_limit: usize,
}

impl BrpcFrame {
    pub fn new(size_limit: usize) -> Self {
        Self {
            meta: BrpcMeta::default(),
            payload: SegmentedBuffer::new(),
            attachment: SegmentedBuffer::new(),
            meta_bytes: Vec::new(),
            header_buf: Vec::with_capacity(HEADER_SIZE),
            state: ParseState::Header,
            size_limit,
        }
    }
}

impl FrameCodec for BrpcFrame {
    fn serialize_meta(&mut self) -> Result<()> {
        self.meta.attachment_size = self.attachment.size() as u32;
        self.meta_bytes = self.meta.encode_to_vec();
        Ok(())
    }

    fn deserialize_meta(&mut self) -> Result<()> {
        self.meta = BrpcMeta::decode(self.meta_bytes.as_slice()).map_err(|e| {
            log::warn!("failed to decode BRPC meta: {e}");
            Error::Meta(e.to_string())
        })?;
        let attachment_size = self.meta.attachment_size as usize;
        if attachment_size > 0 {
            if attachment_size > self.payload.size() {
                log::warn!(
                    "rejecting BRPC frame: attachment_size {attachment_size} exceeds body length {}",
                    self.payload.size()
                );
                return Err(Error::Meta(format!(
                    "attachment_size {attachment_size} exceeds body length {}",
                    self.payload.size()
                )));
            }
            let split_at = self.payload.size() - attachment_size;
            self.attachment = self.payload.cut(split_at)?;
        }
        Ok(())
    }

    fn encode(&self, max: usize) -> Result<Vec<Chunk>> {
        let body_len = self.meta_bytes.len() + self.payload.size() + self.attachment.size();
        if body_len > 0x7FFF_FFFF {
            return Err(Error::MessageTooLarge {
                got: body_len,
                limit: 0x7FFF_FFFF,
            });
        }
        let mut header = Vec::with_capacity(HEADER_SIZE);
        header.extend_from_slice(MAGIC);
        header.extend_from_slice(&(body_len as u32).to_be_bytes());
        header.extend_from_slice(&(self.meta_bytes.len() as u32).to_be_bytes());

        let mut out = Vec::new();
        out.push(Chunk::Owned(header));
        out.push(Chunk::Owned(self.meta_bytes.clone()));
        out.extend(self.payload.encode(max.saturating_sub(2).max(1)));
        if self.attachment.size() > 0 {
            out.extend(self.attachment.encode(1));
        }
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
                    if &self.header_buf[0..4] != MAGIC {
                        log::warn!("rejecting frame: bad BRPC magic");
                        return Err(Error::Protocol("bad BRPC magic".into()));
                    }
                    let body_len = u32::from_be_bytes(self.header_buf[4..8].try_into().unwrap()) as usize;
                    let meta_len = u32::from_be_bytes(self.header_buf[8..12].try_into().unwrap()) as usize;
                    if meta_len > body_len {
                        log::warn!("rejecting BRPC frame: meta_len {meta_len} exceeds body_len {body_len}");
                        return Err(Error::Protocol("BRPC meta_len exceeds body_len".into()));
                    }
                    if body_len > self.size_limit {
                        log::warn!(
                            "rejecting BRPC frame: size {body_len} exceeds limit {limit}",
                            limit = self.size_limit
                        );
                        return Err(Error::MessageTooLarge {
                            got: body_len,
                            limit: self.size_limit,
                        });
                    }
                    self.state = ParseState::Body { meta_len, body_len };
                }
                ParseState::Body { meta_len, body_len } => {
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
                    // everything after meta (payload + attachment, undifferentiated until
                    // deserialize_meta splits it) lands in `payload`.
                    let remaining_body = body_len - meta_len;
                    if self.payload.size() < remaining_body {
                        let need = remaining_body - self.payload.size();
                        let take = need.min(bytes.len());
                        if take > 0 {
                            self.payload.write(&bytes[..take]);
                            bytes = &bytes[take..];
                            total_used += take;
                        }
                        if self.payload.size() < remaining_body {
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

    fn encode_all(frame: &BrpcFrame) -> Vec<u8> {
        frame
            .encode(usize::MAX)
            .unwrap()
            .iter()
            .flat_map(|c| c.to_vec())
            .collect()
    }

    #[test]
    fn brpc_with_attachment_round_trip() {
        let mut frame = BrpcFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
        frame.attachment.write(b"hello world");
        frame.serialize_meta().unwrap();
        assert_eq!(frame.meta.attachment_size, 11);

        let bytes = encode_all(&frame);
        assert_eq!(&bytes[0..4], b"PRPC");
        let body_len = u32::from_be_bytes(bytes[4..8].try_into().unwrap());
        let meta_len = u32::from_be_bytes(bytes[8..12].try_into().unwrap());
        assert_eq!(body_len as usize, meta_len as usize + 11);

        let mut parsed = BrpcFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
        let consumed = parsed.append(&bytes).unwrap();
        assert_eq!(consumed, Consumed::Complete { used: bytes.len() });
        parsed.deserialize_meta().unwrap();
        assert_eq!(parsed.meta.attachment_size, 11);
        let attachment = parsed.attachment.fetch_exact(11).unwrap();
        assert_eq!(&attachment[..], b"hello world");
        assert_eq!(parsed.payload.size(), 0);
    }

    /// Wraps a `prost::Message` so it satisfies `test_frame!`'s `Clone + PartialEq + Into<Vec<u8>>`
    /// requirements via the message's own `encode_to_vec`/`decode`.
    #[derive(Clone, Debug, PartialEq)]
    struct Wire<T>(T);

    impl<T: Message> From<Wire<T>> for Vec<u8> {
        fn from(w: Wire<T>) -> Vec<u8> {
            w.0.encode_to_vec()
        }
    }

    fn decode_brpc_meta(bytes: &[u8]) -> Wire<BrpcMeta> {
        Wire(BrpcMeta::decode(bytes).unwrap())
    }

    rpcx_tests::test_frame!(
        brpc_meta_matches_acceptance_hex,
        Wire(BrpcMeta {
            service_name: "Example".into(),
            method_name: "Echo".into(),
            ..Default::default()
        }),
        "0a074578616d706c6512044563686f",
        decode_brpc_meta
    );

    #[test]
    fn streaming_split_matches_one_shot() {
        let mut frame = BrpcFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
        frame.payload.write(b"body-only-no-attachment");
        frame.serialize_meta().unwrap();
        let bytes = encode_all(&frame);

        for k in 0..bytes.len() {
            let mut parsed = BrpcFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
            let first = parsed.append(&bytes[..k]).unwrap();
            if k < bytes.len() {
                assert_eq!(first, Consumed::NeedMore);
            }
            let second = parsed.append(&bytes[k..]).unwrap();
            assert_eq!(second, Consumed::Complete { used: bytes.len() - k });
        }
    }
}
