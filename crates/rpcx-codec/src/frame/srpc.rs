//! SRPC wire frame: 16-byte header `"SRPC" | meta_len:u32be | payload_len:u32be | reserved:4`,
//! followed by the serialized meta and the payload. Grounded byte-for-byte on
//! `rpc_message_srpc.h`'s `SRPCMessage::encode`/`serialize_meta`/`deserialize_meta`.

use prost::Message;
use rpcx_buf::{Chunk, SegmentedBuffer};
use rpcx_proto::meta::{SrpcRequestMeta, SrpcResponseMeta};

use crate::frame::{Consumed, FrameCodec};
use crate::{Error, Result};

pub const HEADER_SIZE: usize = 16;
const MAGIC: &[u8; 4] = b"SRPC";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Header,
    Body { meta_len: usize, payload_len: usize },
}

/// Generic SRPC frame machinery shared by request and response; `M` is the concrete meta type
/// (`SrpcRequestMeta` or `SrpcResponseMeta`).
pub struct SrpcFrame<M> {
    pub meta: M,
    pub payload: SegmentedBuffer,
    meta_bytes: Vec<u8>,
    header_buf: Vec<u8>,
    state: ParseState,
    size_limit: usize,
}

impl<M: Message + Default> SrpcFrame<M> {
    pub fn new(size_limit: usize) -> Self {
        Self {
            meta: M::default(),
            payload: SegmentedBuffer::new(),
            meta_bytes: Vec::new(),
            header_buf: Vec::with_capacity(HEADER_SIZE),
            state: ParseState::Header,
            size_limit,
        }
    }
}

impl<M: Message + Default> FrameCodec for SrpcFrame<M> {
    fn serialize_meta(&mut self) -> Result<()> {
        self.meta_bytes = self.meta.encode_to_vec();
        Ok(())
    }

    fn deserialize_meta(&mut self) -> Result<()> {
        self.meta = M::decode(self.meta_bytes.as_slice()).map_err(|e| {
            log::warn!("failed to decode SRPC meta: {e}");
            Error::Meta(e.to_string())
        })?;
        Ok(())
    }

    fn encode(&self, max: usize) -> Result<Vec<Chunk>> {
        let payload_len = self.payload.size();
        if payload_len > 0x7FFF_FFFF {
            return Err(Error::MessageTooLarge {
                got: payload_len,
                limit: 0x7FFF_FFFF,
            });
        }
        let mut header = Vec::with_capacity(HEADER_SIZE);
        header.extend_from_slice(MAGIC);
        header.extend_from_slice(&(self.meta_bytes.len() as u32).to_be_bytes());
        header.extend_from_slice(&(payload_len as u32).to_be_bytes());
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
                    if &self.header_buf[0..4] != MAGIC {
                        log::warn!("rejecting frame: bad SRPC magic");
                        return Err(Error::Protocol("bad SRPC magic".into()));
                    }
                    let meta_len = u32::from_be_bytes(self.header_buf[4..8].try_into().unwrap()) as usize;
                    let payload_len =
                        u32::from_be_bytes(self.header_buf[8..12].try_into().unwrap()) as usize;
                    if meta_len + payload_len > self.size_limit {
                        log::warn!(
                            "rejecting SRPC frame: size {got} exceeds limit {limit}",
                            got = meta_len + payload_len,
                            limit = self.size_limit
                        );
                        return Err(Error::MessageTooLarge {
                            got: meta_len + payload_len,
                            limit: self.size_limit,
                        });
                    }
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

pub type SrpcRequestFrame = SrpcFrame<SrpcRequestMeta>;
pub type SrpcResponseFrame = SrpcFrame<SrpcResponseMeta>;

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_all(frame: &SrpcRequestFrame) -> Vec<u8> {
        frame
            .encode(usize::MAX)
            .unwrap()
            .iter()
            .flat_map(|c| c.to_vec())
            .collect()
    }

    #[test]
    fn srpc_echo_round_trip() {
        let mut frame = SrpcRequestFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
        frame.meta.service_name = "Example".into();
        frame.meta.method_name = "Echo".into();
        frame.serialize_meta().unwrap();
        // protobuf-encoded single string field "Hello" (field 1, wire type 2)
        frame.payload.write(&[0x0A, 0x05, b'H', b'e', b'l', b'l', b'o']);

        let bytes = encode_all(&frame);
        assert_eq!(&bytes[0..4], b"SRPC");
        let meta_len = u32::from_be_bytes(bytes[4..8].try_into().unwrap());
        let payload_len = u32::from_be_bytes(bytes[8..12].try_into().unwrap());
        assert_eq!(payload_len, 7);
        assert_eq!(&bytes[12..16], &[0, 0, 0, 0]);

        let mut parsed = SrpcRequestFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
        let consumed = parsed.append(&bytes).unwrap();
        assert_eq!(consumed, Consumed::Complete { used: bytes.len() });
        parsed.deserialize_meta().unwrap();
        assert_eq!(parsed.meta.service_name, "Example");
        assert_eq!(parsed.meta.method_name, "Echo");
        assert_eq!(meta_len as usize, parsed.meta.encode_to_vec().len());
        let got_payload = parsed.payload.fetch_exact(7).unwrap();
        assert_eq!(&got_payload[..], &[0x0A, 0x05, b'H', b'e', b'l', b'l', b'o']);
    }

    #[test]
    fn streaming_byte_by_byte_matches_one_shot() {
        let mut frame = SrpcRequestFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
        frame.meta.service_name = "S".into();
        frame.meta.method_name = "M".into();
        frame.serialize_meta().unwrap();
        frame.payload.write(b"payload-bytes");
        let bytes = encode_all(&frame);

        let mut byte_by_byte = SrpcRequestFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
        let mut last = Consumed::NeedMore;
        for b in &bytes {
            last = byte_by_byte.append(std::slice::from_ref(b)).unwrap();
        }
        assert_eq!(last, Consumed::Complete { used: 1 });

        let mut one_shot = SrpcRequestFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
        let one_shot_result = one_shot.append(&bytes).unwrap();
        assert_eq!(one_shot_result, Consumed::Complete { used: bytes.len() });

        byte_by_byte.deserialize_meta().unwrap();
        one_shot.deserialize_meta().unwrap();
        assert_eq!(byte_by_byte.meta, one_shot.meta);
    }

    #[test]
    fn arbitrary_split_point_matches_one_shot() {
        let mut frame = SrpcRequestFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
        frame.meta.service_name = "Split".into();
        frame.meta.method_name = "Test".into();
        frame.serialize_meta().unwrap();
        frame.payload.write(b"some payload data here");
        let bytes = encode_all(&frame);

        for k in 0..bytes.len() {
            let mut parsed = SrpcRequestFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
            let first = parsed.append(&bytes[..k]).unwrap();
            if k < bytes.len() {
                assert_eq!(first, Consumed::NeedMore, "split at {k}");
            }
            let second = parsed.append(&bytes[k..]).unwrap();
            assert_eq!(second, Consumed::Complete { used: bytes.len() - k });
        }
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

    fn decode_srpc_request_meta(bytes: &[u8]) -> Wire<SrpcRequestMeta> {
        Wire(SrpcRequestMeta::decode(bytes).unwrap())
    }

    rpcx_tests::test_frame!(
        srpc_request_meta_matches_acceptance_hex,
        Wire(SrpcRequestMeta {
            service_name: "Example".into(),
            method_name: "Echo".into(),
            ..Default::default()
        }),
        "0a074578616d706c6512044563686f",
        decode_srpc_request_meta
    );

    #[test]
    fn oversized_frame_is_rejected_without_allocating_payload() {
        let mut frame = SrpcRequestFrame::new(16);
        let mut header = Vec::with_capacity(HEADER_SIZE);
        header.extend_from_slice(MAGIC);
        header.extend_from_slice(&(0u32).to_be_bytes());
        header.extend_from_slice(&((1usize << 31) as u32).to_be_bytes());
        header.extend_from_slice(&[0u8; 4]);
        let err = frame.append(&header).unwrap_err();
        assert!(matches!(err, Error::MessageTooLarge { .. }));
        assert_eq!(frame.payload.size(), 0);
    }
}
