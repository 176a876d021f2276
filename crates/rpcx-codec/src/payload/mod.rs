//! Payload serialization across the three supported data encodings (Protobuf, Thrift binary,
//! JSON) and the two JSON bridges that let either IDL payload travel as JSON (§4.5).

mod protobuf_json;
mod thrift_json;

pub use protobuf_json::{default_descriptor_pool, protobuf_to_json, json_to_protobuf, JsonOptions};
pub use thrift_json::{thrift_to_json, json_to_thrift};

use prost::Message;
use thrift::protocol::{TBinaryInputProtocol, TBinaryOutputProtocol, TSerializable};

use crate::{Error, Result};

/// Serializes a Protobuf message directly (no JSON bridge) into its wire bytes.
pub fn encode_protobuf<M: Message>(msg: &M) -> Vec<u8> {
    msg.encode_to_vec()
}

/// Deserializes Protobuf wire bytes into a concrete message type.
pub fn decode_protobuf<M: Message + Default>(bytes: &[u8]) -> Result<M> {
    M::decode(bytes).map_err(|e| Error::Deserialize(e.to_string()))
}

/// Serializes a Thrift struct using the binary protocol (strict, matching the reference
/// implementation's `ThriftBuffer`).
pub fn encode_thrift<T: TSerializable>(msg: &T) -> Result<Vec<u8>> {
    let mut out = TBinaryOutputProtocol::new(Vec::new(), true);
    msg.write_to_out_protocol(&mut out)
        .map_err(|e| Error::Serialize(e.to_string()))?;
    Ok(out.transport)
}

/// Deserializes a Thrift struct using the binary protocol.
pub fn decode_thrift<T: TSerializable>(bytes: &[u8]) -> Result<T> {
    let mut input = TBinaryInputProtocol::new(bytes, true);
    T::read_from_in_protocol(&mut input).map_err(|e| Error::Deserialize(e.to_string()))
}

/// For an incoming JSON payload with an empty body, the wire contract is "no body means empty
/// message" — this synthesizes the empty-object literal so downstream `serde_json` parsing
/// succeeds instead of failing on zero bytes.
pub fn empty_json_body_if_blank(bytes: &[u8]) -> &[u8] {
    if bytes.is_empty() {
        b"{}"
    } else {
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpcx_proto::meta::SrpcRequestMeta;

    #[test]
    fn protobuf_direct_round_trip() {
        let meta = SrpcRequestMeta {
            service_name: "Example".into(),
            method_name: "Echo".into(),
            ..Default::default()
        };
        let bytes = encode_protobuf(&meta);
        let back: SrpcRequestMeta = decode_protobuf(&bytes).unwrap();
        assert_eq!(meta, back);
    }

    #[test]
    fn empty_json_body_synthesizes_empty_object() {
        assert_eq!(empty_json_body_if_blank(b""), b"{}");
        assert_eq!(empty_json_body_if_blank(b"{\"a\":1}"), b"{\"a\":1}");
    }
}
