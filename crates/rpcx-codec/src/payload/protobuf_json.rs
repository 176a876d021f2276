//! Bidirectional Protobuf↔JSON translation through `prost-reflect`'s `DynamicMessage`, per
//! SPEC_FULL.md §4.5. A process-wide `DescriptorPool` is memoized for the common case; callers
//! with a message tied to a different pool pass it explicitly instead.

use std::sync::OnceLock;

use prost::Message;
use prost_reflect::{DescriptorPool, DynamicMessage, MessageDescriptor, SerializeOptions};

use crate::{Error, Result};

static DEFAULT_POOL: OnceLock<DescriptorPool> = OnceLock::new();

/// The process-wide, lazily-initialized descriptor pool used when callers don't supply their own.
pub fn default_descriptor_pool() -> &'static DescriptorPool {
    DEFAULT_POOL.get_or_init(DescriptorPool::new)
}

/// The four JSON options from §4.5, mapped onto `prost_reflect::SerializeOptions`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonOptions {
    pub add_whitespace: bool,
    pub enum_as_ints: bool,
    pub preserve_proto_field_names: bool,
    pub always_print_fields_with_no_presence: bool,
}

impl JsonOptions {
    fn to_serialize_options(self) -> SerializeOptions {
        SerializeOptions::new()
            .use_enum_numbers(self.enum_as_ints)
            .use_proto_field_name(self.preserve_proto_field_names)
            .skip_default_fields(!self.always_print_fields_with_no_presence)
    }
}

/// Decodes Protobuf wire bytes described by `desc` and re-encodes them as JSON text.
pub fn protobuf_to_json(desc: &MessageDescriptor, bytes: &[u8], opts: JsonOptions) -> Result<String> {
    let dyn_msg = DynamicMessage::decode(desc.clone(), bytes)
        .map_err(|e| Error::Deserialize(e.to_string()))?;
    let ser_opts = opts.to_serialize_options();
    let mut buf = Vec::new();
    if opts.add_whitespace {
        let mut ser = serde_json::Serializer::pretty(&mut buf);
        dyn_msg
            .serialize_with_options(&mut ser, &ser_opts)
            .map_err(|e| Error::Serialize(e.to_string()))?;
    } else {
        let mut ser = serde_json::Serializer::new(&mut buf);
        dyn_msg
            .serialize_with_options(&mut ser, &ser_opts)
            .map_err(|e| Error::Serialize(e.to_string()))?;
    }
    String::from_utf8(buf).map_err(|e| Error::Serialize(e.to_string()))
}

/// Parses JSON text into a message described by `desc` and re-encodes it as Protobuf wire bytes.
pub fn json_to_protobuf(desc: &MessageDescriptor, json: &str) -> Result<Vec<u8>> {
    let mut de = serde_json::Deserializer::from_str(json);
    let dyn_msg = DynamicMessage::deserialize(desc.clone(), &mut de)
        .map_err(|e| Error::Deserialize(e.to_string()))?;
    de.end().map_err(|e| Error::Deserialize(e.to_string()))?;
    Ok(dyn_msg.encode_to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost_reflect::bytes::Bytes;
    use prost_reflect::prost_types::{
        field_descriptor_proto, DescriptorProto, FieldDescriptorProto, FileDescriptorProto,
        FileDescriptorSet,
    };

    fn echo_descriptor() -> MessageDescriptor {
        let file = FileDescriptorProto {
            name: Some("echo.proto".into()),
            package: Some("rpcx.test".into()),
            syntax: Some("proto3".into()),
            message_type: vec![DescriptorProto {
                name: Some("EchoMsg".into()),
                field: vec![FieldDescriptorProto {
                    name: Some("text".into()),
                    number: Some(1),
                    label: Some(field_descriptor_proto::Label::Optional as i32),
                    r#type: Some(field_descriptor_proto::Type::String as i32),
                    json_name: Some("text".into()),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        let pool = DescriptorPool::from_file_descriptor_set(FileDescriptorSet { file: vec![file] })
            .unwrap();
        pool.get_message_by_name("rpcx.test.EchoMsg").unwrap()
    }

    #[test]
    fn protobuf_to_json_and_back_round_trips() {
        let desc = echo_descriptor();
        let mut dyn_msg = DynamicMessage::new(desc.clone());
        dyn_msg.set_field_by_name("text", prost_reflect::Value::String("hello".into()));
        let bytes: Bytes = dyn_msg.encode_to_vec().into();

        let json = protobuf_to_json(&desc, &bytes, JsonOptions::default()).unwrap();
        assert_eq!(json, "{\"text\":\"hello\"}");

        let back = json_to_protobuf(&desc, &json).unwrap();
        assert_eq!(back, bytes.to_vec());
    }

    #[test]
    fn preserve_proto_field_names_and_whitespace_options_apply() {
        let desc = echo_descriptor();
        let mut dyn_msg = DynamicMessage::new(desc.clone());
        dyn_msg.set_field_by_name("text", prost_reflect::Value::String("hi".into()));
        let bytes = dyn_msg.encode_to_vec();

        let pretty = protobuf_to_json(
            &desc,
            &bytes,
            JsonOptions {
                add_whitespace: true,
                preserve_proto_field_names: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(pretty.contains('\n'));
        assert!(pretty.contains("\"text\""));
    }
}
