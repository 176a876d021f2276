//! Meta (request/response header) schemas, as hand-authored `prost::Message` structs — there is no
//! `.proto`/`protoc`/build-script code generation here, matching the source's actual wire shape for
//! each of SRPC/BRPC/TRPC. Field numbers are part of the wire contract and must not change.

use std::collections::HashMap;

/// Tracing sub-message carried inline in SRPC meta (binary trace/span ids).
#[derive(Clone, PartialEq, prost::Message)]
pub struct Span {
    #[prost(bytes = "vec", tag = "1")]
    pub trace_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub span_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub parent_span_id: Vec<u8>,
}

/// SRPC request meta. Field numbers mirror `rpc_message_srpc.h`'s `SRPCRequest`/`SRPCMeta`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct SrpcRequestMeta {
    #[prost(string, tag = "1")]
    pub service_name: String,
    #[prost(string, tag = "2")]
    pub method_name: String,
    #[prost(int32, tag = "3")]
    pub data_type: i32,
    #[prost(int32, tag = "4")]
    pub compress_type: i32,
    #[prost(uint32, tag = "5")]
    pub origin_size: u32,
    #[prost(uint32, tag = "6")]
    pub compressed_size: u32,
    #[prost(message, optional, tag = "7")]
    pub span: Option<Span>,
    #[prost(map = "string, string", tag = "8")]
    pub trans_info: HashMap<String, String>,
}

/// SRPC response meta.
#[derive(Clone, PartialEq, prost::Message)]
pub struct SrpcResponseMeta {
    #[prost(int32, tag = "1")]
    pub status_code: i32,
    #[prost(int32, tag = "2")]
    pub error: i32,
    #[prost(string, tag = "3")]
    pub errmsg: String,
    #[prost(int32, tag = "4")]
    pub data_type: i32,
    #[prost(int32, tag = "5")]
    pub compress_type: i32,
    #[prost(uint32, tag = "6")]
    pub origin_size: u32,
    #[prost(uint32, tag = "7")]
    pub compressed_size: u32,
    #[prost(message, optional, tag = "8")]
    pub span: Option<Span>,
    #[prost(map = "string, string", tag = "9")]
    pub trans_info: HashMap<String, String>,
}

/// BRPC request/response meta. BRPC additionally carries an `attachment_size` and a generic
/// `error_code`; `trans_info` rides in the same key-value map.
#[derive(Clone, PartialEq, prost::Message)]
pub struct BrpcMeta {
    #[prost(string, tag = "1")]
    pub service_name: String,
    #[prost(string, tag = "2")]
    pub method_name: String,
    #[prost(int32, tag = "3")]
    pub data_type: i32,
    #[prost(int32, tag = "4")]
    pub compress_type: i32,
    #[prost(uint32, tag = "5")]
    pub origin_size: u32,
    #[prost(uint32, tag = "6")]
    pub compressed_size: u32,
    #[prost(uint32, tag = "7")]
    pub attachment_size: u32,
    #[prost(int32, tag = "8")]
    pub status_code: i32,
    #[prost(int32, tag = "9")]
    pub error_code: i32,
    #[prost(string, tag = "10")]
    pub errmsg: String,
    #[prost(map = "string, string", tag = "11")]
    pub trans_info: HashMap<String, String>,
}

/// TRPC request/response meta. `callee`/`caller`/`func`/`timeout` are TRPC-specific; method names
/// are of the form `/service/method` before `trim_method_prefix` rewrites them.
#[derive(Clone, PartialEq, prost::Message)]
pub struct TrpcMeta {
    #[prost(string, tag = "1")]
    pub caller: String,
    #[prost(string, tag = "2")]
    pub callee: String,
    #[prost(string, tag = "3")]
    pub func: String,
    #[prost(uint32, tag = "4")]
    pub timeout: u32,
    #[prost(int32, tag = "5")]
    pub data_type: i32,
    #[prost(int32, tag = "6")]
    pub compress_type: i32,
    #[prost(uint32, tag = "7")]
    pub origin_size: u32,
    #[prost(uint32, tag = "8")]
    pub compressed_size: u32,
    #[prost(int32, tag = "9")]
    pub status_code: i32,
    #[prost(int32, tag = "10")]
    pub error_code: i32,
    #[prost(string, tag = "11")]
    pub errmsg: String,
    #[prost(map = "string, string", tag = "12")]
    pub trans_info: HashMap<String, String>,
}

impl TrpcMeta {
    /// Splits `/service/method` into `(service, method)`; returns `None` for a malformed path.
    pub fn split_callee(&self) -> Option<(&str, &str)> {
        let trimmed = self.callee.trim_start_matches('/');
        let (service, method) = trimmed.rsplit_once('/')?;
        Some((service, method))
    }

    /// Rewrites `self.func`/`self.callee`'s method component to the trailing segment after the
    /// last `/`, discarding any leading `/service/` prefix — the Rust rendering of the reference
    /// implementation's `trim_method_prefix()`.
    pub fn trim_method_prefix(&mut self) {
        if let Some(idx) = self.func.rfind('/') {
            self.func = self.func[idx + 1..].to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn srpc_request_meta_round_trips_through_protobuf() {
        let meta = SrpcRequestMeta {
            service_name: "Example".into(),
            method_name: "Echo".into(),
            data_type: 0,
            compress_type: 0,
            origin_size: 0,
            compressed_size: 0,
            span: Some(Span {
                trace_id: vec![0xaa; 16],
                span_id: vec![0xbb; 8],
                parent_span_id: vec![],
            }),
            trans_info: HashMap::new(),
        };
        let bytes = meta.encode_to_vec();
        let decoded = SrpcRequestMeta::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, meta);
    }

    #[test]
    fn trpc_trim_method_prefix() {
        let mut meta = TrpcMeta {
            func: "/Example/Echo".into(),
            ..Default::default()
        };
        meta.trim_method_prefix();
        assert_eq!(meta.func, "Echo");
    }

    #[test]
    fn trpc_split_callee() {
        let meta = TrpcMeta {
            callee: "/Example/Echo".into(),
            ..Default::default()
        };
        assert_eq!(meta.split_callee(), Some(("Example", "Echo")));
    }
}
