//! HTTP-tunneled transport forms (§4.3 "HTTP-tunneled forms" / §6 header mapping table).
//!
//! Each tunneled variant carries its meta fields as HTTP headers instead of a binary header, with
//! the payload as the HTTP body; framing size is `Content-Length`. Parsing/building raw HTTP/1.1
//! bytes is the embedding runtime's job (§1 Non-goals) — these types only translate between an
//! already-parsed [`http::Request<Bytes>`]/[`http::Response<Bytes>`] and this crate's meta fields.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Request, Response, StatusCode};

use rpcx_proto::status::{CompressType, DataType, Status};
use rpcx_proto::trace::TraceParent;

use crate::{Error, Result};

/// `Content-Type` value for a data type, per §6.
pub fn content_type_for(dt: DataType) -> &'static str {
    match dt {
        DataType::Protobuf => "application/x-protobuf",
        DataType::Thrift => "application/x-thrift",
        DataType::Json => "application/json",
    }
}

/// Inverse of [`content_type_for`]; also accepts the Protobuf aliases named in §6.
pub fn data_type_from_content_type(ct: &str) -> Option<DataType> {
    match ct.split(';').next().unwrap_or(ct).trim() {
        "application/x-protobuf" | "application/proto" | "application/pb" => Some(DataType::Protobuf),
        "application/x-thrift" => Some(DataType::Thrift),
        "application/json" => Some(DataType::Json),
        _ => None,
    }
}

/// `Content-Encoding` value for a compression tag, per §6.
pub fn content_encoding_for(ct: CompressType) -> &'static str {
    match ct {
        CompressType::None => "identity",
        CompressType::Snappy => "x-snappy",
        CompressType::Gzip => "gzip",
        CompressType::Zlib => "deflate",
        CompressType::Lz4 => "x-lz4",
    }
}

/// Inverse of [`content_encoding_for`].
pub fn compress_type_from_content_encoding(v: &str) -> Option<CompressType> {
    match v.trim() {
        "identity" => Some(CompressType::None),
        "x-snappy" => Some(CompressType::Snappy),
        "gzip" => Some(CompressType::Gzip),
        "deflate" => Some(CompressType::Zlib),
        "x-lz4" => Some(CompressType::Lz4),
        _ => None,
    }
}

/// Splits a request-URI path into `(service, method)` per §6: `/<service>/<method>`; query and
/// fragment are ignored (the caller passes only the path); trailing slash is trimmed; an empty
/// path, or one with no `/`-separated service segment, is [`Error::UriInvalid`].
pub fn split_service_method(path: &str) -> Result<(String, String)> {
    let trimmed = path.trim_end_matches('/');
    let trimmed = trimmed.strip_prefix('/').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Err(Error::UriInvalid(path.to_string()));
    }
    match trimmed.rfind('/') {
        Some(idx) if idx > 0 => Ok((trimmed[..idx].to_string(), trimmed[idx + 1..].to_string())),
        _ => Err(Error::UriInvalid(path.to_string())),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: String) {
    if let Ok(v) = HeaderValue::from_str(&value) {
        headers.insert(HeaderName::from_static(name), v);
    }
}

/// A mutable `http::HeaderMap` accessor shared by every tunneled variant, exposing the façade's
/// `set_http_header`/`add_http_header`/`http_header` trio (§4.7) over whatever headers weren't
/// already consumed into typed fields.
pub trait HttpHeaders {
    fn headers(&self) -> &HeaderMap;
    fn headers_mut(&mut self) -> &mut HeaderMap;

    fn http_header(&self, name: &str) -> Option<&str> {
        header_str(self.headers(), name)
    }

    fn set_http_header(&mut self, name: &str, value: &str) -> Result<()> {
        let header_name = HeaderName::try_from(name).map_err(|e| Error::Protocol(e.to_string()))?;
        let header_value = HeaderValue::from_str(value).map_err(|e| Error::Protocol(e.to_string()))?;
        self.headers_mut().insert(header_name, header_value);
        Ok(())
    }

    fn add_http_header(&mut self, name: &str, value: &str) -> Result<()> {
        let header_name = HeaderName::try_from(name).map_err(|e| Error::Protocol(e.to_string()))?;
        let header_value = HeaderValue::from_str(value).map_err(|e| Error::Protocol(e.to_string()))?;
        self.headers_mut().append(header_name, header_value);
        Ok(())
    }
}

/// Tracing headers common to every tunneled variant: `Trace-Id`, `Span-Id`, `traceparent`.
fn read_tracing(headers: &HeaderMap) -> (Option<String>, Option<String>, Option<TraceParent>) {
    let trace_id = header_str(headers, "trace-id").map(str::to_string);
    let span_id = header_str(headers, "span-id").map(str::to_string);
    let traceparent = header_str(headers, "traceparent").and_then(|v| TraceParent::parse(v).ok());
    (trace_id, span_id, traceparent)
}

fn write_tracing(headers: &mut HeaderMap, trace_id: &Option<String>, span_id: &Option<String>, tp: Option<TraceParent>) {
    if let Some(id) = trace_id {
        insert_header(headers, "trace-id", id.clone());
    }
    if let Some(id) = span_id {
        insert_header(headers, "span-id", id.clone());
    }
    if let Some(tp) = tp {
        insert_header(headers, "traceparent", tp.to_header());
    }
}

/// SRPC-over-HTTP request: headers carry service/method (from the request URI), data/compress
/// type, and `Origin-Size`; the body is the (possibly compressed) payload.
pub struct SrpcHttpRequest {
    pub service_name: String,
    pub method_name: String,
    pub data_type: i32,
    pub compress_type: i32,
    pub origin_size: Option<u32>,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub body: Bytes,
    extra: HeaderMap,
}

impl HttpHeaders for SrpcHttpRequest {
    fn headers(&self) -> &HeaderMap {
        &self.extra
    }
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.extra
    }
}

impl SrpcHttpRequest {
    pub fn new(service_name: impl Into<String>, method_name: impl Into<String>, body: Bytes) -> Self {
        Self {
            service_name: service_name.into(),
            method_name: method_name.into(),
            data_type: DataType::Protobuf.tag(),
            compress_type: CompressType::None.tag(),
            origin_size: None,
            trace_id: None,
            span_id: None,
            body,
            extra: HeaderMap::new(),
        }
    }

    pub fn encode(&self) -> Result<Request<Bytes>> {
        let uri = format!("/{}/{}", self.service_name, self.method_name);
        let mut builder = Request::builder().method("POST").uri(uri);
        {
            let headers = builder.headers_mut().expect("fresh builder has no error");
            *headers = self.extra.clone();
            insert_header(
                headers,
                "content-type",
                content_type_for(DataType::from_tag(self.data_type).unwrap_or(DataType::Protobuf)).to_string(),
            );
            insert_header(
                headers,
                "content-encoding",
                content_encoding_for(CompressType::from_tag(self.compress_type).unwrap_or(CompressType::None))
                    .to_string(),
            );
            if let Some(size) = self.origin_size {
                insert_header(headers, "origin-size", size.to_string());
            }
            write_tracing(headers, &self.trace_id, &self.span_id, None);
        }
        builder
            .body(self.body.clone())
            .map_err(|e| Error::Protocol(e.to_string()))
    }

    pub fn decode(req: &Request<Bytes>) -> Result<Self> {
        let (service_name, method_name) = split_service_method(req.uri().path())?;
        let headers = req.headers();
        let data_type = header_str(headers, "content-type")
            .and_then(data_type_from_content_type)
            .unwrap_or(DataType::Protobuf);
        let compress_type = header_str(headers, "content-encoding")
            .and_then(compress_type_from_content_encoding)
            .unwrap_or(CompressType::None);
        let origin_size = header_str(headers, "origin-size").and_then(|v| v.parse().ok());
        let (trace_id, span_id, _) = read_tracing(headers);
        Ok(Self {
            service_name,
            method_name,
            data_type: data_type.tag(),
            compress_type: compress_type.tag(),
            origin_size,
            trace_id,
            span_id,
            body: req.body().clone(),
            extra: headers.clone(),
        })
    }
}

/// SRPC-over-HTTP response: `SRPC-Status`/`SRPC-Error` carry the shared status code and the
/// transport-native error code; the HTTP status line itself is derived via
/// [`rpcx_proto::status::Status::to_http_status`].
pub struct SrpcHttpResponse {
    pub status_code: i32,
    pub error: i32,
    pub errmsg: String,
    pub data_type: i32,
    pub compress_type: i32,
    pub origin_size: Option<u32>,
    pub body: Bytes,
    extra: HeaderMap,
}

impl HttpHeaders for SrpcHttpResponse {
    fn headers(&self) -> &HeaderMap {
        &self.extra
    }
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.extra
    }
}

impl SrpcHttpResponse {
    pub fn ok(body: Bytes) -> Self {
        Self {
            status_code: Status::Ok.code(),
            error: 0,
            errmsg: String::new(),
            data_type: DataType::Protobuf.tag(),
            compress_type: CompressType::None.tag(),
            origin_size: None,
            body,
            extra: HeaderMap::new(),
        }
    }

    pub fn encode(&self) -> Result<Response<Bytes>> {
        let status = Status::from_code(self.status_code)
            .map(Status::to_http_status)
            .unwrap_or(500);
        let mut builder = Response::builder()
            .status(StatusCode::from_u16(status).map_err(|e| Error::Protocol(e.to_string()))?);
        {
            let headers = builder.headers_mut().expect("fresh builder has no error");
            *headers = self.extra.clone();
            insert_header(
                headers,
                "content-type",
                content_type_for(DataType::from_tag(self.data_type).unwrap_or(DataType::Protobuf)).to_string(),
            );
            insert_header(
                headers,
                "content-encoding",
                content_encoding_for(CompressType::from_tag(self.compress_type).unwrap_or(CompressType::None))
                    .to_string(),
            );
            insert_header(headers, "srpc-status", self.status_code.to_string());
            insert_header(headers, "srpc-error", self.error.to_string());
            if let Some(size) = self.origin_size {
                insert_header(headers, "origin-size", size.to_string());
            }
        }
        builder
            .body(self.body.clone())
            .map_err(|e| Error::Protocol(e.to_string()))
    }

    pub fn decode(resp: &Response<Bytes>) -> Result<Self> {
        let headers = resp.headers();
        let status_code = header_str(headers, "srpc-status")
            .and_then(|v| v.parse().ok())
            .unwrap_or(Status::Undefined.code());
        let error = header_str(headers, "srpc-error").and_then(|v| v.parse().ok()).unwrap_or(0);
        let data_type = header_str(headers, "content-type")
            .and_then(data_type_from_content_type)
            .unwrap_or(DataType::Protobuf);
        let compress_type = header_str(headers, "content-encoding")
            .and_then(compress_type_from_content_encoding)
            .unwrap_or(CompressType::None);
        let origin_size = header_str(headers, "origin-size").and_then(|v| v.parse().ok());
        Ok(Self {
            status_code,
            error,
            errmsg: String::new(),
            data_type: data_type.tag(),
            compress_type: compress_type.tag(),
            origin_size,
            body: resp.body().clone(),
            extra: headers.clone(),
        })
    }
}

/// TRPC-over-HTTP frame: the `trpc-*` header family (§6) plus the generic tracing/content
/// headers; fused request+response shape, matching the binary TRPC meta's own fusion.
#[derive(Debug, Default, Clone)]
pub struct TrpcHttpFrame {
    pub caller: String,
    pub callee: String,
    pub func: String,
    pub call_type: String,
    pub request_id: Option<u32>,
    pub timeout: Option<u32>,
    pub ret: Option<i32>,
    pub func_ret: Option<i32>,
    pub error_msg: String,
    pub message_type: Option<String>,
    pub trans_info: HashMap<String, String>,
    pub data_type: i32,
    pub compress_type: i32,
}

impl TrpcHttpFrame {
    pub fn new() -> Self {
        Self {
            data_type: DataType::Protobuf.tag(),
            compress_type: CompressType::None.tag(),
            ..Default::default()
        }
    }

    /// Parses the `traceparent` value out of `trans_info`, if present (the same convention the
    /// binary TRPC codec uses).
    pub fn traceparent(&self) -> Option<TraceParent> {
        self.trans_info.get("traceparent").and_then(|v| TraceParent::parse(v).ok())
    }

    pub fn set_traceparent(&mut self, tp: TraceParent) {
        self.trans_info.insert("traceparent".to_string(), tp.to_header());
    }

    fn write_headers(&self, headers: &mut HeaderMap) {
        insert_header(headers, "trpc-caller", self.caller.clone());
        insert_header(headers, "trpc-callee", self.callee.clone());
        insert_header(headers, "trpc-func", self.func.clone());
        insert_header(headers, "trpc-call-type", self.call_type.clone());
        if let Some(id) = self.request_id {
            insert_header(headers, "trpc-request-id", id.to_string());
        }
        if let Some(t) = self.timeout {
            insert_header(headers, "trpc-timeout", t.to_string());
        }
        if let Some(ret) = self.ret {
            insert_header(headers, "trpc-ret", ret.to_string());
        }
        if let Some(ret) = self.func_ret {
            insert_header(headers, "trpc-func-ret", ret.to_string());
        }
        if !self.error_msg.is_empty() {
            insert_header(headers, "trpc-error-msg", self.error_msg.clone());
        }
        if let Some(mt) = &self.message_type {
            insert_header(headers, "trpc-message-type", mt.clone());
        }
        if !self.trans_info.is_empty() {
            let encoded: HashMap<&str, String> = self
                .trans_info
                .iter()
                .map(|(k, v)| (k.as_str(), BASE64.encode(v.as_bytes())))
                .collect();
            if let Ok(json) = serde_json::to_string(&encoded) {
                insert_header(headers, "trpc-trans-info", json);
            }
        }
        insert_header(
            headers,
            "content-type",
            content_type_for(DataType::from_tag(self.data_type).unwrap_or(DataType::Protobuf)).to_string(),
        );
        insert_header(
            headers,
            "content-encoding",
            content_encoding_for(CompressType::from_tag(self.compress_type).unwrap_or(CompressType::None))
                .to_string(),
        );
    }

    fn read_headers(headers: &HeaderMap) -> Self {
        let mut trans_info: HashMap<String, String> = header_str(headers, "trpc-trans-info")
            .and_then(|v| serde_json::from_str::<HashMap<String, String>>(v).ok())
            .map(|raw| {
                raw.into_iter()
                    .map(|(k, v)| match BASE64.decode(&v) {
                        Ok(bytes) => (k, String::from_utf8(bytes).unwrap_or(v)),
                        Err(_) => (k, v),
                    })
                    .collect()
            })
            .unwrap_or_default();
        if let Some(tp) = header_str(headers, "traceparent") {
            trans_info.insert("traceparent".to_string(), tp.to_string());
        }
        let data_type = header_str(headers, "content-type")
            .and_then(data_type_from_content_type)
            .unwrap_or(DataType::Protobuf);
        let compress_type = header_str(headers, "content-encoding")
            .and_then(compress_type_from_content_encoding)
            .unwrap_or(CompressType::None);
        Self {
            caller: header_str(headers, "trpc-caller").unwrap_or_default().to_string(),
            callee: header_str(headers, "trpc-callee").unwrap_or_default().to_string(),
            func: header_str(headers, "trpc-func").unwrap_or_default().to_string(),
            call_type: header_str(headers, "trpc-call-type").unwrap_or_default().to_string(),
            request_id: header_str(headers, "trpc-request-id").and_then(|v| v.parse().ok()),
            timeout: header_str(headers, "trpc-timeout").and_then(|v| v.parse().ok()),
            ret: header_str(headers, "trpc-ret").and_then(|v| v.parse().ok()),
            func_ret: header_str(headers, "trpc-func-ret").and_then(|v| v.parse().ok()),
            error_msg: header_str(headers, "trpc-error-msg").unwrap_or_default().to_string(),
            message_type: header_str(headers, "trpc-message-type").map(str::to_string),
            trans_info,
            data_type: data_type.tag(),
            compress_type: compress_type.tag(),
        }
    }

    pub fn encode_request(&self, body: Bytes) -> Result<Request<Bytes>> {
        let uri = format!("/{}/{}", self.callee, self.func);
        let mut builder = Request::builder().method("POST").uri(uri);
        {
            let headers = builder.headers_mut().expect("fresh builder has no error");
            self.write_headers(headers);
        }
        builder.body(body).map_err(|e| Error::Protocol(e.to_string()))
    }

    pub fn decode_request(req: &Request<Bytes>) -> Result<(Self, Bytes)> {
        let (callee, func) = split_service_method(req.uri().path())?;
        let mut frame = Self::read_headers(req.headers());
        frame.callee = callee;
        frame.func = func;
        Ok((frame, req.body().clone()))
    }

    pub fn encode_response(&self, body: Bytes) -> Result<Response<Bytes>> {
        let status = self
            .ret
            .and_then(|code| Status::from_code(code).ok())
            .map(Status::to_http_status)
            .unwrap_or(200);
        let mut builder =
            Response::builder().status(StatusCode::from_u16(status).map_err(|e| Error::Protocol(e.to_string()))?);
        {
            let headers = builder.headers_mut().expect("fresh builder has no error");
            self.write_headers(headers);
        }
        builder.body(body).map_err(|e| Error::Protocol(e.to_string()))
    }

    pub fn decode_response(resp: &Response<Bytes>) -> Result<(Self, Bytes)> {
        let frame = Self::read_headers(resp.headers());
        Ok((frame, resp.body().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_service_method_trims_trailing_slash_and_ignores_query() {
        let (svc, method) = split_service_method("/Example/Echo/").unwrap();
        assert_eq!(svc, "Example");
        assert_eq!(method, "Echo");
    }

    #[test]
    fn split_service_method_rejects_empty_and_bare_paths() {
        assert!(split_service_method("/").is_err());
        assert!(split_service_method("/Echo").is_err());
    }

    #[test]
    fn content_type_round_trips_every_data_type() {
        for dt in [DataType::Protobuf, DataType::Thrift, DataType::Json] {
            let ct = content_type_for(dt);
            assert_eq!(data_type_from_content_type(ct), Some(dt));
        }
    }

    #[test]
    fn content_encoding_round_trips_every_compress_type() {
        for ct in [CompressType::None, CompressType::Snappy, CompressType::Gzip, CompressType::Zlib, CompressType::Lz4] {
            let enc = content_encoding_for(ct);
            assert_eq!(compress_type_from_content_encoding(enc), Some(ct));
        }
    }

    #[test]
    fn srpc_http_request_round_trips_through_headers_and_uri() {
        let mut req = SrpcHttpRequest::new("Example", "Echo", Bytes::from_static(b"hello"));
        req.compress_type = CompressType::Gzip.tag();
        req.origin_size = Some(5);
        let encoded = req.encode().unwrap();
        assert_eq!(encoded.uri().path(), "/Example/Echo");

        let decoded = SrpcHttpRequest::decode(&encoded).unwrap();
        assert_eq!(decoded.service_name, "Example");
        assert_eq!(decoded.method_name, "Echo");
        assert_eq!(decoded.compress_type, CompressType::Gzip.tag());
        assert_eq!(decoded.origin_size, Some(5));
        assert_eq!(decoded.body, Bytes::from_static(b"hello"));
    }

    #[test]
    fn srpc_http_response_derives_http_status_from_shared_code() {
        let mut resp = SrpcHttpResponse::ok(Bytes::new());
        resp.status_code = Status::MethodNotFound.code();
        let encoded = resp.encode().unwrap();
        assert_eq!(encoded.status().as_u16(), 400);

        let decoded = SrpcHttpResponse::decode(&encoded).unwrap();
        assert_eq!(decoded.status_code, Status::MethodNotFound.code());
    }

    #[test]
    fn trpc_http_tracing_round_trips_through_headers() {
        let mut frame = TrpcHttpFrame::new();
        frame.caller = "client".into();
        frame.callee = "server".into();
        frame.func = "Echo".into();
        let tp = TraceParent::parse("00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01").unwrap();
        frame.set_traceparent(tp);

        let req = frame.encode_request(Bytes::from_static(b"payload")).unwrap();
        let (decoded, body) = TrpcHttpFrame::decode_request(&req).unwrap();
        assert_eq!(decoded.callee, "server");
        assert_eq!(decoded.func, "Echo");
        assert_eq!(decoded.traceparent(), Some(tp));
        assert_eq!(body, Bytes::from_static(b"payload"));
    }

    #[test]
    fn trpc_http_trans_info_base64_round_trips() {
        let mut frame = TrpcHttpFrame::new();
        frame.callee = "svc".into();
        frame.func = "m".into();
        frame.trans_info.insert("custom-key".to_string(), "binary\0value".to_string());

        let req = frame.encode_request(Bytes::new()).unwrap();
        let (decoded, _) = TrpcHttpFrame::decode_request(&req).unwrap();
        assert_eq!(decoded.trans_info.get("custom-key").unwrap(), "binary\0value");
    }

    #[test]
    fn set_and_add_http_header_are_distinguishable() {
        let mut req = SrpcHttpRequest::new("S", "M", Bytes::new());
        req.set_http_header("x-custom", "a").unwrap();
        req.set_http_header("x-custom", "b").unwrap();
        assert_eq!(req.http_header("x-custom"), Some("b"));

        req.add_http_header("x-multi", "1").unwrap();
        req.add_http_header("x-multi", "2").unwrap();
        assert_eq!(req.headers().get_all("x-multi").iter().count(), 2);
    }
}
