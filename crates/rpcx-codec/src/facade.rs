//! Message façade: uniform `Request`/`Response` access over each transport's concrete meta shape,
//! plus the compress/decompress step shared by all of them (§4.7).

use std::collections::HashMap;

use rpcx_buf::SegmentedBuffer;
use rpcx_compress::registry;
use rpcx_proto::status::CompressType;

use crate::frame::brpc::BrpcFrame;
use crate::frame::srpc::{SrpcRequestFrame, SrpcResponseFrame};
use crate::frame::trpc::TrpcFrame;
use crate::{Error, Result};

/// Compresses `payload` in place per `compress_type`, updating `origin_size`/`compressed_size` on
/// the caller-supplied setters. A no-op (besides recording sizes) when `compress_type` is `None`.
fn compress_payload(
    compress_type: i32,
    payload: &mut SegmentedBuffer,
    set_origin_size: impl FnOnce(u32),
    set_compressed_size: impl FnOnce(u32),
) -> Result<()> {
    let origin_size = payload.size();
    set_origin_size(origin_size as u32);
    let ty = CompressType::from_tag(compress_type).unwrap_or(CompressType::None);
    if ty == CompressType::None {
        set_compressed_size(origin_size as u32);
        return Ok(());
    }
    let mut dest = SegmentedBuffer::new();
    let produced = registry().compress_iovec(ty, payload, &mut dest)?;
    *payload = dest;
    set_compressed_size(produced as u32);
    Ok(())
}

/// Decompresses `payload` in place per `compress_type`, per §4.5: validates `compressed_size`
/// against the buffer's actual size before decompressing, and (when compression is active) the
/// decompressed length against `origin_size` afterward. A no-op (besides the size check) when
/// `compress_type` is `None`.
fn decompress_payload(
    compress_type: i32,
    payload: &mut SegmentedBuffer,
    compressed_size: u32,
    origin_size: u32,
) -> Result<()> {
    if payload.size() != compressed_size as usize {
        return Err(Error::DecompressSizeInvalid(format!(
            "compressed_size meta={compressed_size} buffer={actual}",
            actual = payload.size()
        )));
    }
    let ty = CompressType::from_tag(compress_type).unwrap_or(CompressType::None);
    if ty == CompressType::None {
        return Ok(());
    }
    let mut dest = SegmentedBuffer::new();
    registry().decompress_iovec(ty, payload, &mut dest)?;
    if dest.size() != origin_size as usize {
        return Err(Error::DecompressSizeInvalid(format!(
            "origin_size meta={origin_size} decompressed={actual}",
            actual = dest.size()
        )));
    }
    *payload = dest;
    Ok(())
}

/// Fields and operations common to every request, regardless of transport.
pub trait Request {
    fn service_name(&self) -> &str;
    fn set_service_name(&mut self, name: impl Into<String>);
    fn method_name(&self) -> &str;
    fn set_method_name(&mut self, name: impl Into<String>);
    fn data_type(&self) -> i32;
    fn set_data_type(&mut self, value: i32);
    fn compress_type(&self) -> i32;
    fn set_compress_type(&mut self, value: i32);
    fn set_sequence_id(&mut self, id: i64);
    fn meta_module_data(&self) -> &HashMap<String, String>;
    fn meta_module_data_mut(&mut self) -> &mut HashMap<String, String>;
    fn set_meta_module_data(&mut self, data: HashMap<String, String>);
    fn payload_mut(&mut self) -> &mut SegmentedBuffer;
    fn compressed_size(&self) -> u32;
    fn origin_size(&self) -> u32;

    /// Compresses the payload per `compress_type`, recording origin/compressed sizes on the
    /// concrete meta. No shared default: each meta shape names its size-setters differently.
    fn compress(&mut self) -> Result<()>;

    fn decompress(&mut self) -> Result<()> {
        let ty = self.compress_type();
        let compressed_size = self.compressed_size();
        let origin_size = self.origin_size();
        decompress_payload(ty, self.payload_mut(), compressed_size, origin_size)
    }
}

/// Fields and operations that additionally apply to a response.
pub trait Response: Request {
    fn status_code(&self) -> i32;
    fn set_status_code(&mut self, code: i32);
    fn error(&self) -> i32;
    fn set_error(&mut self, code: i32);
    fn errmsg(&self) -> &str;
    fn set_errmsg(&mut self, msg: impl Into<String>);
}

impl Request for SrpcRequestFrame {
    fn service_name(&self) -> &str {
        &self.meta.service_name
    }
    fn set_service_name(&mut self, name: impl Into<String>) {
        self.meta.service_name = name.into();
    }
    fn method_name(&self) -> &str {
        &self.meta.method_name
    }
    fn set_method_name(&mut self, name: impl Into<String>) {
        self.meta.method_name = name.into();
    }
    fn data_type(&self) -> i32 {
        self.meta.data_type
    }
    fn set_data_type(&mut self, value: i32) {
        self.meta.data_type = value;
    }
    fn compress_type(&self) -> i32 {
        self.meta.compress_type
    }
    fn set_compress_type(&mut self, value: i32) {
        self.meta.compress_type = value;
    }
    fn set_sequence_id(&mut self, _id: i64) {}
    fn meta_module_data(&self) -> &HashMap<String, String> {
        &self.meta.trans_info
    }
    fn meta_module_data_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.meta.trans_info
    }
    fn set_meta_module_data(&mut self, data: HashMap<String, String>) {
        self.meta.trans_info = data;
    }
    fn payload_mut(&mut self) -> &mut SegmentedBuffer {
        &mut self.payload
    }
    fn compressed_size(&self) -> u32 {
        self.meta.compressed_size
    }
    fn origin_size(&self) -> u32 {
        self.meta.origin_size
    }

    fn compress(&mut self) -> Result<()> {
        let ty = self.meta.compress_type;
        let meta = &mut self.meta;
        compress_payload(
            ty,
            &mut self.payload,
            |n| meta.origin_size = n,
            |n| meta.compressed_size = n,
        )
    }
}

impl Request for SrpcResponseFrame {
    fn service_name(&self) -> &str {
        ""
    }
    fn set_service_name(&mut self, _name: impl Into<String>) {}
    fn method_name(&self) -> &str {
        ""
    }
    fn set_method_name(&mut self, _name: impl Into<String>) {}
    fn data_type(&self) -> i32 {
        self.meta.data_type
    }
    fn set_data_type(&mut self, value: i32) {
        self.meta.data_type = value;
    }
    fn compress_type(&self) -> i32 {
        self.meta.compress_type
    }
    fn set_compress_type(&mut self, value: i32) {
        self.meta.compress_type = value;
    }
    fn set_sequence_id(&mut self, _id: i64) {}
    fn meta_module_data(&self) -> &HashMap<String, String> {
        &self.meta.trans_info
    }
    fn meta_module_data_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.meta.trans_info
    }
    fn set_meta_module_data(&mut self, data: HashMap<String, String>) {
        self.meta.trans_info = data;
    }
    fn payload_mut(&mut self) -> &mut SegmentedBuffer {
        &mut self.payload
    }
    fn compressed_size(&self) -> u32 {
        self.meta.compressed_size
    }
    fn origin_size(&self) -> u32 {
        self.meta.origin_size
    }

    fn compress(&mut self) -> Result<()> {
        let ty = self.meta.compress_type;
        let meta = &mut self.meta;
        compress_payload(
            ty,
            &mut self.payload,
            |n| meta.origin_size = n,
            |n| meta.compressed_size = n,
        )
    }
}

impl Response for SrpcResponseFrame {
    fn status_code(&self) -> i32 {
        self.meta.status_code
    }
    fn set_status_code(&mut self, code: i32) {
        self.meta.status_code = code;
    }
    fn error(&self) -> i32 {
        self.meta.error
    }
    fn set_error(&mut self, code: i32) {
        self.meta.error = code;
    }
    fn errmsg(&self) -> &str {
        &self.meta.errmsg
    }
    fn set_errmsg(&mut self, msg: impl Into<String>) {
        self.meta.errmsg = msg.into();
    }
}

impl SrpcResponseFrame {
    /// Builds a fresh response for `req`, copying data-type/compression preferences from it and
    /// defaulting to a successful status — the Rust rendering of `server_reply_init(req, resp)`.
    pub fn from_request(req: &SrpcRequestFrame) -> Self {
        let mut resp = SrpcResponseFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
        resp.meta.data_type = req.meta.data_type;
        resp.meta.compress_type = req.meta.compress_type;
        resp.meta.status_code = rpcx_proto::Status::Ok.code();
        resp
    }
}

impl Request for BrpcFrame {
    fn service_name(&self) -> &str {
        &self.meta.service_name
    }
    fn set_service_name(&mut self, name: impl Into<String>) {
        self.meta.service_name = name.into();
    }
    fn method_name(&self) -> &str {
        &self.meta.method_name
    }
    fn set_method_name(&mut self, name: impl Into<String>) {
        self.meta.method_name = name.into();
    }
    fn data_type(&self) -> i32 {
        self.meta.data_type
    }
    fn set_data_type(&mut self, value: i32) {
        self.meta.data_type = value;
    }
    fn compress_type(&self) -> i32 {
        self.meta.compress_type
    }
    fn set_compress_type(&mut self, value: i32) {
        self.meta.compress_type = value;
    }
    fn set_sequence_id(&mut self, _id: i64) {
        // BRPC correlates via the connection's socket-level sequence, not a meta field in this
        // reduced schema.
    }
    fn meta_module_data(&self) -> &HashMap<String, String> {
        &self.meta.trans_info
    }
    fn meta_module_data_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.meta.trans_info
    }
    fn set_meta_module_data(&mut self, data: HashMap<String, String>) {
        self.meta.trans_info = data;
    }
    fn payload_mut(&mut self) -> &mut SegmentedBuffer {
        &mut self.payload
    }
    fn compressed_size(&self) -> u32 {
        self.meta.compressed_size
    }
    fn origin_size(&self) -> u32 {
        self.meta.origin_size
    }

    fn compress(&mut self) -> Result<()> {
        let ty = self.meta.compress_type;
        let meta = &mut self.meta;
        compress_payload(
            ty,
            &mut self.payload,
            |n| meta.origin_size = n,
            |n| meta.compressed_size = n,
        )
    }
}

impl Response for BrpcFrame {
    fn status_code(&self) -> i32 {
        self.meta.status_code
    }
    fn set_status_code(&mut self, code: i32) {
        self.meta.status_code = code;
    }
    fn error(&self) -> i32 {
        self.meta.error_code
    }
    fn set_error(&mut self, code: i32) {
        self.meta.error_code = code;
    }
    fn errmsg(&self) -> &str {
        &self.meta.errmsg
    }
    fn set_errmsg(&mut self, msg: impl Into<String>) {
        self.meta.errmsg = msg.into();
    }
}

impl BrpcFrame {
    /// Builds a fresh reply for `req` sharing its data/compress-type preferences and service info.
    pub fn reply_for(req: &BrpcFrame) -> Self {
        let mut resp = BrpcFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
        resp.meta.service_name = req.meta.service_name.clone();
        resp.meta.method_name = req.meta.method_name.clone();
        resp.meta.data_type = req.meta.data_type;
        resp.meta.compress_type = req.meta.compress_type;
        resp.meta.status_code = rpcx_proto::Status::Ok.code();
        resp
    }
}

impl Request for TrpcFrame {
    fn service_name(&self) -> &str {
        &self.meta.callee
    }
    fn set_service_name(&mut self, name: impl Into<String>) {
        self.meta.callee = name.into();
    }
    fn method_name(&self) -> &str {
        &self.meta.func
    }
    fn set_method_name(&mut self, name: impl Into<String>) {
        self.meta.func = name.into();
    }
    fn data_type(&self) -> i32 {
        self.meta.data_type
    }
    fn set_data_type(&mut self, value: i32) {
        self.meta.data_type = value;
    }
    fn compress_type(&self) -> i32 {
        self.meta.compress_type
    }
    fn set_compress_type(&mut self, value: i32) {
        self.meta.compress_type = value;
    }
    fn set_sequence_id(&mut self, id: i64) {
        self.stream_id = id as u16;
    }
    fn meta_module_data(&self) -> &HashMap<String, String> {
        &self.meta.trans_info
    }
    fn meta_module_data_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.meta.trans_info
    }
    fn set_meta_module_data(&mut self, data: HashMap<String, String>) {
        self.meta.trans_info = data;
    }
    fn payload_mut(&mut self) -> &mut SegmentedBuffer {
        &mut self.payload
    }
    fn compressed_size(&self) -> u32 {
        self.meta.compressed_size
    }
    fn origin_size(&self) -> u32 {
        self.meta.origin_size
    }

    fn compress(&mut self) -> Result<()> {
        let ty = self.meta.compress_type;
        let meta = &mut self.meta;
        compress_payload(
            ty,
            &mut self.payload,
            |n| meta.origin_size = n,
            |n| meta.compressed_size = n,
        )
    }
}

impl Response for TrpcFrame {
    fn status_code(&self) -> i32 {
        self.meta.status_code
    }
    fn set_status_code(&mut self, code: i32) {
        self.meta.status_code = code;
    }
    fn error(&self) -> i32 {
        self.meta.error_code
    }
    fn set_error(&mut self, code: i32) {
        self.meta.error_code = code;
    }
    fn errmsg(&self) -> &str {
        &self.meta.errmsg
    }
    fn set_errmsg(&mut self, msg: impl Into<String>) {
        self.meta.errmsg = msg.into();
    }
}

impl TrpcFrame {
    /// Builds a fresh reply for `req`, swapping caller/callee and copying type preferences.
    pub fn reply_for(req: &TrpcFrame) -> Self {
        let mut resp = TrpcFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
        resp.meta.caller = req.meta.callee.clone();
        resp.meta.callee = req.meta.caller.clone();
        resp.meta.func = req.meta.func.clone();
        resp.meta.data_type = req.meta.data_type;
        resp.meta.compress_type = req.meta.compress_type;
        resp.meta.status_code = rpcx_proto::Status::Ok.code();
        resp.stream_id = req.stream_id;
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameCodec;

    #[test]
    fn srpc_request_compress_then_decompress_round_trips() {
        let mut req = SrpcRequestFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
        req.set_service_name("Example");
        req.set_method_name("Echo");
        req.set_compress_type(CompressType::Gzip.tag());
        req.payload.write(b"hello world, compress me please");

        req.compress().unwrap();
        assert!(req.meta.compressed_size > 0);
        assert_eq!(req.meta.origin_size, 31);

        req.decompress().unwrap();
        assert_eq!(req.payload.merge_all(), b"hello world, compress me please");
    }

    #[test]
    fn decompress_rejects_compressed_size_mismatch_with_req_status() {
        let mut req = SrpcRequestFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
        req.set_compress_type(CompressType::Gzip.tag());
        req.payload.write(b"hello world, compress me please");
        req.compress().unwrap();

        // Tamper with the wire-reported compressed size so it no longer matches the buffer.
        req.meta.compressed_size += 1;
        let err = req.decompress().unwrap_err();
        assert!(matches!(err, Error::DecompressSizeInvalid(_)));
        assert_eq!(err.to_status(true), rpcx_proto::Status::ReqDecompressSizeInvalid);
        assert_eq!(err.to_status(false), rpcx_proto::Status::RespDecompressSizeInvalid);
    }

    #[test]
    fn decompress_rejects_origin_size_mismatch_after_decompressing() {
        let mut req = SrpcRequestFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
        req.set_compress_type(CompressType::Gzip.tag());
        req.payload.write(b"hello world, compress me please");
        req.compress().unwrap();

        // Tamper with the claimed decompressed (origin) size.
        req.meta.origin_size += 1;
        let err = req.decompress().unwrap_err();
        assert!(matches!(err, Error::DecompressSizeInvalid(_)));
    }

    #[test]
    fn srpc_response_from_request_copies_preferences() {
        let mut req = SrpcRequestFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
        req.set_data_type(2);
        req.set_compress_type(CompressType::Snappy.tag());

        let resp = SrpcResponseFrame::from_request(&req);
        assert_eq!(resp.data_type(), 2);
        assert_eq!(resp.compress_type(), CompressType::Snappy.tag());
        assert_eq!(resp.status_code(), rpcx_proto::Status::Ok.code());
    }

    #[test]
    fn brpc_reply_for_swaps_nothing_but_copies_identity() {
        let mut req = BrpcFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
        req.set_service_name("Svc");
        req.set_method_name("Do");
        let resp = BrpcFrame::reply_for(&req);
        assert_eq!(resp.service_name(), "Svc");
        assert_eq!(resp.method_name(), "Do");
        assert_eq!(resp.status_code(), rpcx_proto::Status::Ok.code());
    }

    #[test]
    fn trpc_reply_for_swaps_caller_and_callee() {
        let mut req = TrpcFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
        req.meta.caller = "client".into();
        req.set_service_name("server-service");
        let resp = TrpcFrame::reply_for(&req);
        assert_eq!(resp.meta.caller, "server-service");
        assert_eq!(resp.meta.callee, "client");
    }

    #[test]
    fn meta_module_data_round_trips_trans_info() {
        let mut req = SrpcRequestFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
        req.meta_module_data_mut().insert("trace_id".into(), "abc".into());
        assert_eq!(req.meta_module_data().get("trace_id").unwrap(), "abc");
    }

    #[test]
    fn frame_codec_methods_are_reachable_through_the_facade() {
        let mut req = SrpcRequestFrame::new(crate::config::DEFAULT_SIZE_LIMIT);
        req.set_service_name("S");
        req.set_method_name("M");
        req.serialize_meta().unwrap();
        let chunks = req.encode(usize::MAX).unwrap();
        assert!(!chunks.is_empty());
    }
}
