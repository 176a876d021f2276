//! Multi-protocol RPC frame, payload, and status codecs: SRPC / BRPC / TRPC / Thrift-framed, and
//! their HTTP/1.1-tunneled variants, sharing the segmented buffer ([`rpcx_buf`]) and compression
//! registry ([`rpcx_compress`]) that every transport bottlenecks through.

pub mod config;
pub mod error;
pub mod facade;
pub mod frame;
pub mod http;
pub mod payload;

pub use error::{Error, Result};
