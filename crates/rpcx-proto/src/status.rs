//! Shared status-code taxonomy.
//!
//! Numeric values are load-bearing: they are reproduced verbatim from the reference
//! implementation's `RPCStatusCode` enum so that a status code that crosses the wire (e.g. in an
//! SRPC response meta) means the same thing on both ends.

use thiserror::Error;

/// The closed set of status codes shared across every transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum Status {
    Undefined = 0,
    Ok = 1,
    ServiceNotFound = 2,
    MethodNotFound = 3,
    MetaError = 4,

    ReqCompressSizeInvalid = 5,
    ReqDecompressSizeInvalid = 6,
    ReqCompressNotSupported = 7,
    ReqDecompressNotSupported = 8,
    ReqCompressError = 9,
    ReqDecompressError = 10,
    ReqSerializeError = 11,
    ReqDeserializeError = 12,
    RespCompressSizeInvalid = 13,
    RespDecompressSizeInvalid = 14,
    RespCompressNotSupported = 15,
    RespDecompressNotSupported = 16,
    RespCompressError = 17,
    RespDecompressError = 18,
    RespSerializeError = 19,
    RespDeserializeError = 20,
    IdlSerializeNotSupported = 21,
    IdlDeserializeNotSupported = 22,

    UriInvalid = 30,
    UpstreamFailed = 31,
    SystemError = 100,
    SslError = 101,
    DnsError = 102,
    ProcessTerminated = 103,
}

#[derive(Debug, Error)]
#[error("unrecognized status code {0}")]
pub struct UnknownStatus(pub i32);

impl Status {
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Result<Self, UnknownStatus> {
        Ok(match code {
            0 => Status::Undefined,
            1 => Status::Ok,
            2 => Status::ServiceNotFound,
            3 => Status::MethodNotFound,
            4 => Status::MetaError,
            5 => Status::ReqCompressSizeInvalid,
            6 => Status::ReqDecompressSizeInvalid,
            7 => Status::ReqCompressNotSupported,
            8 => Status::ReqDecompressNotSupported,
            9 => Status::ReqCompressError,
            10 => Status::ReqDecompressError,
            11 => Status::ReqSerializeError,
            12 => Status::ReqDeserializeError,
            13 => Status::RespCompressSizeInvalid,
            14 => Status::RespDecompressSizeInvalid,
            15 => Status::RespCompressNotSupported,
            16 => Status::RespDecompressNotSupported,
            17 => Status::RespCompressError,
            18 => Status::RespDecompressError,
            19 => Status::RespSerializeError,
            20 => Status::RespDeserializeError,
            21 => Status::IdlSerializeNotSupported,
            22 => Status::IdlDeserializeNotSupported,
            30 => Status::UriInvalid,
            31 => Status::UpstreamFailed,
            100 => Status::SystemError,
            101 => Status::SslError,
            102 => Status::DnsError,
            103 => Status::ProcessTerminated,
            other => return Err(UnknownStatus(other)),
        })
    }

    /// Fixed, stable, ASCII message for this status code.
    pub fn message(self) -> &'static str {
        use Status::*;
        match self {
            Undefined => "undefined status",
            Ok => "OK",
            ServiceNotFound => "service not found",
            MethodNotFound => "method not found",
            MetaError => "meta error",
            ReqCompressSizeInvalid => "request compress size invalid",
            ReqDecompressSizeInvalid => "request decompress size invalid",
            ReqCompressNotSupported => "request compress type not supported",
            ReqDecompressNotSupported => "request decompress type not supported",
            ReqCompressError => "request compress error",
            ReqDecompressError => "request decompress error",
            ReqSerializeError => "request serialize error",
            ReqDeserializeError => "request deserialize error",
            RespCompressSizeInvalid => "response compress size invalid",
            RespDecompressSizeInvalid => "response decompress size invalid",
            RespCompressNotSupported => "response compress type not supported",
            RespDecompressNotSupported => "response decompress type not supported",
            RespCompressError => "response compress error",
            RespDecompressError => "response decompress error",
            RespSerializeError => "response serialize error",
            RespDeserializeError => "response deserialize error",
            IdlSerializeNotSupported => "IDL serialize not supported",
            IdlDeserializeNotSupported => "IDL deserialize not supported",
            UriInvalid => "URI invalid",
            UpstreamFailed => "upstream failed",
            SystemError => "system error",
            SslError => "SSL error",
            DnsError => "DNS error",
            ProcessTerminated => "process terminated",
        }
    }

    /// HTTP status code to use for a tunneled response carrying this status.
    pub fn to_http_status(self) -> u16 {
        use Status::*;
        match self {
            Ok => 200,
            ServiceNotFound | MethodNotFound | MetaError | UriInvalid => 400,
            RespCompressNotSupported
            | RespDecompressNotSupported
            | ReqCompressNotSupported
            | ReqDecompressNotSupported
            | IdlSerializeNotSupported
            | IdlDeserializeNotSupported => 501,
            UpstreamFailed => 503,
            _ => 500,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

/// Compression algorithm tag, shared by meta schemas and the compression registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CompressType {
    None = 0,
    Snappy = 1,
    Gzip = 2,
    Zlib = 3,
    Lz4 = 4,
}

/// One past the largest valid [`CompressType`] tag; also the compression registry's table size.
pub const COMPRESS_TYPE_MAX: usize = 5;

impl CompressType {
    pub const fn tag(self) -> i32 {
        self as i32
    }

    pub fn from_tag(tag: i32) -> Option<Self> {
        Some(match tag {
            0 => CompressType::None,
            1 => CompressType::Snappy,
            2 => CompressType::Gzip,
            3 => CompressType::Zlib,
            4 => CompressType::Lz4,
            _ => return None,
        })
    }
}

/// Payload data-type tag carried in meta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum DataType {
    Protobuf = 0,
    Thrift = 1,
    Json = 2,
}

impl DataType {
    pub const fn tag(self) -> i32 {
        self as i32
    }

    pub fn from_tag(tag: i32) -> Option<Self> {
        Some(match tag {
            0 => DataType::Protobuf,
            1 => DataType::Thrift,
            2 => DataType::Json,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_code() {
        for code in [
            0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 30,
            31, 100, 101, 102, 103,
        ] {
            let status = Status::from_code(code).unwrap();
            assert_eq!(status.code(), code);
        }
    }

    #[test]
    fn http_status_is_total() {
        for code in [0, 1, 2, 7, 15, 31, 100] {
            let status = Status::from_code(code).unwrap();
            let http = status.to_http_status();
            assert!((100..600).contains(&(http as i32)));
        }
    }

    #[test]
    fn compress_type_round_trips() {
        for tag in 0..5 {
            let ty = CompressType::from_tag(tag).unwrap();
            assert_eq!(ty.tag(), tag);
        }
        assert!(CompressType::from_tag(5).is_none());
    }
}
