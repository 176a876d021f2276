use rpcx_proto::status::Status;
use thiserror::Error;

/// Top-level error type for the wire codecs, aggregating buffer/compression errors and mapping
/// everything to the shared [`Status`] taxonomy at the facade boundary.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Buffer(#[from] rpcx_buf::BufferError),

    #[error(transparent)]
    Compress(#[from] rpcx_compress::CompressError),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("frame size {got} exceeds configured limit {limit}")]
    MessageTooLarge { got: usize, limit: usize },

    #[error("meta (de)serialization failed: {0}")]
    Meta(String),

    #[error("payload serialize failed: {0}")]
    Serialize(String),

    #[error("payload deserialize failed: {0}")]
    Deserialize(String),

    #[error("unsupported data type tag {0}")]
    UnsupportedDataType(i32),

    #[error("invalid request URI: {0}")]
    UriInvalid(String),

    #[error("decompressed size invalid: {0}")]
    DecompressSizeInvalid(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Maps this error to the shared status taxonomy, direction-aware where the error occurred on
    /// the request side vs. the response side.
    pub fn to_status(&self, is_request: bool) -> Status {
        match self {
            Error::Buffer(_) | Error::Io(_) => Status::SystemError,
            Error::Compress(e) => e.to_status(is_request),
            Error::Protocol(_) => Status::MetaError,
            Error::MessageTooLarge { .. } => Status::MetaError,
            Error::Meta(_) => Status::MetaError,
            Error::Serialize(_) => {
                if is_request {
                    Status::ReqSerializeError
                } else {
                    Status::RespSerializeError
                }
            }
            Error::Deserialize(_) => {
                if is_request {
                    Status::ReqDeserializeError
                } else {
                    Status::RespDeserializeError
                }
            }
            Error::UnsupportedDataType(_) => {
                if is_request {
                    Status::IdlDeserializeNotSupported
                } else {
                    Status::IdlSerializeNotSupported
                }
            }
            Error::UriInvalid(_) => Status::UriInvalid,
            Error::DecompressSizeInvalid(_) => {
                if is_request {
                    Status::ReqDecompressSizeInvalid
                } else {
                    Status::RespDecompressSizeInvalid
                }
            }
        }
    }
}
