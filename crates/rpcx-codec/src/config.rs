//! Configuration knobs (§6/§7): plain Rust structs with `Default` impls, not a file format — parsing
//! an actual config file remains the embedding application's job, mirroring how the teacher crate's
//! `ClientConfig`/`TransportConfig` are just structs constructed by the caller.

use std::time::Duration;

use rpcx_proto::status::CompressType;

/// `2 GiB - 1`, the reference implementation's `RPC_BODY_SIZE_LIMIT`-adjacent default frame size
/// cap (one byte under 2 GiB so the signed 31-bit length fields used on the wire never overflow).
pub const DEFAULT_SIZE_LIMIT: usize = 2 * 1024 * 1024 * 1024 - 1;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_connections: usize,
    pub peer_response_timeout: Duration,
    pub receive_timeout: Duration,
    pub keep_alive_timeout: Duration,
    pub request_size_limit: usize,
    pub ssl_accept_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_connections: 2000,
            peer_response_timeout: Duration::from_secs(10),
            receive_timeout: Duration::from_secs(10),
            keep_alive_timeout: Duration::from_secs(300),
            request_size_limit: DEFAULT_SIZE_LIMIT,
            ssl_accept_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub send_timeout: Duration,
    pub receive_timeout: Duration,
    pub watch_timeout: Duration,
    pub keep_alive_timeout: Duration,
    pub retry_max: u32,
    pub compress_type: CompressType,
    pub data_type: rpcx_proto::status::DataType,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(10),
            receive_timeout: Duration::from_secs(10),
            watch_timeout: Duration::from_secs(0),
            keep_alive_timeout: Duration::from_secs(60),
            retry_max: 0,
            compress_type: CompressType::None,
            data_type: rpcx_proto::status::DataType::Protobuf,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub base: ClientConfig,
    pub redirect_max: u32,
    pub retry_max: u32,
    pub keep_alive_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base: ClientConfig {
                keep_alive_timeout: Duration::from_millis(60_000),
                ..ClientConfig::default()
            },
            redirect_max: 2,
            retry_max: 5,
            keep_alive_timeout: Duration::from_millis(300_000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let server = ServerConfig::default();
        assert_eq!(server.request_size_limit, DEFAULT_SIZE_LIMIT);

        let http = HttpClientConfig::default();
        assert_eq!(http.redirect_max, 2);
        assert_eq!(http.retry_max, 5);
        assert_eq!(http.base.keep_alive_timeout, Duration::from_millis(60_000));
        assert_eq!(http.keep_alive_timeout, Duration::from_millis(300_000));
    }
}
