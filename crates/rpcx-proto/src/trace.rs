//! Tracing identifiers: trace/span ids and a fail-fast snowflake-style id generator.
//!
//! Grounded on `rpc_basic.h`'s `TRACE_ID_BIN_TO_HEX`/`SPAN_ID_BIN_TO_HEX` helpers (trace ids are
//! 16 raw bytes, span ids are 8, both rendered as lowercase hex) and the W3C `traceparent` header
//! format `00-<trace_id>-<span_id>-<flags>` used by the TRPC/HTTP meta mapping.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

pub const TRACE_ID_SIZE: usize = 16;
pub const SPAN_ID_SIZE: usize = 8;

#[derive(Debug, Error)]
pub enum TraceParseError {
    #[error("traceparent header must have 4 dash-separated fields, got {0}")]
    WrongFieldCount(usize),
    #[error("traceparent version must be \"00\"")]
    UnsupportedVersion,
    #[error("invalid hex in traceparent field: {0}")]
    InvalidHex(#[from] std::num::ParseIntError),
    #[error("trace id must decode to {TRACE_ID_SIZE} bytes, got {0}")]
    WrongTraceIdLen(usize),
    #[error("span id must decode to {SPAN_ID_SIZE} bytes, got {0}")]
    WrongSpanIdLen(usize),
}

/// A 16-byte distributed-trace identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(pub [u8; TRACE_ID_SIZE]);

/// An 8-byte span identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId(pub [u8; SPAN_ID_SIZE]);

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn from_hex(s: &str, out: &mut [u8]) -> Result<(), TraceParseError> {
    if s.len() != out.len() * 2 {
        return Err(match out.len() {
            TRACE_ID_SIZE => TraceParseError::WrongTraceIdLen(s.len() / 2),
            SPAN_ID_SIZE => TraceParseError::WrongSpanIdLen(s.len() / 2),
            _ => unreachable!(),
        });
    }
    for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
        let byte_str = std::str::from_utf8(chunk).unwrap_or_default();
        out[i] = u8::from_str_radix(byte_str, 16)?;
    }
    Ok(())
}

impl TraceId {
    pub fn to_hex(self) -> String {
        to_hex(&self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, TraceParseError> {
        let mut bytes = [0u8; TRACE_ID_SIZE];
        from_hex(s, &mut bytes)?;
        Ok(TraceId(bytes))
    }
}

impl SpanId {
    pub fn to_hex(self) -> String {
        to_hex(&self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, TraceParseError> {
        let mut bytes = [0u8; SPAN_ID_SIZE];
        from_hex(s, &mut bytes)?;
        Ok(SpanId(bytes))
    }
}

/// A parsed W3C `traceparent` header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceParent {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub sampled: bool,
}

impl TraceParent {
    pub fn parse(header: &str) -> Result<Self, TraceParseError> {
        let fields: Vec<&str> = header.split('-').collect();
        if fields.len() != 4 {
            return Err(TraceParseError::WrongFieldCount(fields.len()));
        }
        if fields[0] != "00" {
            return Err(TraceParseError::UnsupportedVersion);
        }
        let trace_id = TraceId::from_hex(fields[1])?;
        let span_id = SpanId::from_hex(fields[2])?;
        let flags = u8::from_str_radix(fields[3], 16)?;
        Ok(TraceParent {
            trace_id,
            span_id,
            sampled: flags & 0x01 != 0,
        })
    }

    pub fn to_header(self) -> String {
        format!(
            "00-{}-{}-{:02x}",
            self.trace_id.to_hex(),
            self.span_id.to_hex(),
            if self.sampled { 1u8 } else { 0u8 }
        )
    }
}

#[derive(Debug, Error)]
pub enum SnowflakeError {
    #[error("system clock went backward")]
    ClockWentBackward,
    #[error("sequence exhausted for this millisecond")]
    SequenceExhausted,
}

const SEQUENCE_BITS: u64 = 12;
const MACHINE_BITS: u64 = 10;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;
const MACHINE_SHIFT: u64 = SEQUENCE_BITS;
const TIMESTAMP_SHIFT: u64 = SEQUENCE_BITS + MACHINE_BITS;

struct SnowflakeState {
    last_timestamp_ms: i64,
    sequence: u64,
}

/// A fail-fast snowflake-style 63-bit id generator: `[timestamp | machine | sequence]`.
///
/// Unlike many snowflake implementations, this one never blocks waiting for the clock to catch up
/// on sequence exhaustion — it returns `Err` instead, matching the reference implementation's
/// fail-fast behavior on clock regression.
pub struct SnowflakeGenerator {
    machine_id: u64,
    state: Mutex<SnowflakeState>,
}

impl SnowflakeGenerator {
    pub fn new(machine_id: u16) -> Self {
        Self {
            machine_id: (machine_id as u64) & ((1 << MACHINE_BITS) - 1),
            state: Mutex::new(SnowflakeState {
                last_timestamp_ms: 0,
                sequence: 0,
            }),
        }
    }

    /// Generates the next id, reading the current time as milliseconds since the Unix epoch.
    pub fn next(&self) -> Result<u64, SnowflakeError> {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the Unix epoch")
            .as_millis() as i64;
        self.next_at(now_ms)
    }

    /// Generates the next id for an explicit timestamp (milliseconds since the Unix epoch);
    /// exposed so callers (and tests) can drive the clock deterministically.
    pub fn next_at(&self, now_ms: i64) -> Result<u64, SnowflakeError> {
        let mut state = self.state.lock().unwrap();
        if now_ms < state.last_timestamp_ms {
            return Err(SnowflakeError::ClockWentBackward);
        }
        if now_ms == state.last_timestamp_ms {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                return Err(SnowflakeError::SequenceExhausted);
            }
        } else {
            state.sequence = 0;
        }
        state.last_timestamp_ms = now_ms;
        let id = ((now_ms as u64) << TIMESTAMP_SHIFT)
            | (self.machine_id << MACHINE_SHIFT)
            | state.sequence;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traceparent_round_trips() {
        let header = "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01";
        let parsed = TraceParent::parse(header).unwrap();
        assert_eq!(parsed.trace_id.to_hex(), "0af7651916cd43dd8448eb211c80319c");
        assert_eq!(parsed.span_id.to_hex(), "b7ad6b7169203331");
        assert!(parsed.sampled);
        assert_eq!(parsed.to_header(), header);
    }

    #[test]
    fn snowflake_monotonic_within_same_ms() {
        let sf_gen = SnowflakeGenerator::new(7);
        let a = sf_gen.next_at(1_000).unwrap();
        let b = sf_gen.next_at(1_000).unwrap();
        assert!(b > a);
    }

    #[test]
    fn snowflake_rejects_clock_regression() {
        let sf_gen = SnowflakeGenerator::new(1);
        sf_gen.next_at(2_000).unwrap();
        let err = sf_gen.next_at(1_000).unwrap_err();
        assert!(matches!(err, SnowflakeError::ClockWentBackward));
    }

    #[test]
    fn snowflake_exhausts_sequence() {
        let sf_gen = SnowflakeGenerator::new(1);
        for _ in 0..=SEQUENCE_MASK {
            sf_gen.next_at(5_000).unwrap();
        }
        let err = sf_gen.next_at(5_000).unwrap_err();
        assert!(matches!(err, SnowflakeError::SequenceExhausted));
    }
}
