//! Test-only helper macros for hex-vector round-trip assertions, in the spirit of the teacher
//! workspace's (unretrieved) `smb_tests::test_binrw!`/`test_request!` macros: given a value
//! constructor and a hex literal, assert that encoding produces exactly that hex and that decoding
//! it produces an equal value.

/// Parses a hex string (whitespace ignored) into bytes. Panics on malformed input — this is a
/// test-only helper, not library code.
pub fn hex_to_bytes(hex: &str) -> Vec<u8> {
    let clean: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    assert!(clean.len() % 2 == 0, "hex literal must have an even number of digits");
    clean
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let s = std::str::from_utf8(pair).unwrap();
            u8::from_str_radix(s, 16).expect("invalid hex digit")
        })
        .collect()
}

/// Renders bytes as a lowercase hex string, for assertion failure messages.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Asserts that `encode_expr` (an expression producing `Vec<u8>` or `&[u8]`-like bytes) matches the
/// given hex literal.
#[macro_export]
macro_rules! assert_hex_eq {
    ($encoded:expr, $hex:expr) => {{
        let encoded: Vec<u8> = ::std::convert::From::from($encoded);
        let expected = $crate::hex_to_bytes($hex);
        assert_eq!(
            $crate::bytes_to_hex(&encoded),
            $crate::bytes_to_hex(&expected),
            "byte mismatch"
        );
    }};
}

/// Declares a `#[test]` function named `$name` that encodes `$value` and asserts it matches `$hex`,
/// then decodes `$hex` with `$decode` and asserts the result equals `$value`.
///
/// ```ignore
/// test_frame!(srpc_echo_header, make_header(), "53525043...", decode_header);
/// ```
#[macro_export]
macro_rules! test_frame {
    ($name:ident, $value:expr, $hex:expr, $decode:expr) => {
        #[test]
        fn $name() {
            let value = $value;
            let encoded: Vec<u8> = value.clone().into();
            $crate::assert_hex_eq!(encoded, $hex);
            let bytes = $crate::hex_to_bytes($hex);
            let decoded = $decode(&bytes);
            assert_eq!(decoded, value);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trips() {
        let bytes = vec![0x53, 0x52, 0x50, 0x43];
        let hex = bytes_to_hex(&bytes);
        assert_eq!(hex, "53525043");
        assert_eq!(hex_to_bytes(&hex), bytes);
    }
}
