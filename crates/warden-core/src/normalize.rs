//! Normalization of heterogeneous producer input.
//!
//! Producers populate binary fields in whatever form they happen to hold:
//! raw bytes, a plain byte array, or a string in hex, base64 or plain text.
//! Timestamps arrive as integers, decimal strings or ISO-8601 strings, in
//! seconds or milliseconds. Everything here maps those onto one canonical
//! form. The classification order is part of the wire contract with existing
//! batches and must not change.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Values strictly between zero and this are read as seconds since epoch.
pub const SECONDS_THRESHOLD: i64 = 100_000_000_000;

/// An in-memory representation of a binary field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ByteRepr {
    /// No value at all. Normalizes to empty bytes.
    #[default]
    Missing,
    /// Raw bytes.
    Raw(Bytes),
    /// A plain array of byte values.
    Array(Vec<u8>),
    /// A string holding hex, base64 or plain text.
    Text(String),
}

impl ByteRepr {
    /// Canonical raw bytes for this representation.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            ByteRepr::Missing => Bytes::new(),
            ByteRepr::Raw(b) => b.clone(),
            ByteRepr::Array(arr) => Bytes::copy_from_slice(arr),
            ByteRepr::Text(s) => Bytes::from(decode_text(s)),
        }
    }
}

impl From<Vec<u8>> for ByteRepr {
    fn from(bytes: Vec<u8>) -> Self {
        ByteRepr::Raw(Bytes::from(bytes))
    }
}

impl From<&str> for ByteRepr {
    fn from(s: &str) -> Self {
        ByteRepr::Text(s.to_string())
    }
}

/// How a text value was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Hex,
    Base64,
    Utf8,
}

/// Classify a string by shape alone: hex first, then base64, then plain text.
///
/// A string valid as both hex and base64 is hex.
pub fn classify_text(s: &str) -> TextEncoding {
    let s = s.trim();
    if looks_like_hex(s) {
        TextEncoding::Hex
    } else if looks_like_base64(s) {
        TextEncoding::Base64
    } else {
        TextEncoding::Utf8
    }
}

/// Decode a string into raw bytes following [`classify_text`].
///
/// A string shaped like base64 that still fails to decode falls back to its
/// UTF-8 bytes.
pub fn decode_text(s: &str) -> Vec<u8> {
    let trimmed = s.trim();
    match classify_text(trimmed) {
        TextEncoding::Hex => hex::decode(trimmed).unwrap_or_else(|_| trimmed.as_bytes().to_vec()),
        TextEncoding::Base64 => STANDARD
            .decode(trimmed)
            .unwrap_or_else(|_| trimmed.as_bytes().to_vec()),
        TextEncoding::Utf8 => trimmed.as_bytes().to_vec(),
    }
}

/// Even length of at least two, hex digits only (either case).
fn looks_like_hex(s: &str) -> bool {
    s.len() >= 2 && s.len() % 2 == 0 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Length a multiple of four, standard alphabet, at most two trailing `=`.
fn looks_like_base64(s: &str) -> bool {
    if s.is_empty() || s.len() % 4 != 0 {
        return false;
    }
    let body = s.trim_end_matches('=');
    if s.len() - body.len() > 2 || body.is_empty() {
        return false;
    }
    body.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/')
}

/// Rescale a seconds-range epoch value to milliseconds.
///
/// Any value with `0 < value < 1e11` is taken as seconds. Everything else is
/// returned unchanged.
pub fn normalize_epoch(value: i64) -> i64 {
    if value > 0 && value < SECONDS_THRESHOLD {
        value * 1000
    } else {
        value
    }
}

/// Parse a textual timestamp into epoch milliseconds, before rescaling.
///
/// Accepts a plain decimal integer, an RFC 3339 date-time, a zone-less
/// ISO-8601 date-time (read as UTC) or a bare date (UTC midnight).
pub fn parse_timestamp_text(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<i64>().ok();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hex_wins_over_base64() {
        // "abcd" is valid hex and valid base64.
        assert_eq!(classify_text("abcd"), TextEncoding::Hex);
        assert_eq!(decode_text("abcd"), vec![0xab, 0xcd]);
        assert_eq!(decode_text("ABCD"), vec![0xab, 0xcd]);
    }

    #[test]
    fn test_base64_classification() {
        assert_eq!(classify_text("aGVsbG8="), TextEncoding::Base64);
        assert_eq!(decode_text("aGVsbG8="), b"hello".to_vec());
        // Three padding characters is not base64.
        assert_eq!(classify_text("a==="), TextEncoding::Utf8);
    }

    #[test]
    fn test_utf8_fallback() {
        assert_eq!(classify_text("not hex!"), TextEncoding::Utf8);
        assert_eq!(decode_text("hello"), b"hello".to_vec());
        // Odd-length hex alphabet is not hex and not base64.
        assert_eq!(decode_text("abc"), b"abc".to_vec());
        assert_eq!(decode_text(""), Vec::<u8>::new());
    }

    #[test]
    fn test_text_is_trimmed() {
        assert_eq!(decode_text("  0aff \n"), vec![0x0a, 0xff]);
    }

    #[test]
    fn test_missing_is_empty() {
        assert!(ByteRepr::Missing.to_bytes().is_empty());
    }

    #[test]
    fn test_normalize_epoch() {
        assert_eq!(normalize_epoch(1_700_000_000), 1_700_000_000_000);
        assert_eq!(normalize_epoch(1_700_000_000_000), 1_700_000_000_000);
        assert_eq!(normalize_epoch(0), 0);
        assert_eq!(normalize_epoch(-5), -5);
        assert_eq!(normalize_epoch(99_999_999_999), 99_999_999_999_000);
        assert_eq!(normalize_epoch(100_000_000_000), 100_000_000_000);
    }

    #[test]
    fn test_parse_timestamp_text() {
        assert_eq!(parse_timestamp_text("1700000000000"), Some(1_700_000_000_000));
        assert_eq!(
            parse_timestamp_text("2023-11-14T22:13:20Z"),
            Some(1_700_000_000_000)
        );
        assert_eq!(
            parse_timestamp_text("2023-11-14T22:13:20.000+00:00"),
            Some(1_700_000_000_000)
        );
        assert_eq!(
            parse_timestamp_text("2023-11-14T22:13:20"),
            Some(1_700_000_000_000)
        );
        assert_eq!(parse_timestamp_text("2023-11-14"), Some(1_699_920_000_000));
        assert_eq!(parse_timestamp_text("yesterday"), None);
        assert_eq!(parse_timestamp_text("-12"), None);
    }

    proptest! {
        #[test]
        fn raw_hex_and_base64_agree(bytes in prop::collection::vec(any::<u8>(), 48)) {
            let raw = ByteRepr::Raw(Bytes::from(bytes.clone())).to_bytes();
            let array = ByteRepr::Array(bytes.clone()).to_bytes();
            let hex_repr = ByteRepr::Text(hex::encode(&bytes)).to_bytes();
            prop_assert_eq!(&raw, &array);
            prop_assert_eq!(&raw, &hex_repr);

            // A 64-char base64 string can only be misread as hex if every char
            // is a hex digit; skip that astronomically rare case.
            let b64 = STANDARD.encode(&bytes);
            if classify_text(&b64) == TextEncoding::Base64 {
                prop_assert_eq!(&raw, &ByteRepr::Text(b64).to_bytes());
            }
        }

        #[test]
        fn seconds_range_is_scaled(secs in 1i64..SECONDS_THRESHOLD) {
            prop_assert_eq!(normalize_epoch(secs), secs * 1000);
        }

        #[test]
        fn millis_range_is_kept(ms in SECONDS_THRESHOLD..i64::MAX / 2) {
            prop_assert_eq!(normalize_epoch(ms), ms);
        }
    }
}
