//! Attribution payload: who created an image and when.
//!
//! The payload travels through the watermark as the string
//! `creatorId|timestamp`. On the way back out the decoded text is scanned for
//! an identifier followed by `|` and a strict millisecond ISO-8601 UTC
//! timestamp; anything else is treated as noise.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::MAX_PAYLOAD_CHARS;
use crate::error::{Result, TracemarkError};

/// Separator between creator and timestamp.
pub const SEPARATOR: char = '|';

/// Length of `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub const TIMESTAMP_LEN: usize = 24;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Creator identifier and creation timestamp to embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    pub creator_id: String,
    pub timestamp: String,
}

impl Payload {
    /// Build a validated payload.
    pub fn new(creator_id: impl Into<String>, timestamp: impl Into<String>) -> Result<Self> {
        let payload = Self {
            creator_id: creator_id.into(),
            timestamp: timestamp.into(),
        };
        payload.validate()?;
        Ok(payload)
    }

    /// Payload stamped with the current time.
    pub fn now(creator_id: impl Into<String>) -> Result<Self> {
        Self::new(creator_id, format_timestamp(Utc::now()))
    }

    /// Reject empty, malformed or oversized fields.
    pub fn validate(&self) -> Result<()> {
        if self.creator_id.is_empty() {
            return Err(TracemarkError::InvalidPayload(
                "creator id must not be empty".into(),
            ));
        }
        if let Some(c) = self.creator_id.chars().find(|c| !is_identifier_char(*c)) {
            return Err(TracemarkError::InvalidPayload(format!(
                "creator id contains unsupported character {:?}",
                c
            )));
        }
        if !is_strict_timestamp(&self.timestamp) {
            return Err(TracemarkError::InvalidPayload(format!(
                "timestamp {:?} is not YYYY-MM-DDTHH:MM:SS.mmmZ",
                self.timestamp
            )));
        }
        let max_creator = MAX_PAYLOAD_CHARS - 1 - TIMESTAMP_LEN;
        if self.creator_id.len() > max_creator {
            return Err(TracemarkError::InvalidPayload(format!(
                "creator id is {} characters, at most {} fit",
                self.creator_id.len(),
                max_creator
            )));
        }
        Ok(())
    }

    /// The string written into the image, truncated to the payload maximum.
    pub fn message(&self) -> String {
        format!("{}{}{}", self.creator_id, SEPARATOR, self.timestamp)
            .chars()
            .take(MAX_PAYLOAD_CHARS)
            .collect()
    }
}

/// Which bit layout an extracted payload was recovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PayloadLayout {
    /// Length header followed by the characters.
    #[default]
    Framed,
    /// Characters only; length found by scanning candidates.
    Legacy,
}

/// A payload recovered from pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedPayload {
    pub creator_id: String,
    pub timestamp: String,
    /// The exact `creatorId|timestamp` span that matched.
    pub raw_match: String,
    pub layout: PayloadLayout,
}

impl ExtractedPayload {
    pub fn matches(&self, creator_id: &str, timestamp: &str) -> bool {
        self.creator_id == creator_id && self.timestamp == timestamp
    }
}

/// Characters accepted in a creator identifier.
pub fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '@' | '+' | ':')
}

/// Format a timestamp the way payloads carry it.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Exactly `YYYY-MM-DDTHH:MM:SS.mmmZ` and a real calendar instant.
pub fn is_strict_timestamp(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != TIMESTAMP_LEN {
        return false;
    }
    let shape_ok = bytes.iter().enumerate().all(|(i, b)| match i {
        4 | 7 => *b == b'-',
        10 => *b == b'T',
        13 | 16 => *b == b':',
        19 => *b == b'.',
        23 => *b == b'Z',
        _ => b.is_ascii_digit(),
    });
    shape_ok && NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).is_ok()
}

/// Scan decoded text for the first `identifier|timestamp` occurrence.
pub fn find_payload(text: &str, layout: PayloadLayout) -> Option<ExtractedPayload> {
    let bytes = text.as_bytes();
    for (sep, _) in text.match_indices(SEPARATOR) {
        let ts_end = sep + 1 + TIMESTAMP_LEN;
        let Some(timestamp) = text.get(sep + 1..ts_end) else {
            continue;
        };
        if !is_strict_timestamp(timestamp) {
            continue;
        }

        let start = bytes[..sep]
            .iter()
            .rposition(|b| !is_identifier_char(*b as char))
            .map_or(0, |p| p + 1);
        if start == sep {
            continue;
        }

        return Some(ExtractedPayload {
            creator_id: text[start..sep].to_string(),
            timestamp: timestamp.to_string(),
            raw_match: text[start..ts_end].to_string(),
            layout,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_message_format() {
        let p = Payload::new("alice@x.com", "2024-01-01T00:00:00.000Z").unwrap();
        assert_eq!(p.message(), "alice@x.com|2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_rejects_empty_creator() {
        assert!(matches!(
            Payload::new("", "2024-01-01T00:00:00.000Z"),
            Err(TracemarkError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_rejects_separator_in_creator() {
        assert!(Payload::new("a|b", "2024-01-01T00:00:00.000Z").is_err());
        assert!(Payload::new("a b", "2024-01-01T00:00:00.000Z").is_err());
    }

    #[test]
    fn test_rejects_oversized_creator() {
        let creator = "a".repeat(MAX_PAYLOAD_CHARS - TIMESTAMP_LEN);
        assert!(Payload::new(creator, "2024-01-01T00:00:00.000Z").is_err());
        let creator = "a".repeat(MAX_PAYLOAD_CHARS - TIMESTAMP_LEN - 1);
        let p = Payload::new(creator, "2024-01-01T00:00:00.000Z").unwrap();
        assert_eq!(p.message().len(), MAX_PAYLOAD_CHARS);
    }

    #[test]
    fn test_rejects_loose_timestamps() {
        for ts in [
            "2024-01-01T00:00:00Z",
            "2024-01-01T00:00:00.000",
            "2024-01-01T00:00:00.000+00:00",
            "2024-13-01T00:00:00.000Z",
            "2024-02-30T00:00:00.000Z",
            "2024-01-01 00:00:00.000Z",
            "",
        ] {
            assert!(!is_strict_timestamp(ts), "accepted {:?}", ts);
        }
        assert!(is_strict_timestamp("2024-02-29T23:59:59.999Z"));
    }

    #[test]
    fn test_format_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 12, 30, 45).unwrap();
        assert_eq!(format_timestamp(at), "2024-01-15T12:30:45.000Z");
        assert!(is_strict_timestamp(&format_timestamp(Utc::now())));
    }

    #[test]
    fn test_find_payload_exact() {
        let found = find_payload("alice@x.com|2024-01-01T00:00:00.000Z", PayloadLayout::Framed)
            .unwrap();
        assert_eq!(found.creator_id, "alice@x.com");
        assert_eq!(found.timestamp, "2024-01-01T00:00:00.000Z");
        assert_eq!(found.raw_match, "alice@x.com|2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_find_payload_inside_noise() {
        let found = find_payload(
            "#% 0xAbC9|2023-06-30T08:15:00.123Z  ~~",
            PayloadLayout::Legacy,
        )
        .unwrap();
        assert_eq!(found.creator_id, "0xAbC9");
        assert_eq!(found.layout, PayloadLayout::Legacy);
    }

    #[test]
    fn test_find_payload_skips_bad_candidates() {
        assert!(find_payload("|2024-01-01T00:00:00.000Z", PayloadLayout::Framed).is_none());
        assert!(find_payload("bob|2024-01-01T00:00:00", PayloadLayout::Framed).is_none());
        assert!(find_payload("noise without separators", PayloadLayout::Framed).is_none());

        let found = find_payload(
            "x|garbage bob|2024-01-01T00:00:00.000Z",
            PayloadLayout::Framed,
        )
        .unwrap();
        assert_eq!(found.creator_id, "bob");
    }
}
