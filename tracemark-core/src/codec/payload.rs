//! Bit-level payload coding.
//!
//! Characters become 8 bits MSB first; every bit is then repeated
//! [`REDUNDANCY`] times and recovered by majority vote. This is a plain
//! repetition code: it corrects up to `(R - 1) / 2` flips per group.
//!
//! The framed layout prefixes a 16-bit header (version byte, length byte) so
//! the extractor can learn the payload length instead of guessing it.

use super::{MAX_PAYLOAD_CHARS, REDUNDANCY};

/// Version byte of the framed layout.
pub const FRAME_VERSION: u8 = 0xA7;

/// Header size in raw (pre-ECC) bits.
pub const HEADER_BITS: usize = 16;

/// Header size in encoded bits.
pub const ENCODED_HEADER_BITS: usize = HEADER_BITS * REDUNDANCY;

/// Expand each character to 8 bits, most significant first.
pub fn text_to_bits(text: &str) -> Vec<u8> {
    text.chars()
        .flat_map(|c| byte_to_bits((c as u32 & 0xFF) as u8))
        .collect()
}

/// Collapse groups of 8 bits into characters.
///
/// Non-printable code points become a space; a trailing partial group is
/// dropped.
pub fn bits_to_text(bits: &[u8]) -> String {
    bits.chunks_exact(8)
        .map(|chunk| {
            let byte = bits_to_byte(chunk);
            if (0x20..=0x7E).contains(&byte) {
                byte as char
            } else {
                ' '
            }
        })
        .collect()
}

fn byte_to_bits(byte: u8) -> impl Iterator<Item = u8> {
    (0..8).rev().map(move |shift| (byte >> shift) & 1)
}

fn bits_to_byte(bits: &[u8]) -> u8 {
    bits.iter().fold(0u8, |acc, bit| (acc << 1) | (bit & 1))
}

/// Repeat every bit `redundancy` times consecutively.
pub fn ecc_encode(bits: &[u8], redundancy: usize) -> Vec<u8> {
    bits.iter()
        .flat_map(|&bit| std::iter::repeat(bit).take(redundancy))
        .collect()
}

/// Majority-decode `original_len` bits from a repetition-coded stream.
///
/// A group decodes to 1 when at least `ceil(R / 2)` of its copies are 1.
/// Missing copies (short input) count as 0.
pub fn ecc_decode(encoded: &[u8], original_len: usize, redundancy: usize) -> Vec<u8> {
    let threshold = redundancy.div_ceil(2);
    (0..original_len)
        .map(|i| {
            let start = (i * redundancy).min(encoded.len());
            let end = ((i + 1) * redundancy).min(encoded.len());
            let ones: usize = encoded[start..end].iter().map(|b| (b & 1) as usize).sum();
            u8::from(ones >= threshold)
        })
        .collect()
}

/// Encoded bitstream for the unframed (legacy) layout.
pub fn encode_legacy(message: &str) -> Vec<u8> {
    ecc_encode(&text_to_bits(message), REDUNDANCY)
}

/// Encoded bitstream for the framed layout: header, then characters.
pub fn encode_framed(message: &str) -> Vec<u8> {
    let len = message.chars().count().min(MAX_PAYLOAD_CHARS) as u8;
    let mut bits: Vec<u8> = byte_to_bits(FRAME_VERSION).chain(byte_to_bits(len)).collect();
    bits.extend(text_to_bits(message));
    ecc_encode(&bits, REDUNDANCY)
}

/// Decode an encoded header; returns the payload length when it is valid.
pub fn parse_header(encoded_header: &[u8]) -> Option<usize> {
    let header = ecc_decode(encoded_header, HEADER_BITS, REDUNDANCY);
    let version = bits_to_byte(&header[..8]);
    let len = bits_to_byte(&header[8..]) as usize;
    (version == FRAME_VERSION && (1..=MAX_PAYLOAD_CHARS).contains(&len)).then_some(len)
}

/// Encoded length of a framed stream carrying `char_len` characters.
pub fn framed_encoded_len(char_len: usize) -> usize {
    (HEADER_BITS + char_len * 8) * REDUNDANCY
}

/// Decode the characters of a framed stream whose header announced `char_len`.
pub fn decode_framed(encoded: &[u8], char_len: usize) -> String {
    let bits = ecc_decode(encoded, HEADER_BITS + char_len * 8, REDUNDANCY);
    bits_to_text(&bits[HEADER_BITS..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_to_bits_msb_first() {
        assert_eq!(text_to_bits("A"), vec![0, 1, 0, 0, 0, 0, 0, 1]);
        assert_eq!(text_to_bits("ab").len(), 16);
        assert!(text_to_bits("").is_empty());
    }

    #[test]
    fn test_bits_to_text() {
        let bits = text_to_bits("alice@x.com|2024");
        assert_eq!(bits_to_text(&bits), "alice@x.com|2024");
    }

    #[test]
    fn test_bits_to_text_filler_and_trailing() {
        let mut bits = vec![0, 0, 0, 0, 0, 1, 1, 1]; // BEL, not printable
        bits.extend(text_to_bits("Z"));
        bits.extend([1, 0, 1]); // partial group
        assert_eq!(bits_to_text(&bits), " Z");
    }

    #[test]
    fn test_ecc_encode_repeats() {
        assert_eq!(ecc_encode(&[1, 0], 3), vec![1, 1, 1, 0, 0, 0]);
    }

    #[test]
    fn test_ecc_tolerates_single_flip_per_group() {
        let original = text_to_bits("Hi");
        for flip in 0..REDUNDANCY {
            let mut encoded = ecc_encode(&original, REDUNDANCY);
            for group in 0..original.len() {
                encoded[group * REDUNDANCY + flip] ^= 1;
            }
            assert_eq!(ecc_decode(&encoded, original.len(), REDUNDANCY), original);
        }
    }

    #[test]
    fn test_ecc_fails_with_two_flips() {
        let original = vec![1u8, 0, 1, 1];
        let mut encoded = ecc_encode(&original, 3);
        encoded[0] ^= 1;
        encoded[1] ^= 1;
        let decoded = ecc_decode(&encoded, original.len(), 3);
        assert_eq!(decoded[0], 0);
        assert_eq!(&decoded[1..], &original[1..]);
    }

    #[test]
    fn test_ecc_decode_short_input() {
        assert_eq!(ecc_decode(&[1, 1], 2, 3), vec![1, 0]);
    }

    #[test]
    fn test_framed_header_roundtrip() {
        let encoded = encode_framed("alice@x.com|2024-01-01T00:00:00.000Z");
        assert_eq!(encoded.len(), framed_encoded_len(36));
        assert_eq!(parse_header(&encoded[..ENCODED_HEADER_BITS]), Some(36));
        assert_eq!(
            decode_framed(&encoded, 36),
            "alice@x.com|2024-01-01T00:00:00.000Z"
        );
    }

    #[test]
    fn test_header_rejects_wrong_version() {
        let encoded = encode_legacy("alice");
        assert_eq!(parse_header(&encoded[..ENCODED_HEADER_BITS]), None);
    }

    #[test]
    fn test_header_rejects_zero_length() {
        let encoded = encode_framed("");
        assert_eq!(parse_header(&encoded[..ENCODED_HEADER_BITS]), None);
    }

    #[test]
    fn test_legacy_length() {
        assert_eq!(encode_legacy("abc").len(), 3 * 8 * REDUNDANCY);
    }
}
