//! License key generation and structural validation.
//!
//! A key is `prefix`, then `segments - 1` random segments joined by the
//! delimiter, then the delimiter and a single checksum digit:
//!
//! ```text
//! LS-7KQ2M-ZP4HX-W9RTA-3
//! ^^^ ^^^^^^^^^^^^^^^^^ ^
//! prefix   random       checksum
//! ```
//!
//! The checksum is the sum of the UTF-16 code units of everything before the
//! final delimiter, modulo 10. It catches typos; it does not stop anyone from
//! minting well-formed keys offline.

use crate::format::KeyFormat;
use rand::Rng;
use thiserror::Error;

/// Characters random segments are drawn from. Excludes `0`, `O`, `1` and `I`.
pub const ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// The first structural check a key failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyDefect {
    #[error("key is empty")]
    Empty,

    #[error("key does not start with the expected prefix")]
    MissingPrefix,

    #[error("expected {expected} segments, found {actual}")]
    SegmentCount { expected: usize, actual: usize },

    #[error("segment {index} has length {actual}, expected {expected}")]
    SegmentLength {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("segment {index} contains characters outside the key alphabet")]
    InvalidCharacter { index: usize },

    #[error("checksum segment must be a single digit")]
    MalformedChecksum,

    #[error("checksum mismatch: expected {expected}, found {actual}")]
    ChecksumMismatch { expected: u8, actual: u8 },
}

/// Computes the checksum digit (0-9) for `body`.
#[must_use]
pub fn checksum_digit(body: &str) -> u8 {
    let sum: u64 = body.encode_utf16().map(u64::from).sum();
    (sum % 10) as u8
}

/// Generates a key for `format` using the thread-local CSPRNG.
#[must_use]
pub fn generate(format: &KeyFormat) -> String {
    generate_with(format, &mut rand::thread_rng())
}

/// Generates a key for `format` drawing randomness from `rng`.
pub fn generate_with<R: Rng + ?Sized>(format: &KeyFormat, rng: &mut R) -> String {
    let delimiter = format.delimiter();
    let mut key = String::with_capacity(format.key_len());
    key.push_str(format.prefix());

    for segment in 0..format.random_segments() {
        if segment > 0 {
            key.push(delimiter);
        }
        for _ in 0..format.segment_length() {
            let index = rng.gen_range(0..ALPHABET.len());
            key.push(char::from(ALPHABET[index]));
        }
    }

    let check = checksum_digit(&key);
    key.push(delimiter);
    key.push(char::from(b'0' + check));
    key
}

/// Checks `key` against `format`, reporting the first defect found.
pub fn inspect(key: &str, format: &KeyFormat) -> Result<(), KeyDefect> {
    if key.is_empty() {
        return Err(KeyDefect::Empty);
    }

    let delimiter = format.delimiter();
    let expected_segments = usize::from(format.segments());

    let rest = key
        .strip_prefix(format.prefix())
        .ok_or(KeyDefect::MissingPrefix)?;

    let (payload, check) = rest
        .rsplit_once(delimiter)
        .ok_or(KeyDefect::SegmentCount {
            expected: expected_segments,
            actual: 1,
        })?;

    let segments: Vec<&str> = payload.split(delimiter).collect();
    if segments.len() + 1 != expected_segments {
        return Err(KeyDefect::SegmentCount {
            expected: expected_segments,
            actual: segments.len() + 1,
        });
    }

    let expected_len = usize::from(format.segment_length());
    for (index, segment) in segments.iter().enumerate() {
        let actual = segment.chars().count();
        if actual != expected_len {
            return Err(KeyDefect::SegmentLength {
                index,
                expected: expected_len,
                actual,
            });
        }
        if !segment.bytes().all(|b| ALPHABET.contains(&b)) {
            return Err(KeyDefect::InvalidCharacter { index });
        }
    }

    let actual = match check.as_bytes() {
        [digit @ b'0'..=b'9'] => digit - b'0',
        _ => return Err(KeyDefect::MalformedChecksum),
    };

    let signed_len = key.len() - check.len() - delimiter.len_utf8();
    let expected = checksum_digit(&key[..signed_len]);
    if expected != actual {
        return Err(KeyDefect::ChecksumMismatch { expected, actual });
    }

    Ok(())
}

/// Returns true if `key` is well formed under `format`.
#[must_use]
pub fn validate(key: &str, format: &KeyFormat) -> bool {
    inspect(key, format).is_ok()
}
