//! Per-application key format parameters.

use crate::codec::ALPHABET;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest allowed segment count (including the checksum segment).
pub const MIN_SEGMENTS: u8 = 2;
/// Largest allowed segment count (including the checksum segment).
pub const MAX_SEGMENTS: u8 = 6;
/// Shortest allowed random segment.
pub const MIN_SEGMENT_LENGTH: u8 = 3;
/// Longest allowed random segment.
pub const MAX_SEGMENT_LENGTH: u8 = 10;
/// Longest allowed prefix, in characters.
pub const MAX_PREFIX_LEN: usize = 10;

/// Out-of-range or inconsistent format parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("segment count must be between 2 and 6, got {0}")]
    Segments(u8),

    #[error("segment length must be between 3 and 10, got {0}")]
    SegmentLength(u8),

    #[error("prefix must be at most 10 characters, got {0}")]
    PrefixTooLong(usize),

    #[error("prefix must not contain whitespace or control characters")]
    PrefixCharacters,

    #[error("delimiter {0:?} is not allowed (must be printable punctuation)")]
    Delimiter(char),
}

/// Key format specification owned by an application.
///
/// Keys look like `prefix + seg (delim seg)* + delim + digit`, with
/// `segments - 1` random segments of `segment_length` characters each
/// followed by a single checksum digit. `LS-XXXXX-XXXXX-XXXXX-7` is the
/// default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawKeyFormat")]
pub struct KeyFormat {
    prefix: String,
    segments: u8,
    segment_length: u8,
    delimiter: char,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawKeyFormat {
    prefix: String,
    segments: u8,
    segment_length: u8,
    delimiter: char,
}

impl TryFrom<RawKeyFormat> for KeyFormat {
    type Error = FormatError;

    fn try_from(raw: RawKeyFormat) -> Result<Self, Self::Error> {
        Self::new(raw.prefix, raw.segments, raw.segment_length, raw.delimiter)
    }
}

impl KeyFormat {
    pub const DEFAULT_PREFIX: &'static str = "LS-";
    pub const DEFAULT_SEGMENTS: u8 = 4;
    pub const DEFAULT_SEGMENT_LENGTH: u8 = 5;
    pub const DEFAULT_DELIMITER: char = '-';

    /// Builds a format, rejecting out-of-range parameters.
    pub fn new(
        prefix: impl Into<String>,
        segments: u8,
        segment_length: u8,
        delimiter: char,
    ) -> Result<Self, FormatError> {
        let prefix = prefix.into();

        if !(MIN_SEGMENTS..=MAX_SEGMENTS).contains(&segments) {
            return Err(FormatError::Segments(segments));
        }
        if !(MIN_SEGMENT_LENGTH..=MAX_SEGMENT_LENGTH).contains(&segment_length) {
            return Err(FormatError::SegmentLength(segment_length));
        }
        let prefix_len = prefix.chars().count();
        if prefix_len > MAX_PREFIX_LEN {
            return Err(FormatError::PrefixTooLong(prefix_len));
        }
        if prefix.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(FormatError::PrefixCharacters);
        }
        // The delimiter must never be confusable with segment content or the
        // checksum digit.
        let delimiter_ok = delimiter.is_ascii_punctuation()
            && !ALPHABET.contains(&(delimiter as u8));
        if !delimiter_ok {
            return Err(FormatError::Delimiter(delimiter));
        }

        Ok(Self {
            prefix,
            segments,
            segment_length,
            delimiter,
        })
    }

    /// The literal prefix every key starts with.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Total segment count, checksum segment included.
    #[must_use]
    pub fn segments(&self) -> u8 {
        self.segments
    }

    /// Number of random segments (segment count minus the checksum).
    #[must_use]
    pub fn random_segments(&self) -> u8 {
        self.segments - 1
    }

    /// Characters per random segment.
    #[must_use]
    pub fn segment_length(&self) -> u8 {
        self.segment_length
    }

    /// Separator between segments.
    #[must_use]
    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Length in characters of every key this format produces.
    #[must_use]
    pub fn key_len(&self) -> usize {
        let random = usize::from(self.random_segments());
        self.prefix.chars().count()
            + random * usize::from(self.segment_length)
            + random // delimiters, including the one before the checksum
            + 1
    }

    /// Number of distinct keys this format can produce, saturating at
    /// `u128::MAX`.
    #[must_use]
    pub fn key_space(&self) -> u128 {
        let exponent = u32::from(self.random_segments()) * u32::from(self.segment_length);
        (ALPHABET.len() as u128)
            .checked_pow(exponent)
            .unwrap_or(u128::MAX)
    }
}

impl Default for KeyFormat {
    fn default() -> Self {
        Self {
            prefix: Self::DEFAULT_PREFIX.to_string(),
            segments: Self::DEFAULT_SEGMENTS,
            segment_length: Self::DEFAULT_SEGMENT_LENGTH,
            delimiter: Self::DEFAULT_DELIMITER,
        }
    }
}
