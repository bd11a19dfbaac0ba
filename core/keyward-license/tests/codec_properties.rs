//! Property-based tests for the key codec.
//!
//! - Every generated key validates under its own format
//! - Changing any single random character to another alphabet character
//!   is caught unless the checksum happens to collide

use keyward_license::codec::{generate_with, inspect, validate};
use keyward_license::{KeyDefect, KeyFormat};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn format_strategy() -> impl Strategy<Value = KeyFormat> {
    (
        "[A-Z]{0,6}[-_]?",
        2u8..=6,
        3u8..=10,
        prop::sample::select(vec!['-', '_', '.', ':', '~']),
    )
        .prop_map(|(prefix, segments, length, delimiter)| {
            KeyFormat::new(prefix, segments, length, delimiter).unwrap()
        })
}

proptest! {
    #[test]
    fn generated_keys_validate(format in format_strategy(), seed in any::<u64>()) {
        let key = generate_with(&format, &mut StdRng::seed_from_u64(seed));
        prop_assert!(validate(&key, &format), "{} invalid for {:?}", key, format);
        prop_assert_eq!(key.chars().count(), format.key_len());
    }

    #[test]
    fn substitutions_are_detected_or_collide(
        format in format_strategy(),
        seed in any::<u64>(),
        position in any::<prop::sample::Index>(),
    ) {
        let key = generate_with(&format, &mut StdRng::seed_from_u64(seed));
        let body_start = format.prefix().len();
        let body_end = key.len() - 2;
        let candidates: Vec<usize> = (body_start..body_end)
            .filter(|&i| key.as_bytes()[i] != format.delimiter() as u8)
            .collect();
        let at = candidates[position.index(candidates.len())];

        let original = key.as_bytes()[at];
        let replacement = if original == b'A' { b'B' } else { b'A' };
        let mut bytes = key.clone().into_bytes();
        bytes[at] = replacement;
        let mutated = String::from_utf8(bytes).unwrap();

        // Only a shift by a multiple of 10 leaves the digit unchanged.
        let delta = (i32::from(original) - i32::from(replacement)).rem_euclid(10);
        if delta == 0 {
            prop_assert!(validate(&mutated, &format));
        } else {
            let is_mismatch = matches!(
                inspect(&mutated, &format),
                Err(KeyDefect::ChecksumMismatch { .. })
            );
            prop_assert!(is_mismatch);
        }
    }
}
