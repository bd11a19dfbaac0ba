use keyward_license::codec::{generate, generate_with, inspect, validate};
use keyward_license::{ALPHABET, FormatError, KeyDefect, KeyFormat, checksum_digit};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn default_format() -> KeyFormat {
    KeyFormat::default()
}

#[test]
fn default_key_has_expected_shape() {
    let key = generate(&default_format());
    assert_eq!(key.len(), 22);
    assert!(key.starts_with("LS-"));

    let parts: Vec<&str> = key["LS-".len()..].split('-').collect();
    assert_eq!(parts.len(), 4);
    for segment in &parts[..3] {
        assert_eq!(segment.len(), 5);
        assert!(segment.bytes().all(|b| ALPHABET.contains(&b)));
    }
    assert_eq!(parts[3].len(), 1);
    assert!(parts[3].as_bytes()[0].is_ascii_digit());
}

#[test]
fn generated_key_validates() {
    let format = default_format();
    for _ in 0..50 {
        let key = generate(&format);
        assert!(validate(&key, &format), "{key} should validate");
    }
}

#[test]
fn key_len_matches_generated_length() {
    let format = KeyFormat::new("ACME_", 6, 8, '.').unwrap();
    let key = generate(&format);
    assert_eq!(key.chars().count(), format.key_len());
}

#[test]
fn seeded_generation_is_deterministic() {
    let format = default_format();
    let a = generate_with(&format, &mut StdRng::seed_from_u64(42));
    let b = generate_with(&format, &mut StdRng::seed_from_u64(42));
    assert_eq!(a, b);
}

#[test]
fn alphabet_excludes_ambiguous_characters() {
    for c in [b'0', b'O', b'1', b'I'] {
        assert!(!ALPHABET.contains(&c));
    }
    assert_eq!(ALPHABET.len(), 32);
}

#[test]
fn checksum_is_sum_of_code_units_mod_10() {
    // 'A' = 65, 'B' = 66
    assert_eq!(checksum_digit("AB"), 1);
    assert_eq!(checksum_digit(""), 0);
    assert_eq!(checksum_digit("LS-"), ((76 + 83 + 45) % 10) as u8);
}

#[test]
fn tampered_checksum_is_rejected() {
    let format = default_format();
    let key = generate(&format);
    let digit = key.as_bytes()[key.len() - 1] - b'0';
    let wrong = (digit + 1) % 10;
    let tampered = format!("{}{}", &key[..key.len() - 1], wrong);

    assert!(!validate(&tampered, &format));
    assert_eq!(
        inspect(&tampered, &format),
        Err(KeyDefect::ChecksumMismatch {
            expected: digit,
            actual: wrong,
        })
    );
}

#[test]
fn empty_key_is_rejected() {
    assert_eq!(inspect("", &default_format()), Err(KeyDefect::Empty));
}

#[test]
fn wrong_prefix_is_rejected() {
    let format = default_format();
    let key = generate(&format).replacen("LS-", "XX-", 1);
    assert_eq!(inspect(&key, &format), Err(KeyDefect::MissingPrefix));
}

#[test]
fn missing_segment_is_rejected() {
    let format = default_format();
    assert!(matches!(
        inspect("LS-ABCDE-FGHJK-3", &format),
        Err(KeyDefect::SegmentCount {
            expected: 4,
            actual: 3
        })
    ));
}

#[test]
fn short_segment_is_rejected() {
    let format = default_format();
    assert!(matches!(
        inspect("LS-ABCDE-FGH-KLMNP-3", &format),
        Err(KeyDefect::SegmentLength { index: 1, .. })
    ));
}

#[test]
fn lowercase_characters_are_rejected() {
    let format = default_format();
    assert_eq!(
        inspect("LS-abcde-FGHJK-LMNPQ-3", &format),
        Err(KeyDefect::InvalidCharacter { index: 0 })
    );
}

#[test]
fn non_digit_checksum_is_rejected() {
    let format = default_format();
    assert_eq!(
        inspect("LS-ABCDE-FGHJK-LMNPQ-X", &format),
        Err(KeyDefect::MalformedChecksum)
    );
    assert_eq!(
        inspect("LS-ABCDE-FGHJK-LMNPQ-12", &format),
        Err(KeyDefect::MalformedChecksum)
    );
}

#[test]
fn empty_prefix_keys_validate() {
    let format = KeyFormat::new("", 3, 4, '_').unwrap();
    let key = generate(&format);
    assert!(!key.starts_with('_'));
    assert!(validate(&key, &format));
}

#[test]
fn key_from_other_format_is_rejected() {
    let narrow = KeyFormat::new("LS-", 3, 5, '-').unwrap();
    let key = generate(&default_format());
    assert!(!validate(&key, &narrow));
}

#[test]
fn format_rejects_out_of_range_parameters() {
    assert_eq!(KeyFormat::new("LS-", 1, 5, '-'), Err(FormatError::Segments(1)));
    assert_eq!(KeyFormat::new("LS-", 7, 5, '-'), Err(FormatError::Segments(7)));
    assert_eq!(
        KeyFormat::new("LS-", 4, 2, '-'),
        Err(FormatError::SegmentLength(2))
    );
    assert_eq!(
        KeyFormat::new("LS-", 4, 11, '-'),
        Err(FormatError::SegmentLength(11))
    );
    assert_eq!(
        KeyFormat::new("ABCDEFGHIJK", 4, 5, '-'),
        Err(FormatError::PrefixTooLong(11))
    );
    assert_eq!(
        KeyFormat::new("L S", 4, 5, '-'),
        Err(FormatError::PrefixCharacters)
    );
}

#[test]
fn format_rejects_alphanumeric_delimiters() {
    assert_eq!(KeyFormat::new("LS-", 4, 5, 'A'), Err(FormatError::Delimiter('A')));
    assert_eq!(KeyFormat::new("LS-", 4, 5, '7'), Err(FormatError::Delimiter('7')));
    assert_eq!(KeyFormat::new("LS-", 4, 5, ' '), Err(FormatError::Delimiter(' ')));
}

#[test]
fn key_space_counts_random_characters() {
    let format = KeyFormat::new("", 2, 3, '-').unwrap();
    assert_eq!(format.key_space(), 32u128.pow(3));
    assert_eq!(KeyFormat::new("", 6, 10, '-').unwrap().key_space(), u128::MAX);
}

#[test]
fn format_deserialization_validates() {
    let ok: KeyFormat = serde_json::from_str(
        r#"{"prefix":"LS-","segments":4,"segmentLength":5,"delimiter":"-"}"#,
    )
    .unwrap();
    assert_eq!(ok, KeyFormat::default());

    let bad = serde_json::from_str::<KeyFormat>(
        r#"{"prefix":"LS-","segments":9,"segmentLength":5,"delimiter":"-"}"#,
    );
    assert!(bad.is_err());
}

#[test]
fn defect_messages_are_readable() {
    let msg = KeyDefect::SegmentCount {
        expected: 4,
        actual: 2,
    }
    .to_string();
    assert!(msg.contains("expected 4"));
}
