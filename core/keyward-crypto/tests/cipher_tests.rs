use base64::{Engine, engine::general_purpose::STANDARD};
use keyward_crypto::{
    ENVELOPE_VERSION, Envelope, KdfParams, NONCE_SIZE, Salt, TAG_SIZE, VaultKey, derive_key,
    open_bytes, seal_bytes,
};

#[test]
fn seal_open_roundtrip() {
    let key = VaultKey::generate();
    let envelope = seal_bytes(&key, b"{\"name\":\"Ada\"}").unwrap();
    assert_eq!(open_bytes(&key, &envelope).unwrap(), b"{\"name\":\"Ada\"}");
}

#[test]
fn empty_payload_is_just_a_tag() {
    let key = VaultKey::generate();
    let envelope = seal_bytes(&key, b"").unwrap();
    assert_eq!(envelope.ciphertext.len(), TAG_SIZE);
    assert_eq!(open_bytes(&key, &envelope).unwrap(), b"");
}

#[test]
fn wrong_key_is_rejected() {
    let envelope = seal_bytes(&VaultKey::generate(), b"Secret").unwrap();
    assert!(open_bytes(&VaultKey::generate(), &envelope).is_err());
}

#[test]
fn flipped_ciphertext_bit_is_rejected() {
    let key = VaultKey::generate();
    let mut envelope = seal_bytes(&key, b"Secret").unwrap();
    envelope.ciphertext[0] ^= 0xFF;
    assert!(open_bytes(&key, &envelope).is_err());
}

#[test]
fn every_envelope_gets_its_own_nonce() {
    let key = VaultKey::generate();
    let a = seal_bytes(&key, b"same").unwrap();
    let b = seal_bytes(&key, b"same").unwrap();
    assert_ne!(a.nonce, b.nonce);
    assert_ne!(a.ciphertext, b.ciphertext);
}

#[test]
fn encoding_starts_with_version() {
    let key = VaultKey::generate();
    let envelope = seal_bytes(&key, b"payload").unwrap();
    let encoded = envelope.encode();

    let raw = STANDARD.decode(&encoded).unwrap();
    assert_eq!(raw[0], ENVELOPE_VERSION);
    assert_eq!(raw.len(), envelope.encoded_len());
    assert_eq!(envelope.encoded_len(), 1 + NONCE_SIZE + b"payload".len() + TAG_SIZE);
    assert_eq!(Envelope::decode(&encoded).unwrap(), envelope);
}

#[test]
fn unknown_version_is_rejected() {
    let key = VaultKey::generate();
    let mut raw = STANDARD.decode(seal_bytes(&key, b"x").unwrap().encode()).unwrap();
    raw[0] = ENVELOPE_VERSION + 1;
    let err = Envelope::decode(&STANDARD.encode(raw)).unwrap_err();
    assert!(err.to_string().contains("unsupported envelope version"));
}

#[test]
fn decode_rejects_garbage() {
    assert!(Envelope::decode("").is_err());
    assert!(Envelope::decode("!!!not base64!!!").is_err());
    assert!(Envelope::decode("AQAA").is_err());
}

// ── VaultKey ────────────────────────────────────────────────────

#[test]
fn vault_key_base64_roundtrip() {
    let key = VaultKey::generate();
    let restored = VaultKey::from_base64(&key.to_base64()).unwrap();
    assert_eq!(restored.as_bytes(), key.as_bytes());
}

#[test]
fn vault_key_rejects_wrong_length() {
    let err = VaultKey::from_base64("AAAAAAAA").unwrap_err();
    assert!(format!("{err}").contains("invalid key length"));
}

#[test]
fn vault_key_debug_is_redacted() {
    let key = VaultKey::from_bytes([7u8; 32]);
    let debug = format!("{key:?}");
    assert!(debug.contains("REDACTED"));
    assert!(!debug.contains('7'));
}

#[test]
fn derive_key_is_deterministic() {
    let params = KdfParams {
        memory_cost: 1024,
        time_cost: 1,
        parallelism: 1,
    };
    let salt = Salt::from_bytes([9u8; 16]);
    let a = derive_key("correct horse", &salt, &params).unwrap();
    let b = derive_key("correct horse", &salt, &params).unwrap();
    let c = derive_key("battery staple", &salt, &params).unwrap();
    assert_eq!(a.as_bytes(), b.as_bytes());
    assert_ne!(a.as_bytes(), c.as_bytes());
}

#[test]
fn salt_base64_requires_sixteen_bytes() {
    let salt = Salt::random();
    let decoded = Salt::from_base64(&salt.to_base64()).unwrap();
    assert_eq!(decoded.as_bytes(), salt.as_bytes());

    assert!(matches!(
        Salt::from_base64("AAAA"),
        Err(keyward_crypto::CryptoError::InvalidKeyLength { expected: 16, actual: 3 })
    ));
}
