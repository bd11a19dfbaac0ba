use keyward_crypto::{CryptoError, IdentityVault, SealedIdentity, VaultKey, seal_bytes};
use keyward_types::HolderIdentity;
use serde_json::json;

fn sample_identity() -> HolderIdentity {
    HolderIdentity::new()
        .with("name", "Ada Lovelace")
        .with("email", "ada@example.com")
        .with("device", json!({"id": "D-42", "os": "linux"}))
}

#[test]
fn seal_then_open_returns_original() {
    let vault = IdentityVault::new(VaultKey::generate());
    let identity = sample_identity();
    let sealed = vault.seal(&identity).unwrap();
    assert_eq!(vault.open(&sealed).unwrap(), identity);
}

#[test]
fn sealed_blob_hides_plaintext() {
    let vault = IdentityVault::new(VaultKey::generate());
    let sealed = vault.seal(&sample_identity()).unwrap();
    assert!(!sealed.as_str().contains("Ada"));
    assert!(!sealed.as_str().contains("example.com"));
}

#[test]
fn sealing_twice_differs() {
    let vault = IdentityVault::new(VaultKey::generate());
    let identity = sample_identity();
    assert_ne!(vault.seal(&identity).unwrap(), vault.seal(&identity).unwrap());
}

#[test]
fn open_with_other_key_fails() {
    let sealed = IdentityVault::new(VaultKey::generate())
        .seal(&sample_identity())
        .unwrap();
    let other = IdentityVault::new(VaultKey::generate());
    assert!(matches!(other.open(&sealed), Err(CryptoError::Decryption(_))));
}

#[test]
fn open_malformed_blob_fails() {
    let vault = IdentityVault::new(VaultKey::generate());
    for blob in ["", "zzz", "not-base64-at-all!", "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"] {
        assert!(vault.open(&SealedIdentity::from_stored(blob)).is_err());
    }
}

#[test]
fn open_non_object_plaintext_fails() {
    let key = VaultKey::generate();
    let vault = IdentityVault::new(key.clone());
    let blob = seal_bytes(&key, b"[1,2,3]").unwrap().encode();
    assert!(matches!(
        vault.open(&SealedIdentity::from_stored(blob)),
        Err(CryptoError::InvalidPayload(_))
    ));
}

#[test]
fn empty_identity_roundtrips() {
    let vault = IdentityVault::new(VaultKey::generate());
    let sealed = vault.seal(&HolderIdentity::new()).unwrap();
    assert!(vault.open(&sealed).unwrap().is_empty());
}

#[test]
fn sealed_identity_debug_hides_content() {
    let sealed = SealedIdentity::from_stored("c2VjcmV0");
    assert!(!format!("{sealed:?}").contains("c2VjcmV0"));
}
