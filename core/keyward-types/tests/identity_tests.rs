use chrono::{Duration, TimeZone, Utc};
use keyward_types::{Clock, FixedClock, HolderIdentity};
use serde_json::json;

#[test]
fn identity_from_object() {
    let identity = HolderIdentity::try_from(json!({"name": "Ada", "seats": 3})).unwrap();
    assert_eq!(identity.len(), 2);
    assert_eq!(identity.get("name"), Some(&json!("Ada")));
}

#[test]
fn identity_rejects_non_objects() {
    for value in [json!(null), json!(true), json!(1), json!("x"), json!([1, 2])] {
        assert!(HolderIdentity::try_from(value).is_err());
    }
}

#[test]
fn identity_json_bytes_roundtrip() {
    let identity = HolderIdentity::new()
        .with("email", "ada@example.com")
        .with("device", json!({"os": "linux"}));
    let bytes = identity.to_json_bytes().unwrap();
    assert_eq!(HolderIdentity::from_json_bytes(&bytes).unwrap(), identity);
}

#[test]
fn identity_from_bytes_rejects_array() {
    assert!(HolderIdentity::from_json_bytes(b"[1,2,3]").is_err());
    assert!(HolderIdentity::from_json_bytes(b"not json").is_err());
}

#[test]
fn identity_serializes_as_plain_object() {
    let identity = HolderIdentity::new().with("name", "Ada");
    assert_eq!(serde_json::to_value(&identity).unwrap(), json!({"name": "Ada"}));
}

// ── FixedClock ───────────────────────────────────────────────────

#[test]
fn fixed_clock_set_and_advance() {
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let clock = FixedClock::at(start);
    assert_eq!(clock.now(), start);

    clock.advance(Duration::hours(2));
    assert_eq!(clock.now(), start + Duration::hours(2));

    clock.set(start);
    assert_eq!(clock.now(), start);
}
