//! End-to-end tests driving parsed command lines against an in-memory database.

use chrono::{TimeZone, Utc};
use clap::Parser;
use keyward_cli::{Args, Command, Config, Outcome, Services, execute, keygen};
use keyward_crypto::{KdfParams, Salt, VaultKey, derive_key};
use keyward_license::IssuancePolicy;
use keyward_storage::SqliteStore;
use keyward_types::{AccountId, FixedClock};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::sync::Arc;

const VAULT_KEY: &str = "BwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwc=";

fn services() -> Services {
    let clock = Arc::new(FixedClock::at(
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    ));
    Services::new(
        SqliteStore::open_in_memory().unwrap(),
        VaultKey::from_base64(VAULT_KEY).unwrap(),
        IssuancePolicy::default(),
        clock,
    )
}

fn parse(args: &[&str]) -> Args {
    let mut argv = vec!["keyward", "--vault-key", VAULT_KEY];
    argv.extend_from_slice(args);
    Args::try_parse_from(argv).unwrap()
}

fn run(services: &Services, args: &[&str]) -> Outcome {
    let args = parse(args);
    let config = Config::from_args(&args).unwrap();
    execute(services, config.actor, args.command).unwrap()
}

fn as_str(value: &Value) -> &str {
    value.as_str().unwrap()
}

#[test]
fn parses_global_options_after_subcommand() {
    let account = AccountId::new().to_string();
    let args = parse(&["list", "--status", "pending", "--actor", &account, "--admin"]);

    assert!(args.admin);
    assert_eq!(args.actor.map(|a| a.to_string()), Some(account));
    assert!(matches!(
        args.command,
        Command::List { status: Some(_), page: 1, limit: 10, .. }
    ));
}

#[test]
fn rejects_unknown_status() {
    let err = Args::try_parse_from(["keyward", "list", "--status", "suspended"]).unwrap_err();
    assert!(err.to_string().contains("unknown license status"));
}

#[test]
fn expiry_and_clear_expiry_conflict() {
    let id = AccountId::new().to_string();
    let result = Args::try_parse_from([
        "keyward",
        "update",
        &id,
        "--expires-at",
        "2027-01-01T00:00:00Z",
        "--clear-expiry",
    ]);
    assert!(result.is_err());
}

#[test]
fn config_requires_vault_key() {
    let args = Args::try_parse_from(["keyward", "review"]).unwrap();
    if std::env::var_os("KEYWARD_VAULT_KEY").is_none() {
        let err = Config::from_args(&args).unwrap_err();
        assert!(err.to_string().contains("vault key is required"));
    }
}

#[test]
fn config_rejects_malformed_vault_key() {
    let args = Args::try_parse_from(["keyward", "--vault-key", "not-a-key", "review"]).unwrap();
    let err = Config::from_args(&args).unwrap_err();
    assert_eq!(err.to_string(), "invalid vault key");
}

#[test]
fn config_derives_key_from_passphrase() {
    let salt = Salt::from_bytes([3u8; 16]);
    let args = Args::try_parse_from([
        "keyward",
        "--vault-passphrase",
        "correct horse",
        "--vault-salt",
        &salt.to_base64(),
        "review",
    ])
    .unwrap();
    let config = Config::from_args(&args).unwrap();

    let expected = derive_key("correct horse", &salt, &KdfParams::default()).unwrap();
    assert_eq!(config.vault_key.as_bytes(), expected.as_bytes());
}

#[test]
fn passphrase_without_salt_fails() {
    let args = Args::try_parse_from(["keyward", "--vault-passphrase", "pw", "review"]).unwrap();
    if std::env::var_os("KEYWARD_VAULT_SALT").is_none() {
        let err = Config::from_args(&args).unwrap_err();
        assert!(err.to_string().contains("--vault-salt"));
    }
}

#[test]
fn config_rejects_zero_attempts() {
    let args = parse(&["--max-key-attempts", "0", "review"]);
    assert!(Config::from_args(&args).is_err());
}

#[test]
fn admin_flag_selects_role() {
    let account = AccountId::new().to_string();
    let owner = Config::from_args(&parse(&["--actor", &account, "review"])).unwrap();
    let admin = Config::from_args(&parse(&["--actor", &account, "--admin", "review"])).unwrap();

    assert!(!owner.actor.unwrap().is_admin);
    assert!(admin.actor.unwrap().is_admin);
}

#[test]
fn public_commands_need_no_actor() {
    for args in [
        vec!["verify", "LS-AAAAA", "abc"],
        vec!["apply", "LS-AAAAA", "abc", "{}"],
        vec!["pending-keys", "abc"],
        vec!["keygen"],
    ] {
        assert!(!parse(&args).command.is_management());
    }
    assert!(parse(&["review"]).command.is_management());
}

#[test]
fn management_without_actor_fails() {
    let services = services();
    let args = parse(&["app", "list"]);
    let err = execute(&services, None, args.command).unwrap_err();
    assert!(err.to_string().contains("--actor"));
}

#[test]
fn keygen_prints_usable_key() {
    let outcome = keygen().unwrap();
    assert!(outcome.success);
    let encoded = as_str(&outcome.body["vaultKey"]);
    assert!(VaultKey::from_base64(encoded).is_ok());
    assert!(Salt::from_base64(as_str(&outcome.body["vaultSalt"])).is_ok());
}

#[test]
fn verify_unknown_key_reports_failure_body() {
    let services = services();
    let outcome = run(&services, &["verify", "LS-NOPE1-NOPE1-NOPE1-NOPE1-0", "0123"]);

    assert!(!outcome.success);
    assert_eq!(outcome.body["success"], Value::Bool(false));
    assert_eq!(outcome.body["valid"], Value::Bool(false));
    assert!(outcome.body["message"].is_string());
}

#[test]
fn apply_rejects_invalid_json() {
    let services = services();
    let args = parse(&["apply", "LS-X", "abc", "{not json"]);
    assert!(execute(&services, None, args.command).is_err());
}

#[test]
fn full_activation_round_trip() {
    let services = services();
    let owner = AccountId::new().to_string();
    let as_owner = |args: &[&str]| {
        let mut argv = vec!["--actor", owner.as_str()];
        argv.extend_from_slice(args);
        run(&services, &argv)
    };

    let app = as_owner(&["app", "create", "Demo", "--prefix", "DM-", "--segments", "3"]);
    assert!(app.success);
    let application_id = as_str(&app.body["id"]).to_string();
    let app_id = as_str(&app.body["appId"]).to_string();

    let issued = as_owner(&["generate", &application_id, "--count", "2"]);
    let issued = issued.body.as_array().unwrap().clone();
    assert_eq!(issued.len(), 2);
    let key = as_str(&issued[0]["licenseKey"]).to_string();
    let license_id = as_str(&issued[0]["id"]).to_string();
    assert!(key.starts_with("DM-"));
    assert_eq!(issued[0]["status"], "pending");

    let pending = run(&services, &["pending-keys", &app_id]);
    assert!(pending.success);
    assert_eq!(pending.body["pendingLicenses"].as_array().unwrap().len(), 2);

    let verify = run(&services, &["verify", &key, &app_id]);
    assert!(verify.success);
    assert_eq!(verify.body["valid"], Value::Bool(false));
    assert_eq!(verify.body["status"], "pending");

    let identity = r#"{"name":"Ada","email":"ada@example.com"}"#;
    let applied = run(&services, &["apply", &key, &app_id, identity]);
    assert!(applied.success);
    assert_eq!(applied.body["license"]["licenseKey"], Value::String(key.clone()));

    let review = as_owner(&["review"]);
    let queue = review.body.as_array().unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0]["holderIdentity"]["name"], "Ada");

    let processed = as_owner(&["process", &license_id]);
    assert_eq!(processed.body["status"], "active");
    assert_eq!(processed.body["holderIdentity"]["email"], "ada@example.com");

    let verify = run(&services, &["verify", &key, &app_id]);
    assert_eq!(verify.body["valid"], Value::Bool(true));
    assert_eq!(verify.body["status"], "active");

    let args = parse(&["--actor", &owner, "process", &license_id, "--reject"]);
    let actor = Config::from_args(&args).unwrap().actor;
    assert!(execute(&services, actor, args.command).is_err());
}

#[test]
fn update_override_and_audit() {
    let services = services();
    let owner = AccountId::new().to_string();
    let as_owner = |args: &[&str]| {
        let mut argv = vec!["--actor", owner.as_str()];
        argv.extend_from_slice(args);
        let args = parse(&argv);
        let config = Config::from_args(&args).unwrap();
        execute(&services, config.actor, args.command)
    };

    let app = as_owner(&["app", "create", "Tools"]).unwrap();
    let application_id = as_str(&app.body["id"]).to_string();
    let issued = as_owner(&["generate", &application_id]).unwrap();
    let license_id = as_str(&issued.body[0]["id"]).to_string();

    assert!(as_owner(&["update", &license_id]).is_err());

    let revoked = as_owner(&["update", &license_id, "--status", "revoked"]).unwrap();
    assert_eq!(revoked.body["status"], "revoked");

    assert!(as_owner(&["override", &license_id, "active"]).is_err());

    let listed = as_owner(&["list", "--status", "revoked"]).unwrap();
    assert_eq!(listed.body["totalItems"], 1);

    let audit = as_owner(&["audit", &license_id]).unwrap();
    assert_eq!(audit.body.as_array().unwrap().len(), 0);

    let deleted = as_owner(&["delete", &license_id]).unwrap();
    assert_eq!(deleted.body["deleted"], Value::String(license_id.clone()));
    assert!(as_owner(&["show", &license_id]).is_err());

    let removed = as_owner(&["app", "delete", &application_id]).unwrap();
    assert!(removed.success);
}

#[test]
fn stats_reports_counts_and_issuance() {
    let services = services();
    let owner = AccountId::new().to_string();
    let as_owner = |args: &[&str]| {
        let mut argv = vec!["--actor", owner.as_str()];
        argv.extend_from_slice(args);
        run(&services, &argv)
    };

    let app = as_owner(&["app", "create", "Metrics"]);
    let application_id = as_str(&app.body["id"]).to_string();
    let issued = as_owner(&["generate", &application_id, "--count", "3"]);
    let license_id = as_str(&issued.body[0]["id"]).to_string();
    as_owner(&["update", &license_id, "--status", "revoked"]);

    let stats = as_owner(&["stats"]);
    assert!(stats.success);
    assert_eq!(stats.body["total"], 3);
    assert_eq!(stats.body["pending"], 2);
    assert_eq!(stats.body["revoked"], 1);
    assert_eq!(stats.body["issuedToday"], 3);
    assert_eq!(stats.body["issuedThisWeek"], 3);
    assert_eq!(stats.body["issuedThisMonth"], 3);

    let stranger = AccountId::new().to_string();
    let empty = run(&services, &["--actor", &stranger, "stats"]);
    assert_eq!(empty.body["total"], 0);
}
