//! Command-line arguments and the runtime configuration derived from them.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use keyward_crypto::{KdfParams, Salt, VaultKey, derive_key};
use keyward_license::{Actor, IssuancePolicy, LicenseStatus};
use keyward_types::{AccountId, ApplicationId, LicenseId};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "keyward")]
#[command(about = "License key issuance, review and verification")]
pub struct Args {
    /// SQLite database file
    #[arg(long, env = "KEYWARD_DATABASE", default_value = "keyward.db", global = true)]
    pub database: PathBuf,

    /// Base64-encoded 32-byte key sealing holder identities
    #[arg(long, env = "KEYWARD_VAULT_KEY", hide_env_values = true, global = true)]
    pub vault_key: Option<String>,

    /// Derive the vault key from this passphrase instead (needs --vault-salt)
    #[arg(
        long,
        env = "KEYWARD_VAULT_PASSPHRASE",
        hide_env_values = true,
        global = true,
        conflicts_with = "vault_key"
    )]
    pub vault_passphrase: Option<String>,

    /// Base64-encoded 16-byte salt for --vault-passphrase
    #[arg(long, env = "KEYWARD_VAULT_SALT", global = true)]
    pub vault_salt: Option<String>,

    /// Candidate keys tried per license before giving up
    #[arg(long, default_value_t = 10, global = true)]
    pub max_key_attempts: u32,

    /// Account performing management commands
    #[arg(long, env = "KEYWARD_ACTOR", global = true)]
    pub actor: Option<AccountId>,

    /// Act with the admin role
    #[arg(long, global = true)]
    pub admin: bool,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a freshly generated vault key and passphrase salt
    Keygen,

    /// Manage applications
    #[command(subcommand)]
    App(AppCommand),

    /// Issue pending license keys for an application
    Generate {
        application: ApplicationId,
        #[arg(short, long, default_value_t = 1)]
        count: u32,
    },

    /// List licenses, newest first
    List {
        #[arg(long)]
        application: Option<ApplicationId>,
        #[arg(long)]
        status: Option<LicenseStatus>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },

    /// Show one license
    Show { id: LicenseId },

    /// Change status (transition table applies) or expiry
    Update {
        id: LicenseId,
        #[arg(long)]
        status: Option<LicenseStatus>,
        /// RFC 3339 timestamp
        #[arg(long, conflicts_with = "clear_expiry")]
        expires_at: Option<DateTime<Utc>>,
        #[arg(long)]
        clear_expiry: bool,
    },

    /// Force a status outside the transition table (audited)
    Override {
        id: LicenseId,
        status: LicenseStatus,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Delete a license
    Delete { id: LicenseId },

    /// List submitted activation requests awaiting review
    Review,

    /// Approve (default) or reject a submitted activation request
    Process {
        id: LicenseId,
        #[arg(long)]
        reject: bool,
    },

    /// Show the override history of a license
    Audit { id: LicenseId },

    /// License counts and recent issuance across visible applications
    Stats,

    /// Check a license key as client software would
    Verify { license_key: String, app_id: String },

    /// Submit a holder identity for a pending key
    Apply {
        license_key: String,
        app_id: String,
        /// Holder identity as a JSON object
        identity: String,
    },

    /// List unclaimed keys of an application
    PendingKeys { app_id: String },
}

#[derive(Subcommand, Debug)]
pub enum AppCommand {
    /// Create an application
    Create {
        name: String,
        #[command(flatten)]
        fields: AppFields,
    },

    /// Update an application; format changes only affect new keys
    Update {
        id: ApplicationId,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        fields: AppFields,
    },

    /// Delete an application without licenses
    Delete { id: ApplicationId },

    /// List applications
    List,

    /// Show an application with license counts
    Show { id: ApplicationId },
}

#[derive(ClapArgs, Debug, Default)]
pub struct AppFields {
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub prefix: Option<String>,
    #[arg(long)]
    pub segments: Option<u8>,
    #[arg(long)]
    pub segment_length: Option<u8>,
    #[arg(long)]
    pub delimiter: Option<char>,
}

impl Command {
    /// Returns true for commands that act on behalf of an account.
    pub fn is_management(&self) -> bool {
        !matches!(
            self,
            Self::Keygen | Self::Verify { .. } | Self::Apply { .. } | Self::PendingKeys { .. }
        )
    }
}

/// Runtime configuration resolved from [`Args`].
#[derive(Debug)]
pub struct Config {
    pub database: PathBuf,
    pub vault_key: VaultKey,
    pub policy: IssuancePolicy,
    pub actor: Option<Actor>,
}

impl Config {
    pub fn from_args(args: &Args) -> Result<Self> {
        let vault_key = match (&args.vault_key, &args.vault_passphrase) {
            (Some(encoded), _) => VaultKey::from_base64(encoded).context("invalid vault key")?,
            (None, Some(passphrase)) => {
                let salt = args
                    .vault_salt
                    .as_deref()
                    .context("--vault-passphrase needs --vault-salt")?;
                let salt = Salt::from_base64(salt).context("invalid vault salt")?;
                derive_key(passphrase, &salt, &KdfParams::default())
                    .context("failed to derive vault key")?
            }
            (None, None) => bail!(
                "a vault key is required (--vault-key, KEYWARD_VAULT_KEY or --vault-passphrase)"
            ),
        };

        if args.max_key_attempts == 0 {
            bail!("--max-key-attempts must be at least 1");
        }

        let actor = args.actor.map(|account| {
            if args.admin {
                Actor::admin(account)
            } else {
                Actor::owner(account)
            }
        });

        Ok(Self {
            database: args.database.clone(),
            vault_key,
            policy: IssuancePolicy {
                max_attempts: args.max_key_attempts,
            },
            actor,
        })
    }
}
