//! Command execution. Every command produces a JSON document.

use crate::config::{AppCommand, AppFields, Command, Config};
use anyhow::{Context, Result, bail};
use keyward_crypto::{IdentityVault, Salt, VaultKey};
use keyward_license::{
    ActivationWorkflow, Actor, ApplicationDraft, ApplicationPatch, ApplyResponse, Decision,
    ErrorResponse, IssuancePolicy, LicenseError, LicensePatch, LicenseQuery, LicenseRegistry,
    PendingKeysResponse, VerifyResponse,
};
use keyward_storage::SqliteStore;
use keyward_types::{Clock, SystemClock};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Result of running one command.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub body: Value,
    /// False when a public command reports a failure body.
    pub success: bool,
}

impl Outcome {
    fn ok(body: impl Serialize) -> Result<Self> {
        Ok(Self {
            body: serde_json::to_value(body).context("failed to serialize output")?,
            success: true,
        })
    }

    fn public_failure(err: &LicenseError, for_verify: bool) -> Result<Self> {
        debug!("public call failed: {err}");
        Ok(Self {
            body: serde_json::to_value(ErrorResponse::from_error(err, for_verify))?,
            success: false,
        })
    }
}

/// Registry and workflow sharing one store, vault and clock.
pub struct Services {
    pub registry: LicenseRegistry<SqliteStore>,
    pub workflow: ActivationWorkflow<SqliteStore>,
}

impl Services {
    pub fn new(
        store: SqliteStore,
        vault_key: VaultKey,
        policy: IssuancePolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Arc::new(store);
        let vault = Arc::new(IdentityVault::new(vault_key));
        Self {
            registry: LicenseRegistry::new(
                Arc::clone(&store),
                Arc::clone(&vault),
                Arc::clone(&clock),
                policy,
            ),
            workflow: ActivationWorkflow::new(store, vault, clock),
        }
    }

    /// Opens the configured database with the system clock.
    pub fn open(config: Config) -> Result<Self> {
        let store = SqliteStore::open(&config.database)
            .with_context(|| format!("failed to open {}", config.database.display()))?;
        Ok(Self::new(
            store,
            config.vault_key,
            config.policy,
            Arc::new(SystemClock),
        ))
    }
}

/// Prints a new base64 vault key, plus a salt for the passphrase route.
/// Needs no database.
pub fn keygen() -> Result<Outcome> {
    Outcome::ok(serde_json::json!({
        "vaultKey": VaultKey::generate().to_base64(),
        "vaultSalt": Salt::random().to_base64(),
    }))
}

/// Runs any command except `keygen`.
pub fn execute(services: &Services, actor: Option<Actor>, command: Command) -> Result<Outcome> {
    if !command.is_management() {
        return execute_public(services, command);
    }
    let actor = actor.context("management commands require --actor (or KEYWARD_ACTOR)")?;
    let registry = &services.registry;

    match command {
        Command::App(app) => execute_app(registry, &actor, app),
        Command::Generate { application, count } => {
            let issued: Vec<Value> = registry
                .generate(&actor, application, count)?
                .into_iter()
                .map(|l| serde_json::json!({ "id": l.id, "licenseKey": l.key, "status": l.status }))
                .collect();
            Outcome::ok(issued)
        }
        Command::List {
            application,
            status,
            search,
            page,
            limit,
        } => {
            let query = LicenseQuery {
                application_id: application,
                status,
                search,
                page,
                limit,
            };
            Outcome::ok(registry.list(&actor, &query)?)
        }
        Command::Show { id } => Outcome::ok(registry.get(&actor, id)?),
        Command::Update {
            id,
            status,
            expires_at,
            clear_expiry,
        } => {
            let expires_at = if clear_expiry {
                Some(None)
            } else {
                expires_at.map(Some)
            };
            if status.is_none() && expires_at.is_none() {
                bail!("nothing to update: pass --status, --expires-at or --clear-expiry");
            }
            registry.update(&actor, id, LicensePatch { status, expires_at })?;
            Outcome::ok(registry.get(&actor, id)?)
        }
        Command::Override { id, status, reason } => {
            registry.override_status(&actor, id, status, reason)?;
            Outcome::ok(registry.get(&actor, id)?)
        }
        Command::Delete { id } => {
            registry.delete(&actor, id)?;
            Outcome::ok(serde_json::json!({ "deleted": id }))
        }
        Command::Review => Outcome::ok(registry.pending_applications(&actor)?),
        Command::Process { id, reject } => {
            let decision = Decision::from_approved(!reject);
            services.workflow.process(&actor, id, decision)?;
            Outcome::ok(registry.get(&actor, id)?)
        }
        Command::Audit { id } => Outcome::ok(registry.audit_trail(&actor, id)?),
        Command::Stats => Outcome::ok(registry.stats(&actor)?),
        other => bail!("{other:?} does not act on behalf of an account"),
    }
}

fn execute_app(
    registry: &LicenseRegistry<SqliteStore>,
    actor: &Actor,
    command: AppCommand,
) -> Result<Outcome> {
    match command {
        AppCommand::Create { name, fields } => {
            let AppFields {
                description,
                prefix,
                segments,
                segment_length,
                delimiter,
            } = fields;
            let draft = ApplicationDraft {
                name,
                description,
                prefix,
                segments,
                segment_length,
                delimiter,
            };
            Outcome::ok(registry.create_application(actor, draft)?)
        }
        AppCommand::Update { id, name, fields } => {
            let patch = ApplicationPatch {
                name,
                description: fields.description,
                prefix: fields.prefix,
                segments: fields.segments,
                segment_length: fields.segment_length,
                delimiter: fields.delimiter,
            };
            Outcome::ok(registry.update_application(actor, id, patch)?)
        }
        AppCommand::Delete { id } => {
            registry.delete_application(actor, id)?;
            Outcome::ok(serde_json::json!({ "deleted": id }))
        }
        AppCommand::List => Outcome::ok(registry.list_applications(actor)?),
        AppCommand::Show { id } => Outcome::ok(registry.application_detail(actor, id)?),
    }
}

/// Public client calls answer with the wire bodies client SDKs expect,
/// including on failure.
fn execute_public(services: &Services, command: Command) -> Result<Outcome> {
    let workflow = &services.workflow;
    match command {
        Command::Verify {
            license_key,
            app_id,
        } => match workflow.verify(&license_key, &app_id) {
            Ok(v) => Outcome::ok(VerifyResponse::from(v)),
            Err(e) => Outcome::public_failure(&e, true),
        },
        Command::Apply {
            license_key,
            app_id,
            identity,
        } => {
            let identity: Value =
                serde_json::from_str(&identity).context("identity must be valid JSON")?;
            match workflow.apply_json(&license_key, &app_id, identity) {
                Ok((license, application)) => {
                    Outcome::ok(ApplyResponse::submitted(&license, &application))
                }
                Err(e) => Outcome::public_failure(&e, false),
            }
        }
        Command::PendingKeys { app_id } => match workflow.pending_keys(&app_id) {
            Ok(keys) => Outcome::ok(PendingKeysResponse::from(keys)),
            Err(e) => Outcome::public_failure(&e, false),
        },
        other => bail!("{other:?} is not a public command"),
    }
}
