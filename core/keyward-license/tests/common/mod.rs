//! Shared test helpers for license tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use keyward_crypto::{IdentityVault, VaultKey};
use keyward_license::{
    ActivationWorkflow, Actor, Application, ApplicationDraft, IssuancePolicy, License,
    LicenseRegistry, LicenseStore, MemoryStore,
};
use keyward_types::{AccountId, Clock, FixedClock, HolderIdentity};
use std::sync::Arc;

/// A fixed point in time all harness clocks start at.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// Returns a vault with a deterministic key.
pub fn test_vault() -> IdentityVault {
    IdentityVault::new(VaultKey::from_bytes([7u8; 32]))
}

pub fn sample_identity() -> HolderIdentity {
    HolderIdentity::new()
        .with("name", "Grace Hopper")
        .with("email", "grace@example.com")
        .with("machine", "HOST-01")
}

/// Registry and workflow wired to one in-memory store and a fixed clock.
pub struct Harness<S = MemoryStore> {
    pub store: Arc<S>,
    pub vault: Arc<IdentityVault>,
    pub clock: Arc<FixedClock>,
    pub registry: LicenseRegistry<S>,
    pub workflow: ActivationWorkflow<S>,
    pub owner: Actor,
    pub admin: Actor,
}

impl Harness<MemoryStore> {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new(), IssuancePolicy::default())
    }
}

impl<S: LicenseStore> Harness<S> {
    pub fn with_store(store: S, policy: IssuancePolicy) -> Self {
        let store = Arc::new(store);
        let vault = Arc::new(test_vault());
        let clock = Arc::new(FixedClock::at(epoch()));
        let registry = LicenseRegistry::new(
            Arc::clone(&store),
            Arc::clone(&vault),
            clock.clone(),
            policy,
        );
        let workflow = ActivationWorkflow::new(Arc::clone(&store), Arc::clone(&vault), clock.clone());
        Self {
            store,
            vault,
            clock,
            registry,
            workflow,
            owner: Actor::owner(AccountId::new()),
            admin: Actor::admin(AccountId::new()),
        }
    }

    /// Current time on the harness clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Creates an application with the default key format for `owner`.
    pub fn app(&self) -> Application {
        self.app_named("Desktop Suite")
    }

    pub fn app_named(&self, name: &str) -> Application {
        self.registry
            .create_application(
                &self.owner,
                ApplicationDraft {
                    name: name.to_string(),
                    ..ApplicationDraft::default()
                },
            )
            .unwrap()
    }

    /// Issues one pending license for `app`.
    pub fn issue(&self, app: &Application) -> License {
        self.registry
            .generate(&self.owner, app.id, 1)
            .unwrap()
            .remove(0)
    }

    /// Issues a license and takes it through apply and approve.
    pub fn activate(&self, app: &Application) -> License {
        let license = self.issue(app);
        self.workflow
            .apply(&license.key, app.app_id.as_str(), &sample_identity())
            .unwrap();
        self.workflow
            .process(&self.owner, license.id, keyward_license::Decision::Approve)
            .unwrap()
    }
}
