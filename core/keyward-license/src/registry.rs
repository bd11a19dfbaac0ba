//! Owner and admin operations: applications, key issuance, license
//! management and the review queue.

use crate::codec;
use crate::error::{LicenseError, LicenseResult};
use crate::format::KeyFormat;
use crate::lifecycle::{self, LicenseStatus};
use crate::model::{
    Actor, Application, ApplicationDraft, ApplicationPatch, AuditEntry, License, LicenseChange,
    LicenseFilter, LicensePatch,
};
use crate::store::{LicenseStore, StoreError};
use crate::view::{ApplicationDetail, LicenseStats, LicenseView, Page, PendingApplication};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use keyward_crypto::IdentityVault;
use keyward_types::{AppId, ApplicationId, Clock, LicenseId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Largest batch a single `generate` call may issue.
pub const MAX_BATCH: u32 = 100;

/// Largest page size for listings.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Warn when an application would hold more than this fraction
/// (1 / N) of its key space.
const KEY_SPACE_WARN_RATIO: u128 = 1_000;

/// Conditional writes tried before a status change gives up with `Contended`.
const MAX_SWAP_ATTEMPTS: u32 = 5;

/// Tuning for key issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuancePolicy {
    /// Candidate keys tried per license before giving up with `Conflict`.
    pub max_attempts: u32,
}

impl Default for IssuancePolicy {
    fn default() -> Self {
        Self { max_attempts: 10 }
    }
}

/// Listing parameters for [`LicenseRegistry::list`].
#[derive(Debug, Clone, PartialEq)]
pub struct LicenseQuery {
    pub application_id: Option<ApplicationId>,
    pub status: Option<LicenseStatus>,
    /// Substring match on the key string.
    pub search: Option<String>,
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
}

impl Default for LicenseQuery {
    fn default() -> Self {
        Self {
            application_id: None,
            status: None,
            search: None,
            page: 1,
            limit: 10,
        }
    }
}

/// Authenticated management surface over a [`LicenseStore`].
pub struct LicenseRegistry<S> {
    store: Arc<S>,
    vault: Arc<IdentityVault>,
    clock: Arc<dyn Clock>,
    policy: IssuancePolicy,
}

impl<S> Clone for LicenseRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            vault: Arc::clone(&self.vault),
            clock: Arc::clone(&self.clock),
            policy: self.policy,
        }
    }
}

impl<S: LicenseStore> LicenseRegistry<S> {
    pub fn new(
        store: Arc<S>,
        vault: Arc<IdentityVault>,
        clock: Arc<dyn Clock>,
        policy: IssuancePolicy,
    ) -> Self {
        Self {
            store,
            vault,
            clock,
            policy,
        }
    }

    // ── Applications ────────────────────────────────────────────

    /// Creates an application owned by `actor`.
    pub fn create_application(
        &self,
        actor: &Actor,
        draft: ApplicationDraft,
    ) -> LicenseResult<Application> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(LicenseError::Validation("application name must not be empty".to_string()));
        }

        let format = KeyFormat::new(
            draft.prefix.unwrap_or_else(|| KeyFormat::DEFAULT_PREFIX.to_string()),
            draft.segments.unwrap_or(KeyFormat::DEFAULT_SEGMENTS),
            draft.segment_length.unwrap_or(KeyFormat::DEFAULT_SEGMENT_LENGTH),
            draft.delimiter.unwrap_or(KeyFormat::DEFAULT_DELIMITER),
        )?;

        let now = self.clock.now();
        let mut application = Application {
            id: ApplicationId::new(),
            app_id: AppId::generate(),
            name: name.to_string(),
            description: draft.description,
            owner: actor.account,
            format,
            created_at: now,
            updated_at: now,
        };

        // 128-bit app ids do not collide in practice; one retry covers it.
        match self.store.insert_application(&application) {
            Err(StoreError::DuplicateAppId(_)) => {
                application.app_id = AppId::generate();
                self.store.insert_application(&application)?;
            }
            other => other?,
        }

        info!(application = %application.id, owner = %actor.account, "application created");
        Ok(application)
    }

    /// Updates an application. New format parameters only affect keys
    /// generated afterwards.
    pub fn update_application(
        &self,
        actor: &Actor,
        id: ApplicationId,
        patch: ApplicationPatch,
    ) -> LicenseResult<Application> {
        let mut application = self.managed_application(actor, id)?;

        if let Some(name) = &patch.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(LicenseError::Validation(
                    "application name must not be empty".to_string(),
                ));
            }
            application.name = name.to_string();
        }
        if patch.description.is_some() {
            application.description = patch.description.clone();
        }
        if patch.touches_format() {
            let current = &application.format;
            application.format = KeyFormat::new(
                patch.prefix.clone().unwrap_or_else(|| current.prefix().to_string()),
                patch.segments.unwrap_or(current.segments()),
                patch.segment_length.unwrap_or(current.segment_length()),
                patch.delimiter.unwrap_or(current.delimiter()),
            )?;
        }
        application.updated_at = self.clock.now();

        if !self.store.update_application(&application)? {
            return Err(LicenseError::NotFound(format!("application {id}")));
        }
        info!(application = %id, "application updated");
        Ok(application)
    }

    /// Deletes an application that owns no licenses.
    pub fn delete_application(&self, actor: &Actor, id: ApplicationId) -> LicenseResult<()> {
        self.managed_application(actor, id)?;

        match self.store.delete_application(id) {
            Ok(true) => {}
            Ok(false) => return Err(LicenseError::NotFound(format!("application {id}"))),
            Err(StoreError::ApplicationInUse(total)) => {
                return Err(LicenseError::ApplicationInUse(total));
            }
            Err(e) => return Err(e.into()),
        }
        info!(application = %id, "application deleted");
        Ok(())
    }

    /// Applications visible to `actor`, newest first.
    pub fn list_applications(&self, actor: &Actor) -> LicenseResult<Vec<Application>> {
        let owner = (!actor.is_admin).then_some(actor.account);
        Ok(self.store.list_applications(owner)?)
    }

    /// One application with its license counts.
    pub fn application_detail(
        &self,
        actor: &Actor,
        id: ApplicationId,
    ) -> LicenseResult<ApplicationDetail> {
        let application = self.managed_application(actor, id)?;
        let stats = self.store.count_by_status(id)?;
        Ok(ApplicationDetail { application, stats })
    }

    /// License counts across every application visible to `actor`, plus
    /// issuance in the current UTC day, week (from Sunday) and month.
    pub fn stats(&self, actor: &Actor) -> LicenseResult<LicenseStats> {
        let scope: Option<Vec<ApplicationId>> = if actor.is_admin {
            None
        } else {
            Some(self.visible_applications(actor)?.into_keys().collect())
        };
        let scoped = |created_since: Option<DateTime<Utc>>| LicenseFilter {
            applications: scope.clone(),
            created_since,
            ..LicenseFilter::default()
        };

        let today = self.clock.now().date_naive();
        let start_of = |day: NaiveDate| day.and_time(NaiveTime::MIN).and_utc();
        let week = today - Duration::days(i64::from(today.weekday().num_days_from_sunday()));
        let month = today.with_day(1).unwrap_or(today);

        let counts = self.store.count_licenses(&scoped(None))?;
        let issued = |since: NaiveDate| -> LicenseResult<u64> {
            Ok(self.store.count_licenses(&scoped(Some(start_of(since))))?.total)
        };
        Ok(LicenseStats {
            counts,
            issued_today: issued(today)?,
            issued_this_week: issued(week)?,
            issued_this_month: issued(month)?,
        })
    }

    // ── Issuance ────────────────────────────────────────────────

    /// Issues `count` pending licenses for an application.
    ///
    /// Each key is checked against the store before insertion and retried on
    /// collision up to `policy.max_attempts` times. Licenses issued before a
    /// `Conflict` stay persisted.
    pub fn generate(
        &self,
        actor: &Actor,
        application_id: ApplicationId,
        count: u32,
    ) -> LicenseResult<Vec<License>> {
        if !(1..=MAX_BATCH).contains(&count) {
            return Err(LicenseError::Validation(format!(
                "count must be between 1 and {MAX_BATCH}, got {count}"
            )));
        }
        let application = self.managed_application(actor, application_id)?;

        let existing = self.store.count_by_status(application_id)?.total;
        let key_space = application.format.key_space();
        if u128::from(existing + u64::from(count)) > key_space / KEY_SPACE_WARN_RATIO {
            warn!(
                application = %application_id,
                existing,
                key_space = %key_space,
                "key space is getting crowded, consider longer or more segments"
            );
        }

        let now = self.clock.now();
        let mut issued = Vec::with_capacity(count as usize);
        for _ in 0..count {
            issued.push(self.issue_one(actor, &application, now)?);
        }

        info!(application = %application_id, count, "license keys issued");
        Ok(issued)
    }

    fn issue_one(
        &self,
        actor: &Actor,
        application: &Application,
        now: DateTime<Utc>,
    ) -> LicenseResult<License> {
        let attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=attempts {
            let key = codec::generate(&application.format);
            if self.store.key_exists(&key)? {
                warn!(application = %application.id, attempt, "license key collision, retrying");
                continue;
            }

            let license = License::issue(key, application.id, Some(actor.account), now);
            match self.store.insert_license(&license) {
                Ok(()) => return Ok(license),
                Err(StoreError::DuplicateKey(_)) => {
                    warn!(application = %application.id, attempt, "license key taken concurrently, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(LicenseError::Conflict { attempts })
    }

    // ── Licenses ────────────────────────────────────────────────

    /// Pages through licenses visible to `actor`, newest first.
    pub fn list(&self, actor: &Actor, query: &LicenseQuery) -> LicenseResult<Page<LicenseView>> {
        if query.page == 0 {
            return Err(LicenseError::Validation("page starts at 1".to_string()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&query.limit) {
            return Err(LicenseError::Validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}, got {}",
                query.limit
            )));
        }

        let applications = self.visible_applications(actor)?;
        let scope = match query.application_id {
            Some(id) if applications.contains_key(&id) => Some(vec![id]),
            Some(id) => return Err(LicenseError::NotFound(format!("application {id}"))),
            None if actor.is_admin => None,
            None => Some(applications.keys().copied().collect()),
        };

        let filter = LicenseFilter {
            applications: scope,
            status: query.status,
            key_contains: query
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            ..LicenseFilter::default()
        };

        let limit = u64::from(query.limit);
        let offset = u64::from(query.page - 1) * limit;
        let (licenses, total_items) = self.store.list_licenses(&filter, offset, Some(limit))?;
        debug!(total_items, returned = licenses.len(), "listed licenses");

        let items = licenses
            .iter()
            .map(|l| LicenseView::build(&self.vault, l, applications.get(&l.application_id)))
            .collect();

        Ok(Page {
            items,
            total_items,
            total_pages: total_items.div_ceil(limit),
            current_page: query.page,
        })
    }

    /// One license, with holder identity if it is active.
    pub fn get(&self, actor: &Actor, id: LicenseId) -> LicenseResult<LicenseView> {
        let (license, application) = self.managed_license(actor, id)?;
        Ok(LicenseView::build(&self.vault, &license, Some(&application)))
    }

    /// Regular administrative update: status changes must follow the
    /// transition table, expiry may be set or cleared freely. Fields the
    /// patch leaves out are never written back.
    pub fn update(
        &self,
        actor: &Actor,
        id: LicenseId,
        patch: LicensePatch,
    ) -> LicenseResult<License> {
        let (license, _) = self.managed_license(actor, id)?;
        let now = self.clock.now();

        let (_, updated) = self.swap_license(license, |current| {
            let mut change = match patch.status {
                Some(requested) => {
                    let next = lifecycle::attempt_transition(current.status, requested)?;
                    LicenseChange::transition(current, next, now)
                }
                None => LicenseChange::touch(now),
            };
            if let Some(expires_at) = patch.expires_at {
                change = change.with_expiry(expires_at);
            }
            Ok(change)
        })?;

        info!(license = %id, status = %updated.status, "license updated");
        Ok(updated)
    }

    /// Forces a status outside the transition table. Leaving `revoked` is
    /// still refused. Every applied override is recorded in the audit trail.
    pub fn override_status(
        &self,
        actor: &Actor,
        id: LicenseId,
        status: LicenseStatus,
        reason: Option<String>,
    ) -> LicenseResult<License> {
        let (license, _) = self.managed_license(actor, id)?;
        let now = self.clock.now();

        let (from, updated) = self.swap_license(license, |current| {
            let to = lifecycle::attempt_override(current.status, status)?;
            Ok(LicenseChange::transition(current, to, now))
        })?;
        let to = updated.status;

        let entry = AuditEntry {
            license_id: id,
            actor: actor.account,
            from,
            to,
            reason,
            at: now,
        };
        self.store.append_audit(&entry)?;
        warn!(
            target: "keyward::audit",
            license = %id,
            actor = %actor.account,
            %from,
            %to,
            reason = entry.reason.as_deref().unwrap_or(""),
            "license status overridden"
        );
        Ok(updated)
    }

    /// Override history of a license.
    pub fn audit_trail(&self, actor: &Actor, id: LicenseId) -> LicenseResult<Vec<AuditEntry>> {
        self.managed_license(actor, id)?;
        Ok(self.store.audit_trail(id)?)
    }

    /// Deletes a license.
    pub fn delete(&self, actor: &Actor, id: LicenseId) -> LicenseResult<()> {
        self.managed_license(actor, id)?;
        if !self.store.delete_license(id)? {
            return Err(LicenseError::NotFound(format!("license {id}")));
        }
        info!(license = %id, "license deleted");
        Ok(())
    }

    /// Pending licenses with a submitted identity, newest first, with the
    /// identity decrypted for review.
    pub fn pending_applications(&self, actor: &Actor) -> LicenseResult<Vec<PendingApplication>> {
        let applications = self.visible_applications(actor)?;
        let filter = LicenseFilter {
            applications: (!actor.is_admin).then(|| applications.keys().copied().collect()),
            status: Some(LicenseStatus::Pending),
            has_identity: Some(true),
            ..LicenseFilter::default()
        };
        let (licenses, _) = self.store.list_licenses(&filter, 0, None)?;
        Ok(licenses
            .iter()
            .map(|l| PendingApplication::build(&self.vault, l, applications.get(&l.application_id)))
            .collect())
    }

    // ── Scoping helpers ─────────────────────────────────────────

    fn visible_applications(
        &self,
        actor: &Actor,
    ) -> LicenseResult<HashMap<ApplicationId, Application>> {
        Ok(self
            .list_applications(actor)?
            .into_iter()
            .map(|a| (a.id, a))
            .collect())
    }

    /// Loads an application the actor may manage. Foreign applications are
    /// reported as missing.
    fn managed_application(&self, actor: &Actor, id: ApplicationId) -> LicenseResult<Application> {
        self.store
            .get_application(id)?
            .filter(|a| actor.can_manage(a))
            .ok_or_else(|| LicenseError::NotFound(format!("application {id}")))
    }

    /// Writes the change `plan` derives from the license, conditional on the
    /// status it was planned against. A concurrent status change reloads the
    /// license and plans again. Returns the status the change was applied
    /// over, with the stored result.
    fn swap_license(
        &self,
        mut current: License,
        mut plan: impl FnMut(&License) -> LicenseResult<LicenseChange>,
    ) -> LicenseResult<(LicenseStatus, License)> {
        let id = current.id;
        for attempt in 1..=MAX_SWAP_ATTEMPTS {
            let change = plan(&current)?;
            if let Some(updated) = self.store.compare_and_swap(id, current.status, &change)? {
                return Ok((current.status, updated));
            }
            debug!(license = %id, attempt, "license changed concurrently, re-planning");
            current = self
                .store
                .get_license(id)?
                .ok_or_else(|| LicenseError::NotFound(format!("license {id}")))?;
        }
        Err(LicenseError::Contended {
            attempts: MAX_SWAP_ATTEMPTS,
        })
    }

    fn managed_license(
        &self,
        actor: &Actor,
        id: LicenseId,
    ) -> LicenseResult<(License, Application)> {
        let not_found = || LicenseError::NotFound(format!("license {id}"));
        let license = self.store.get_license(id)?.ok_or_else(not_found)?;
        let application = self
            .store
            .get_application(license.application_id)?
            .filter(|a| actor.can_manage(a))
            .ok_or_else(not_found)?;
        Ok((license, application))
    }
}
