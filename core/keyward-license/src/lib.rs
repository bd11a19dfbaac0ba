//! Licensing core for Keyward.
//!
//! This crate handles:
//! - Per-application key formats and key generation/validation
//! - The license status state machine
//! - The public client workflow (apply, verify, pending keys)
//! - Owner and admin management (applications, issuance, review, overrides)
//!
//! # Design Principles
//!
//! - **Storage-agnostic**: all persistence goes through [`LicenseStore`]
//! - **Atomic review**: approval and rejection are conditional writes, so a
//!   pending license is processed at most once
//! - **Sealed identities**: holder identities are encrypted at rest and only
//!   opened on authenticated read paths
//!
//! # License Key Format
//!
//! Keys are formatted as `prefix + segment (- segment)* + - + digit`, for
//! example `LS-7KQ2M-ZP4HX-W9RTA-3`. See [`codec`] for details.

pub mod codec;
mod error;
mod format;
mod lifecycle;
mod model;
mod registry;
mod responses;
mod store;
mod view;
mod workflow;

pub use codec::{ALPHABET, KeyDefect, checksum_digit};
pub use error::{LicenseError, LicenseResult};
pub use format::{
    FormatError, KeyFormat, MAX_PREFIX_LEN, MAX_SEGMENT_LENGTH, MAX_SEGMENTS, MIN_SEGMENT_LENGTH,
    MIN_SEGMENTS,
};
pub use lifecycle::{
    LicenseStatus, attempt_override, attempt_transition, expiry_due, is_allowed, is_past,
};
pub use model::{
    Actor, Application, ApplicationDraft, ApplicationPatch, AuditEntry, License, LicenseChange,
    LicenseFilter, LicensePatch, StatusCounts,
};
pub use registry::{IssuancePolicy, LicenseQuery, LicenseRegistry, MAX_BATCH, MAX_PAGE_SIZE};
pub use responses::{
    AppliedLicense, ApplyResponse, ErrorResponse, PendingKey, PendingKeysResponse, VerifyResponse,
};
pub use store::{LicenseStore, MemoryStore, StoreError, StoreResult};
pub use view::{
    ApplicationDetail, ApplicationSummary, IdentityView, LicenseStats, LicenseView, Page,
    PendingApplication,
};
pub use workflow::{ActivationWorkflow, Decision, Verification};
