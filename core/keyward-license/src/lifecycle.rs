//! The license status state machine.
//!
//! ```text
//!             approve / edit
//!   pending ─────────────────▶ active ───(now > expires_at)──▶ expired
//!      │                         │                               │
//!      └────────────┬────────────┴───────────────────────────────┘
//!                   ▼
//!                revoked   (terminal)
//! ```
//!
//! The default update path goes through [`attempt_transition`]. Operators
//! that need to step outside the table (for example re-activating an expired
//! license) use [`attempt_override`], which callers must audit.

use crate::error::{LicenseError, LicenseResult};
use crate::model::License;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of an issued license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    /// Issued, not yet activated.
    Pending,
    /// In use.
    Active,
    /// Time-bounded and past its expiry.
    Expired,
    /// Permanently disabled.
    Revoked,
}

impl LicenseStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [LicenseStatus; 4] = [
        LicenseStatus::Pending,
        LicenseStatus::Active,
        LicenseStatus::Expired,
        LicenseStatus::Revoked,
    ];

    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }

    /// Returns true if no transition leaves this status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Revoked)
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LicenseStatus {
    type Err = LicenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| LicenseError::Validation(format!("unknown license status: {s}")))
    }
}

/// Transitions permitted on the regular (non-override) path.
const ALLOWED: &[(LicenseStatus, LicenseStatus)] = &[
    (LicenseStatus::Pending, LicenseStatus::Active),
    (LicenseStatus::Pending, LicenseStatus::Revoked),
    (LicenseStatus::Active, LicenseStatus::Expired),
    (LicenseStatus::Active, LicenseStatus::Revoked),
    (LicenseStatus::Expired, LicenseStatus::Revoked),
];

/// Returns true if `from → to` is in the allow-list. Staying put is always
/// allowed.
#[must_use]
pub fn is_allowed(from: LicenseStatus, to: LicenseStatus) -> bool {
    from == to || ALLOWED.contains(&(from, to))
}

/// Validates a regular status change against the allow-list.
pub fn attempt_transition(
    current: LicenseStatus,
    requested: LicenseStatus,
) -> LicenseResult<LicenseStatus> {
    if is_allowed(current, requested) {
        Ok(requested)
    } else {
        Err(LicenseError::invalid_state(
            current,
            format!("transition to {requested}"),
        ))
    }
}

/// Validates an administrative override. Anything goes except leaving
/// `revoked`.
pub fn attempt_override(
    current: LicenseStatus,
    requested: LicenseStatus,
) -> LicenseResult<LicenseStatus> {
    if current.is_terminal() && current != requested {
        return Err(LicenseError::invalid_state(
            current,
            format!("override to {requested}"),
        ));
    }
    Ok(requested)
}

/// Returns true if `expires_at` is set and strictly before `now`.
#[must_use]
pub fn is_past(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    matches!(expires_at, Some(at) if now > at)
}

/// Returns true if a verification at `now` should move `license` from
/// `active` to `expired`.
#[must_use]
pub fn expiry_due(license: &License, now: DateTime<Utc>) -> bool {
    license.status == LicenseStatus::Active && is_past(license.expires_at, now)
}
