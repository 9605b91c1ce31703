//! Time-bound administrative overrides.
//!
//! Write-once, lift-once records that mask the enforcement effect of a
//! specific trigger (and partner, when scoped) until expiry or lift.

use serde::{Deserialize, Serialize};

use crate::catalogue::{Scope, Trigger};
use crate::incident::BreakerIncident;
use crate::PartnerId;

/// 7 days.
pub const MAX_OVERRIDE_TTL_MINUTES: u64 = 10_080;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerOverride {
    pub id: u64,
    pub trigger: Trigger,
    pub scope: Scope,
    pub partner_id: Option<PartnerId>,
    pub reason: String,
    pub operator: String,
    pub created_at: u64,
    pub expires_at: u64,
    pub lifted_at: Option<u64>,
    pub lifted_by: Option<String>,
}

impl BreakerOverride {
    pub fn is_active(&self, now: u64) -> bool {
        self.lifted_at.is_none() && now < self.expires_at
    }

    /// Whether this override suppresses the given incident's enforcement.
    /// Trigger and partner identity must both match.
    pub fn masks(&self, incident: &BreakerIncident, now: u64) -> bool {
        self.is_active(now)
            && self.trigger == incident.trigger
            && self.partner_id == incident.partner_id
    }
}
