//! Incident records and lifecycle.

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

use crate::catalogue::{Scope, Severity, Trigger, TriggerAction, MAX_ACTIONS};
use crate::PartnerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncidentStatus {
    Open,
    Acknowledged,
    Resolved,
}

/// A fired trigger. Created by evaluation, mutated only by admin
/// acknowledge/resolve or liquidity auto-clear, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerIncident {
    pub id: u64,
    pub trigger: Trigger,
    pub severity: Severity,
    pub scope: Scope,
    pub partner_id: Option<PartnerId>,
    pub metric_value: f64,
    pub threshold: f64,
    pub actions_applied: ArrayVec<TriggerAction, MAX_ACTIONS>,
    pub status: IncidentStatus,
    pub opened_at: u64,
    pub acknowledged_at: Option<u64>,
    pub resolved_at: Option<u64>,
    pub acknowledged_by: Option<String>,
    pub resolved_by: Option<String>,
    pub note: Option<String>,
}

impl BreakerIncident {
    /// Still projecting into enforcement: anything not yet resolved.
    pub fn is_enforcing(&self) -> bool {
        self.status != IncidentStatus::Resolved
    }

    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.opened_at)
    }
}
