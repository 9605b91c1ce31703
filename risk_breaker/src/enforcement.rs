//! Enforcement state projection.
//!
//! `EnforcementState` is derived, never stored: it is a pure function of
//! the unresolved incidents and the active overrides, so re-deriving at
//! any time yields the same value.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::catalogue::TriggerAction;
use crate::incident::BreakerIncident;
use crate::overrides::BreakerOverride;
use crate::PartnerId;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnforcementState {
    pub global_block: bool,
    pub global_freeze: bool,
    pub require_manual_approval: bool,
    pub blocked_partner_ids: BTreeSet<PartnerId>,
    pub tightened_partner_ids: BTreeSet<PartnerId>,
    pub evaluated_at: u64,
}

impl EnforcementState {
    pub fn blocks(&self, partner_id: PartnerId) -> bool {
        self.global_block || self.global_freeze || self.blocked_partner_ids.contains(&partner_id)
    }
}

/// Union the actions of every enforcing incident that no active override
/// masks.
pub fn project(
    incidents: &[BreakerIncident],
    overrides: &[BreakerOverride],
    now: u64,
) -> EnforcementState {
    let mut state = EnforcementState {
        evaluated_at: now,
        ..Default::default()
    };

    for incident in incidents.iter().filter(|i| i.is_enforcing()) {
        if overrides.iter().any(|ov| ov.masks(incident, now)) {
            continue;
        }
        for action in &incident.actions_applied {
            match action {
                TriggerAction::BlockAllOriginations => state.global_block = true,
                TriggerAction::FreezeOriginations => state.global_freeze = true,
                TriggerAction::RequireManualApproval => state.require_manual_approval = true,
                TriggerAction::BlockPartnerOriginations => {
                    if let Some(partner) = incident.partner_id {
                        state.blocked_partner_ids.insert(partner);
                    }
                }
                TriggerAction::TightenTerms => {
                    if let Some(partner) = incident.partner_id {
                        state.tightened_partner_ids.insert(partner);
                    }
                }
            }
        }
    }

    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::Trigger;
    use crate::incident::IncidentStatus;

    fn incident(id: u64, trigger: Trigger, partner_id: Option<PartnerId>) -> BreakerIncident {
        let spec = trigger.spec();
        BreakerIncident {
            id,
            trigger,
            severity: spec.severity,
            scope: spec.scope,
            partner_id,
            metric_value: 1.0,
            threshold: spec.threshold,
            actions_applied: trigger.actions(),
            status: IncidentStatus::Open,
            opened_at: 0,
            acknowledged_at: None,
            resolved_at: None,
            acknowledged_by: None,
            resolved_by: None,
            note: None,
        }
    }

    #[test]
    fn partner_incident_blocks_that_partner_only() {
        let incidents = vec![incident(1, Trigger::PartnerDefaultRate30D, Some(5))];
        let state = project(&incidents, &[], 100);
        assert!(!state.global_block);
        assert!(state.blocks(5));
        assert!(!state.blocks(6));
    }

    #[test]
    fn settlement_incident_blocks_everything() {
        let incidents = vec![incident(1, Trigger::FiatConfirmedNoChainRecord, None)];
        let state = project(&incidents, &[], 100);
        assert!(state.global_block);
        assert!(state.blocks(1));
        assert!(state.blocks(999));
    }

    #[test]
    fn resolved_incidents_do_not_project() {
        let mut inc = incident(1, Trigger::PoolLiquidityRatio, None);
        inc.status = IncidentStatus::Resolved;
        let state = project(&[inc], &[], 100);
        assert_eq!(state, EnforcementState { evaluated_at: 100, ..Default::default() });
    }

    #[test]
    fn projection_is_a_pure_function_of_inputs() {
        let incidents = vec![
            incident(1, Trigger::PartnerDefaultRate30D, Some(1)),
            incident(2, Trigger::PoolNavDrawdown7D, None),
            incident(3, Trigger::PartnerDelinquency14D, Some(2)),
        ];
        let a = project(&incidents, &[], 42);
        let b = project(&incidents, &[], 42);
        assert_eq!(a, b);
        assert!(a.global_freeze);
        assert!(a.require_manual_approval);
        assert_eq!(a.blocked_partner_ids.len(), 1);
        assert_eq!(a.tightened_partner_ids.len(), 1);
    }
}
