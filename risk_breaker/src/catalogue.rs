//! Static trigger catalogue.
//!
//! Each trigger binds a severity, a scope, the enforcement actions it
//! applies, and a numerical threshold. Thresholds compare strictly: a
//! metric sitting exactly on its threshold does not fire.

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    ActiveWithoutDisbursementProof,
    FiatConfirmedNoChainRecord,
    PartnerDefaultRate30D,
    PartnerDelinquency14D,
    PoolLiquidityRatio,
    PoolNavDrawdown7D,
    JuniorDepletion,
    SeniorDrawdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    Global,
    Pool,
    Partner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerAction {
    BlockAllOriginations,
    FreezeOriginations,
    RequireManualApproval,
    BlockPartnerOriginations,
    TightenTerms,
}

/// Maximum actions any single trigger applies.
pub const MAX_ACTIONS: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct TriggerSpec {
    pub trigger: Trigger,
    pub severity: Severity,
    pub scope: Scope,
    pub actions: &'static [TriggerAction],
    pub threshold: f64,
}

pub static CATALOGUE: &[TriggerSpec] = &[
    TriggerSpec {
        trigger: Trigger::ActiveWithoutDisbursementProof,
        severity: Severity::Critical,
        scope: Scope::Global,
        actions: &[TriggerAction::BlockAllOriginations],
        threshold: 0.0,
    },
    TriggerSpec {
        trigger: Trigger::FiatConfirmedNoChainRecord,
        severity: Severity::Critical,
        scope: Scope::Global,
        actions: &[TriggerAction::BlockAllOriginations],
        threshold: 0.0,
    },
    TriggerSpec {
        trigger: Trigger::PartnerDefaultRate30D,
        severity: Severity::High,
        scope: Scope::Partner,
        actions: &[TriggerAction::BlockPartnerOriginations],
        threshold: 0.08,
    },
    TriggerSpec {
        trigger: Trigger::PartnerDelinquency14D,
        severity: Severity::Warning,
        scope: Scope::Partner,
        actions: &[TriggerAction::TightenTerms],
        threshold: 0.15,
    },
    TriggerSpec {
        trigger: Trigger::PoolLiquidityRatio,
        severity: Severity::Warning,
        scope: Scope::Pool,
        actions: &[TriggerAction::FreezeOriginations],
        threshold: 0.25,
    },
    TriggerSpec {
        trigger: Trigger::PoolNavDrawdown7D,
        severity: Severity::High,
        scope: Scope::Pool,
        actions: &[
            TriggerAction::FreezeOriginations,
            TriggerAction::RequireManualApproval,
        ],
        threshold: 0.02,
    },
    TriggerSpec {
        trigger: Trigger::JuniorDepletion,
        severity: Severity::Critical,
        scope: Scope::Pool,
        actions: &[TriggerAction::BlockAllOriginations],
        threshold: 0.0,
    },
    TriggerSpec {
        trigger: Trigger::SeniorDrawdown,
        severity: Severity::Critical,
        scope: Scope::Pool,
        actions: &[
            TriggerAction::BlockAllOriginations,
            TriggerAction::RequireManualApproval,
        ],
        threshold: 0.0,
    },
];

impl Trigger {
    /// Stable wire key.
    pub fn key(self) -> &'static str {
        match self {
            Trigger::ActiveWithoutDisbursementProof => "ACTIVE_WITHOUT_DISBURSEMENT_PROOF",
            Trigger::FiatConfirmedNoChainRecord => "FIAT_CONFIRMED_NO_CHAIN_RECORD",
            Trigger::PartnerDefaultRate30D => "PARTNER_DEFAULT_RATE_30D",
            Trigger::PartnerDelinquency14D => "PARTNER_DELINQUENCY_14D",
            Trigger::PoolLiquidityRatio => "POOL_LIQUIDITY_RATIO",
            Trigger::PoolNavDrawdown7D => "POOL_NAV_DRAWDOWN_7D",
            Trigger::JuniorDepletion => "JUNIOR_DEPLETION",
            Trigger::SeniorDrawdown => "SENIOR_DRAWDOWN",
        }
    }

    /// Total parse of a wire key.
    pub fn from_key(key: &str) -> Option<Trigger> {
        CATALOGUE
            .iter()
            .map(|spec| spec.trigger)
            .find(|t| t.key() == key)
    }

    pub fn spec(self) -> &'static TriggerSpec {
        CATALOGUE
            .iter()
            .find(|spec| spec.trigger == self)
            .expect("every trigger variant has a catalogue entry")
    }

    pub fn actions(self) -> ArrayVec<TriggerAction, MAX_ACTIONS> {
        self.spec().actions.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_trigger_has_a_catalogue_entry() {
        for trigger in [
            Trigger::ActiveWithoutDisbursementProof,
            Trigger::FiatConfirmedNoChainRecord,
            Trigger::PartnerDefaultRate30D,
            Trigger::PartnerDelinquency14D,
            Trigger::PoolLiquidityRatio,
            Trigger::PoolNavDrawdown7D,
            Trigger::JuniorDepletion,
            Trigger::SeniorDrawdown,
        ] {
            let spec = trigger.spec();
            assert_eq!(spec.trigger, trigger);
            assert!(!spec.actions.is_empty());
            assert!(spec.actions.len() <= MAX_ACTIONS);
        }
    }

    #[test]
    fn key_round_trips() {
        for spec in CATALOGUE {
            assert_eq!(Trigger::from_key(spec.trigger.key()), Some(spec.trigger));
        }
        assert_eq!(Trigger::from_key("NOT_A_TRIGGER"), None);
    }

    #[test]
    fn credit_thresholds_match_policy() {
        assert_eq!(Trigger::PartnerDefaultRate30D.spec().threshold, 0.08);
        assert_eq!(Trigger::PartnerDelinquency14D.spec().threshold, 0.15);
        assert_eq!(Trigger::PoolLiquidityRatio.spec().threshold, 0.25);
        assert_eq!(Trigger::PoolNavDrawdown7D.spec().threshold, 0.02);
    }
}
