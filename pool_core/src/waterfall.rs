//! Waterfall primitives: loss absorption and recovery re-crediting.
//!
//! Both functions are pure and total. They are the shared kernel between
//! the live pool engine and the offline stress simulator.

use serde::{Deserialize, Serialize};

/// Result of absorbing a loss across the two tranches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LossOutcome {
    pub junior_after: u128,
    pub senior_after: u128,
    pub junior_absorbed: u128,
    pub senior_absorbed: u128,
    /// Loss neither tranche could absorb. Nonzero residual means the pool
    /// is insolvent at the protocol level; the simulator flags it.
    pub residual: u128,
}

/// Result of crediting a recovery back across the two tranches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryOutcome {
    pub junior_after: u128,
    pub senior_after: u128,
    pub senior_recovered: u128,
    pub junior_recovered: u128,
    /// Recovery beyond both tranches' absorbed losses, credited to Junior.
    pub junior_bonus: u128,
}

/// Absorb `loss` bottom-up: Junior first up to its balance, then Senior,
/// anything left is residual.
///
/// `junior_absorbed + senior_absorbed + residual == loss` always.
pub fn apply_loss(junior: u128, senior: u128, loss: u128) -> LossOutcome {
    let junior_absorbed = loss.min(junior);
    let remainder = loss - junior_absorbed;
    let senior_absorbed = remainder.min(senior);
    let residual = remainder - senior_absorbed;
    LossOutcome {
        junior_after: junior - junior_absorbed,
        senior_after: senior - senior_absorbed,
        junior_absorbed,
        senior_absorbed,
        residual,
    }
}

/// Credit `recovery` top-down: Senior was impaired last, so it is made
/// whole first (up to `senior_loss_absorbed`), then Junior (up to
/// `junior_loss_absorbed`); any residual lands on Junior as a bonus.
///
/// `senior_recovered + junior_recovered + junior_bonus == recovery` always.
pub fn apply_recovery(
    junior: u128,
    senior: u128,
    junior_loss_absorbed: u128,
    senior_loss_absorbed: u128,
    recovery: u128,
) -> RecoveryOutcome {
    let senior_recovered = recovery.min(senior_loss_absorbed);
    let after_senior = recovery - senior_recovered;
    let junior_recovered = after_senior.min(junior_loss_absorbed);
    let junior_bonus = after_senior - junior_recovered;
    RecoveryOutcome {
        junior_after: junior
            .saturating_add(junior_recovered)
            .saturating_add(junior_bonus),
        senior_after: senior.saturating_add(senior_recovered),
        senior_recovered,
        junior_recovered,
        junior_bonus,
    }
}
