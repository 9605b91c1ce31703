//! Drift gate against a pinned baseline.

use serde::{Deserialize, Serialize};

use crate::aggregate::ConfigRecord;

/// Acceptance ceiling: senior-impairment probability may rise at most
/// 0.75 percentage points over the baseline.
pub const MAX_SENIOR_IMPAIRMENT_DRIFT_PP: f64 = 0.75;

/// The pinned numbers a release candidate is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Baseline {
    pub version: u32,
    pub mean_senior_impairment_probability: f64,
    pub mean_junior_depletion_probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftReport {
    pub current_senior_impairment: f64,
    pub baseline_senior_impairment: f64,
    /// Percentage points, positive when the candidate is worse.
    pub senior_impairment_drift_pp: f64,
    pub invariants_all_zero: bool,
    pub gate_passed: bool,
}

pub fn mean_senior_impairment(records: &[ConfigRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    records
        .iter()
        .map(|r| r.senior_impairment_probability)
        .sum::<f64>()
        / records.len() as f64
}

pub fn mean_junior_depletion(records: &[ConfigRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    records
        .iter()
        .map(|r| r.junior_depletion_probability)
        .sum::<f64>()
        / records.len() as f64
}

/// Compare the candidate sweep against the baseline. The gate passes iff
/// the impairment drift stays within the ceiling and every invariant
/// counter is zero.
pub fn evaluate_drift(
    records: &[ConfigRecord],
    baseline: &Baseline,
    invariants_all_zero: bool,
) -> DriftReport {
    let current = mean_senior_impairment(records);
    let drift_pp = (current - baseline.mean_senior_impairment_probability) * 100.0;
    DriftReport {
        current_senior_impairment: current,
        baseline_senior_impairment: baseline.mean_senior_impairment_probability,
        senior_impairment_drift_pp: drift_pp,
        invariants_all_zero,
        gate_passed: drift_pp <= MAX_SENIOR_IMPAIRMENT_DRIFT_PP && invariants_all_zero,
    }
}
