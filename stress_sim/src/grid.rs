//! Sweep configuration grid and configuration identity.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Withdrawal-pressure tier. Doubles as the stressed default-rate axis:
/// heavier redemption pressure is simulated together with a hotter base
/// default rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WithdrawalSensitivity {
    Low,
    Medium,
    High,
}

impl WithdrawalSensitivity {
    /// Base annualized default rate for the tier.
    pub fn base_default_rate(self) -> f64 {
        match self {
            WithdrawalSensitivity::Low => 0.02,
            WithdrawalSensitivity::Medium => 0.05,
            WithdrawalSensitivity::High => 0.10,
        }
    }

    /// Redemption pressure factor in [0, 1].
    pub fn pressure(self) -> f64 {
        match self {
            WithdrawalSensitivity::Low => 0.2,
            WithdrawalSensitivity::Medium => 0.5,
            WithdrawalSensitivity::High => 0.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CorrelationLevel {
    None,
    Low,
    Moderate,
    High,
    Extreme,
}

impl CorrelationLevel {
    pub fn coefficient(self) -> f64 {
        match self {
            CorrelationLevel::None => 0.0,
            CorrelationLevel::Low => 0.2,
            CorrelationLevel::Moderate => 0.45,
            CorrelationLevel::High => 0.7,
            CorrelationLevel::Extreme => 0.9,
        }
    }
}

/// One point of the sweep grid. Field order is the canonical JSON order;
/// the configuration identity hashes exactly this serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimConfig {
    pub senior_allocation_bps: u32,
    pub junior_coverage_floor_bps: u32,
    pub recovery_rate: f64,
    pub withdrawal_sensitivity: WithdrawalSensitivity,
    pub correlation_level: CorrelationLevel,
    #[serde(default = "default_priority_window")]
    pub senior_priority_window_hours: u32,
}

fn default_priority_window() -> u32 {
    24
}

impl SimConfig {
    /// Canonical JSON: serde struct field order, no whitespace.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).expect("config serialization is infallible")
    }

    /// SHA-1 prefix of the canonical JSON.
    pub fn config_id(&self) -> String {
        let digest = Sha1::digest(self.canonical_json().as_bytes());
        hex_prefix(&digest, 12)
    }
}

fn hex_prefix(bytes: &[u8], len: usize) -> String {
    let mut out = String::with_capacity(len);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
        if out.len() >= len {
            break;
        }
    }
    out.truncate(len);
    out
}

/// Full cross-product sweep grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepGrid {
    pub senior_allocation_bps: Vec<u32>,
    pub junior_coverage_floor_bps: Vec<u32>,
    pub recovery_rate: Vec<f64>,
    pub withdrawal_sensitivity: Vec<WithdrawalSensitivity>,
    pub correlation_level: Vec<CorrelationLevel>,
    pub senior_priority_window_hours: Vec<u32>,
}

impl Default for SweepGrid {
    fn default() -> Self {
        Self {
            senior_allocation_bps: vec![5_000, 6_000, 6_500, 7_000, 7_500, 8_000, 9_000],
            junior_coverage_floor_bps: vec![1_000, 1_500, 2_000],
            recovery_rate: vec![0.0, 0.2, 0.4, 0.5, 0.6, 0.8],
            withdrawal_sensitivity: vec![
                WithdrawalSensitivity::Low,
                WithdrawalSensitivity::Medium,
                WithdrawalSensitivity::High,
            ],
            correlation_level: vec![
                CorrelationLevel::None,
                CorrelationLevel::Low,
                CorrelationLevel::Moderate,
                CorrelationLevel::High,
                CorrelationLevel::Extreme,
            ],
            senior_priority_window_hours: vec![12, 24, 48, 72, 168],
        }
    }
}

impl SweepGrid {
    /// Reduced grid for smoke runs and tests.
    pub fn smoke() -> Self {
        Self {
            senior_allocation_bps: vec![7_000, 8_000],
            junior_coverage_floor_bps: vec![1_500],
            recovery_rate: vec![0.4],
            withdrawal_sensitivity: vec![WithdrawalSensitivity::Medium],
            correlation_level: vec![CorrelationLevel::Moderate],
            senior_priority_window_hours: vec![24],
        }
    }

    /// Expand the cross-product in a fixed nesting order, so configuration
    /// indices are stable across runs.
    pub fn expand(&self) -> Vec<SimConfig> {
        let mut configs = Vec::with_capacity(self.len());
        for &senior_allocation_bps in &self.senior_allocation_bps {
            for &junior_coverage_floor_bps in &self.junior_coverage_floor_bps {
                for &recovery_rate in &self.recovery_rate {
                    for &withdrawal_sensitivity in &self.withdrawal_sensitivity {
                        for &correlation_level in &self.correlation_level {
                            for &senior_priority_window_hours in
                                &self.senior_priority_window_hours
                            {
                                configs.push(SimConfig {
                                    senior_allocation_bps,
                                    junior_coverage_floor_bps,
                                    recovery_rate,
                                    withdrawal_sensitivity,
                                    correlation_level,
                                    senior_priority_window_hours,
                                });
                            }
                        }
                    }
                }
            }
        }
        configs
    }

    pub fn len(&self) -> usize {
        self.senior_allocation_bps.len()
            * self.junior_coverage_floor_bps.len()
            * self.recovery_rate.len()
            * self.withdrawal_sensitivity.len()
            * self.correlation_level.len()
            * self.senior_priority_window_hours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// SHA-1 over the grid's canonical JSON.
    pub fn grid_hash(&self) -> String {
        let json = serde_json::to_string(self).expect("grid serialization is infallible");
        let digest = Sha1::digest(json.as_bytes());
        hex_prefix(&digest, 40)
    }
}
