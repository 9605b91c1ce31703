//! Pool launch parameters.

use serde::{Deserialize, Serialize};

use crate::errors::PoolError;
use crate::MAX_OPEN_REQUESTS;

pub const MIN_SENIOR_ALLOCATION_BPS: u32 = 5_000;
pub const MAX_SENIOR_ALLOCATION_BPS: u32 = 9_000;

const THIRTY_DAYS_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Share of each allocation routed from the Senior tranche.
    pub senior_allocation_bps: u32,
    /// Minimum subordination ratio after a Senior deposit or Junior
    /// withdrawal.
    pub min_subordination_bps: u32,
    /// Minimum subordination ratio after any allocation.
    pub junior_coverage_floor_bps: u32,
    /// Senior per-repayment interest cap.
    pub senior_target_yield_bps: u32,
    /// Senior tranche deposit cap; 0 means unlimited.
    pub senior_deposit_cap: u128,
    /// Junior tranche deposit cap; 0 means unlimited.
    pub junior_deposit_cap: u128,
    /// Senior priority auto-expiry window.
    pub senior_priority_max_duration_secs: u64,
    /// Open withdrawal requests allowed per holder per tranche.
    pub max_open_requests: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            senior_allocation_bps: 7_500,
            min_subordination_bps: 2_000,
            junior_coverage_floor_bps: 1_500,
            senior_target_yield_bps: 800,
            senior_deposit_cap: 0,
            junior_deposit_cap: 0,
            senior_priority_max_duration_secs: THIRTY_DAYS_SECS,
            max_open_requests: MAX_OPEN_REQUESTS,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), PoolError> {
        validate_senior_allocation(self.senior_allocation_bps)?;
        Ok(())
    }
}

pub fn validate_senior_allocation(bps: u32) -> Result<(), PoolError> {
    if !(MIN_SENIOR_ALLOCATION_BPS..=MAX_SENIOR_ALLOCATION_BPS).contains(&bps) {
        return Err(PoolError::AllocationRatioOutOfBounds { bps });
    }
    Ok(())
}
