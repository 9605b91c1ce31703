//! Tranche identity and per-tranche / per-holder state.

use serde::{Deserialize, Serialize};

/// Exactly two risk layers. Junior absorbs losses first; Senior carries a
/// target yield cap.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum TrancheId {
    Senior,
    Junior,
}

impl TrancheId {
    pub fn other(self) -> Self {
        match self {
            TrancheId::Senior => TrancheId::Junior,
            TrancheId::Junior => TrancheId::Senior,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrancheId::Senior => "senior",
            TrancheId::Junior => "junior",
        }
    }
}

/// Opaque holder identity. Custody and addressing live outside the pool
/// boundary; the engine only needs a stable key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct HolderId(pub u64);

/// Opaque handle of a registered loan contract.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct LoanId(pub u64);

/// Accounting state of one tranche.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrancheState {
    /// Outstanding shares.
    pub total_shares: u128,
    /// Cash attributed to this tranche inside the pool.
    pub virtual_balance: u128,
    /// Principal routed out of this tranche to loans, still outstanding.
    pub principal_allocated: u128,
    /// Cumulative written-off principal absorbed by this tranche.
    pub bad_debt: u128,
    /// Cumulative interest credited.
    pub interest_earned: u128,
    /// Per-repayment interest cap, Senior only (0 on Junior).
    pub target_yield_bps: u32,
    /// Maximum virtual balance; 0 means unlimited.
    pub deposit_cap: u128,
}

impl TrancheState {
    /// NAV used for share conversions: cash claim plus outstanding
    /// principal at par. Write-offs have already been removed from both
    /// terms when they were recorded.
    pub fn nav(&self) -> u128 {
        self.virtual_balance.saturating_add(self.principal_allocated)
    }
}

/// Per-holder per-tranche position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub shares: u128,
    /// Shares locked behind open withdrawal requests.
    pub pending_shares: u128,
    pub open_request_count: u32,
    /// Index of the holder's most recent open request, the O(1)
    /// coalescing hint.
    pub last_open_request_index: Option<u64>,
}

impl Position {
    pub fn free_shares(&self) -> u128 {
        self.shares.saturating_sub(self.pending_shares)
    }
}
