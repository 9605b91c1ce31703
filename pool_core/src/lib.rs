//! Pool Core - Tranched Pool Accounting Engine
//!
//! Two-tranche (Senior/Junior) capital pool: deposits, instant and queued
//! withdrawals, loan allocations, repayment waterfalls, bottom-up loss
//! absorption, and the numbered runtime invariants behind
//! [`pool::TranchePool::check_invariants`].
//!
//! The waterfall kernels in [`waterfall`] are pure and are shared with the
//! offline stress simulator, so live and simulated behavior cannot drift.
//!
//! All mutating operations take `&mut self` on [`pool::TranchePool`]: the
//! single-writer contract is visible in the types. Callers that need
//! concurrent access wrap the pool in their own lock.

pub mod config;
pub mod errors;
pub mod events;
pub mod math;
pub mod pool;
pub mod queue;
pub mod tranche;
pub mod waterfall;

#[cfg(test)]
mod tests;

pub use config::PoolConfig;
pub use errors::{MathError, PoolError};
pub use events::PoolEvent;
pub use pool::{LoanSink, NoopRiskHook, RiskHook, TranchePool};
pub use queue::{WithdrawQueue, WithdrawRequest};
pub use tranche::{HolderId, LoanId, Position, TrancheId, TrancheState};
pub use waterfall::{apply_loss, apply_recovery, LossOutcome, RecoveryOutcome};

/// Basis point denominator.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Fixed-point scale for share prices (18 decimals).
pub const SHARE_SCALE: u128 = 1_000_000_000_000_000_000;

/// Decimals of the settlement token.
pub const TOKEN_DECIMALS: u32 = 6;

/// Seconds in the interest-accrual year.
pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;

/// Maximum open withdrawal requests per holder per tranche.
pub const MAX_OPEN_REQUESTS: u32 = 50;
