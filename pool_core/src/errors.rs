//! Pool error taxonomy.
//!
//! Capacity errors carry the quantity missed; state errors name the state
//! that blocked the call; authorization errors stay opaque.

use thiserror::Error;

/// Arithmetic failures from the fixed-point kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("arithmetic overflow")]
    ArithmeticOverflow,
    #[error("division by zero")]
    DivisionByZero,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    // --- input ---
    #[error("amount must be greater than zero")]
    ZeroAmount,
    #[error("senior allocation ratio {bps} bps outside [5000, 9000]")]
    AllocationRatioOutOfBounds { bps: u32 },
    #[error("withdrawal request {index} does not exist")]
    RequestNotFound { index: u64 },

    // --- authorization ---
    #[error("unauthorized")]
    Unauthorized,

    // --- state ---
    #[error("pool is paused")]
    EnforcedPause,
    #[error("pool is in stress mode")]
    StressModeLocked,
    #[error("senior priority is active; junior fulfillment is deferred")]
    SeniorPriorityActive,
    #[error("launch parameters are locked")]
    LaunchParametersLocked,
    #[error("withdrawal request is no longer open")]
    InvalidRequestState,
    #[error("loan is paused")]
    LoanPaused,

    // --- capacity ---
    #[error("insufficient shares: requested {requested}, held {held}")]
    InsufficientShares { requested: u128, held: u128 },
    #[error("insufficient free shares: requested {requested}, free {free}")]
    InsufficientFreeShares { requested: u128, free: u128 },
    #[error("insufficient liquidity: needed {needed}, available {available}")]
    InsufficientLiquidity { needed: u128, available: u128 },
    #[error("tranche deposit cap exceeded: cap {cap}, would hold {would_hold}")]
    TrancheDepositCapExceeded { cap: u128, would_hold: u128 },
    #[error("too many open requests: {open} of {max}")]
    TooManyOpenRequests { open: u32, max: u32 },
    #[error("coverage floor breached: {actual_bps} bps < floor {floor_bps} bps")]
    CoverageFloorBreached { actual_bps: u32, floor_bps: u32 },
    #[error("subordination too low: {actual_bps} bps < required {required_bps} bps")]
    SubordinationTooLow { actual_bps: u32, required_bps: u32 },

    // --- accounting ---
    #[error("arithmetic overflow")]
    ArithmeticOverflow,
}

impl From<MathError> for PoolError {
    fn from(_: MathError) -> Self {
        PoolError::ArithmeticOverflow
    }
}
