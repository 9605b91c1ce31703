//! Pool event log.
//!
//! Every mutating operation appends an event; the embedding service drains
//! them after each command and fans them out.

use serde::{Deserialize, Serialize};

use crate::tranche::{HolderId, LoanId, TrancheId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolEvent {
    Deposit {
        tranche: TrancheId,
        holder: HolderId,
        assets: u128,
        shares: u128,
    },
    Withdraw {
        tranche: TrancheId,
        holder: HolderId,
        assets: u128,
        shares: u128,
    },
    WithdrawRequested {
        tranche: TrancheId,
        holder: HolderId,
        shares: u128,
        request_index: u64,
        coalesced: bool,
    },
    WithdrawCancelled {
        tranche: TrancheId,
        holder: HolderId,
        request_index: u64,
        shares: u128,
    },
    WithdrawFulfilled {
        tranche: TrancheId,
        holder: HolderId,
        request_index: u64,
        assets: u128,
        shares: u128,
    },
    LoanAllocated {
        loan: LoanId,
        amount: u128,
        senior_part: u128,
        junior_part: u128,
    },
    RepaymentApplied {
        loan: LoanId,
        principal: u128,
        senior_interest: u128,
        junior_interest: u128,
    },
    BadDebtRecorded {
        loan: LoanId,
        write_off: u128,
        junior_absorbed: u128,
        senior_absorbed: u128,
        residual: u128,
    },
    RecoveryApplied {
        loan: LoanId,
        amount: u128,
        senior_recovered: u128,
        junior_recovered: u128,
        junior_bonus: u128,
    },
    SeniorImpairmentDetected {
        loan: LoanId,
        senior_bad_debt: u128,
    },
    JuniorDepleted,
    StressModeSet {
        active: bool,
    },
    SeniorPriorityCleared {
        auto_expired: bool,
    },
    Paused,
    Unpaused,
    LaunchParametersLocked,
}
