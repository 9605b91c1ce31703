//! Randomized operation-sequence stress tests.
//!
//! Drives the real `TranchePool` with generated operation interleavings
//! and checks the full invariant self-audit after every step.

mod generators;
mod tests;

use crate::errors::PoolError;
use crate::pool::LoanSink;
use crate::tranche::{HolderId, LoanId, TrancheId};

/// Loan stub that accepts all funding.
pub struct TestLoan {
    pub paused: bool,
}

impl LoanSink for TestLoan {
    fn pool_fund(&mut self, _amount: u128) -> Result<(), PoolError> {
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }
}

#[derive(Debug, Clone)]
pub enum Operation {
    Deposit {
        tranche: TrancheId,
        holder: HolderId,
        amount: u128,
    },
    Withdraw {
        tranche: TrancheId,
        holder: HolderId,
        shares: u128,
    },
    RequestWithdraw {
        tranche: TrancheId,
        holder: HolderId,
        shares: u128,
    },
    CancelWithdraw {
        tranche: TrancheId,
        holder: HolderId,
        index: u64,
    },
    FulfillWithdraw {
        tranche: TrancheId,
        index: u64,
    },
    Allocate {
        loan: LoanId,
        amount: u128,
    },
    Repay {
        loan: LoanId,
        principal: u128,
        interest: u128,
    },
    RecordBadDebt {
        loan: LoanId,
        write_off: u128,
    },
    Recovery {
        loan: LoanId,
        amount: u128,
    },
    Unpause,
}
