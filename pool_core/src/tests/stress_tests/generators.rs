//! Proptest strategies for pool operation sequences.

use proptest::prelude::*;

use super::Operation;
use crate::tranche::{HolderId, LoanId, TrancheId};

const MAX_AMOUNT: u128 = 10_000_000_000; // 10k tokens at 6 decimals

fn tranche() -> impl Strategy<Value = TrancheId> {
    prop_oneof![Just(TrancheId::Senior), Just(TrancheId::Junior)]
}

fn holder() -> impl Strategy<Value = HolderId> {
    (1u64..=8).prop_map(HolderId)
}

fn loan() -> impl Strategy<Value = LoanId> {
    (1u64..=3).prop_map(LoanId)
}

pub fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        4 => (tranche(), holder(), 1u128..MAX_AMOUNT)
            .prop_map(|(tranche, holder, amount)| Operation::Deposit {
                tranche,
                holder,
                amount,
            }),
        3 => (tranche(), holder(), 1u128..MAX_AMOUNT)
            .prop_map(|(tranche, holder, shares)| Operation::Withdraw {
                tranche,
                holder,
                shares,
            }),
        2 => (tranche(), holder(), 1u128..MAX_AMOUNT)
            .prop_map(|(tranche, holder, shares)| Operation::RequestWithdraw {
                tranche,
                holder,
                shares,
            }),
        1 => (tranche(), holder(), 0u64..16)
            .prop_map(|(tranche, holder, index)| Operation::CancelWithdraw {
                tranche,
                holder,
                index,
            }),
        2 => (tranche(), 0u64..16)
            .prop_map(|(tranche, index)| Operation::FulfillWithdraw { tranche, index }),
        2 => (loan(), 1u128..MAX_AMOUNT)
            .prop_map(|(loan, amount)| Operation::Allocate { loan, amount }),
        2 => (loan(), 0u128..MAX_AMOUNT, 0u128..MAX_AMOUNT / 100)
            .prop_map(|(loan, principal, interest)| Operation::Repay {
                loan,
                principal,
                interest,
            }),
        1 => (loan(), 1u128..MAX_AMOUNT)
            .prop_map(|(loan, write_off)| Operation::RecordBadDebt { loan, write_off }),
        1 => (loan(), 1u128..MAX_AMOUNT)
            .prop_map(|(loan, amount)| Operation::Recovery { loan, amount }),
        1 => Just(Operation::Unpause),
    ]
}

pub fn operation_sequence(len: usize) -> impl Strategy<Value = Vec<Operation>> {
    prop::collection::vec(operation(), 1..=len)
}
