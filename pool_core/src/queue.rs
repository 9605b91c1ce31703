//! Per-tranche withdrawal queue.
//!
//! Append-only vector of requests with stable indices. Fulfillment is
//! index-addressable: out-of-order execution is permitted by design, the
//! caller owns the ordering policy. Terminal states are immutable.

use serde::{Deserialize, Serialize};

use crate::tranche::HolderId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub holder: HolderId,
    pub shares: u128,
    pub fulfilled: bool,
    pub cancelled: bool,
    pub created_at: u64,
}

impl WithdrawRequest {
    pub fn is_open(&self) -> bool {
        !self.fulfilled && !self.cancelled
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawQueue {
    requests: Vec<WithdrawRequest>,
}

impl WithdrawQueue {
    pub fn get(&self, index: u64) -> Option<&WithdrawRequest> {
        self.requests.get(index as usize)
    }

    pub fn get_mut(&mut self, index: u64) -> Option<&mut WithdrawRequest> {
        self.requests.get_mut(index as usize)
    }

    /// Append a fresh open request and return its index.
    pub fn push(&mut self, holder: HolderId, shares: u128, created_at: u64) -> u64 {
        self.requests.push(WithdrawRequest {
            holder,
            shares,
            fulfilled: false,
            cancelled: false,
            created_at,
        });
        (self.requests.len() - 1) as u64
    }

    /// Merge additional shares into the holder's request at `hint` if that
    /// request is still open and owned by the same holder. Returns whether
    /// the merge happened.
    pub fn coalesce_into(&mut self, hint: u64, holder: HolderId, shares: u128) -> bool {
        match self.requests.get_mut(hint as usize) {
            Some(req) if req.is_open() && req.holder == holder => {
                req.shares = req.shares.saturating_add(shares);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> u64 {
        self.requests.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &WithdrawRequest)> {
        self.requests
            .iter()
            .enumerate()
            .map(|(i, r)| (i as u64, r))
    }

    pub fn open_shares_of(&self, holder: HolderId) -> u128 {
        self.requests
            .iter()
            .filter(|r| r.is_open() && r.holder == holder)
            .map(|r| r.shares)
            .sum()
    }
}
