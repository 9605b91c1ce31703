//! Read-only view of the external loan book.
//!
//! The pool and breaker never own loan lifecycle state; they see it
//! through this trait. [`MemoryLoanBook`] backs tests and simulator runs.

use serde::{Deserialize, Serialize};

pub type PartnerId = u64;
pub type PoolId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    Pending,
    Active,
    Repaid,
    Defaulted,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub id: u64,
    pub partner_id: PartnerId,
    pub pool_id: PoolId,
    pub status: LoanStatus,
    pub principal: u128,
    pub originated_at: u64,
    pub defaulted_at: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FiatTransferStatus {
    Initiated,
    Pending,
    Confirmed,
    PayoutConfirmed,
    Settled,
    Failed,
}

impl FiatTransferStatus {
    /// Statuses accepted as proof that a disbursement actually went out.
    pub fn is_disbursement_proof(self) -> bool {
        matches!(
            self,
            FiatTransferStatus::Confirmed
                | FiatTransferStatus::PayoutConfirmed
                | FiatTransferStatus::Settled
        )
    }
}

/// On-chain action linked to a fiat transfer, if any was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainAction {
    pub tx_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiatTransfer {
    pub id: u64,
    pub loan_id: Option<u64>,
    pub direction: TransferDirection,
    pub status: FiatTransferStatus,
    pub chain_action: Option<ChainAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerPool {
    pub pool_id: PoolId,
    pub partner_id: PartnerId,
    pub capacity: u128,
    pub outstanding: u128,
}

/// Capabilities the projections need from the loan book.
pub trait LoanBook {
    fn loans(&self) -> &[LoanRecord];
    fn fiat_transfers(&self) -> &[FiatTransfer];
    fn partner_pools(&self) -> &[PartnerPool];
}

/// In-memory loan book for tests and simulator runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryLoanBook {
    pub loans: Vec<LoanRecord>,
    pub fiat_transfers: Vec<FiatTransfer>,
    pub partner_pools: Vec<PartnerPool>,
}

impl LoanBook for MemoryLoanBook {
    fn loans(&self) -> &[LoanRecord] {
        &self.loans
    }

    fn fiat_transfers(&self) -> &[FiatTransfer] {
        &self.fiat_transfers
    }

    fn partner_pools(&self) -> &[PartnerPool] {
        &self.partner_pools
    }
}
