//! Loan Metrics - projections feeding the circuit breaker.
//!
//! Every projection is a pure function over a [`LoanBook`] view, so the
//! stress simulator can replay them against synthetic books and the
//! scheduler can sample them on a cadence without hidden state.

pub mod book;
pub mod projections;

pub use book::{
    ChainAction, FiatTransfer, FiatTransferStatus, LoanBook, LoanRecord, LoanStatus,
    MemoryLoanBook, PartnerId, PartnerPool, PoolId, TransferDirection,
};
pub use projections::{
    active_without_disbursement_proof, fiat_confirmed_no_chain_record,
    partner_default_rate_30d, partner_delinquency_14d, pool_liquidity_ratio,
    pool_nav_drawdown_7d,
};

pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;
