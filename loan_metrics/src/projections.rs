//! Metric projections.
//!
//! Conventions: rates are fractions in [0, 1]; a partner or pool with an
//! empty denominator is excluded from the result map rather than reported
//! as zero.

use std::collections::BTreeMap;

use crate::book::{
    LoanBook, LoanStatus, PartnerId, PoolId, TransferDirection,
};
use crate::SECONDS_PER_DAY;

/// Loans in state Active with no outbound fiat transfer in any
/// proof-acceptable status.
pub fn active_without_disbursement_proof(book: &dyn LoanBook) -> u64 {
    book.loans()
        .iter()
        .filter(|loan| loan.status == LoanStatus::Active)
        .filter(|loan| {
            !book.fiat_transfers().iter().any(|t| {
                t.loan_id == Some(loan.id)
                    && t.direction == TransferDirection::Outbound
                    && t.status.is_disbursement_proof()
            })
        })
        .count() as u64
}

/// Outbound fiat transfers confirmed on the fiat side whose chain record
/// is missing: either no linked chain action at all, or one without a
/// transaction hash.
pub fn fiat_confirmed_no_chain_record(book: &dyn LoanBook) -> u64 {
    use crate::book::FiatTransferStatus::{Confirmed, PayoutConfirmed};

    book.fiat_transfers()
        .iter()
        .filter(|t| t.direction == TransferDirection::Outbound)
        .filter(|t| matches!(t.status, Confirmed | PayoutConfirmed))
        .filter(|t| {
            t.chain_action
                .as_ref()
                .map_or(true, |a| a.tx_hash.is_none())
        })
        .count() as u64
}

/// Per-partner default rate over the trailing 30 days:
/// `defaulted / (active + repaid + defaulted)` among loans with activity
/// in the window.
pub fn partner_default_rate_30d(book: &dyn LoanBook, now: u64) -> BTreeMap<PartnerId, f64> {
    let start = now.saturating_sub(30 * SECONDS_PER_DAY);
    let mut tally: BTreeMap<PartnerId, (u64, u64)> = BTreeMap::new(); // (defaulted, denominator)

    for loan in book.loans() {
        let active_in_window = loan.originated_at >= start
            || loan.defaulted_at.is_some_and(|t| t >= start);
        if !active_in_window {
            continue;
        }
        let entry = tally.entry(loan.partner_id).or_default();
        match loan.status {
            LoanStatus::Defaulted => {
                entry.0 += 1;
                entry.1 += 1;
            }
            LoanStatus::Active | LoanStatus::Repaid => entry.1 += 1,
            LoanStatus::Pending | LoanStatus::Cancelled => {}
        }
    }

    tally
        .into_iter()
        .filter(|(_, (_, denom))| *denom > 0)
        .map(|(partner, (defaulted, denom))| (partner, defaulted as f64 / denom as f64))
        .collect()
}

/// Per-partner delinquency over the trailing 14 days:
/// `defaulted_in_window / (active or defaulted in window)`.
pub fn partner_delinquency_14d(book: &dyn LoanBook, now: u64) -> BTreeMap<PartnerId, f64> {
    let start = now.saturating_sub(14 * SECONDS_PER_DAY);
    let mut tally: BTreeMap<PartnerId, (u64, u64)> = BTreeMap::new();

    for loan in book.loans() {
        let defaulted_in_window = loan.status == LoanStatus::Defaulted
            && loan.defaulted_at.is_some_and(|t| t >= start);
        let in_window = defaulted_in_window
            || (loan.status == LoanStatus::Active && loan.originated_at >= start);
        if !in_window {
            continue;
        }
        let entry = tally.entry(loan.partner_id).or_default();
        entry.1 += 1;
        if defaulted_in_window {
            entry.0 += 1;
        }
    }

    tally
        .into_iter()
        .filter(|(_, (_, denom))| *denom > 0)
        .map(|(partner, (defaulted, denom))| (partner, defaulted as f64 / denom as f64))
        .collect()
}

/// Per-pool liquidity headroom: `(capacity - outstanding) / capacity`,
/// clamped to [0, 1]. A pool without capacity reports full liquidity.
pub fn pool_liquidity_ratio(book: &dyn LoanBook) -> BTreeMap<PoolId, f64> {
    book.partner_pools()
        .iter()
        .map(|pool| {
            let ratio = if pool.capacity == 0 {
                1.0
            } else {
                let free = pool.capacity.saturating_sub(pool.outstanding);
                (free as f64 / pool.capacity as f64).clamp(0.0, 1.0)
            };
            (pool.pool_id, ratio)
        })
        .collect()
}

/// Per-pool NAV drawdown over the trailing 7 days: principal defaulted in
/// the window over active plus defaulted principal.
pub fn pool_nav_drawdown_7d(book: &dyn LoanBook, now: u64) -> BTreeMap<PoolId, f64> {
    let start = now.saturating_sub(7 * SECONDS_PER_DAY);
    let mut tally: BTreeMap<PoolId, (u128, u128)> = BTreeMap::new(); // (defaulted, base)

    for loan in book.loans() {
        let entry = tally.entry(loan.pool_id).or_default();
        match loan.status {
            LoanStatus::Defaulted => {
                entry.1 += loan.principal;
                if loan.defaulted_at.is_some_and(|t| t >= start) {
                    entry.0 += loan.principal;
                }
            }
            LoanStatus::Active => entry.1 += loan.principal,
            _ => {}
        }
    }

    tally
        .into_iter()
        .filter(|(_, (_, base))| *base > 0)
        .map(|(pool, (defaulted, base))| (pool, defaulted as f64 / base as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::*;

    const DAY: u64 = SECONDS_PER_DAY;

    fn loan(id: u64, partner: u64, status: LoanStatus, originated_at: u64) -> LoanRecord {
        LoanRecord {
            id,
            partner_id: partner,
            pool_id: 1,
            status,
            principal: 1_000_000,
            originated_at,
            defaulted_at: if status == LoanStatus::Defaulted {
                Some(originated_at + DAY)
            } else {
                None
            },
        }
    }

    fn outbound(id: u64, loan_id: u64, status: FiatTransferStatus) -> FiatTransfer {
        FiatTransfer {
            id,
            loan_id: Some(loan_id),
            direction: TransferDirection::Outbound,
            status,
            chain_action: None,
        }
    }

    #[test]
    fn active_loans_without_proof_are_counted() {
        let book = MemoryLoanBook {
            loans: vec![
                loan(1, 1, LoanStatus::Active, 0),
                loan(2, 1, LoanStatus::Active, 0),
                loan(3, 1, LoanStatus::Repaid, 0),
            ],
            fiat_transfers: vec![
                outbound(10, 1, FiatTransferStatus::Confirmed),
                // Initiated is not proof.
                outbound(11, 2, FiatTransferStatus::Initiated),
            ],
            partner_pools: vec![],
        };
        assert_eq!(active_without_disbursement_proof(&book), 1);
    }

    #[test]
    fn confirmed_transfer_without_chain_hash_is_flagged() {
        let mut with_hash = outbound(1, 1, FiatTransferStatus::Confirmed);
        with_hash.chain_action = Some(ChainAction {
            tx_hash: Some("0xabc".into()),
        });
        let mut without_hash = outbound(2, 2, FiatTransferStatus::PayoutConfirmed);
        without_hash.chain_action = Some(ChainAction { tx_hash: None });
        let unlinked = outbound(3, 3, FiatTransferStatus::Confirmed);
        let inbound = FiatTransfer {
            id: 4,
            loan_id: None,
            direction: TransferDirection::Inbound,
            status: FiatTransferStatus::Confirmed,
            chain_action: None,
        };

        let book = MemoryLoanBook {
            loans: vec![],
            fiat_transfers: vec![with_hash, without_hash, unlinked, inbound],
            partner_pools: vec![],
        };
        assert_eq!(fiat_confirmed_no_chain_record(&book), 2);
    }

    #[test]
    fn default_rate_excludes_partners_without_denominator() {
        let now = 100 * DAY;
        let book = MemoryLoanBook {
            loans: vec![
                loan(1, 1, LoanStatus::Active, now - DAY),
                loan(2, 1, LoanStatus::Defaulted, now - 2 * DAY),
                // Partner 2 only has stale loans outside the window.
                loan(3, 2, LoanStatus::Defaulted, now - 90 * DAY),
                // Partner 3 only has pending loans: no denominator.
                loan(4, 3, LoanStatus::Pending, now - DAY),
            ],
            fiat_transfers: vec![],
            partner_pools: vec![],
        };

        let rates = partner_default_rate_30d(&book, now);
        assert_eq!(rates.get(&1), Some(&0.5));
        assert!(!rates.contains_key(&2));
        assert!(!rates.contains_key(&3));
    }

    #[test]
    fn delinquency_window_is_fourteen_days() {
        let now = 100 * DAY;
        let mut recent_default = loan(1, 1, LoanStatus::Defaulted, now - 20 * DAY);
        recent_default.defaulted_at = Some(now - 2 * DAY);
        let mut stale_default = loan(2, 1, LoanStatus::Defaulted, now - 20 * DAY);
        stale_default.defaulted_at = Some(now - 19 * DAY);

        let book = MemoryLoanBook {
            loans: vec![
                recent_default,
                stale_default,
                loan(3, 1, LoanStatus::Active, now - 3 * DAY),
            ],
            fiat_transfers: vec![],
            partner_pools: vec![],
        };

        let rates = partner_delinquency_14d(&book, now);
        assert_eq!(rates.get(&1), Some(&0.5));
    }

    #[test]
    fn liquidity_ratio_clamps_and_defaults() {
        let book = MemoryLoanBook {
            loans: vec![],
            fiat_transfers: vec![],
            partner_pools: vec![
                PartnerPool {
                    pool_id: 1,
                    partner_id: 1,
                    capacity: 1_000,
                    outstanding: 750,
                },
                PartnerPool {
                    pool_id: 2,
                    partner_id: 2,
                    capacity: 0,
                    outstanding: 500,
                },
                PartnerPool {
                    pool_id: 3,
                    partner_id: 3,
                    capacity: 100,
                    outstanding: 400,
                },
            ],
        };

        let ratios = pool_liquidity_ratio(&book);
        assert_eq!(ratios.get(&1), Some(&0.25));
        assert_eq!(ratios.get(&2), Some(&1.0));
        assert_eq!(ratios.get(&3), Some(&0.0));
    }

    #[test]
    fn nav_drawdown_counts_recent_defaults_only() {
        let now = 100 * DAY;
        let mut recent = loan(1, 1, LoanStatus::Defaulted, now - 30 * DAY);
        recent.defaulted_at = Some(now - 3 * DAY);
        let mut stale = loan(2, 1, LoanStatus::Defaulted, now - 30 * DAY);
        stale.defaulted_at = Some(now - 20 * DAY);

        let book = MemoryLoanBook {
            loans: vec![
                recent,
                stale,
                loan(3, 1, LoanStatus::Active, now - 5 * DAY),
                loan(4, 1, LoanStatus::Active, now - 5 * DAY),
            ],
            fiat_transfers: vec![],
            partner_pools: vec![],
        };

        // 1 of 4 million units defaulted inside the window.
        let dd = pool_nav_drawdown_7d(&book, now);
        assert_eq!(dd.get(&1), Some(&0.25));
    }
}
