//! Two-tranche pool accounting engine.
//!
//! All mutating operations go through `&mut self`: the single-writer
//! contract is part of the type. State updates complete before any
//! outbound call to a loan capability, with explicit rollback if the call
//! fails, so a half-applied allocation can never be observed.

use std::collections::BTreeMap;

use crate::config::{validate_senior_allocation, PoolConfig};
use crate::errors::PoolError;
use crate::events::PoolEvent;
use crate::math::{
    bps_of, checked_add, convert_to_assets, convert_to_shares, mul_div, ratio_bps,
};
use crate::queue::WithdrawQueue;
use crate::tranche::{HolderId, LoanId, Position, TrancheId, TrancheState};
use crate::waterfall::{apply_loss, apply_recovery};
use crate::BPS_DENOMINATOR;

/// Capability handle of a registered loan contract. The pool funds the
/// loan and propagates pause state through this object; it never holds a
/// direct reference to loan internals.
pub trait LoanSink: Send + Sync {
    /// Debit `amount` toward the loan; the loan pulls the cash.
    fn pool_fund(&mut self, amount: u128) -> Result<(), PoolError>;
    fn set_paused(&mut self, paused: bool);
    fn is_paused(&self) -> bool;
}

/// Hook into the breaker engine for pool-side risk signals.
pub trait RiskHook: Send + Sync {
    fn junior_depleted(&mut self, now: u64);
}

/// Hook that swallows signals; used by tests and the simulator.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRiskHook;

impl RiskHook for NoopRiskHook {
    fn junior_depleted(&mut self, _now: u64) {}
}

struct LoanAccount {
    sink: Box<dyn LoanSink>,
    senior_outstanding: u128,
    junior_outstanding: u128,
}

impl LoanAccount {
    fn outstanding(&self) -> u128 {
        self.senior_outstanding + self.junior_outstanding
    }
}

/// Read-only snapshot of pool-level aggregates.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PoolStats {
    pub cash_balance: u128,
    pub senior: TrancheState,
    pub junior: TrancheState,
    pub total_principal_outstanding: u128,
    pub total_bad_debt: u128,
    pub residual_loss: u128,
    pub total_assets_nav: u128,
    pub subordination_bps: u32,
    pub paused: bool,
    pub stress_mode: bool,
    pub senior_priority_active: bool,
    pub junior_high_water_mark: u128,
}

pub struct TranchePool {
    config: PoolConfig,
    cash_balance: u128,
    senior: TrancheState,
    junior: TrancheState,
    positions: BTreeMap<(TrancheId, HolderId), Position>,
    senior_queue: WithdrawQueue,
    junior_queue: WithdrawQueue,
    loans: BTreeMap<LoanId, LoanAccount>,
    total_principal_outstanding: u128,
    total_bad_debt: u128,
    /// Loss neither tranche could absorb. Must stay zero.
    residual_loss: u128,
    paused: bool,
    stress_mode: bool,
    senior_priority_active: bool,
    senior_priority_since: Option<u64>,
    launch_params_locked: bool,
    junior_high_water_mark: u128,
    /// Set if a loss ever reached Senior while Junior still held cash.
    /// Unreachable through `apply_loss`; audited as invariant 4.
    loss_order_violated: bool,
    /// Coverage outcome of the most recent applied allocation.
    last_allocation_coverage_ok: bool,
    risk_hook: Box<dyn RiskHook>,
    events: Vec<PoolEvent>,
}

impl TranchePool {
    pub fn new(config: PoolConfig, risk_hook: Box<dyn RiskHook>) -> Result<Self, PoolError> {
        config.validate()?;
        let senior = TrancheState {
            target_yield_bps: config.senior_target_yield_bps,
            deposit_cap: config.senior_deposit_cap,
            ..Default::default()
        };
        let junior = TrancheState {
            deposit_cap: config.junior_deposit_cap,
            ..Default::default()
        };
        Ok(Self {
            config,
            cash_balance: 0,
            senior,
            junior,
            positions: BTreeMap::new(),
            senior_queue: WithdrawQueue::default(),
            junior_queue: WithdrawQueue::default(),
            loans: BTreeMap::new(),
            total_principal_outstanding: 0,
            total_bad_debt: 0,
            residual_loss: 0,
            paused: false,
            stress_mode: false,
            senior_priority_active: false,
            senior_priority_since: None,
            launch_params_locked: false,
            junior_high_water_mark: 0,
            loss_order_violated: false,
            last_allocation_coverage_ok: true,
            risk_hook,
            events: Vec::new(),
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn tranche(&self, id: TrancheId) -> &TrancheState {
        match id {
            TrancheId::Senior => &self.senior,
            TrancheId::Junior => &self.junior,
        }
    }

    fn tranche_mut(&mut self, id: TrancheId) -> &mut TrancheState {
        match id {
            TrancheId::Senior => &mut self.senior,
            TrancheId::Junior => &mut self.junior,
        }
    }

    fn queue_mut(&mut self, id: TrancheId) -> &mut WithdrawQueue {
        match id {
            TrancheId::Senior => &mut self.senior_queue,
            TrancheId::Junior => &mut self.junior_queue,
        }
    }

    pub fn queue(&self, id: TrancheId) -> &WithdrawQueue {
        match id {
            TrancheId::Senior => &self.senior_queue,
            TrancheId::Junior => &self.junior_queue,
        }
    }

    pub fn position(&self, tranche: TrancheId, holder: HolderId) -> Option<&Position> {
        self.positions.get(&(tranche, holder))
    }

    fn position_mut(&mut self, tranche: TrancheId, holder: HolderId) -> &mut Position {
        self.positions.entry((tranche, holder)).or_default()
    }

    pub fn cash_balance(&self) -> u128 {
        self.cash_balance
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn stress_mode(&self) -> bool {
        self.stress_mode
    }

    pub fn senior_priority_active(&self) -> bool {
        self.senior_priority_active
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Junior share of pool cash, in basis points.
    pub fn subordination_bps(&self) -> u32 {
        ratio_bps(
            self.junior.virtual_balance,
            self.junior
                .virtual_balance
                .saturating_add(self.senior.virtual_balance),
        )
    }

    /// NAV identity: cash + outstanding principal - bad debt, floored
    /// at zero.
    pub fn total_assets_nav(&self) -> u128 {
        self.cash_balance
            .saturating_add(self.total_principal_outstanding)
            .saturating_sub(self.total_bad_debt)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            cash_balance: self.cash_balance,
            senior: self.senior.clone(),
            junior: self.junior.clone(),
            total_principal_outstanding: self.total_principal_outstanding,
            total_bad_debt: self.total_bad_debt,
            residual_loss: self.residual_loss,
            total_assets_nav: self.total_assets_nav(),
            subordination_bps: self.subordination_bps(),
            paused: self.paused,
            stress_mode: self.stress_mode,
            senior_priority_active: self.senior_priority_active,
            junior_high_water_mark: self.junior_high_water_mark,
        }
    }

    /// Drain accumulated events.
    pub fn take_events(&mut self) -> Vec<PoolEvent> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------
    // Deposits and withdrawals
    // ------------------------------------------------------------------

    pub fn deposit(
        &mut self,
        tranche: TrancheId,
        assets: u128,
        holder: HolderId,
    ) -> Result<u128, PoolError> {
        if assets == 0 {
            return Err(PoolError::ZeroAmount);
        }
        if self.paused {
            return Err(PoolError::EnforcedPause);
        }

        let t = self.tranche(tranche);
        let would_hold = checked_add(t.virtual_balance, assets)?;
        if t.deposit_cap > 0 && would_hold > t.deposit_cap {
            return Err(PoolError::TrancheDepositCapExceeded {
                cap: t.deposit_cap,
                would_hold,
            });
        }

        if tranche == TrancheId::Senior {
            let junior_vb = self.junior.virtual_balance;
            let senior_after = checked_add(self.senior.virtual_balance, assets)?;
            let actual_bps = ratio_bps(junior_vb, checked_add(junior_vb, senior_after)?);
            if actual_bps < self.config.min_subordination_bps {
                return Err(PoolError::SubordinationTooLow {
                    actual_bps,
                    required_bps: self.config.min_subordination_bps,
                });
            }
        }

        let t = self.tranche(tranche);
        let shares = convert_to_shares(assets, t.nav(), t.total_shares)?;

        // Compute every new value before committing any of them.
        let new_total_shares = checked_add(t.total_shares, shares)?;
        let new_virtual_balance = checked_add(t.virtual_balance, assets)?;
        let new_cash = checked_add(self.cash_balance, assets)?;
        let new_holder_shares = checked_add(
            self.position(tranche, holder).map_or(0, |p| p.shares),
            shares,
        )?;

        let t = self.tranche_mut(tranche);
        t.total_shares = new_total_shares;
        t.virtual_balance = new_virtual_balance;
        self.cash_balance = new_cash;
        self.position_mut(tranche, holder).shares = new_holder_shares;

        if tranche == TrancheId::Junior {
            self.junior_high_water_mark =
                self.junior_high_water_mark.max(self.junior.virtual_balance);
        }

        self.events.push(PoolEvent::Deposit {
            tranche,
            holder,
            assets,
            shares,
        });
        Ok(shares)
    }

    /// Instant withdrawal, burning free shares for cash.
    pub fn withdraw(
        &mut self,
        tranche: TrancheId,
        shares: u128,
        holder: HolderId,
    ) -> Result<u128, PoolError> {
        if shares == 0 {
            return Err(PoolError::ZeroAmount);
        }
        if self.paused {
            return Err(PoolError::EnforcedPause);
        }
        if self.stress_mode {
            return Err(PoolError::StressModeLocked);
        }

        let pos = self.position(tranche, holder).cloned().unwrap_or_default();
        if shares > pos.shares {
            return Err(PoolError::InsufficientShares {
                requested: shares,
                held: pos.shares,
            });
        }
        if shares > pos.free_shares() {
            return Err(PoolError::InsufficientFreeShares {
                requested: shares,
                free: pos.free_shares(),
            });
        }

        let t = self.tranche(tranche);
        let assets = convert_to_assets(shares, t.nav(), t.total_shares)?;
        if assets > t.virtual_balance {
            return Err(PoolError::InsufficientLiquidity {
                needed: assets,
                available: t.virtual_balance,
            });
        }

        if tranche == TrancheId::Junior {
            let junior_after = self.junior.virtual_balance - assets;
            let actual_bps = ratio_bps(
                junior_after,
                junior_after.saturating_add(self.senior.virtual_balance),
            );
            if self.senior.virtual_balance > 0 && actual_bps < self.config.min_subordination_bps
            {
                return Err(PoolError::SubordinationTooLow {
                    actual_bps,
                    required_bps: self.config.min_subordination_bps,
                });
            }
        }

        self.burn(tranche, holder, shares, assets);
        self.events.push(PoolEvent::Withdraw {
            tranche,
            holder,
            assets,
            shares,
        });
        Ok(assets)
    }

    fn burn(&mut self, tranche: TrancheId, holder: HolderId, shares: u128, assets: u128) {
        let pos = self.position_mut(tranche, holder);
        pos.shares -= shares;
        let t = self.tranche_mut(tranche);
        t.total_shares -= shares;
        t.virtual_balance -= assets;
        self.cash_balance -= assets;
    }

    // ------------------------------------------------------------------
    // Withdrawal queue
    // ------------------------------------------------------------------

    /// Queue a withdrawal. Allowed while paused: queuing is the safe exit.
    /// Consecutive requests by the same holder coalesce into the last open
    /// one.
    pub fn request_withdraw(
        &mut self,
        tranche: TrancheId,
        shares: u128,
        holder: HolderId,
        now: u64,
    ) -> Result<u64, PoolError> {
        if shares == 0 {
            return Err(PoolError::ZeroAmount);
        }

        let pos = self.position(tranche, holder).cloned().unwrap_or_default();
        if shares > pos.free_shares() {
            return Err(PoolError::InsufficientFreeShares {
                requested: shares,
                free: pos.free_shares(),
            });
        }

        let hint = pos.last_open_request_index;
        let coalesced =
            hint.is_some_and(|h| self.queue_mut(tranche).coalesce_into(h, holder, shares));

        let index = if coalesced {
            hint.unwrap()
        } else {
            if pos.open_request_count >= self.config.max_open_requests {
                return Err(PoolError::TooManyOpenRequests {
                    open: pos.open_request_count,
                    max: self.config.max_open_requests,
                });
            }
            let index = self.queue_mut(tranche).push(holder, shares, now);
            let pos = self.position_mut(tranche, holder);
            pos.open_request_count += 1;
            pos.last_open_request_index = Some(index);
            index
        };

        let pos = self.position_mut(tranche, holder);
        pos.pending_shares = checked_add(pos.pending_shares, shares)?;

        self.events.push(PoolEvent::WithdrawRequested {
            tranche,
            holder,
            shares,
            request_index: index,
            coalesced,
        });
        Ok(index)
    }

    pub fn cancel_withdraw(
        &mut self,
        tranche: TrancheId,
        request_index: u64,
        holder: HolderId,
    ) -> Result<(), PoolError> {
        if self.paused {
            return Err(PoolError::EnforcedPause);
        }
        let req = self
            .queue(tranche)
            .get(request_index)
            .ok_or(PoolError::RequestNotFound {
                index: request_index,
            })?;
        if req.holder != holder {
            return Err(PoolError::Unauthorized);
        }
        if !req.is_open() {
            return Err(PoolError::InvalidRequestState);
        }
        let shares = req.shares;

        self.queue_mut(tranche)
            .get_mut(request_index)
            .expect("request existence checked above")
            .cancelled = true;

        let pos = self.position_mut(tranche, holder);
        pos.pending_shares = pos.pending_shares.saturating_sub(shares);
        pos.open_request_count = pos.open_request_count.saturating_sub(1);
        if pos.last_open_request_index == Some(request_index) {
            pos.last_open_request_index = None;
        }

        self.events.push(PoolEvent::WithdrawCancelled {
            tranche,
            holder,
            request_index,
            shares,
        });
        Ok(())
    }

    /// Fulfill a queued request by index. Any caller may fulfill.
    pub fn fulfill_withdraw(
        &mut self,
        tranche: TrancheId,
        request_index: u64,
        now: u64,
    ) -> Result<u128, PoolError> {
        if self.paused {
            return Err(PoolError::EnforcedPause);
        }
        if self.stress_mode {
            return Err(PoolError::StressModeLocked);
        }
        if self.senior_priority_active && tranche == TrancheId::Junior {
            if self.senior_priority_expired(now) {
                self.lift_senior_priority(true);
            } else {
                return Err(PoolError::SeniorPriorityActive);
            }
        }

        let req = self
            .queue(tranche)
            .get(request_index)
            .ok_or(PoolError::RequestNotFound {
                index: request_index,
            })?;
        if !req.is_open() {
            return Err(PoolError::InvalidRequestState);
        }
        let (holder, shares) = (req.holder, req.shares);

        let t = self.tranche(tranche);
        let assets = convert_to_assets(shares, t.nav(), t.total_shares)?;
        if assets > t.virtual_balance {
            return Err(PoolError::InsufficientLiquidity {
                needed: assets,
                available: t.virtual_balance,
            });
        }

        self.queue_mut(tranche)
            .get_mut(request_index)
            .expect("request existence checked above")
            .fulfilled = true;

        let pos = self.position_mut(tranche, holder);
        pos.pending_shares = pos.pending_shares.saturating_sub(shares);
        pos.open_request_count = pos.open_request_count.saturating_sub(1);
        if pos.last_open_request_index == Some(request_index) {
            pos.last_open_request_index = None;
        }
        self.burn(tranche, holder, shares, assets);

        self.events.push(PoolEvent::WithdrawFulfilled {
            tranche,
            holder,
            request_index,
            assets,
            shares,
        });
        Ok(assets)
    }

    fn senior_priority_expired(&self, now: u64) -> bool {
        match self.senior_priority_since {
            Some(since) => {
                now.saturating_sub(since) >= self.config.senior_priority_max_duration_secs
            }
            None => true,
        }
    }

    fn lift_senior_priority(&mut self, auto_expired: bool) {
        self.senior_priority_active = false;
        self.senior_priority_since = None;
        self.events
            .push(PoolEvent::SeniorPriorityCleared { auto_expired });
    }

    // ------------------------------------------------------------------
    // Loan collaboration
    // ------------------------------------------------------------------

    pub fn register_loan(&mut self, loan: LoanId, sink: Box<dyn LoanSink>) {
        self.loans.entry(loan).or_insert(LoanAccount {
            sink,
            senior_outstanding: 0,
            junior_outstanding: 0,
        });
    }

    pub fn is_loan_registered(&self, loan: LoanId) -> bool {
        self.loans.contains_key(&loan)
    }

    pub fn set_loan_paused(&mut self, loan: LoanId, paused: bool) -> Result<(), PoolError> {
        let account = self.loans.get_mut(&loan).ok_or(PoolError::Unauthorized)?;
        account.sink.set_paused(paused);
        Ok(())
    }

    pub fn loan_outstanding(&self, loan: LoanId) -> u128 {
        self.loans.get(&loan).map(LoanAccount::outstanding).unwrap_or(0)
    }

    /// Route `amount` from the tranches to a registered loan, split by the
    /// senior allocation ratio. The junior coverage floor is re-evaluated
    /// on the post-split balances before anything moves.
    pub fn allocate_to_loan(&mut self, loan: LoanId, amount: u128) -> Result<(), PoolError> {
        if amount == 0 {
            return Err(PoolError::ZeroAmount);
        }
        if self.stress_mode {
            return Err(PoolError::StressModeLocked);
        }
        let account = self.loans.get(&loan).ok_or(PoolError::Unauthorized)?;
        if account.sink.is_paused() {
            return Err(PoolError::LoanPaused);
        }

        let senior_part = bps_of(amount, self.config.senior_allocation_bps)?;
        let junior_part = amount - senior_part;

        if senior_part > self.senior.virtual_balance {
            return Err(PoolError::InsufficientLiquidity {
                needed: senior_part,
                available: self.senior.virtual_balance,
            });
        }
        if junior_part > self.junior.virtual_balance {
            return Err(PoolError::InsufficientLiquidity {
                needed: junior_part,
                available: self.junior.virtual_balance,
            });
        }

        let junior_after = self.junior.virtual_balance - junior_part;
        let senior_after = self.senior.virtual_balance - senior_part;
        let coverage_bps = ratio_bps(junior_after, junior_after.saturating_add(senior_after));
        if coverage_bps < self.config.junior_coverage_floor_bps {
            // Nothing moved; the reverted attempt leaves coverage intact.
            return Err(PoolError::CoverageFloorBreached {
                actual_bps: coverage_bps,
                floor_bps: self.config.junior_coverage_floor_bps,
            });
        }
        // Compute every new value before committing any of them.
        let senior_allocated = checked_add(self.senior.principal_allocated, senior_part)?;
        let junior_allocated = checked_add(self.junior.principal_allocated, junior_part)?;
        let outstanding_total = checked_add(self.total_principal_outstanding, amount)?;
        let loan_senior = checked_add(account.senior_outstanding, senior_part)?;
        let loan_junior = checked_add(account.junior_outstanding, junior_part)?;

        self.last_allocation_coverage_ok = true;
        self.senior.virtual_balance = senior_after;
        self.senior.principal_allocated = senior_allocated;
        self.junior.virtual_balance = junior_after;
        self.junior.principal_allocated = junior_allocated;
        self.cash_balance -= amount;
        self.total_principal_outstanding = outstanding_total;
        {
            let account = self
                .loans
                .get_mut(&loan)
                .expect("loan registration checked above");
            account.senior_outstanding = loan_senior;
            account.junior_outstanding = loan_junior;
        }

        // Interaction last; roll state back if the loan refuses the cash.
        let fund_result = self
            .loans
            .get_mut(&loan)
            .expect("loan registration checked above")
            .sink
            .pool_fund(amount);
        if let Err(e) = fund_result {
            self.senior.virtual_balance += senior_part;
            self.senior.principal_allocated -= senior_part;
            self.junior.virtual_balance += junior_part;
            self.junior.principal_allocated -= junior_part;
            self.cash_balance += amount;
            self.total_principal_outstanding -= amount;
            let account = self
                .loans
                .get_mut(&loan)
                .expect("loan registration checked above");
            account.senior_outstanding -= senior_part;
            account.junior_outstanding -= junior_part;
            return Err(e);
        }

        self.events.push(PoolEvent::LoanAllocated {
            loan,
            amount,
            senior_part,
            junior_part,
        });
        Ok(())
    }

    /// Loan repayment callback. Principal returns to each tranche by its
    /// recorded allocation share for this loan; interest goes Senior-first
    /// up to the target yield cap, remainder to Junior.
    pub fn on_loan_repayment(
        &mut self,
        loan: LoanId,
        principal_paid: u128,
        interest_paid: u128,
    ) -> Result<(), PoolError> {
        if !self.loans.contains_key(&loan) {
            return Err(PoolError::Unauthorized);
        }

        let account = self.loans.get(&loan).expect("checked above");
        let outstanding = account.outstanding();
        let applied_principal = principal_paid.min(outstanding);

        let senior_principal = if applied_principal == 0 {
            0
        } else {
            mul_div(applied_principal, account.senior_outstanding, outstanding)?
                .min(account.senior_outstanding)
        };
        let junior_principal = applied_principal - senior_principal;

        let cap = bps_of(self.senior.virtual_balance, self.senior.target_yield_bps)?;
        let senior_interest = interest_paid.min(cap);
        let junior_interest = interest_paid - senior_interest;

        // Compute every new value before committing any of them.
        let senior_vb = checked_add(
            self.senior.virtual_balance,
            checked_add(senior_principal, senior_interest)?,
        )?;
        let junior_vb = checked_add(
            self.junior.virtual_balance,
            checked_add(junior_principal, junior_interest)?,
        )?;
        let senior_earned = checked_add(self.senior.interest_earned, senior_interest)?;
        let junior_earned = checked_add(self.junior.interest_earned, junior_interest)?;
        let cash = checked_add(
            self.cash_balance,
            checked_add(applied_principal, interest_paid)?,
        )?;

        let account = self.loans.get_mut(&loan).expect("checked above");
        account.senior_outstanding -= senior_principal;
        account.junior_outstanding -= junior_principal;

        self.senior.principal_allocated =
            self.senior.principal_allocated.saturating_sub(senior_principal);
        self.junior.principal_allocated =
            self.junior.principal_allocated.saturating_sub(junior_principal);
        self.total_principal_outstanding = self
            .total_principal_outstanding
            .saturating_sub(applied_principal);

        self.senior.virtual_balance = senior_vb;
        self.junior.virtual_balance = junior_vb;
        self.senior.interest_earned = senior_earned;
        self.junior.interest_earned = junior_earned;
        self.cash_balance = cash;

        self.events.push(PoolEvent::RepaymentApplied {
            loan,
            principal: applied_principal,
            senior_interest,
            junior_interest,
        });
        Ok(())
    }

    /// Write off loan principal. The loss is absorbed bottom-up through
    /// the waterfall; a first Senior impairment atomically flips the
    /// stress bundle.
    pub fn record_bad_debt(
        &mut self,
        loan: LoanId,
        write_off: u128,
        now: u64,
    ) -> Result<u128, PoolError> {
        if write_off == 0 {
            return Err(PoolError::ZeroAmount);
        }
        let account = self.loans.get(&loan).ok_or(PoolError::Unauthorized)?;
        let outstanding = account.outstanding();
        let write_off = write_off.min(outstanding);
        if write_off == 0 {
            return Ok(0);
        }

        let senior_share = mul_div(write_off, account.senior_outstanding, outstanding)?
            .min(account.senior_outstanding);
        let junior_share = write_off - senior_share;

        let outcome = apply_loss(
            self.junior.virtual_balance,
            self.senior.virtual_balance,
            write_off,
        );
        if outcome.senior_absorbed > 0 && outcome.junior_after > 0 {
            self.loss_order_violated = true;
        }

        let senior_was_unimpaired = self.senior.bad_debt == 0;

        // Compute every new value before committing any of them.
        let junior_bad = checked_add(self.junior.bad_debt, outcome.junior_absorbed)?;
        let senior_bad = checked_add(self.senior.bad_debt, outcome.senior_absorbed)?;
        let total_bad = checked_add(
            self.total_bad_debt,
            outcome.junior_absorbed + outcome.senior_absorbed,
        )?;
        let residual = checked_add(self.residual_loss, outcome.residual)?;

        self.junior.virtual_balance = outcome.junior_after;
        self.senior.virtual_balance = outcome.senior_after;
        self.cash_balance = self
            .cash_balance
            .saturating_sub(outcome.junior_absorbed + outcome.senior_absorbed);
        self.junior.bad_debt = junior_bad;
        self.senior.bad_debt = senior_bad;
        self.total_bad_debt = total_bad;
        self.residual_loss = residual;

        let account = self.loans.get_mut(&loan).expect("checked above");
        account.senior_outstanding -= senior_share;
        account.junior_outstanding -= junior_share;
        self.senior.principal_allocated =
            self.senior.principal_allocated.saturating_sub(senior_share);
        self.junior.principal_allocated =
            self.junior.principal_allocated.saturating_sub(junior_share);
        self.total_principal_outstanding =
            self.total_principal_outstanding.saturating_sub(write_off);

        self.events.push(PoolEvent::BadDebtRecorded {
            loan,
            write_off,
            junior_absorbed: outcome.junior_absorbed,
            senior_absorbed: outcome.senior_absorbed,
            residual: outcome.residual,
        });

        if self.senior.bad_debt > 0 && senior_was_unimpaired {
            self.stress_mode = true;
            self.paused = true;
            self.senior_priority_active = true;
            self.senior_priority_since = Some(now);
            self.events.push(PoolEvent::SeniorImpairmentDetected {
                loan,
                senior_bad_debt: self.senior.bad_debt,
            });
        }

        let fully_wiped =
            self.junior.virtual_balance == 0 && self.senior.virtual_balance == 0;
        if self.junior.virtual_balance == 0 && (self.subordination_bps() == 0 || fully_wiped) {
            self.risk_hook.junior_depleted(now);
            self.events.push(PoolEvent::JuniorDepleted);
        }

        Ok(write_off)
    }

    /// Collateral recovery callback. Reverses impairment Senior-first;
    /// anything beyond the recorded bad debt is Junior yield.
    pub fn on_collateral_recovery(
        &mut self,
        loan: LoanId,
        amount: u128,
    ) -> Result<(), PoolError> {
        if amount == 0 {
            return Err(PoolError::ZeroAmount);
        }
        if !self.loans.contains_key(&loan) {
            return Err(PoolError::Unauthorized);
        }

        let outcome = apply_recovery(
            self.junior.virtual_balance,
            self.senior.virtual_balance,
            self.junior.bad_debt,
            self.senior.bad_debt,
            amount,
        );

        // Compute every new value before committing any of them.
        let junior_earned = checked_add(self.junior.interest_earned, outcome.junior_bonus)?;
        let cash = checked_add(self.cash_balance, amount)?;

        self.junior.virtual_balance = outcome.junior_after;
        self.senior.virtual_balance = outcome.senior_after;
        self.senior.bad_debt -= outcome.senior_recovered;
        self.junior.bad_debt -= outcome.junior_recovered;
        self.total_bad_debt = self
            .total_bad_debt
            .saturating_sub(outcome.senior_recovered + outcome.junior_recovered);
        self.junior.interest_earned = junior_earned;
        self.cash_balance = cash;

        self.events.push(PoolEvent::RecoveryApplied {
            loan,
            amount,
            senior_recovered: outcome.senior_recovered,
            junior_recovered: outcome.junior_recovered,
            junior_bonus: outcome.junior_bonus,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Administrative controls
    // ------------------------------------------------------------------

    pub fn set_stress_mode(&mut self, active: bool, now: u64) {
        if active {
            self.stress_mode = true;
            if !self.senior_priority_active {
                self.senior_priority_active = true;
                self.senior_priority_since = Some(now);
            }
        } else {
            // Priority survives until cleared explicitly or auto-expired.
            self.stress_mode = false;
        }
        self.events.push(PoolEvent::StressModeSet { active });
    }

    pub fn clear_senior_priority(&mut self) {
        if self.senior_priority_active {
            self.lift_senior_priority(false);
        }
    }

    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            self.events.push(PoolEvent::Paused);
        }
    }

    pub fn unpause(&mut self) {
        if self.paused {
            self.paused = false;
            self.events.push(PoolEvent::Unpaused);
        }
    }

    fn ensure_params_unlocked(&self) -> Result<(), PoolError> {
        if self.launch_params_locked {
            return Err(PoolError::LaunchParametersLocked);
        }
        Ok(())
    }

    pub fn set_senior_allocation_bps(&mut self, bps: u32) -> Result<(), PoolError> {
        self.ensure_params_unlocked()?;
        validate_senior_allocation(bps)?;
        self.config.senior_allocation_bps = bps;
        Ok(())
    }

    pub fn set_min_subordination_bps(&mut self, bps: u32) -> Result<(), PoolError> {
        self.ensure_params_unlocked()?;
        self.config.min_subordination_bps = bps.min(BPS_DENOMINATOR as u32);
        Ok(())
    }

    pub fn set_junior_coverage_floor_bps(&mut self, bps: u32) -> Result<(), PoolError> {
        self.ensure_params_unlocked()?;
        self.config.junior_coverage_floor_bps = bps.min(BPS_DENOMINATOR as u32);
        Ok(())
    }

    pub fn set_senior_target_yield(&mut self, bps: u32) -> Result<(), PoolError> {
        self.ensure_params_unlocked()?;
        self.config.senior_target_yield_bps = bps;
        self.senior.target_yield_bps = bps;
        Ok(())
    }

    /// One-way lock of the launch parameters.
    pub fn lock_launch_parameters(&mut self) {
        if !self.launch_params_locked {
            self.launch_params_locked = true;
            self.events.push(PoolEvent::LaunchParametersLocked);
        }
    }

    // ------------------------------------------------------------------
    // Self-audit
    // ------------------------------------------------------------------

    /// Enumerate invariants 1 through 8 and return `(true, 0)` or the code of the
    /// first failed invariant. Read-only.
    pub fn check_invariants(&self) -> (bool, u8) {
        // 1: tranche cash attribution matches the pool cash ledger.
        let attributed = self
            .senior
            .virtual_balance
            .saturating_add(self.junior.virtual_balance);
        if attributed != self.cash_balance {
            return (false, 1);
        }

        // 2: no holder has more pending than total shares.
        for pos in self.positions.values() {
            if pos.pending_shares > pos.shares {
                return (false, 2);
            }
        }

        // 3: bad debt split sums to the total.
        if self.senior.bad_debt.saturating_add(self.junior.bad_debt) != self.total_bad_debt {
            return (false, 3);
        }

        // 4: a loss never reached Senior while Junior held cash.
        if self.loss_order_violated {
            return (false, 4);
        }

        // 5: shares outstanding iff some holder has shares.
        for tranche in [TrancheId::Senior, TrancheId::Junior] {
            let any_holder = self
                .positions
                .iter()
                .any(|((t, _), p)| *t == tranche && p.shares > 0);
            let held: u128 = self
                .positions
                .iter()
                .filter(|((t, _), _)| *t == tranche)
                .map(|(_, p)| p.shares)
                .sum();
            let t = self.tranche(tranche);
            if (t.total_shares > 0) != any_holder || held != t.total_shares {
                return (false, 5);
            }
        }

        // 6: the outstanding-principal trackers backing the NAV
        // identity agree at every level.
        let by_loan: u128 = self.loans.values().map(LoanAccount::outstanding).sum();
        let by_tranche = self
            .senior
            .principal_allocated
            .saturating_add(self.junior.principal_allocated);
        if by_loan != self.total_principal_outstanding || by_tranche != by_loan {
            return (false, 6);
        }

        // 7: the most recent allocation respected the coverage floor.
        if !self.last_allocation_coverage_ok {
            return (false, 7);
        }

        // 8: senior impairment implies the stress bundle.
        if self.senior.bad_debt > 0
            && !(self.stress_mode && self.paused && self.senior_priority_active)
        {
            return (false, 8);
        }

        (true, 0)
    }
}
