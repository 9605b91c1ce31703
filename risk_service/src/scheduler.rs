//! Scheduled metric evaluation.
//!
//! Three cadences run concurrently; each callback is idempotent on its
//! own input. Ticks are dropped, not queued, when a prior run of the same
//! cadence is still executing. Shutdown is observed between metric reads
//! so a partially-committed incident write is never abandoned mid-flight.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, NaiveTime, Utc};
use loan_metrics::{
    active_without_disbursement_proof, fiat_confirmed_no_chain_record, partner_default_rate_30d,
    partner_delinquency_14d, pool_liquidity_ratio, pool_nav_drawdown_7d,
};
use risk_breaker::{BreakerError, ReconciliationReport};
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::guard::{
    fail_closed_count, fail_closed_rate, fail_closed_ratio, FetchError, LoanBookSource,
};
use crate::state::AppState;

const SETTLEMENT_PERIOD: Duration = Duration::from_secs(5 * 60);
const CREDIT_LIQUIDITY_PERIOD: Duration = Duration::from_secs(60 * 60);

fn daily_reconciliation_time() -> NaiveTime {
    NaiveTime::from_hms_opt(3, 0, 0).expect("03:00:00 is a valid time of day")
}

pub struct Scheduler {
    state: AppState,
    source: Arc<dyn LoanBookSource>,
    stability_window_secs: u64,
    shutdown: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(
        state: AppState,
        source: Arc<dyn LoanBookSource>,
        stability_window_secs: u64,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            state,
            source,
            stability_window_secs,
            shutdown,
        }
    }

    pub fn spawn_all(self) {
        let settlement = Self {
            state: self.state.clone(),
            source: self.source.clone(),
            stability_window_secs: self.stability_window_secs,
            shutdown: self.shutdown.clone(),
        };
        let hourly = Self {
            state: self.state.clone(),
            source: self.source.clone(),
            stability_window_secs: self.stability_window_secs,
            shutdown: self.shutdown.clone(),
        };
        tokio::spawn(settlement.run_settlement_loop());
        tokio::spawn(hourly.run_credit_liquidity_loop());
        tokio::spawn(self.run_daily_loop());
    }

    fn stopping(&self) -> bool {
        *self.shutdown.borrow()
    }

    async fn run_settlement_loop(self) {
        let mut ticker = interval(SETTLEMENT_PERIOD);
        // Dropped, not queued: a slow run swallows its missed ticks.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut shutdown = self.shutdown.clone();
        tracing::info!("settlement reconciliation loop started (every 5m)");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.settlement_cycle().await;
                }
                _ = shutdown.changed() => {
                    tracing::info!("settlement loop stopping");
                    return;
                }
            }
        }
    }

    async fn run_credit_liquidity_loop(self) {
        let mut ticker = interval(CREDIT_LIQUIDITY_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut shutdown = self.shutdown.clone();
        tracing::info!("credit/liquidity loop started (hourly)");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.credit_liquidity_cycle().await;
                }
                _ = shutdown.changed() => {
                    tracing::info!("credit/liquidity loop stopping");
                    return;
                }
            }
        }
    }

    async fn run_daily_loop(self) {
        let mut shutdown = self.shutdown.clone();
        tracing::info!("daily reconciliation loop started (03:00 UTC)");
        loop {
            let wait = seconds_until_daily_run();
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(wait)) => {
                    tracing::info!("daily full reconciliation starting");
                    self.settlement_cycle().await;
                    if self.stopping() {
                        return;
                    }
                    self.credit_liquidity_cycle().await;
                }
                _ = shutdown.changed() => {
                    tracing::info!("daily loop stopping");
                    return;
                }
            }
        }
    }

    /// Settlement-integrity reconciliation: mismatch counts mapped onto
    /// report keys, fail-closed on fetch errors.
    pub async fn settlement_cycle(&self) {
        let book = self.source.fetch();

        let fiat_no_chain = fail_closed_count(
            book.as_ref()
                .map(|b| fiat_confirmed_no_chain_record(b))
                .map_err(clone_err),
            "fiat-confirmed-no-chain-record",
        );
        if self.stopping() {
            return;
        }
        let active_no_proof = fail_closed_count(
            book.as_ref()
                .map(|b| active_without_disbursement_proof(b))
                .map_err(clone_err),
            "active-without-disbursement-proof",
        );

        let reports = vec![
            ReconciliationReport {
                report: "FIAT_CONFIRMED_NO_CHAIN_TX".to_string(),
                count: fiat_no_chain,
            },
            ReconciliationReport {
                report: "CHAIN_ACTIVE_NO_FIAT_DISBURSEMENT_PROOF".to_string(),
                count: active_no_proof,
            },
        ];

        let mut breaker = self.state.breaker.write().await;
        match breaker.evaluate_reconciliation(&reports) {
            Ok(alerts) => {
                for alert in alerts {
                    tracing::warn!(
                        trigger = alert.trigger.key(),
                        metric = alert.metric_value,
                        incident = alert.incident_id,
                        "settlement trigger fired"
                    );
                }
            }
            Err(e) => self.escalate(e).await,
        }
    }

    /// Credit and liquidity metrics, plus the liquidity auto-clear.
    pub async fn credit_liquidity_cycle(&self) {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let book = self.source.fetch();

        let default_rates = book
            .as_ref()
            .map(|b| partner_default_rate_30d(b, now))
            .map_err(clone_err);
        match default_rates {
            Ok(rates) => {
                for (partner, rate) in rates {
                    self.evaluate_default_spike(partner, rate).await;
                }
            }
            Err(e) => {
                // Partner identity is unknown when the book is dark;
                // conservative bound goes to the sentinel partner 0.
                tracing::error!("default rates unavailable ({e}); failing closed");
                self.evaluate_default_spike(0, fail_closed_rate(Err(e), "default rate"))
                    .await;
            }
        }
        if self.stopping() {
            return;
        }

        match book
            .as_ref()
            .map(|b| partner_delinquency_14d(b, now))
            .map_err(clone_err)
        {
            Ok(rates) => {
                for (partner, rate) in rates {
                    self.evaluate_delinquency(partner, rate).await;
                }
            }
            Err(e) => {
                tracing::error!("delinquency unavailable ({e}); failing closed");
                self.evaluate_delinquency(0, fail_closed_rate(Err(e), "delinquency"))
                    .await;
            }
        }
        if self.stopping() {
            return;
        }

        let worst_ratio = fail_closed_ratio(
            book.as_ref()
                .map(|b| {
                    pool_liquidity_ratio(b)
                        .values()
                        .copied()
                        .fold(1.0_f64, f64::min)
                })
                .map_err(clone_err),
            "liquidity ratio",
        );
        {
            let mut breaker = self.state.breaker.write().await;
            if let Err(e) = breaker.evaluate_liquidity_ratio_breach(worst_ratio) {
                self.escalate(e).await;
            }
        }
        if self.stopping() {
            return;
        }

        match book
            .as_ref()
            .map(|b| pool_nav_drawdown_7d(b, now))
            .map_err(clone_err)
        {
            Ok(drawdowns) => {
                for (pool, drawdown) in drawdowns {
                    let mut breaker = self.state.breaker.write().await;
                    if let Err(e) =
                        breaker.evaluate_nav_drawdown(&pool.to_string(), drawdown)
                    {
                        self.escalate(e).await;
                    }
                }
            }
            Err(e) => {
                tracing::error!("nav drawdown unavailable ({e}); failing closed");
                let worst = fail_closed_rate(Err(e), "nav drawdown");
                let mut breaker = self.state.breaker.write().await;
                if let Err(e) = breaker.evaluate_nav_drawdown("unknown", worst) {
                    self.escalate(e).await;
                }
            }
        }

        let mut breaker = self.state.breaker.write().await;
        match breaker.auto_clear_liquidity_incidents_if_stable(
            worst_ratio,
            self.stability_window_secs,
            "scheduler",
        ) {
            Ok(cleared) if !cleared.is_empty() => {
                tracing::info!(incidents = ?cleared, "liquidity incidents auto-cleared");
            }
            Ok(_) => {}
            Err(e) => self.escalate(e).await,
        }
    }

    async fn evaluate_default_spike(&self, partner: u64, rate: f64) {
        let mut breaker = self.state.breaker.write().await;
        match breaker.evaluate_partner_default_spike(partner, rate) {
            Ok(Some(alert)) => {
                tracing::warn!(partner, rate, incident = alert.incident_id, "default spike");
            }
            Ok(None) => {}
            Err(e) => self.escalate(e).await,
        }
    }

    async fn evaluate_delinquency(&self, partner: u64, rate: f64) {
        let mut breaker = self.state.breaker.write().await;
        match breaker.evaluate_delinquency_spike(partner, rate) {
            Ok(Some(alert)) => {
                tracing::warn!(partner, rate, incident = alert.incident_id, "delinquency spike");
            }
            Ok(None) => {}
            Err(e) => self.escalate(e).await,
        }
    }

    /// A breaker failure here means the audit journal is broken: take the
    /// pool offline rather than run unlogged.
    async fn escalate(&self, error: BreakerError) {
        tracing::error!("breaker transition failed fatally: {error}; pausing pool");
        self.state.pool.write().await.pause();
    }
}

fn clone_err(e: &FetchError) -> FetchError {
    e.clone()
}

/// Seconds until the next 03:00 UTC.
fn seconds_until_daily_run() -> u64 {
    let now = Utc::now();
    let today_run = now
        .date_naive()
        .and_time(daily_reconciliation_time())
        .and_utc();
    let next = if today_run > now {
        today_run
    } else {
        today_run + ChronoDuration::days(1)
    };
    (next - now).num_seconds().max(1) as u64
}
