//! Pool-to-breaker signal wiring.
//!
//! The pool engine raises risk signals synchronously from inside its
//! write path; they cross into the async breaker through an unbounded
//! channel so the pool never blocks on a breaker lock.

use pool_core::RiskHook;
use tokio::sync::mpsc;

use crate::state::SharedBreaker;

pub struct BreakerRiskHook {
    tx: mpsc::UnboundedSender<u64>,
}

impl RiskHook for BreakerRiskHook {
    fn junior_depleted(&mut self, now: u64) {
        // A dropped receiver means the service is shutting down.
        let _ = self.tx.send(now);
    }
}

/// Build the hook and spawn the task that forwards signals into the
/// breaker as JuniorDepletion incidents.
pub fn spawn_breaker_hook(breaker: SharedBreaker) -> BreakerRiskHook {
    let (tx, mut rx) = mpsc::unbounded_channel::<u64>();

    tokio::spawn(async move {
        while let Some(at) = rx.recv().await {
            let mut engine = breaker.write().await;
            match engine.report_junior_depletion() {
                Ok(alert) => {
                    tracing::error!(
                        incident = alert.incident_id,
                        at,
                        "junior tranche depleted; originations blocked"
                    );
                }
                Err(e) => {
                    tracing::error!("failed to open junior depletion incident: {e}");
                }
            }
        }
    });

    BreakerRiskHook { tx }
}
