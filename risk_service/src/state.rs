//! Shared service state.
//!
//! Both engines sit behind RwLocks: scheduler callbacks and admin
//! handlers serialize their writes, the hot origination gate takes a
//! shared snapshot.

use std::sync::Arc;

use pool_core::TranchePool;
use risk_breaker::{BreakerEngine, MemoryAudit, SystemClock};
use tokio::sync::RwLock;

pub type SharedBreaker = Arc<RwLock<BreakerEngine<MemoryAudit, SystemClock>>>;
pub type SharedPool = Arc<RwLock<TranchePool>>;

#[derive(Clone)]
pub struct AppState {
    pub breaker: SharedBreaker,
    pub pool: SharedPool,
    /// Bearer secret for the admin surface.
    pub admin_token: Arc<String>,
}

impl AppState {
    pub fn new(breaker: SharedBreaker, pool: SharedPool, admin_token: String) -> Self {
        Self {
            breaker,
            pool,
            admin_token: Arc::new(admin_token),
        }
    }
}
