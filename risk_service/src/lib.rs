//! Risk Service library surface.
//!
//! The binary wires these pieces to env configuration; tests drive the
//! router and scheduler directly.

pub mod guard;
pub mod hooks;
pub mod http;
pub mod scheduler;
pub mod state;

pub use guard::{FetchError, FileLoanBookSource, LoanBookSource};
pub use hooks::{spawn_breaker_hook, BreakerRiskHook};
pub use scheduler::Scheduler;
pub use state::{AppState, SharedBreaker, SharedPool};
