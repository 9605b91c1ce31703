//! Fail-closed metric guard.
//!
//! When visibility into the loan book is lost, conservatism prefers a
//! false alarm to an undetected solvency breach: every fetch error is
//! replaced by a value that fires its trigger.

use loan_metrics::MemoryLoanBook;
use thiserror::Error;

/// Error surfaced by a loan book source. Remote sources carry their own
/// deadlines and fold timeouts into this.
#[derive(Debug, Clone, Error)]
#[error("loan book fetch failed: {reason}")]
pub struct FetchError {
    pub reason: String,
}

/// Source of loan book snapshots for the scheduler.
pub trait LoanBookSource: Send + Sync {
    fn fetch(&self) -> Result<MemoryLoanBook, FetchError>;
}

/// Loan book snapshots read from a JSON file. A missing or malformed
/// file surfaces as a fetch error, which the guard fails closed.
pub struct FileLoanBookSource {
    pub path: std::path::PathBuf,
}

impl LoanBookSource for FileLoanBookSource {
    fn fetch(&self) -> Result<MemoryLoanBook, FetchError> {
        let bytes = std::fs::read(&self.path).map_err(|e| FetchError {
            reason: format!("{}: {e}", self.path.display()),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError {
            reason: format!("{}: {e}", self.path.display()),
        })
    }
}

/// Substitutions applied when a metric cannot be computed: values chosen
/// so the corresponding triggers fire.
pub const FAIL_CLOSED_MISMATCH_COUNT: u64 = 1;
pub const FAIL_CLOSED_RATE: f64 = 1.0;
pub const FAIL_CLOSED_LIQUIDITY_RATIO: f64 = 0.0;

pub fn fail_closed_count(result: Result<u64, FetchError>, metric: &str) -> u64 {
    result.unwrap_or_else(|e| {
        tracing::error!("{metric} unavailable ({e}); substituting trigger-firing count");
        FAIL_CLOSED_MISMATCH_COUNT
    })
}

pub fn fail_closed_rate(result: Result<f64, FetchError>, metric: &str) -> f64 {
    result.unwrap_or_else(|e| {
        tracing::error!("{metric} unavailable ({e}); substituting worst-case rate");
        FAIL_CLOSED_RATE
    })
}

pub fn fail_closed_ratio(result: Result<f64, FetchError>, metric: &str) -> f64 {
    result.unwrap_or_else(|e| {
        tracing::error!("{metric} unavailable ({e}); substituting empty liquidity");
        FAIL_CLOSED_LIQUIDITY_RATIO
    })
}
