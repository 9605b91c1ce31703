//! Breaker error taxonomy.
//!
//! `Forbidden` tags enforcement blocks distinctly from bad input so the
//! origination gate can hide internals while validation errors stay
//! explicit.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BreakerError {
    /// Origination blocked by the current enforcement state.
    #[error("forbidden")]
    Forbidden,

    #[error("unknown trigger key: {key}")]
    TriggerUnknown { key: String },

    #[error("incident {id} does not exist")]
    IncidentNotFound { id: u64 },

    #[error("incident is not in a state that allows this transition")]
    InvalidIncidentState,

    #[error("override {id} does not exist")]
    OverrideNotFound { id: u64 },

    #[error("override was already lifted")]
    OverrideAlreadyLifted,

    #[error("override expiry {minutes} minutes outside (0, 10080]")]
    OverrideExpiryOutOfRange { minutes: u64 },

    /// Fatal: a state transition could not be journaled.
    #[error("audit log write failed: {reason}")]
    AuditWriteFailed { reason: String },
}
