//! Append-only audit sink.
//!
//! The sink is injected at engine construction; the in-memory
//! implementation backs tests and the admin `GET /audit` view, a durable
//! one can be swapped in without touching the engine.

use serde::{Deserialize, Serialize};

use crate::catalogue::{Scope, Trigger};
use crate::PartnerId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AuditAction {
    IncidentOpened { incident_id: u64 },
    IncidentAcknowledged { incident_id: u64 },
    IncidentResolved { incident_id: u64 },
    OverrideApplied { override_id: u64 },
    OverrideLifted { override_id: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub timestamp: u64,
    pub operator: String,
    pub action: AuditAction,
    pub trigger: Option<Trigger>,
    pub scope: Option<Scope>,
    pub partner_id: Option<PartnerId>,
    pub metric_value: Option<f64>,
    pub note: String,
}

/// Failure to persist an audit entry. Fatal for the enclosing transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("audit sink rejected entry: {reason}")]
pub struct AuditWriteError {
    pub reason: String,
}

pub trait AuditSink: Send {
    fn append(&mut self, entry: AuditEntry) -> Result<(), AuditWriteError>;
}

/// Audit log held in memory.
#[derive(Debug, Default)]
pub struct MemoryAudit {
    entries: Vec<AuditEntry>,
}

impl MemoryAudit {
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }
}

impl AuditSink for MemoryAudit {
    fn append(&mut self, entry: AuditEntry) -> Result<(), AuditWriteError> {
        self.entries.push(entry);
        Ok(())
    }
}
