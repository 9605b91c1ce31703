//! Breaker engine: evaluation entry points, incident lifecycle,
//! overrides, and the origination gate.
//!
//! No server-side deduplication: repeated evaluations with breaching
//! values open new incidents; sampling cadence is the caller's job.

use serde::{Deserialize, Serialize};

use crate::audit::{AuditAction, AuditEntry, AuditSink, AuditWriteError};
use crate::catalogue::{Severity, Trigger};
use crate::clock::Clock;
use crate::enforcement::{project, EnforcementState};
use crate::errors::BreakerError;
use crate::incident::{BreakerIncident, IncidentStatus};
use crate::overrides::{BreakerOverride, MAX_OVERRIDE_TTL_MINUTES};
use crate::PartnerId;

/// Report keys recognized by settlement reconciliation. Unknown report
/// keys are ignored.
const RECONCILIATION_REPORTS: &[(&str, Trigger)] = &[
    ("FIAT_CONFIRMED_NO_CHAIN_TX", Trigger::FiatConfirmedNoChainRecord),
    (
        "CHAIN_ACTIVE_NO_FIAT_DISBURSEMENT_PROOF",
        Trigger::ActiveWithoutDisbursementProof,
    ),
];

/// Sentinel metric recorded on governance drill incidents.
const DRILL_METRIC: f64 = -1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub report: String,
    pub count: u64,
}

/// Returned to the scheduler when a trigger fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub incident_id: u64,
    pub trigger: Trigger,
    pub severity: Severity,
    pub partner_id: Option<PartnerId>,
    pub metric_value: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRequest {
    pub trigger: Trigger,
    pub partner_id: Option<PartnerId>,
    pub reason: String,
    pub operator: String,
    pub expires_in_minutes: u64,
}

pub struct BreakerEngine<A: AuditSink, C: Clock> {
    incidents: Vec<BreakerIncident>,
    overrides: Vec<BreakerOverride>,
    next_incident_id: u64,
    next_override_id: u64,
    audit: A,
    clock: C,
}

impl<A: AuditSink, C: Clock> BreakerEngine<A, C> {
    pub fn new(audit: A, clock: C) -> Self {
        Self {
            incidents: Vec::new(),
            overrides: Vec::new(),
            next_incident_id: 1,
            next_override_id: 1,
            audit,
            clock,
        }
    }

    pub fn incidents(&self) -> &[BreakerIncident] {
        &self.incidents
    }

    pub fn overrides(&self) -> &[BreakerOverride] {
        &self.overrides
    }

    pub fn audit(&self) -> &A {
        &self.audit
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    // ------------------------------------------------------------------
    // Enforcement
    // ------------------------------------------------------------------

    /// Derive the current enforcement snapshot.
    pub fn enforcement_state(&self) -> EnforcementState {
        project(&self.incidents, &self.overrides, self.clock.now())
    }

    /// Origination gate. A hot read path: projects a snapshot and fails
    /// closed with an opaque `Forbidden`.
    pub fn assert_origination_allowed(&self, partner_id: PartnerId) -> Result<(), BreakerError> {
        if self.enforcement_state().blocks(partner_id) {
            return Err(BreakerError::Forbidden);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Trigger evaluation
    // ------------------------------------------------------------------

    /// Map settlement reconciliation reports onto triggers. Any report
    /// with a positive count opens an incident.
    pub fn evaluate_reconciliation(
        &mut self,
        reports: &[ReconciliationReport],
    ) -> Result<Vec<Alert>, BreakerError> {
        let mut alerts = Vec::new();
        for report in reports {
            let Some((_, trigger)) = RECONCILIATION_REPORTS
                .iter()
                .find(|(key, _)| *key == report.report)
            else {
                continue;
            };
            if report.count == 0 {
                continue;
            }
            let alert = self.open_incident(
                *trigger,
                None,
                report.count as f64,
                Some(format!("{} mismatches: {}", report.report, report.count)),
                "scheduler",
            )?;
            alerts.push(alert);
        }
        Ok(alerts)
    }

    /// Fires strictly above the 8% catalogue threshold.
    pub fn evaluate_partner_default_spike(
        &mut self,
        partner_id: PartnerId,
        rate: f64,
    ) -> Result<Option<Alert>, BreakerError> {
        self.evaluate_higher_is_worse(Trigger::PartnerDefaultRate30D, Some(partner_id), rate)
    }

    /// Fires strictly above the 15% catalogue threshold.
    pub fn evaluate_delinquency_spike(
        &mut self,
        partner_id: PartnerId,
        rate: f64,
    ) -> Result<Option<Alert>, BreakerError> {
        self.evaluate_higher_is_worse(Trigger::PartnerDelinquency14D, Some(partner_id), rate)
    }

    /// Fires strictly below the 25% liquidity threshold.
    pub fn evaluate_liquidity_ratio_breach(
        &mut self,
        ratio: f64,
    ) -> Result<Option<Alert>, BreakerError> {
        let threshold = Trigger::PoolLiquidityRatio.spec().threshold;
        if ratio >= threshold {
            return Ok(None);
        }
        self.open_incident(
            Trigger::PoolLiquidityRatio,
            None,
            ratio,
            Some(format!("liquidity ratio {ratio:.4} below {threshold:.2}")),
            "scheduler",
        )
        .map(Some)
    }

    /// Fires strictly above the 2% drawdown threshold.
    pub fn evaluate_nav_drawdown(
        &mut self,
        pool_label: &str,
        drawdown: f64,
    ) -> Result<Option<Alert>, BreakerError> {
        let threshold = Trigger::PoolNavDrawdown7D.spec().threshold;
        if drawdown <= threshold {
            return Ok(None);
        }
        self.open_incident(
            Trigger::PoolNavDrawdown7D,
            None,
            drawdown,
            Some(format!("pool {pool_label} NAV drawdown {drawdown:.4}")),
            "scheduler",
        )
        .map(Some)
    }

    /// Tranche-level signals raised by the pool engine.
    pub fn report_junior_depletion(&mut self) -> Result<Alert, BreakerError> {
        self.open_incident(Trigger::JuniorDepletion, None, 0.0, None, "pool")
    }

    pub fn report_senior_drawdown(&mut self, impairment: f64) -> Result<Alert, BreakerError> {
        self.open_incident(Trigger::SeniorDrawdown, None, impairment, None, "pool")
    }

    fn evaluate_higher_is_worse(
        &mut self,
        trigger: Trigger,
        partner_id: Option<PartnerId>,
        value: f64,
    ) -> Result<Option<Alert>, BreakerError> {
        let threshold = trigger.spec().threshold;
        if value <= threshold {
            return Ok(None);
        }
        self.open_incident(trigger, partner_id, value, None, "scheduler")
            .map(Some)
    }

    fn open_incident(
        &mut self,
        trigger: Trigger,
        partner_id: Option<PartnerId>,
        metric_value: f64,
        note: Option<String>,
        operator: &str,
    ) -> Result<Alert, BreakerError> {
        let spec = trigger.spec();
        let now = self.clock.now();
        let id = self.next_incident_id;

        let incident = BreakerIncident {
            id,
            trigger,
            severity: spec.severity,
            scope: spec.scope,
            partner_id,
            metric_value,
            threshold: spec.threshold,
            actions_applied: trigger.actions(),
            status: IncidentStatus::Open,
            opened_at: now,
            acknowledged_at: None,
            resolved_at: None,
            acknowledged_by: None,
            resolved_by: None,
            note: note.clone(),
        };

        self.write_audit(AuditEntry {
            timestamp: now,
            operator: operator.to_string(),
            action: AuditAction::IncidentOpened { incident_id: id },
            trigger: Some(trigger),
            scope: Some(spec.scope),
            partner_id,
            metric_value: Some(metric_value),
            note: note.unwrap_or_default(),
        })?;

        self.incidents.push(incident);
        self.next_incident_id += 1;

        Ok(Alert {
            incident_id: id,
            trigger,
            severity: spec.severity,
            partner_id,
            metric_value,
            threshold: spec.threshold,
        })
    }

    // ------------------------------------------------------------------
    // Incident lifecycle
    // ------------------------------------------------------------------

    pub fn acknowledge_incident(
        &mut self,
        id: u64,
        operator: &str,
    ) -> Result<(), BreakerError> {
        let now = self.clock.now();
        let (trigger, scope, partner_id, metric) = {
            let incident = self.incident_mut(id)?;
            if incident.status != IncidentStatus::Open {
                return Err(BreakerError::InvalidIncidentState);
            }
            (
                incident.trigger,
                incident.scope,
                incident.partner_id,
                incident.metric_value,
            )
        };

        // Journal first: once the entry is durable, the mutation below
        // cannot fail, so no state change goes unlogged.
        self.write_audit(AuditEntry {
            timestamp: now,
            operator: operator.to_string(),
            action: AuditAction::IncidentAcknowledged { incident_id: id },
            trigger: Some(trigger),
            scope: Some(scope),
            partner_id,
            metric_value: Some(metric),
            note: String::new(),
        })?;

        let incident = self.incident_mut(id).expect("incident existence checked above");
        incident.status = IncidentStatus::Acknowledged;
        incident.acknowledged_at = Some(now);
        incident.acknowledged_by = Some(operator.to_string());
        Ok(())
    }

    pub fn resolve_incident(
        &mut self,
        id: u64,
        operator: &str,
        note: &str,
    ) -> Result<(), BreakerError> {
        let now = self.clock.now();
        let (trigger, scope, partner_id, metric) = {
            let incident = self.incident_mut(id)?;
            if incident.status == IncidentStatus::Resolved {
                return Err(BreakerError::InvalidIncidentState);
            }
            (
                incident.trigger,
                incident.scope,
                incident.partner_id,
                incident.metric_value,
            )
        };

        self.write_audit(AuditEntry {
            timestamp: now,
            operator: operator.to_string(),
            action: AuditAction::IncidentResolved { incident_id: id },
            trigger: Some(trigger),
            scope: Some(scope),
            partner_id,
            metric_value: Some(metric),
            note: note.to_string(),
        })?;

        let incident = self.incident_mut(id).expect("incident existence checked above");
        incident.status = IncidentStatus::Resolved;
        incident.resolved_at = Some(now);
        incident.resolved_by = Some(operator.to_string());
        Ok(())
    }

    /// Resolve every open liquidity incident older than the stability
    /// window, provided the current ratio is back at or above threshold.
    pub fn auto_clear_liquidity_incidents_if_stable(
        &mut self,
        current_ratio: f64,
        stability_window_secs: u64,
        operator: &str,
    ) -> Result<Vec<u64>, BreakerError> {
        let threshold = Trigger::PoolLiquidityRatio.spec().threshold;
        if current_ratio < threshold {
            return Ok(Vec::new());
        }

        let now = self.clock.now();
        let eligible: Vec<u64> = self
            .incidents
            .iter()
            .filter(|i| {
                i.trigger == Trigger::PoolLiquidityRatio
                    && i.status == IncidentStatus::Open
                    && i.age(now) > stability_window_secs
            })
            .map(|i| i.id)
            .collect();

        for id in &eligible {
            let metric = self.incident_mut(*id)?.metric_value;

            self.write_audit(AuditEntry {
                timestamp: now,
                operator: operator.to_string(),
                action: AuditAction::IncidentResolved { incident_id: *id },
                trigger: Some(Trigger::PoolLiquidityRatio),
                scope: Some(Trigger::PoolLiquidityRatio.spec().scope),
                partner_id: None,
                metric_value: Some(metric),
                note: format!(
                    "auto-resolved after stability window (ratio {current_ratio:.4})"
                ),
            })?;

            let incident = self.incident_mut(*id).expect("eligibility scan found it");
            incident.status = IncidentStatus::Resolved;
            incident.resolved_at = Some(now);
            incident.resolved_by = Some(operator.to_string());
        }

        Ok(eligible)
    }

    fn incident_mut(&mut self, id: u64) -> Result<&mut BreakerIncident, BreakerError> {
        self.incidents
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(BreakerError::IncidentNotFound { id })
    }

    // ------------------------------------------------------------------
    // Overrides
    // ------------------------------------------------------------------

    pub fn apply_override(&mut self, req: OverrideRequest) -> Result<u64, BreakerError> {
        if req.expires_in_minutes == 0 || req.expires_in_minutes > MAX_OVERRIDE_TTL_MINUTES {
            return Err(BreakerError::OverrideExpiryOutOfRange {
                minutes: req.expires_in_minutes,
            });
        }

        let now = self.clock.now();
        let id = self.next_override_id;
        let record = BreakerOverride {
            id,
            trigger: req.trigger,
            scope: req.trigger.spec().scope,
            partner_id: req.partner_id,
            reason: req.reason.clone(),
            operator: req.operator.clone(),
            created_at: now,
            expires_at: now + req.expires_in_minutes * 60,
            lifted_at: None,
            lifted_by: None,
        };

        self.write_audit(AuditEntry {
            timestamp: now,
            operator: req.operator,
            action: AuditAction::OverrideApplied { override_id: id },
            trigger: Some(req.trigger),
            scope: Some(req.trigger.spec().scope),
            partner_id: req.partner_id,
            metric_value: None,
            note: req.reason,
        })?;

        self.overrides.push(record);
        self.next_override_id += 1;
        Ok(id)
    }

    /// Lifting twice is rejected, not absorbed.
    pub fn lift_override(&mut self, id: u64, operator: &str) -> Result<(), BreakerError> {
        let now = self.clock.now();
        let (trigger, scope, partner_id) = {
            let record = self
                .overrides
                .iter()
                .find(|o| o.id == id)
                .ok_or(BreakerError::OverrideNotFound { id })?;
            if record.lifted_at.is_some() {
                return Err(BreakerError::OverrideAlreadyLifted);
            }
            (record.trigger, record.scope, record.partner_id)
        };

        self.write_audit(AuditEntry {
            timestamp: now,
            operator: operator.to_string(),
            action: AuditAction::OverrideLifted { override_id: id },
            trigger: Some(trigger),
            scope: Some(scope),
            partner_id,
            metric_value: None,
            note: String::new(),
        })?;

        let record = self
            .overrides
            .iter_mut()
            .find(|o| o.id == id)
            .expect("override existence checked above");
        record.lifted_at = Some(now);
        record.lifted_by = Some(operator.to_string());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Governance drill
    // ------------------------------------------------------------------

    /// Open a synthetic incident to rehearse the full incident workflow.
    pub fn fire_drill_trigger(
        &mut self,
        trigger: Trigger,
        operator: &str,
    ) -> Result<Alert, BreakerError> {
        self.open_incident(
            trigger,
            None,
            DRILL_METRIC,
            Some(format!("GOVERNANCE_DRILL fired by {operator}")),
            operator,
        )
    }

    fn write_audit(&mut self, entry: AuditEntry) -> Result<(), BreakerError> {
        self.audit.append(entry).map_err(BreakerError::from)
    }
}

impl From<AuditWriteError> for BreakerError {
    fn from(e: AuditWriteError) -> Self {
        BreakerError::AuditWriteFailed { reason: e.reason }
    }
}
