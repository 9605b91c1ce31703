//! Breaker end-to-end scenarios.

use risk_breaker::{
    AuditAction, AuditEntry, AuditSink, AuditWriteError, BreakerEngine, BreakerError, FixedClock,
    IncidentStatus, MemoryAudit, OverrideRequest, ReconciliationReport, Trigger,
};

fn engine() -> BreakerEngine<MemoryAudit, FixedClock> {
    BreakerEngine::new(MemoryAudit::default(), FixedClock::at(1_000))
}

fn reports(pairs: &[(&str, u64)]) -> Vec<ReconciliationReport> {
    pairs
        .iter()
        .map(|(report, count)| ReconciliationReport {
            report: report.to_string(),
            count: *count,
        })
        .collect()
}

#[test]
fn partner_default_spike_blocks_that_partner_only() {
    let mut engine = engine();

    let alert = engine
        .evaluate_partner_default_spike(1, 0.12)
        .unwrap()
        .expect("0.12 > 0.08 must fire");
    assert_eq!(alert.trigger, Trigger::PartnerDefaultRate30D);
    assert_eq!(alert.partner_id, Some(1));

    assert_eq!(
        engine.assert_origination_allowed(1).unwrap_err(),
        BreakerError::Forbidden
    );
    engine.assert_origination_allowed(2).unwrap();
    engine.assert_origination_allowed(3).unwrap();
    assert!(!engine.enforcement_state().global_block);
}

#[test]
fn at_threshold_does_not_fire() {
    let mut engine = engine();

    assert!(engine.evaluate_partner_default_spike(1, 0.08).unwrap().is_none());
    assert!(engine
        .evaluate_partner_default_spike(1, 0.08 + 1e-9)
        .unwrap()
        .is_some());

    assert!(engine.evaluate_delinquency_spike(1, 0.15).unwrap().is_none());
    assert!(engine.evaluate_liquidity_ratio_breach(0.25).unwrap().is_none());
    assert!(engine.evaluate_liquidity_ratio_breach(0.2499).unwrap().is_some());
    assert!(engine.evaluate_nav_drawdown("main", 0.02).unwrap().is_none());
    assert!(engine.evaluate_nav_drawdown("main", 0.021).unwrap().is_some());
}

#[test]
fn liquidity_incident_auto_clears_after_stability_window() {
    let mut engine = engine();

    let alert = engine
        .evaluate_liquidity_ratio_breach(0.18)
        .unwrap()
        .expect("0.18 < 0.25 must fire");
    assert!(engine.enforcement_state().global_freeze);

    // Inside the window nothing clears, even at a healthy ratio.
    engine.clock().advance(1_800);
    let cleared = engine
        .auto_clear_liquidity_incidents_if_stable(0.35, 3_600, "scheduler")
        .unwrap();
    assert!(cleared.is_empty());

    // Past the window with a healthy ratio the incident resolves.
    engine.clock().advance(1_801);
    let cleared = engine
        .auto_clear_liquidity_incidents_if_stable(0.35, 3_600, "scheduler")
        .unwrap();
    assert_eq!(cleared, vec![alert.incident_id]);
    assert!(!engine.enforcement_state().global_freeze);

    let note = &engine
        .audit()
        .entries()
        .last()
        .expect("auto-clear writes audit")
        .note;
    assert!(note.contains("auto-resolved"), "note was {note:?}");

    // Past the window with an unhealthy ratio nothing clears.
    let mut engine2 = engine_with_breach();
    engine2.clock().advance(7_200);
    let cleared = engine2
        .auto_clear_liquidity_incidents_if_stable(0.20, 3_600, "scheduler")
        .unwrap();
    assert!(cleared.is_empty());
}

fn engine_with_breach() -> BreakerEngine<MemoryAudit, FixedClock> {
    let mut e = engine();
    e.evaluate_liquidity_ratio_breach(0.18).unwrap().unwrap();
    e
}

#[test]
fn fiat_mismatch_report_blocks_all_originations() {
    let mut engine = engine();

    let alerts = engine
        .evaluate_reconciliation(&reports(&[
            ("FIAT_CONFIRMED_NO_CHAIN_TX", 3),
            ("CHAIN_ACTIVE_NO_FIAT_DISBURSEMENT_PROOF", 0),
            ("SOME_UNKNOWN_REPORT", 9),
        ]))
        .unwrap();

    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].trigger, Trigger::FiatConfirmedNoChainRecord);
    assert_eq!(alerts[0].metric_value, 3.0);

    let open: Vec<_> = engine
        .incidents()
        .iter()
        .filter(|i| i.status == IncidentStatus::Open)
        .collect();
    assert_eq!(open.len(), 1);

    assert!(engine.enforcement_state().global_block);
    assert_eq!(
        engine.assert_origination_allowed(42).unwrap_err(),
        BreakerError::Forbidden
    );
}

#[test]
fn override_lift_is_rejected_twice() {
    let mut engine = engine();

    let id = engine
        .apply_override(OverrideRequest {
            trigger: Trigger::PartnerDefaultRate30D,
            partner_id: Some(1),
            reason: "verified false positive".into(),
            operator: "ops".into(),
            expires_in_minutes: 60,
        })
        .unwrap();

    engine.lift_override(id, "ops").unwrap();
    assert_eq!(
        engine.lift_override(id, "ops").unwrap_err(),
        BreakerError::OverrideAlreadyLifted
    );
}

#[test]
fn override_expiry_is_clamped_to_seven_days() {
    let mut engine = engine();
    let request = |minutes| OverrideRequest {
        trigger: Trigger::PoolLiquidityRatio,
        partner_id: None,
        reason: "drill".into(),
        operator: "ops".into(),
        expires_in_minutes: minutes,
    };

    assert_eq!(
        engine.apply_override(request(0)).unwrap_err(),
        BreakerError::OverrideExpiryOutOfRange { minutes: 0 }
    );
    assert_eq!(
        engine.apply_override(request(10_081)).unwrap_err(),
        BreakerError::OverrideExpiryOutOfRange { minutes: 10_081 }
    );
    engine.apply_override(request(1)).unwrap();
    engine.apply_override(request(10_080)).unwrap();
}

#[test]
fn override_masks_matching_incident_until_expiry() {
    let mut engine = engine();
    engine.evaluate_partner_default_spike(7, 0.2).unwrap().unwrap();
    assert!(engine.assert_origination_allowed(7).is_err());

    engine
        .apply_override(OverrideRequest {
            trigger: Trigger::PartnerDefaultRate30D,
            partner_id: Some(7),
            reason: "partner remediated".into(),
            operator: "ops".into(),
            expires_in_minutes: 30,
        })
        .unwrap();

    engine.assert_origination_allowed(7).unwrap();

    // Expired override stops masking.
    engine.clock().advance(30 * 60);
    assert!(engine.assert_origination_allowed(7).is_err());
}

#[test]
fn enforcement_projection_is_rederivable() {
    let mut engine = engine();
    engine.evaluate_partner_default_spike(1, 0.3).unwrap();
    engine.evaluate_delinquency_spike(2, 0.5).unwrap();
    engine.evaluate_liquidity_ratio_breach(0.1).unwrap();

    let a = engine.enforcement_state();
    let b = engine.enforcement_state();
    assert_eq!(a, b);
    assert!(a.global_freeze);
    assert!(a.blocked_partner_ids.contains(&1));
    assert!(a.tightened_partner_ids.contains(&2));
}

#[test]
fn incident_lifecycle_is_one_directional() {
    let mut engine = engine();
    let alert = engine.fire_drill_trigger(Trigger::SeniorDrawdown, "ops").unwrap();
    let id = alert.incident_id;

    let drill = &engine.incidents()[0];
    assert_eq!(drill.metric_value, -1.0);
    assert!(drill.note.as_deref().unwrap().starts_with("GOVERNANCE_DRILL"));

    engine.acknowledge_incident(id, "ops").unwrap();
    // Ack from non-Open is rejected.
    assert_eq!(
        engine.acknowledge_incident(id, "ops").unwrap_err(),
        BreakerError::InvalidIncidentState
    );

    // Acknowledged incidents still enforce.
    assert!(engine.enforcement_state().global_block);

    engine.resolve_incident(id, "ops", "drill complete").unwrap();
    assert!(!engine.enforcement_state().global_block);
    assert_eq!(
        engine.resolve_incident(id, "ops", "again").unwrap_err(),
        BreakerError::InvalidIncidentState
    );

    // Every transition left an audit entry.
    let actions: Vec<_> = engine
        .audit()
        .entries()
        .iter()
        .map(|e| std::mem::discriminant(&e.action))
        .collect();
    assert_eq!(actions.len(), 3);
    assert_eq!(
        engine.audit().entries()[0].action,
        AuditAction::IncidentOpened { incident_id: id }
    );
}

#[test]
fn repeated_breaches_open_new_incidents() {
    // No server-side dedup: cadence control is the caller's job.
    let mut engine = engine();
    engine.evaluate_partner_default_spike(1, 0.2).unwrap();
    engine.evaluate_partner_default_spike(1, 0.2).unwrap();
    assert_eq!(engine.incidents().len(), 2);
}

struct FailingAudit;

impl AuditSink for FailingAudit {
    fn append(&mut self, _entry: AuditEntry) -> Result<(), AuditWriteError> {
        Err(AuditWriteError {
            reason: "disk full".into(),
        })
    }
}

#[test]
fn audit_write_failure_aborts_the_transition() {
    let mut engine = BreakerEngine::new(FailingAudit, FixedClock::at(0));
    let err = engine.evaluate_partner_default_spike(1, 0.5).unwrap_err();
    assert!(matches!(err, BreakerError::AuditWriteFailed { .. }));
    // The incident never became visible.
    assert!(engine.incidents().is_empty());
}
