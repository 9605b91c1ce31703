//! Filesystem artifact set.
//!
//! Written under a configured output root with fixed filenames; the
//! release pipeline consumes them by exact name.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::json;

use crate::aggregate::ConfigRecord;
use crate::drift::{Baseline, DriftReport, MAX_SENIOR_IMPAIRMENT_DRIFT_PP};
use crate::manifest::RunManifest;
use crate::runner::SweepResult;

pub const HEATMAP_JSON: &str = "tranche-parameter-sweep-heatmap.json";
pub const HEATMAP_CSV: &str = "tranche-parameter-sweep-heatmap.csv";
pub const RESIMULATION_JSON: &str = "resimulation-output.json";
pub const REPLAY_JSON: &str = "deterministic-replay-top25.json";
pub const MANIFEST_JSON: &str = "audit-manifest.json";
pub const INVARIANT_REPORT_MD: &str = "runtime-invariant-verification-report.md";

/// The exact column order of the sweep CSV.
pub const CSV_HEADER: &str = "seniorAllocationBps, juniorCoverageFloorBps, recoveryRate, \
withdrawalSensitivity, correlationLevel, seniorImpairmentProbability, \
juniorDepletionProbability, breakerActivationFrequency, avgBreakerDuration, \
avgTimeToStabilization, avgJuniorNAVVolatility, avgSeniorNAVVolatility, \
capitalEfficiencyScore, waterfallViolationCount, negativeNavCount";

pub fn drift_report_name(current: &str, baseline: &str) -> String {
    format!("stress-resimulation-report-{current}-vs-{baseline}.md")
}

/// Write the full artifact set. Returns the paths written.
pub fn write_artifacts(
    output_root: &Path,
    result: &SweepResult,
    manifest: &RunManifest,
    drift: &DriftReport,
    baseline: &Baseline,
    current_label: &str,
    baseline_label: &str,
) -> io::Result<Vec<PathBuf>> {
    fs::create_dir_all(output_root)?;
    let mut written = Vec::new();

    written.push(write_json(
        output_root.join(HEATMAP_JSON),
        &json!({
            "records": result.records,
            "heatmap": heatmap(&result.records),
            "contours": contours(&result.records),
            "invariants": result.invariants,
        }),
    )?);
    written.push(write_csv(output_root.join(HEATMAP_CSV), &result.records)?);
    written.push(write_json(
        output_root.join(RESIMULATION_JSON),
        &json!({
            "gridHash": result.grid_hash,
            "baseSeed": result.base_seed,
            "pathsPerConfig": result.paths_per_config,
            "configCount": result.records.len(),
            "records": result.records,
            "invariants": result.invariants,
        }),
    )?);
    written.push(write_json(
        output_root.join(REPLAY_JSON),
        &json!({
            "baseSeed": result.base_seed,
            "worstSeeds": result.worst_seeds,
        }),
    )?);
    written.push(write_json(output_root.join(MANIFEST_JSON), manifest)?);
    written.push(write_text(
        output_root.join(INVARIANT_REPORT_MD),
        &invariant_report(result, manifest),
    )?);
    written.push(write_text(
        output_root.join(drift_report_name(current_label, baseline_label)),
        &drift_report(drift, baseline, current_label, baseline_label),
    )?);

    Ok(written)
}

fn write_json<T: Serialize>(path: PathBuf, value: &T) -> io::Result<PathBuf> {
    let body = serde_json::to_vec_pretty(value)?;
    fs::write(&path, body)?;
    Ok(path)
}

fn write_text(path: PathBuf, body: &str) -> io::Result<PathBuf> {
    fs::write(&path, body)?;
    Ok(path)
}

fn write_csv(path: PathBuf, records: &[ConfigRecord]) -> io::Result<PathBuf> {
    let mut out = String::with_capacity(64 * (records.len() + 1));
    out.push_str(CSV_HEADER);
    out.push('\n');
    for r in records {
        let sensitivity = serde_plain_label(&r.withdrawal_sensitivity);
        let correlation = serde_plain_label(&r.correlation_level);
        out.push_str(&format!(
            "{},{},{},{},{},{:.6},{:.6},{:.6},{:.4},{:.4},{:.6},{:.6},{:.6},{},{}\n",
            r.senior_allocation_bps,
            r.junior_coverage_floor_bps,
            r.recovery_rate,
            sensitivity,
            correlation,
            r.senior_impairment_probability,
            r.junior_depletion_probability,
            r.breaker_activation_frequency,
            r.avg_breaker_duration,
            r.avg_time_to_stabilization,
            r.avg_junior_nav_volatility,
            r.avg_senior_nav_volatility,
            r.capital_efficiency_score,
            r.waterfall_violation_count,
            r.negative_nav_count,
        ));
    }
    fs::write(&path, out)?;
    Ok(path)
}

/// Enum label as it appears on the wire, without JSON quotes.
fn serde_plain_label<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_default()
        .trim_matches('"')
        .to_string()
}

/// Mean senior-impairment probability per (allocation, coverage-floor)
/// cell, averaged over the remaining axes.
fn heatmap(records: &[ConfigRecord]) -> serde_json::Value {
    let mut allocs: Vec<u32> = records.iter().map(|r| r.senior_allocation_bps).collect();
    allocs.sort_unstable();
    allocs.dedup();
    let mut floors: Vec<u32> = records
        .iter()
        .map(|r| r.junior_coverage_floor_bps)
        .collect();
    floors.sort_unstable();
    floors.dedup();

    let mut values = Vec::with_capacity(allocs.len());
    for alloc in &allocs {
        let mut row = Vec::with_capacity(floors.len());
        for floor in &floors {
            let cell: Vec<f64> = records
                .iter()
                .filter(|r| {
                    r.senior_allocation_bps == *alloc && r.junior_coverage_floor_bps == *floor
                })
                .map(|r| r.senior_impairment_probability)
                .collect();
            let mean = if cell.is_empty() {
                0.0
            } else {
                cell.iter().sum::<f64>() / cell.len() as f64
            };
            row.push(mean);
        }
        values.push(row);
    }

    json!({
        "rows": allocs,
        "cols": floors,
        "metric": "seniorImpairmentProbability",
        "values": values,
    })
}

/// Cells at or above each contour level of impairment probability.
fn contours(records: &[ConfigRecord]) -> serde_json::Value {
    const LEVELS: [f64; 3] = [0.01, 0.05, 0.10];
    let levels: Vec<serde_json::Value> = LEVELS
        .iter()
        .map(|level| {
            let cells: Vec<serde_json::Value> = records
                .iter()
                .filter(|r| r.senior_impairment_probability >= *level)
                .map(|r| {
                    json!({
                        "configIndex": r.config_index,
                        "seniorAllocationBps": r.senior_allocation_bps,
                        "juniorCoverageFloorBps": r.junior_coverage_floor_bps,
                        "probability": r.senior_impairment_probability,
                    })
                })
                .collect();
            json!({ "level": level, "cells": cells })
        })
        .collect();
    json!(levels)
}

fn invariant_report(result: &SweepResult, manifest: &RunManifest) -> String {
    let inv = &result.invariants;
    let c = &inv.counters;
    let verdict = if inv.all_zero() { "PASS" } else { "FAIL" };

    format!(
        "# Runtime Invariant Verification Report\n\n\
         Run `{run_id}` over {configs} configurations, {paths} paths evaluated.\n\n\
         | Check | Violations |\n|---|---|\n\
         | Coverage floor after hypothetical allocation | {cov} |\n\
         | Senior impairment stress bundle | {bundle} |\n\
         | Pause-state machine posture | {pause} |\n\
         | Waterfall residual | {residual} |\n\
         | Negative NAV | {nav} |\n\n\
         **Verdict: {verdict}** — release candidates require every counter at zero.\n",
        run_id = manifest.run_id,
        configs = result.records.len(),
        paths = inv.paths_evaluated,
        cov = c.coverage_floor,
        bundle = c.stress_bundle,
        pause = c.pause_machine,
        residual = c.waterfall_residual,
        nav = c.negative_nav,
        verdict = verdict,
    )
}

fn drift_report(
    drift: &DriftReport,
    baseline: &Baseline,
    current_label: &str,
    baseline_label: &str,
) -> String {
    let verdict = if drift.gate_passed { "PASS" } else { "FAIL" };
    format!(
        "# Stress Resimulation Report: {current_label} vs {baseline_label}\n\n\
         Baseline v{bver}.\n\n\
         | Metric | Baseline | Current | Drift |\n|---|---|---|---|\n\
         | Senior impairment probability | {base:.4} | {cur:.4} | {drift:+.3}pp |\n\n\
         Acceptance: drift ≤ +{max}pp and all invariant counters zero \
         (counters zero: {zeros}).\n\n\
         **Verdict: {verdict}**\n",
        bver = baseline.version,
        base = drift.baseline_senior_impairment,
        cur = drift.current_senior_impairment,
        drift = drift.senior_impairment_drift_pp,
        max = MAX_SENIOR_IMPAIRMENT_DRIFT_PP,
        zeros = drift.invariants_all_zero,
        verdict = verdict,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::SweepGrid;
    use crate::runner::{run_sweep, SweepOptions};

    #[test]
    fn csv_header_matches_schema_exactly() {
        assert_eq!(
            CSV_HEADER,
            "seniorAllocationBps, juniorCoverageFloorBps, recoveryRate, \
             withdrawalSensitivity, correlationLevel, seniorImpairmentProbability, \
             juniorDepletionProbability, breakerActivationFrequency, avgBreakerDuration, \
             avgTimeToStabilization, avgJuniorNAVVolatility, avgSeniorNAVVolatility, \
             capitalEfficiencyScore, waterfallViolationCount, negativeNavCount"
        );
        assert_eq!(CSV_HEADER.split(", ").count(), 15);
    }

    #[test]
    fn artifact_set_is_complete() {
        let dir = std::env::temp_dir().join(format!(
            "stress-artifacts-test-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);

        let result = run_sweep(
            &SweepGrid::smoke(),
            &SweepOptions {
                paths_per_config: 20,
                base_seed: 7,
                batch_size: 2,
                workers: 2,
            },
        );
        let records_json = serde_json::to_vec(&result.records).unwrap();
        let manifest = RunManifest::build(&result.grid_hash, &records_json, 7, 20);
        let baseline = Baseline {
            version: 1,
            mean_senior_impairment_probability: 0.5,
            mean_junior_depletion_probability: 0.5,
        };
        let drift = crate::drift::evaluate_drift(
            &result.records,
            &baseline,
            result.invariants.all_zero(),
        );

        let written = write_artifacts(
            &dir, &result, &manifest, &drift, &baseline, "v2", "v1",
        )
        .unwrap();
        assert_eq!(written.len(), 7);
        for path in &written {
            assert!(path.exists(), "{path:?} missing");
        }

        let csv = fs::read_to_string(dir.join(HEATMAP_CSV)).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), CSV_HEADER);
        assert_eq!(lines.count(), result.records.len());
        assert!(dir
            .join(drift_report_name("v2", "v1"))
            .exists());

        let _ = fs::remove_dir_all(&dir);
    }
}
