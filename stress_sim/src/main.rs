//! Stress simulator binary.
//!
//! Env-configured; artifacts land under STRESS_OUTPUT_ROOT. A missing
//! baseline file makes this run the new baseline instead of gating
//! against one.

use std::path::PathBuf;
use std::process::ExitCode;

use stress_sim::artifacts;
use stress_sim::{
    evaluate_drift, mean_junior_depletion, mean_senior_impairment, run_sweep, Baseline,
    RunManifest, SweepGrid, SweepOptions,
};

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stress_sim=info".parse().expect("static directive parses")),
        )
        .init();

    let output_root: PathBuf =
        PathBuf::from(env_or("STRESS_OUTPUT_ROOT", "./stress-artifacts".to_string()));
    let baseline_path: PathBuf =
        PathBuf::from(env_or("STRESS_BASELINE", "./stress-baseline.json".to_string()));
    let current_label = env_or("STRESS_LABEL", "candidate".to_string());

    let options = SweepOptions {
        paths_per_config: env_or("STRESS_PATHS", 5_000u32),
        base_seed: env_or("STRESS_BASE_SEED", 424_242u64),
        batch_size: env_or("STRESS_BATCH_SIZE", 64usize),
        workers: env_or(
            "STRESS_WORKERS",
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        ),
    };
    let grid = if env_or("STRESS_SMOKE", false) {
        SweepGrid::smoke()
    } else {
        SweepGrid::default()
    };

    tracing::info!(
        configs = grid.len(),
        paths_per_config = options.paths_per_config,
        base_seed = options.base_seed,
        workers = options.workers,
        "starting parameter sweep"
    );

    let result = run_sweep(&grid, &options);

    tracing::info!(
        records = result.records.len(),
        worst_seeds = result.worst_seeds.len(),
        invariant_violations = result.invariants.counters.total(),
        "sweep complete"
    );

    let records_json = match serde_json::to_vec(&result.records) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("failed to serialize records: {e}");
            return ExitCode::FAILURE;
        }
    };
    let manifest = RunManifest::build(
        &result.grid_hash,
        &records_json,
        options.base_seed,
        options.paths_per_config,
    );

    let (baseline, baseline_label) = match std::fs::read(&baseline_path) {
        Ok(bytes) => match serde_json::from_slice::<Baseline>(&bytes) {
            Ok(baseline) => (baseline, format!("baseline-v{}", baseline.version)),
            Err(e) => {
                tracing::error!("baseline at {baseline_path:?} is unreadable: {e}");
                return ExitCode::FAILURE;
            }
        },
        Err(_) => {
            tracing::warn!(
                "no baseline at {baseline_path:?}; pinning this run as the baseline"
            );
            let pinned = Baseline {
                version: 1,
                mean_senior_impairment_probability: mean_senior_impairment(&result.records),
                mean_junior_depletion_probability: mean_junior_depletion(&result.records),
            };
            if let Err(e) = std::fs::write(
                &baseline_path,
                serde_json::to_vec_pretty(&pinned).expect("baseline serializes"),
            ) {
                tracing::error!("failed to pin baseline: {e}");
                return ExitCode::FAILURE;
            }
            (pinned, "self".to_string())
        }
    };

    let drift = evaluate_drift(&result.records, &baseline, result.invariants.all_zero());

    match artifacts::write_artifacts(
        &output_root,
        &result,
        &manifest,
        &drift,
        &baseline,
        &current_label,
        &baseline_label,
    ) {
        Ok(written) => {
            for path in written {
                tracing::info!("wrote {}", path.display());
            }
        }
        Err(e) => {
            tracing::error!("artifact write failed: {e}");
            return ExitCode::FAILURE;
        }
    }

    if drift.gate_passed {
        tracing::info!(
            drift_pp = drift.senior_impairment_drift_pp,
            "acceptance gate PASSED"
        );
        ExitCode::SUCCESS
    } else {
        tracing::error!(
            drift_pp = drift.senior_impairment_drift_pp,
            invariants_zero = drift.invariants_all_zero,
            "acceptance gate FAILED"
        );
        ExitCode::FAILURE
    }
}
