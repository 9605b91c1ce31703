//! Stress Sim - deterministic tranche parameter sweep.
//!
//! Replays the pool's waterfall kernels under adversarial parameter grids
//! and emits the artifact set gating protocol releases: aggregate
//! heatmaps, worst-seed replay data, a run manifest, an invariant report,
//! and a drift report against a pinned baseline.
//!
//! Everything is a function of (configuration, seed): no wall-clock, no
//! global RNG. Re-running the same pair yields byte-identical records.

pub mod aggregate;
pub mod artifacts;
pub mod drift;
pub mod grid;
pub mod manifest;
pub mod path;
pub mod rng;
pub mod runner;
pub mod worst;

pub use aggregate::{aggregate_config, ConfigRecord, InvariantTotals};
pub use drift::{
    evaluate_drift, mean_junior_depletion, mean_senior_impairment, Baseline, DriftReport,
    MAX_SENIOR_IMPAIRMENT_DRIFT_PP,
};
pub use grid::{CorrelationLevel, SimConfig, SweepGrid, WithdrawalSensitivity};
pub use manifest::RunManifest;
pub use path::{simulate_configuration_seed, InvariantCounters, PathRecord, ResponseProfile};
pub use rng::{fast_hash, mix32, Mulberry32};
pub use runner::{run_sweep, SweepOptions, SweepResult};
pub use worst::{SeedEntry, WorstSeeds};

/// Pool capital per simulated path, in 6-decimal token units (10M).
pub const POOL_CAPITAL: u128 = 10_000_000_000_000;

/// Fraction of capital deployed into loans at path start, in bps.
pub const DEPLOYED_BPS: u128 = 8_000;

/// Worst seeds retained for deterministic replay.
pub const WORST_SEED_COUNT: usize = 25;
