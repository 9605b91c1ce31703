//! Parallel sweep execution.
//!
//! Configurations fan out across worker threads in batches; workers own
//! their RNG and mini-pool state and communicate only through a result
//! channel. Final ordering is by (config_index, seed_index), independent
//! of worker scheduling.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;

use serde::{Deserialize, Serialize};

use crate::aggregate::{aggregate_config, ConfigRecord, InvariantTotals};
use crate::grid::{SimConfig, SweepGrid};
use crate::path::simulate_configuration_seed;
use crate::rng::path_seed;
use crate::worst::{SeedEntry, WorstSeeds};
use crate::WORST_SEED_COUNT;

#[derive(Debug, Clone)]
pub struct SweepOptions {
    pub paths_per_config: u32,
    pub base_seed: u64,
    pub batch_size: usize,
    pub workers: usize,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            paths_per_config: 5_000,
            base_seed: 424_242,
            batch_size: 64,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepResult {
    pub records: Vec<ConfigRecord>,
    pub worst_seeds: Vec<SeedEntry>,
    pub invariants: InvariantTotals,
    pub paths_per_config: u32,
    pub base_seed: u64,
    pub grid_hash: String,
}

struct ConfigOutcome {
    config_index: usize,
    record: ConfigRecord,
    worst: Vec<SeedEntry>,
}

/// Evaluate every configuration of the grid.
pub fn run_sweep(grid: &SweepGrid, options: &SweepOptions) -> SweepResult {
    let configs = grid.expand();
    let mut outcomes: Vec<Option<ConfigOutcome>> = Vec::new();
    outcomes.resize_with(configs.len(), || None);

    for (batch_start, batch) in configs
        .chunks(options.batch_size.max(1))
        .enumerate()
        .map(|(i, c)| (i * options.batch_size.max(1), c))
    {
        let cursor = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel::<ConfigOutcome>();

        std::thread::scope(|scope| {
            for _ in 0..options.workers.max(1) {
                let tx = tx.clone();
                let cursor = &cursor;
                scope.spawn(move || loop {
                    let offset = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(cfg) = batch.get(offset) else {
                        break;
                    };
                    let outcome =
                        evaluate_config(batch_start + offset, cfg, options);
                    if tx.send(outcome).is_err() {
                        break;
                    }
                });
            }
            drop(tx);

            for outcome in rx {
                let index = outcome.config_index;
                outcomes[index] = Some(outcome);
            }
        });
    }

    // Deterministic assembly: configuration order, then each config's
    // already-ordered worst candidates.
    let mut records = Vec::with_capacity(configs.len());
    let mut worst = WorstSeeds::new(WORST_SEED_COUNT);
    let mut invariants = InvariantTotals::default();

    for outcome in outcomes.into_iter().flatten() {
        invariants.absorb(&outcome.record, options.paths_per_config as u64);
        for entry in outcome.worst {
            worst.push(entry);
        }
        records.push(outcome.record);
    }

    SweepResult {
        records,
        worst_seeds: worst.into_sorted(),
        invariants,
        paths_per_config: options.paths_per_config,
        base_seed: options.base_seed,
        grid_hash: grid.grid_hash(),
    }
}

fn evaluate_config(
    config_index: usize,
    cfg: &SimConfig,
    options: &SweepOptions,
) -> ConfigOutcome {
    let config_id = cfg.config_id();
    let mut paths = Vec::with_capacity(options.paths_per_config as usize);
    let mut worst = WorstSeeds::new(WORST_SEED_COUNT);

    for seed_index in 0..options.paths_per_config {
        let seed = path_seed(&config_id, options.base_seed, seed_index);
        let mut record = simulate_configuration_seed(cfg, seed);
        record.seed_index = seed_index;
        worst.push(SeedEntry::new(
            record.severity,
            config_index,
            seed_index,
            seed,
            config_id.clone(),
        ));
        paths.push(record);
    }

    let record = aggregate_config(config_index, cfg, &paths);
    ConfigOutcome {
        config_index,
        record,
        worst: worst.into_sorted(),
    }
}
