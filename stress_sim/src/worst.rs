//! Top-K worst seed tracking.
//!
//! A min-heap of fixed capacity keyed on severity: the smallest retained
//! severity sits on top and is evicted when a worse path arrives. Ties
//! break on (config_index, seed_index) so the retained set is independent
//! of scheduling.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

/// Replayable identity of one evaluated path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedEntry {
    /// Severity in fixed-point millionths, the heap key.
    pub severity_micros: u64,
    pub config_index: usize,
    pub seed_index: u32,
    pub seed: u32,
    pub config_id: String,
}

impl SeedEntry {
    pub fn new(
        severity: f64,
        config_index: usize,
        seed_index: u32,
        seed: u32,
        config_id: String,
    ) -> Self {
        Self {
            severity_micros: (severity.max(0.0) * 1_000_000.0) as u64,
            config_index,
            seed_index,
            seed,
            config_id,
        }
    }
}

#[derive(Debug)]
pub struct WorstSeeds {
    heap: BinaryHeap<Reverse<SeedEntry>>,
    capacity: usize,
}

impl WorstSeeds {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn push(&mut self, entry: SeedEntry) {
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(entry));
            return;
        }
        if let Some(Reverse(min)) = self.heap.peek() {
            if entry > *min {
                self.heap.pop();
                self.heap.push(Reverse(entry));
            }
        }
    }

    /// Worst first.
    pub fn into_sorted(self) -> Vec<SeedEntry> {
        let mut entries: Vec<SeedEntry> = self.heap.into_iter().map(|r| r.0).collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries
    }
}
