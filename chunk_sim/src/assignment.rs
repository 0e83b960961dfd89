//! Chunk-to-worker assignment strategies.
//!
//! A strategy turns a list of chunk costs into per-worker loads. It never sees
//! the cost model or the block, so heuristics can be swapped without touching
//! the scheduler or the sweep driver.

use std::fmt::Debug;
use std::num::NonZeroUsize;

/// Distributes chunk costs over a pool of identical workers.
pub trait AssignmentStrategy: Debug + Send + Sync {
    /// Returns the accumulated load of each worker, indexed by worker.
    ///
    /// The returned vector has exactly `workers` entries and its sum equals
    /// the sum of `chunk_costs`.
    fn assign(&self, chunk_costs: &[f64], workers: NonZeroUsize) -> Vec<f64>;

    /// Short identifier used in logs and reports.
    fn name(&self) -> &'static str;
}

/// Greedy longest-processing-time-first list scheduling.
///
/// Chunks are taken largest first and each goes to the worker with the least
/// accumulated load, ties going to the lowest worker index. The resulting
/// makespan is within 4/3 of optimal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GreedyLpt;

impl AssignmentStrategy for GreedyLpt {
    fn assign(&self, chunk_costs: &[f64], workers: NonZeroUsize) -> Vec<f64> {
        let mut loads = vec![0.0; workers.get()];

        let mut sorted = chunk_costs.to_vec();
        sorted.sort_by(|a, b| b.total_cmp(a));

        for cost in sorted {
            let idx = least_loaded(&loads);
            loads[idx] += cost;
        }
        loads
    }

    fn name(&self) -> &'static str {
        "lpt"
    }
}

/// Index of the first worker holding the minimum load.
fn least_loaded(loads: &[f64]) -> usize {
    let mut idx = 0;
    for (i, load) in loads.iter().enumerate().skip(1) {
        if *load < loads[idx] {
            idx = i;
        }
    }
    idx
}

/// Deals chunks out in partition order: chunk `i` goes to worker
/// `i % workers`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoundRobin;

impl AssignmentStrategy for RoundRobin {
    fn assign(&self, chunk_costs: &[f64], workers: NonZeroUsize) -> Vec<f64> {
        let mut loads = vec![0.0; workers.get()];
        for (i, cost) in chunk_costs.iter().enumerate() {
            loads[i % workers.get()] += cost;
        }
        loads
    }

    fn name(&self) -> &'static str {
        "round-robin"
    }
}
