//! The chunk scheduler.
//!
//! Given a block's target count and a [`ChunkingConfig`], decides whether the
//! multiproof is chunked, partitions the targets, prices each chunk with the
//! [`CostModel`] and asks an [`AssignmentStrategy`] for the per-worker loads.
//! The block's wall time is the busiest worker's load plus a fixed per-block
//! overhead.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::{AssignmentStrategy, Block, GreedyLpt, SimError, DEFAULT_MAX_TARGETS_FOR_CHUNKING};

/// Linear cost model, all values in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Paid once per block regardless of chunking.
    pub fixed_ms: f64,
    /// Paid once per dispatched chunk.
    pub chunk_overhead_ms: f64,
    /// Paid per proof target.
    pub per_target_ms: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            fixed_ms: 0.5,
            chunk_overhead_ms: 0.15,
            per_target_ms: 0.02,
        }
    }
}

impl CostModel {
    /// Builds a cost model, rejecting negative or non-finite constants.
    pub fn new(fixed_ms: f64, chunk_overhead_ms: f64, per_target_ms: f64) -> Result<Self, SimError> {
        let model = Self {
            fixed_ms,
            chunk_overhead_ms,
            per_target_ms,
        };
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), SimError> {
        for (name, value) in [
            ("fixed_ms", self.fixed_ms),
            ("chunk_overhead_ms", self.chunk_overhead_ms),
            ("per_target_ms", self.per_target_ms),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SimError::InvalidCost { name, value });
            }
        }
        Ok(())
    }

    /// Cost of one chunk holding `targets` targets.
    ///
    /// An empty chunk is never dispatched and costs nothing.
    pub fn chunk_cost(&self, targets: u64) -> f64 {
        if targets == 0 {
            return 0.0;
        }
        self.chunk_overhead_ms + self.per_target_ms * targets as f64
    }
}

/// When a block's multiproof is split into chunks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationRule {
    /// Chunk whenever there are more targets than fit in one chunk and more
    /// than one worker. The activation threshold is not consulted.
    #[default]
    ChunkSize,
    /// Like [`ActivationRule::ChunkSize`], but additionally require more
    /// targets than the activation threshold.
    ThresholdGated,
}

/// A validated scheduling configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkingConfig {
    chunk_size: u64,
    max_targets_for_chunking: u64,
    workers: NonZeroUsize,
    cost: CostModel,
    activation: ActivationRule,
}

impl ChunkingConfig {
    /// Builds a configuration using [`ActivationRule::ChunkSize`].
    ///
    /// Fails on a zero chunk size, zero workers or an invalid cost model, so
    /// misconfiguration is caught before any block is simulated.
    pub fn new(
        chunk_size: u64,
        max_targets_for_chunking: u64,
        workers: usize,
        cost: CostModel,
    ) -> Result<Self, SimError> {
        if chunk_size == 0 {
            return Err(SimError::ZeroChunkSize);
        }
        let workers = NonZeroUsize::new(workers).ok_or(SimError::ZeroWorkers)?;
        cost.validate()?;

        Ok(Self {
            chunk_size,
            max_targets_for_chunking,
            workers,
            cost,
            activation: ActivationRule::default(),
        })
    }

    /// Replaces the activation rule.
    pub const fn with_activation(mut self, activation: ActivationRule) -> Self {
        self.activation = activation;
        self
    }

    /// Same configuration with a different chunk size.
    pub fn with_chunk_size(self, chunk_size: u64) -> Result<Self, SimError> {
        if chunk_size == 0 {
            return Err(SimError::ZeroChunkSize);
        }
        Ok(Self { chunk_size, ..self })
    }

    /// Same configuration with a different activation threshold.
    pub const fn with_threshold(self, max_targets_for_chunking: u64) -> Self {
        Self {
            max_targets_for_chunking,
            ..self
        }
    }

    /// Maximum targets per chunk.
    pub const fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Activation threshold consulted by [`ActivationRule::ThresholdGated`].
    pub const fn max_targets_for_chunking(&self) -> u64 {
        self.max_targets_for_chunking
    }

    /// Size of the worker pool.
    pub const fn workers(&self) -> NonZeroUsize {
        self.workers
    }

    /// Cost model used to price chunks.
    pub const fn cost(&self) -> &CostModel {
        &self.cost
    }

    /// When a block is chunked.
    pub const fn activation(&self) -> ActivationRule {
        self.activation
    }

    /// Whether a block with `targets` targets gets chunked.
    pub fn should_chunk(&self, targets: u64) -> bool {
        let splittable = targets > self.chunk_size && self.workers.get() > 1;
        match self.activation {
            ActivationRule::ChunkSize => splittable,
            ActivationRule::ThresholdGated => {
                splittable && targets > self.max_targets_for_chunking
            }
        }
    }
}

/// Outcome of simulating one block under one configuration.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimulationResult {
    /// Targets in the block.
    pub targets: u64,
    /// Chunk size of the configuration.
    pub chunk_size: u64,
    /// Number of chunks produced, at least one.
    pub n_chunks: u64,
    /// Busiest worker's load plus the fixed per-block overhead.
    pub wall_time_ms: f64,
    /// Mean worker load over max worker load, `1.0` when no work was done.
    pub utilization: f64,
    /// Load of the busiest worker.
    pub max_load_ms: f64,
    /// Total per-chunk overhead paid.
    pub overhead_ms: f64,
    /// Whether the targets were split.
    pub chunking_triggered: bool,
    /// Accumulated load per worker.
    pub worker_loads: Vec<f64>,
}

/// Splits `targets` into full chunks of `chunk_size` followed by one chunk
/// holding the remainder, which is always in `[1, chunk_size]`.
///
/// `targets == 0` yields a single empty chunk.
pub fn partition_targets(targets: u64, chunk_size: u64) -> Vec<u64> {
    debug_assert!(chunk_size > 0);
    if targets <= chunk_size {
        return vec![targets];
    }
    let n_chunks = targets.div_ceil(chunk_size);
    let mut chunks = vec![chunk_size; n_chunks as usize];
    chunks[n_chunks as usize - 1] = targets - chunk_size * (n_chunks - 1);
    chunks
}

/// Simulates the multiproof for a block with `targets` targets.
pub fn simulate_block(
    targets: u64,
    config: &ChunkingConfig,
    strategy: &dyn AssignmentStrategy,
) -> SimulationResult {
    let chunking_triggered = config.should_chunk(targets);
    let chunks = if chunking_triggered {
        partition_targets(targets, config.chunk_size)
    } else {
        vec![targets]
    };

    let costs: Vec<f64> = chunks.iter().map(|&t| config.cost.chunk_cost(t)).collect();
    let worker_loads = strategy.assign(&costs, config.workers);

    let max_load_ms = worker_loads.iter().copied().fold(0.0, f64::max);
    let mean_load = worker_loads.iter().sum::<f64>() / worker_loads.len() as f64;
    let utilization = if max_load_ms > 0.0 {
        mean_load / max_load_ms
    } else {
        1.0
    };

    let n_chunks = chunks.len() as u64;
    let dispatched = chunks.iter().filter(|&&t| t > 0).count();

    SimulationResult {
        targets,
        chunk_size: config.chunk_size,
        n_chunks,
        wall_time_ms: max_load_ms + config.cost.fixed_ms,
        utilization,
        max_load_ms,
        overhead_ms: dispatched as f64 * config.cost.chunk_overhead_ms,
        chunking_triggered,
        worker_loads,
    }
}

/// A [`ChunkingConfig`] bound to an [`AssignmentStrategy`].
#[derive(Debug)]
pub struct ChunkScheduler {
    config: ChunkingConfig,
    strategy: Box<dyn AssignmentStrategy>,
}

impl ChunkScheduler {
    /// Scheduler using greedy LPT assignment.
    pub fn new(config: ChunkingConfig) -> Self {
        Self::with_strategy(config, Box::new(GreedyLpt))
    }

    /// Scheduler with a custom assignment strategy.
    pub fn with_strategy(config: ChunkingConfig, strategy: Box<dyn AssignmentStrategy>) -> Self {
        Self { config, strategy }
    }

    /// The configuration every block is simulated with.
    pub const fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Simulates `block`.
    pub fn simulate(&self, block: &Block) -> SimulationResult {
        simulate_block(block.total_targets(), &self.config, self.strategy.as_ref())
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: crate::DEFAULT_CHUNK_SIZE,
            max_targets_for_chunking: DEFAULT_MAX_TARGETS_FOR_CHUNKING,
            workers: NonZeroUsize::MIN.saturating_add(7),
            cost: CostModel::default(),
            activation: ActivationRule::default(),
        }
    }
}
