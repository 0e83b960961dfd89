//! Models how an execution client splits multiproof work ("state-root
//! targets") into chunks and spreads those chunks over a fixed pool of proof
//! workers, and sweeps the chunking parameters to find the settings with the
//! lowest tail latency.
//!
//! The pipeline is:
//!
//! ```text
//! gas -> transactions -> touched state -> proof targets -> chunks -> workers
//! ```
//!
//! 1. [`workload`] samples synthetic transactions from a set of
//!    [`TransactionProfile`]s and packs them into [`Block`]s bounded by a gas
//!    limit. Blocks collected from a live node have the same shape.
//! 2. [`scheduler`] partitions a block's targets into chunks, prices each chunk
//!    with a linear [`CostModel`] and hands the chunk costs to an
//!    [`AssignmentStrategy`] (greedy LPT by default) to obtain per-worker
//!    loads.
//! 3. [`sweep`] evaluates one fixed block set against every candidate chunk
//!    size (and activation threshold) and picks the candidate with the lowest
//!    95th-percentile wall time.
//!
//! No proofs are computed: worker loads are plain accumulators, so every
//! evaluation is a pure function of its inputs.
//!
//! # Example
//!
//! ```
//! use chunk_sim::{
//!     workload::{default_profiles, generate_block_set, ProfileSet},
//!     ChunkingConfig, CostModel, SweepAnalyzer,
//! };
//! use rand::SeedableRng as _;
//! use rand_chacha::ChaCha8Rng;
//!
//! let profiles = ProfileSet::new(default_profiles()).unwrap();
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let blocks = generate_block_set(40, 20_000_000, &profiles, &mut rng);
//!
//! let analyzer = SweepAnalyzer::new(&blocks, 8, CostModel::default()).unwrap();
//! let sweep = analyzer.chunk_size_sweep(&[20, 60, 120]).unwrap();
//! let best = chunk_sim::sweep::optimal(&sweep).unwrap();
//! assert!([20, 60, 120].contains(&best.chunk_size));
//!
//! let config = ChunkingConfig::new(best.chunk_size, 300, 8, CostModel::default()).unwrap();
//! assert_eq!(config.chunk_size(), best.chunk_size);
//! ```

#![deny(rustdoc::broken_intra_doc_links)]
#![warn(missing_debug_implementations)]
#![warn(missing_docs)]

pub mod assignment;
pub mod block;
mod error;
pub mod report;
pub mod scheduler;
pub mod stats;
pub mod sweep;
pub mod workload;

pub use assignment::{AssignmentStrategy, GreedyLpt, RoundRobin};
pub use block::{Block, Transaction};
pub use error::SimError;
pub use scheduler::{
    simulate_block, ActivationRule, ChunkScheduler, ChunkingConfig, CostModel, SimulationResult,
};
pub use sweep::{SweepAnalyzer, SweepSummary, ThresholdSummary};
pub use workload::{ProfileSet, TransactionProfile};

/// Reth's `DEFAULT_MULTIPROOF_TASK_CHUNK_SIZE`.
pub const DEFAULT_CHUNK_SIZE: u64 = 60;

/// Reth's `DEFAULT_MAX_TARGETS_FOR_CHUNKING`.
pub const DEFAULT_MAX_TARGETS_FOR_CHUNKING: u64 = 300;

/// Candidate chunk sizes evaluated by a default sweep, in report order.
pub const DEFAULT_CHUNK_SIZES: &[u64] = &[10, 15, 20, 30, 40, 50, 60, 80, 100, 120, 150, 200, 300];

/// Candidate activation thresholds evaluated by a default threshold sweep.
pub const DEFAULT_THRESHOLDS: &[u64] = &[50, 100, 150, 200, 300, 500];
