use std::path::PathBuf;

use chunk_sim::{
    ActivationRule, AssignmentStrategy, Block, CostModel, GreedyLpt, RoundRobin, SimError,
    SweepAnalyzer, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_SIZES, DEFAULT_MAX_TARGETS_FOR_CHUNKING,
    DEFAULT_THRESHOLDS,
};
use clap::{Args, ValueEnum, ValueHint};

const HELP_HEADING: &str = "Sweep options";

/// How chunks are spread over workers.
#[derive(ValueEnum, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum AssignmentArg {
    /// Longest processing time first: each chunk goes to the least-loaded
    /// worker.
    #[default]
    Lpt,
    /// Chunk `i` goes to worker `i mod workers`.
    RoundRobin,
}

/// When a block's targets are split into chunks.
#[derive(ValueEnum, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ActivationArg {
    /// Chunk whenever the block has more targets than the chunk size.
    #[default]
    ChunkSize,
    /// Chunk only above `--max-targets-for-chunking`.
    ThresholdGated,
}

impl From<ActivationArg> for ActivationRule {
    fn from(arg: ActivationArg) -> Self {
        match arg {
            ActivationArg::ChunkSize => Self::ChunkSize,
            ActivationArg::ThresholdGated => Self::ThresholdGated,
        }
    }
}

/// Parameters shared by every data source.
#[derive(Args, Clone, PartialEq, Debug)]
pub struct CliSweepConfig {
    /// Size of the proof worker pool.
    #[arg(short, long, env = "TUNER_WORKERS", help_heading = HELP_HEADING, default_value_t = 8)]
    pub workers: usize,
    /// Directory the CSV files are written to.
    #[arg(short, long, env = "TUNER_OUTPUT", help_heading = HELP_HEADING, value_hint = ValueHint::DirPath, default_value = "multiproof_analysis")]
    pub output: PathBuf,
    /// Candidate chunk sizes, comma separated.
    #[arg(long, env = "TUNER_CHUNK_SIZES", help_heading = HELP_HEADING, value_delimiter = ',', default_values_t = DEFAULT_CHUNK_SIZES.to_vec())]
    pub chunk_sizes: Vec<u64>,
    /// Candidate activation thresholds, comma separated.
    #[arg(long, env = "TUNER_THRESHOLDS", help_heading = HELP_HEADING, value_delimiter = ',', default_values_t = DEFAULT_THRESHOLDS.to_vec())]
    pub thresholds: Vec<u64>,
    /// Chunk size held fixed while sweeping thresholds.
    #[arg(long, env = "TUNER_REFERENCE_CHUNK_SIZE", help_heading = HELP_HEADING, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub reference_chunk_size: u64,
    /// Activation threshold used by the chunk-size sweep under
    /// `--activation threshold-gated`.
    #[arg(long, env = "TUNER_MAX_TARGETS_FOR_CHUNKING", help_heading = HELP_HEADING, default_value_t = DEFAULT_MAX_TARGETS_FOR_CHUNKING)]
    pub max_targets_for_chunking: u64,
    /// Fixed cost per block, in milliseconds.
    #[arg(long, env = "TUNER_FIXED_MS", help_heading = HELP_HEADING, default_value_t = 0.5)]
    pub fixed_ms: f64,
    /// Dispatch cost per chunk, in milliseconds.
    #[arg(long, env = "TUNER_CHUNK_OVERHEAD_MS", help_heading = HELP_HEADING, default_value_t = 0.15)]
    pub chunk_overhead_ms: f64,
    /// Proving cost per target, in milliseconds.
    #[arg(long, env = "TUNER_PER_TARGET_MS", help_heading = HELP_HEADING, default_value_t = 0.02)]
    pub per_target_ms: f64,
    #[arg(long, env = "TUNER_ASSIGNMENT", help_heading = HELP_HEADING, value_enum, default_value_t = AssignmentArg::Lpt)]
    pub assignment: AssignmentArg,
    #[arg(long, env = "TUNER_ACTIVATION", help_heading = HELP_HEADING, value_enum, default_value_t = ActivationArg::ChunkSize)]
    pub activation: ActivationArg,
}

impl CliSweepConfig {
    pub fn cost_model(&self) -> Result<CostModel, SimError> {
        CostModel::new(self.fixed_ms, self.chunk_overhead_ms, self.per_target_ms)
    }

    pub fn strategy(&self) -> Box<dyn AssignmentStrategy> {
        match self.assignment {
            AssignmentArg::Lpt => Box::new(GreedyLpt),
            AssignmentArg::RoundRobin => Box::new(RoundRobin),
        }
    }

    /// Analyzer over `blocks` configured from the command line.
    pub fn analyzer<'a>(&self, blocks: &'a [Block]) -> Result<SweepAnalyzer<'a>, SimError> {
        Ok(SweepAnalyzer::new(blocks, self.workers, self.cost_model()?)?
            .with_strategy(self.strategy())
            .with_activation(self.activation.into())
            .with_threshold(self.max_targets_for_chunking))
    }
}
