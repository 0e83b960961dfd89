use alloy::transports::http::reqwest::Url;
use clap::{Parser, Subcommand, ValueHint};
use tuner::cli::CliSweepConfig;

/// Multiproof chunk-size tuner
#[derive(Parser)]
#[command(version, propagate_version = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,

    #[clap(flatten)]
    pub(crate) sweep: CliSweepConfig,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Sweeps over blocks sampled from the synthetic workload model.
    Synthetic {
        /// Number of blocks to generate.
        #[arg(short, long, env = "TUNER_BLOCKS", default_value_t = 500)]
        blocks: usize,
        /// Block gas limit.
        #[arg(short, long, env = "TUNER_GAS_LIMIT", default_value_t = 20_000_000)]
        gas_limit: u64,
        /// Seed for the workload generator.
        #[arg(short, long, env = "TUNER_SEED", default_value_t = 42)]
        seed: u64,
    },
    /// Sweeps over exact target counts traced from a node.
    Rpc {
        /// The node RPC URL. Must serve `debug_traceTransaction`.
        #[arg(short = 'u', long, env = "TUNER_RPC_URL", value_hint = ValueHint::Url)]
        rpc_url: Url,
        /// First block to collect (inclusive).
        #[arg(short, long, env = "TUNER_START_BLOCK", default_value_t = 0)]
        start_block: u64,
        /// Number of consecutive blocks to collect.
        #[arg(short, long, env = "TUNER_BLOCKS", default_value_t = 500)]
        blocks: u64,
        /// Backoff in milliseconds for retry requests
        #[arg(long, env = "TUNER_BACKOFF", default_value_t = 0)]
        backoff: u64,
        /// The maximum number of retries
        #[arg(long, env = "TUNER_MAX_RETRIES", default_value_t = 0)]
        max_retries: u32,
        /// Transactions traced concurrently within a block.
        #[arg(short, long, env = "TUNER_CONCURRENCY", default_value_t = 16)]
        concurrency: usize,
    },
}
