use std::{
    fs::{self, File},
    io::BufWriter,
    path::Path,
    time::Duration,
};

use anyhow::{Context as _, Result};
use chunk_sim::{
    report::{self, Report},
    workload::{default_profiles, generate_block_set},
    Block, ProfileSet,
};
use clap::Parser;
use cli::Command;
use rand::SeedableRng as _;
use rand_chacha::ChaCha8Rng;
use tracing::info;
use tuner::{
    collector::collect_blocks, env::load_dotenvy_vars_if_present,
    provider::RpcStateDiffSource, retry::build_http_retry_provider,
};

#[path = "tuner/cli.rs"]
mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenvy_vars_if_present()?;
    tuner::tracing::init();

    let args = cli::Cli::parse();

    let blocks = match args.command {
        Command::Synthetic {
            blocks,
            gas_limit,
            seed,
        } => {
            info!(blocks, gas_limit, seed, "generating synthetic workload");
            let profiles = ProfileSet::new(default_profiles())?;
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            generate_block_set(blocks, gas_limit, &profiles, &mut rng)
        }
        Command::Rpc {
            rpc_url,
            start_block,
            blocks,
            backoff,
            max_retries,
            concurrency,
        } => {
            let provider =
                build_http_retry_provider(rpc_url, Duration::from_millis(backoff), max_retries);
            let source = RpcStateDiffSource::new(provider);
            collect_blocks(&source, start_block, blocks, concurrency).await?
        }
    };

    let sweep = &args.sweep;
    let analyzer = sweep.analyzer(&blocks)?;
    let report = Report::new(
        &analyzer,
        &sweep.chunk_sizes,
        &sweep.thresholds,
        sweep.reference_chunk_size,
    )?;
    println!("{report}");

    write_outputs(&sweep.output, &blocks, &report)
}

fn write_outputs(dir: &Path, blocks: &[Block], report: &Report) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("couldn't create output directory {}", dir.display()))?;

    let blocks_path = dir.join(report::BLOCKS_CSV);
    report::write_blocks_csv(create(&blocks_path)?, blocks)
        .with_context(|| format!("couldn't write {}", blocks_path.display()))?;

    let sweep_path = dir.join(report::SWEEP_CSV);
    report::write_sweep_csv(create(&sweep_path)?, &report.sweep)
        .with_context(|| format!("couldn't write {}", sweep_path.display()))?;

    let threshold_path = dir.join(report::THRESHOLD_CSV);
    report::write_threshold_csv(create(&threshold_path)?, &report.thresholds)
        .with_context(|| format!("couldn't write {}", threshold_path.display()))?;

    println!("\nResults written to:");
    for path in [blocks_path, sweep_path, threshold_path] {
        println!("  {}", path.display());
    }
    Ok(())
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file =
        File::create(path).with_context(|| format!("couldn't create {}", path.display()))?;
    Ok(BufWriter::new(file))
}
