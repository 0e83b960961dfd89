use std::collections::HashSet;

use alloy::primitives::{Address, B256};
use anyhow::bail;
use chunk_sim::Block;
use futures::StreamExt as _;
use tracing::{info, warn};

use crate::provider::{BlockSummary, StateDiffSource};

/// Progress is logged every this many collected blocks.
const PROGRESS_INTERVAL: usize = 10;

/// Collects exact proof-target counts for `num_blocks` consecutive blocks
/// starting at `start_block`.
///
/// Every transaction of a block is traced with the prestate diff tracer, at
/// most `concurrency` at a time. An account counts once per block no matter
/// how many transactions touch it, and likewise for a storage slot. Blocks
/// the node does not return are skipped, as are transactions whose trace
/// fails. Blocks come back in ascending order.
///
/// Fails only if no block at all could be collected.
pub async fn collect_blocks<S: StateDiffSource>(
    source: &S,
    start_block: u64,
    num_blocks: u64,
    concurrency: usize,
) -> anyhow::Result<Vec<Block>> {
    let concurrency = concurrency.max(1);
    let mut blocks = Vec::new();

    info!(start_block, num_blocks, "collecting blocks");

    for number in start_block..start_block.saturating_add(num_blocks) {
        let summary = match source.block_summary(number).await {
            Ok(Some(summary)) => summary,
            Ok(None) => {
                warn!(block = number, "block not found, skipping");
                continue;
            }
            Err(e) => {
                warn!(block = number, "couldn't fetch block, skipping: {e:#}");
                continue;
            }
        };

        blocks.push(collect_block(source, summary, concurrency).await);

        if blocks.len() % PROGRESS_INTERVAL == 0 {
            info!(collected = blocks.len(), last_block = number, "collection progress");
        }
    }

    if blocks.is_empty() {
        bail!("no blocks collected; check RPC URL and block range");
    }
    info!(collected = blocks.len(), "collection done");
    Ok(blocks)
}

async fn collect_block<S: StateDiffSource>(
    source: &S,
    summary: BlockSummary,
    concurrency: usize,
) -> Block {
    let BlockSummary {
        number,
        gas_used,
        tx_hashes,
    } = summary;

    let mut accounts = HashSet::<Address>::new();
    let mut slots = HashSet::<(Address, B256)>::new();

    let mut diffs = futures::stream::iter(tx_hashes.iter().copied())
        .map(|tx_hash| async move { (tx_hash, source.state_diff(tx_hash).await) })
        .buffered(concurrency);

    while let Some((tx_hash, diff)) = diffs.next().await {
        let diff = match diff {
            Ok(diff) => diff,
            Err(e) => {
                warn!(block = number, %tx_hash, "couldn't trace transaction, skipping: {e:#}");
                continue;
            }
        };
        for (address, touched) in diff.sections() {
            accounts.insert(*address);
            slots.extend(touched.iter().map(|slot| (*address, *slot)));
        }
    }

    Block::from_exact_counts(
        number,
        gas_used,
        tx_hashes.len(),
        accounts.len() as u64,
        slots.len() as u64,
    )
}
