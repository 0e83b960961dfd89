//! Descriptive statistics over a block set.
//!
//! Nothing here feeds back into scheduling; these numbers give context for the
//! sweep results (how big the blocks are, how targets scale with gas).

use itertools::Itertools as _;
use serde::Serialize;

use crate::{Block, SimError, DEFAULT_MAX_TARGETS_FOR_CHUNKING};

/// Gas-used bin edges, in gas units. Bin `i` covers `[edges[i], edges[i+1])`.
pub const DEFAULT_GAS_BIN_EDGES: &[u64] = &[
    0, 1_000_000, 2_000_000, 5_000_000, 10_000_000, 15_000_000, 20_000_000, 30_000_000,
];

/// Blocks below this much gas are the focus of [`SmallBlockInsights`].
pub const SMALL_BLOCK_GAS: u64 = 20_000_000;

/// Nearest-rank percentile of an ascending slice: the element at index
/// `floor(q * n)`, clamped to the last element.
///
/// Returns `None` for an empty slice.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = ((sorted.len() as f64 * q) as usize).min(sorted.len() - 1);
    Some(sorted[idx])
}

/// [`percentile`] at 0.95.
pub fn p95(sorted: &[f64]) -> Option<f64> {
    percentile(sorted, 0.95)
}

/// Arithmetic mean, `None` for an empty input.
pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator,
    I::Item: Into<f64>,
{
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), v| (sum + v.into(), n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Range and mean of gas used and targets over the whole block set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BlockSetStats {
    /// Number of blocks.
    pub blocks: usize,
    /// Smallest gas used.
    pub gas_min: u64,
    /// Largest gas used.
    pub gas_max: u64,
    /// Mean gas used.
    pub gas_mean: f64,
    /// Fewest targets in a block.
    pub targets_min: u64,
    /// Most targets in a block.
    pub targets_max: u64,
    /// Mean targets per block.
    pub targets_mean: f64,
}

impl BlockSetStats {
    /// Fails on an empty block set.
    pub fn new(blocks: &[Block]) -> Result<Self, SimError> {
        let (gas_min, gas_max) = blocks
            .iter()
            .map(|b| b.gas_used)
            .minmax()
            .into_option()
            .ok_or(SimError::EmptyBlockSet)?;
        let (targets_min, targets_max) = blocks
            .iter()
            .map(Block::total_targets)
            .minmax()
            .into_option()
            .ok_or(SimError::EmptyBlockSet)?;

        Ok(Self {
            blocks: blocks.len(),
            gas_min,
            gas_max,
            gas_mean: mean(blocks.iter().map(|b| b.gas_used as f64)).unwrap_or_default(),
            targets_min,
            targets_max,
            targets_mean: mean(blocks.iter().map(|b| b.total_targets() as f64))
                .unwrap_or_default(),
        })
    }
}

/// Targets of the blocks whose gas used falls in `[gas_lo, gas_hi)`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GasBin {
    /// Inclusive lower gas edge.
    pub gas_lo: u64,
    /// Exclusive upper gas edge.
    pub gas_hi: u64,
    /// Blocks in the bin, at least one.
    pub blocks: usize,
    /// Fewest targets in a block of the bin.
    pub targets_min: u64,
    /// Most targets in a block of the bin.
    pub targets_max: u64,
    /// Mean targets per block of the bin.
    pub targets_mean: f64,
    /// Mean of `targets / (gas_used / 1e6)` over the bin's non-empty blocks.
    /// `None` if every block in the bin used zero gas.
    pub targets_per_mgas: Option<f64>,
}

/// Groups blocks by gas used. Empty bins are omitted; blocks outside the
/// outermost edges are not counted.
pub fn gas_bins(blocks: &[Block], edges: &[u64]) -> Vec<GasBin> {
    edges
        .iter()
        .tuple_windows()
        .filter_map(|(&lo, &hi)| {
            let in_bin = blocks
                .iter()
                .filter(|b| (lo..hi).contains(&b.gas_used))
                .collect::<Vec<_>>();
            let (targets_min, targets_max) = in_bin
                .iter()
                .map(|b| b.total_targets())
                .minmax()
                .into_option()?;

            Some(GasBin {
                gas_lo: lo,
                gas_hi: hi,
                blocks: in_bin.len(),
                targets_min,
                targets_max,
                targets_mean: mean(in_bin.iter().map(|b| b.total_targets() as f64))?,
                targets_per_mgas: mean(
                    in_bin
                        .iter()
                        .filter(|b| b.gas_used > 0)
                        .map(|b| b.total_targets() as f64 / (b.gas_used as f64 / 1e6)),
                ),
            })
        })
        .collect()
}

/// Tuning advice derived from the small blocks' mean target count.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum Recommendation {
    /// Mean below 100 targets: chunk size 20-30 and a lower activation
    /// threshold.
    FewTargets {
        /// Suggested activation threshold, 1.5x the mean.
        suggested_threshold: u64,
    },
    /// Mean between 100 and 300 targets: chunk size 30-60.
    Moderate {
        /// Suggested activation threshold, about the mean.
        suggested_threshold: u64,
    },
    /// Default settings are likely fine.
    HighTargets,
}

/// Summary of blocks under [`SMALL_BLOCK_GAS`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SmallBlockInsights {
    /// Blocks under the gas cut.
    pub small_blocks: usize,
    /// All blocks.
    pub total_blocks: usize,
    /// Mean targets per small block.
    pub mean_targets: f64,
    /// Most targets in a small block.
    pub max_targets: u64,
    /// Percent of small blocks with more than
    /// [`DEFAULT_MAX_TARGETS_FOR_CHUNKING`] targets.
    pub pct_over_default_threshold: f64,
    /// Suggested tuning for the small blocks.
    pub recommendation: Recommendation,
    /// Under 10% of small blocks reach the default threshold, so a
    /// threshold-gated client would prove most blocks on one worker.
    pub low_chunking_warning: bool,
}

impl SmallBlockInsights {
    /// `None` if no block is under the gas cut.
    pub fn new(blocks: &[Block]) -> Option<Self> {
        let small: Vec<u64> = blocks
            .iter()
            .filter(|b| b.gas_used < SMALL_BLOCK_GAS)
            .map(Block::total_targets)
            .collect();
        let mean_targets = mean(small.iter().map(|&t| t as f64))?;
        let max_targets = small.iter().copied().max()?;
        let over = small
            .iter()
            .filter(|&&t| t > DEFAULT_MAX_TARGETS_FOR_CHUNKING)
            .count();
        let pct_over_default_threshold = over as f64 / small.len() as f64 * 100.0;

        let recommendation = if mean_targets < 100.0 {
            Recommendation::FewTargets {
                suggested_threshold: (mean_targets * 1.5) as u64,
            }
        } else if mean_targets < 300.0 {
            Recommendation::Moderate {
                suggested_threshold: mean_targets as u64,
            }
        } else {
            Recommendation::HighTargets
        };

        Some(Self {
            small_blocks: small.len(),
            total_blocks: blocks.len(),
            mean_targets,
            max_targets,
            pct_over_default_threshold,
            recommendation,
            low_chunking_warning: pct_over_default_threshold < 10.0,
        })
    }
}
