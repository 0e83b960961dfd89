//! Report contract: CSV exports and the console report.
//!
//! The per-block export keeps input order and the sweep exports keep candidate
//! order, so two runs over the same seed produce byte-identical files.

use std::fmt::{self, Display, Formatter};
use std::io;

use serde::Serialize;

use crate::{
    stats::{self, BlockSetStats, GasBin, Recommendation, SmallBlockInsights},
    sweep::{self, SweepAnalyzer, SweepSummary, ThresholdSummary},
    Block, SimError, DEFAULT_MAX_TARGETS_FOR_CHUNKING,
};

/// File name of the chunk-size sweep export.
pub const SWEEP_CSV: &str = "chunk_sweep_results.csv";

/// File name of the threshold sweep export.
pub const THRESHOLD_CSV: &str = "threshold_sweep_results.csv";

/// File name of the per-block export.
pub const BLOCKS_CSV: &str = "block_targets.csv";

#[derive(Serialize)]
struct BlockRow {
    gas_used: u64,
    tx_count: usize,
    total_accounts: u64,
    total_slots: u64,
    total_targets: u64,
}

impl From<&Block> for BlockRow {
    fn from(b: &Block) -> Self {
        Self {
            gas_used: b.gas_used,
            tx_count: b.tx_count,
            total_accounts: b.unique_accounts,
            total_slots: b.unique_slots,
            total_targets: b.total_targets(),
        }
    }
}

fn write_rows<W, T, I>(writer: W, rows: I) -> Result<(), csv::Error>
where
    W: io::Write,
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes one row per block, in input order.
pub fn write_blocks_csv<W: io::Write>(writer: W, blocks: &[Block]) -> Result<(), csv::Error> {
    write_rows(writer, blocks.iter().map(BlockRow::from))
}

/// Writes one row per candidate chunk size, in sweep order.
pub fn write_sweep_csv<W: io::Write>(
    writer: W,
    summaries: &[SweepSummary],
) -> Result<(), csv::Error> {
    write_rows(writer, summaries)
}

/// Writes one row per candidate threshold, in sweep order.
pub fn write_threshold_csv<W: io::Write>(
    writer: W,
    summaries: &[ThresholdSummary],
) -> Result<(), csv::Error> {
    write_rows(writer, summaries)
}

/// Everything the console report shows.
#[derive(Clone, Debug)]
pub struct Report {
    /// Worker pool size used for every evaluation.
    pub workers: usize,
    /// Range and mean of gas and targets.
    pub stats: BlockSetStats,
    /// Blocks grouped by gas used.
    pub gas_bins: Vec<GasBin>,
    /// One row per candidate chunk size, in candidate order.
    pub sweep: Vec<SweepSummary>,
    /// Index into `sweep` of the lowest-p95 candidate.
    pub optimal: usize,
    /// One row per candidate threshold, in candidate order.
    pub thresholds: Vec<ThresholdSummary>,
    /// Chunk size held fixed during the threshold sweep.
    pub reference_chunk_size: u64,
    /// `None` when no block is under the small-block gas cut.
    pub insights: Option<SmallBlockInsights>,
}

impl Report {
    /// Runs both sweeps and gathers the descriptive statistics.
    pub fn new(
        analyzer: &SweepAnalyzer<'_>,
        chunk_sizes: &[u64],
        thresholds: &[u64],
        reference_chunk_size: u64,
    ) -> Result<Self, SimError> {
        let blocks = analyzer.blocks();
        let sweep = analyzer.chunk_size_sweep(chunk_sizes)?;
        let optimal = sweep::optimal(&sweep)
            .and_then(|best| sweep.iter().position(|s| std::ptr::eq(s, best)))
            .ok_or(SimError::EmptyCandidates)?;

        Ok(Self {
            workers: analyzer.workers(),
            stats: BlockSetStats::new(blocks)?,
            gas_bins: stats::gas_bins(blocks, stats::DEFAULT_GAS_BIN_EDGES),
            thresholds: analyzer.threshold_sweep(thresholds, reference_chunk_size)?,
            optimal,
            sweep,
            reference_chunk_size,
            insights: SmallBlockInsights::new(blocks),
        })
    }

    /// The lowest-p95 sweep entry.
    pub fn best(&self) -> &SweepSummary {
        &self.sweep[self.optimal]
    }
}

fn section(f: &mut Formatter<'_>, title: &str) -> fmt::Result {
    let rule = "=".repeat(70);
    writeln!(f)?;
    writeln!(f, "{rule}")?;
    writeln!(f, "{title}")?;
    writeln!(f, "{rule}")
}

/// Formats an integer with `,` thousands separators.
fn grouped(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = &self.stats;
        section(f, "BLOCK STATISTICS")?;
        writeln!(f, "  Blocks analyzed: {}", s.blocks)?;
        writeln!(f, "  Gas range: {} - {}", grouped(s.gas_min), grouped(s.gas_max))?;
        writeln!(f, "  Gas mean: {}", grouped(s.gas_mean.round() as u64))?;
        writeln!(f, "  Target range: {} - {}", s.targets_min, s.targets_max)?;
        writeln!(f, "  Target mean: {:.1}", s.targets_mean)?;
        writeln!(f, "  Workers: {}", self.workers)?;

        section(f, "TARGETS vs GAS (binned)")?;
        for bin in &self.gas_bins {
            write!(
                f,
                "  {:.0}-{:.0}M gas: n={}, targets={}-{} (mean={:.0})",
                bin.gas_lo as f64 / 1e6,
                bin.gas_hi as f64 / 1e6,
                bin.blocks,
                bin.targets_min,
                bin.targets_max,
                bin.targets_mean,
            )?;
            match bin.targets_per_mgas {
                Some(tpm) => writeln!(f, ", targets/Mgas={tpm:.1}")?,
                None => writeln!(f)?,
            }
        }

        section(f, "CHUNK SIZE SWEEP")?;
        writeln!(
            f,
            "  {:>10} {:>12} {:>11} {:>11} {:>9} {:>9}",
            "chunk_size", "mean_time_ms", "p95_time_ms", "mean_chunks", "%_chunked", "mean_util"
        )?;
        writeln!(f, "  {}", "-".repeat(64))?;
        for r in &self.sweep {
            writeln!(
                f,
                "  {:>10} {:>12.2} {:>11.2} {:>11.1} {:>8.1}% {:>8.1}%",
                r.chunk_size,
                r.mean_time_ms,
                r.p95_time_ms,
                r.mean_chunks,
                r.pct_chunked,
                r.mean_utilization * 100.0,
            )?;
        }
        let best = self.best();
        writeln!(
            f,
            "\n  >> Optimal chunk_size (by p95): {} (p95={:.2}ms, mean={:.2}ms)",
            best.chunk_size, best.p95_time_ms, best.mean_time_ms
        )?;

        section(
            f,
            &format!(
                "MAX_TARGETS_FOR_CHUNKING SENSITIVITY (with chunk_size={})",
                self.reference_chunk_size
            ),
        )?;
        writeln!(
            f,
            "  {:>10} {:>14} {:>12} {:>11}",
            "threshold", "%_blocks_chunk", "mean_time_ms", "p95_time_ms"
        )?;
        writeln!(f, "  {}", "-".repeat(49))?;
        for r in &self.thresholds {
            writeln!(
                f,
                "  {:>10} {:>13.1}% {:>12.2} {:>11.2}",
                r.threshold, r.pct_chunked, r.mean_time_ms, r.p95_time_ms
            )?;
        }

        if let Some(insights) = &self.insights {
            write!(f, "{insights}")?;
        }
        Ok(())
    }
}

impl Display for SmallBlockInsights {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let cut = stats::SMALL_BLOCK_GAS / 1_000_000;
        let default = DEFAULT_MAX_TARGETS_FOR_CHUNKING;

        section(f, &format!("KEY INSIGHTS (<{cut}M GAS BLOCKS)"))?;
        writeln!(
            f,
            "  Blocks <{cut}M gas: {}/{}",
            self.small_blocks, self.total_blocks
        )?;
        writeln!(f, "  Mean targets: {:.0}", self.mean_targets)?;
        writeln!(f, "  Max targets: {}", self.max_targets)?;
        writeln!(
            f,
            "  % exceeding DEFAULT_MAX_TARGETS ({default}): {:.1}%",
            self.pct_over_default_threshold
        )?;

        match self.recommendation {
            Recommendation::FewTargets {
                suggested_threshold,
            } => {
                writeln!(f, "  >> Most blocks have very few targets. Consider chunk_size=20-30")?;
                writeln!(
                    f,
                    "     or lowering max_targets_for_chunking to ~{suggested_threshold}"
                )?;
            }
            Recommendation::Moderate {
                suggested_threshold,
            } => {
                writeln!(f, "  >> Moderate targets. chunk_size=30-60 is reasonable.")?;
                writeln!(
                    f,
                    "     Consider lowering max_targets_for_chunking to ~{suggested_threshold}"
                )?;
            }
            Recommendation::HighTargets => {
                writeln!(f, "  >> High target count. Default chunk_size=60 likely fine.")?;
            }
        }

        if self.low_chunking_warning {
            writeln!(
                f,
                "  >> WARNING: <10% of blocks trigger chunking with threshold={default}."
            )?;
            writeln!(f, "     This means multiproof runs single-threaded for most blocks.")?;
            writeln!(f, "     Strongly consider lowering max_targets_for_chunking.")?;
        }
        Ok(())
    }
}
