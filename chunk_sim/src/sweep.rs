//! Parameter sweeps.
//!
//! A [`SweepAnalyzer`] holds one block set and evaluates it under every
//! candidate configuration. The same blocks are reused for every candidate, so
//! results are directly comparable. Candidates are evaluated in parallel;
//! output order always follows candidate order.

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    scheduler::simulate_block, stats, ActivationRule, AssignmentStrategy, Block, ChunkingConfig,
    CostModel, GreedyLpt, SimError, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_TARGETS_FOR_CHUNKING,
};

/// Aggregate over all blocks for one candidate chunk size.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SweepSummary {
    /// Candidate chunk size.
    pub chunk_size: u64,
    /// Blocks evaluated.
    #[serde(skip)]
    pub blocks: usize,
    /// Mean wall time over the block set, in milliseconds.
    pub mean_time_ms: f64,
    /// Nearest-rank 95th percentile of wall time.
    pub p95_time_ms: f64,
    /// Mean number of chunks per block.
    pub mean_chunks: f64,
    /// Percent of blocks that were chunked, in `[0, 100]`.
    pub pct_chunked: f64,
    /// Mean utilization ratio, in `[0, 1]`.
    pub mean_utilization: f64,
}

/// Aggregate over all blocks for one candidate activation threshold, at a
/// fixed reference chunk size.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ThresholdSummary {
    /// Candidate activation threshold.
    pub threshold: u64,
    /// Chunk size held fixed during the sweep.
    pub chunk_size: u64,
    /// Blocks evaluated.
    #[serde(skip)]
    pub blocks: usize,
    /// Percent of blocks that were chunked, in `[0, 100]`.
    pub pct_chunked: f64,
    /// Mean wall time over the block set, in milliseconds.
    pub mean_time_ms: f64,
    /// 95th-percentile wall time, in milliseconds.
    pub p95_time_ms: f64,
    /// Mean number of chunks per block.
    pub mean_chunks: f64,
    /// Mean worker utilization, as a ratio in `[0, 1]`.
    pub mean_utilization: f64,
}

/// Series statistics for one configuration.
#[derive(Debug)]
struct Evaluation {
    blocks: usize,
    mean_time_ms: f64,
    p95_time_ms: f64,
    mean_chunks: f64,
    pct_chunked: f64,
    mean_utilization: f64,
}

/// Evaluates a fixed block set under candidate configurations.
#[derive(Debug)]
pub struct SweepAnalyzer<'a> {
    blocks: &'a [Block],
    base: ChunkingConfig,
    strategy: Box<dyn AssignmentStrategy>,
}

impl<'a> SweepAnalyzer<'a> {
    /// Analyzer with greedy LPT assignment and the default activation rule.
    ///
    /// Fails on an empty block set, zero workers or an invalid cost model.
    pub fn new(blocks: &'a [Block], workers: usize, cost: CostModel) -> Result<Self, SimError> {
        if blocks.is_empty() {
            return Err(SimError::EmptyBlockSet);
        }
        let base = ChunkingConfig::new(
            DEFAULT_CHUNK_SIZE,
            DEFAULT_MAX_TARGETS_FOR_CHUNKING,
            workers,
            cost,
        )?;
        Ok(Self {
            blocks,
            base,
            strategy: Box::new(GreedyLpt),
        })
    }

    /// Replaces the assignment strategy.
    pub fn with_strategy(self, strategy: Box<dyn AssignmentStrategy>) -> Self {
        Self { strategy, ..self }
    }

    /// Replaces the activation rule.
    pub fn with_activation(self, activation: ActivationRule) -> Self {
        Self {
            base: self.base.with_activation(activation),
            ..self
        }
    }

    /// Threshold used by [`Self::chunk_size_sweep`] under
    /// [`ActivationRule::ThresholdGated`].
    pub fn with_threshold(self, threshold: u64) -> Self {
        Self {
            base: self.base.with_threshold(threshold),
            ..self
        }
    }

    /// The block set under evaluation.
    pub fn blocks(&self) -> &'a [Block] {
        self.blocks
    }

    /// Size of the worker pool every candidate is evaluated with.
    pub fn workers(&self) -> usize {
        self.base.workers().get()
    }

    /// The assignment strategy used for every evaluation.
    pub fn strategy(&self) -> &dyn AssignmentStrategy {
        self.strategy.as_ref()
    }

    /// Evaluates every candidate chunk size.
    ///
    /// All candidates are validated before any block is simulated.
    pub fn chunk_size_sweep(&self, chunk_sizes: &[u64]) -> Result<Vec<SweepSummary>, SimError> {
        if chunk_sizes.is_empty() {
            return Err(SimError::EmptyCandidates);
        }
        let configs = chunk_sizes
            .iter()
            .map(|&cs| self.base.with_chunk_size(cs))
            .collect::<Result<Vec<_>, _>>()?;

        let summaries: Vec<_> = configs
            .par_iter()
            .map(|config| {
                let eval = self.evaluate(config);
                SweepSummary {
                    chunk_size: config.chunk_size(),
                    blocks: eval.blocks,
                    mean_time_ms: eval.mean_time_ms,
                    p95_time_ms: eval.p95_time_ms,
                    mean_chunks: eval.mean_chunks,
                    pct_chunked: eval.pct_chunked,
                    mean_utilization: eval.mean_utilization,
                }
            })
            .collect();

        for s in &summaries {
            debug!(
                chunk_size = s.chunk_size,
                mean_ms = s.mean_time_ms,
                p95_ms = s.p95_time_ms,
                "evaluated chunk size"
            );
        }
        if let Some(best) = optimal(&summaries) {
            info!(
                chunk_size = best.chunk_size,
                p95_ms = best.p95_time_ms,
                strategy = self.strategy.name(),
                "optimal chunk size"
            );
        }
        Ok(summaries)
    }

    /// Evaluates every candidate activation threshold with the chunk size held
    /// at `reference_chunk_size`.
    ///
    /// Under [`ActivationRule::ChunkSize`] the threshold does not gate
    /// chunking, so every row is identical; the sweep only becomes
    /// decision-relevant under [`ActivationRule::ThresholdGated`].
    pub fn threshold_sweep(
        &self,
        thresholds: &[u64],
        reference_chunk_size: u64,
    ) -> Result<Vec<ThresholdSummary>, SimError> {
        if thresholds.is_empty() {
            return Err(SimError::EmptyCandidates);
        }
        let reference = self.base.with_chunk_size(reference_chunk_size)?;

        let rows: Vec<_> = thresholds
            .par_iter()
            .map(|&threshold| {
                let config = reference.with_threshold(threshold);
                let eval = self.evaluate(&config);
                ThresholdSummary {
                    threshold,
                    chunk_size: reference_chunk_size,
                    blocks: eval.blocks,
                    pct_chunked: eval.pct_chunked,
                    mean_time_ms: eval.mean_time_ms,
                    p95_time_ms: eval.p95_time_ms,
                    mean_chunks: eval.mean_chunks,
                    mean_utilization: eval.mean_utilization,
                }
            })
            .collect();

        for r in &rows {
            debug!(
                threshold = r.threshold,
                chunk_size = r.chunk_size,
                pct_chunked = r.pct_chunked,
                p95_ms = r.p95_time_ms,
                "evaluated threshold"
            );
        }
        Ok(rows)
    }

    fn evaluate(&self, config: &ChunkingConfig) -> Evaluation {
        let n = self.blocks.len();
        let mut times = Vec::with_capacity(n);
        let mut chunks = 0u64;
        let mut chunked = 0usize;
        let mut utilization = 0.0;

        for block in self.blocks {
            let result = simulate_block(block.total_targets(), config, self.strategy.as_ref());
            times.push(result.wall_time_ms);
            chunks += result.n_chunks;
            chunked += usize::from(result.chunking_triggered);
            utilization += result.utilization;
        }

        let mean_time_ms = times.iter().sum::<f64>() / n as f64;
        times.sort_by(f64::total_cmp);

        Evaluation {
            blocks: n,
            mean_time_ms,
            // Non-empty by construction.
            p95_time_ms: stats::p95(&times).unwrap_or_default(),
            mean_chunks: chunks as f64 / n as f64,
            pct_chunked: chunked as f64 / n as f64 * 100.0,
            mean_utilization: utilization / n as f64,
        }
    }
}

/// The summary with the lowest p95 wall time; the first one wins ties.
pub fn optimal(summaries: &[SweepSummary]) -> Option<&SweepSummary> {
    summaries
        .iter()
        .min_by(|a, b| a.p95_time_ms.total_cmp(&b.p95_time_ms))
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use super::*;
    use crate::RoundRobin;

    fn blocks(targets: &[u64]) -> Vec<Block> {
        targets
            .iter()
            .map(|&t| Block {
                gas_used: 1_000_000,
                tx_count: 1,
                unique_accounts: t,
                ..Block::empty()
            })
            .collect()
    }

    #[test]
    fn rejects_empty_inputs() {
        let cost = CostModel::default();
        assert_eq!(
            SweepAnalyzer::new(&[], 8, cost).unwrap_err(),
            SimError::EmptyBlockSet
        );

        let set = blocks(&[10]);
        assert_eq!(SweepAnalyzer::new(&set, 0, cost).unwrap_err(), SimError::ZeroWorkers);

        let analyzer = SweepAnalyzer::new(&set, 8, cost).unwrap();
        assert_eq!(
            analyzer.chunk_size_sweep(&[]).unwrap_err(),
            SimError::EmptyCandidates
        );
        assert_eq!(
            analyzer.threshold_sweep(&[], 60).unwrap_err(),
            SimError::EmptyCandidates
        );
        assert_eq!(
            analyzer.chunk_size_sweep(&[10, 0, 20]).unwrap_err(),
            SimError::ZeroChunkSize
        );
    }

    #[test]
    fn sweep_preserves_candidate_order() {
        let set = blocks(&[0, 50, 120, 400, 1_000]);
        let analyzer = SweepAnalyzer::new(&set, 8, CostModel::default()).unwrap();
        let candidates = [300, 10, 60, 15];
        let sweep = analyzer.chunk_size_sweep(&candidates).unwrap();
        let order: Vec<_> = sweep.iter().map(|s| s.chunk_size).collect();
        assert_eq!(order, candidates);
        assert!(sweep.iter().all(|s| s.blocks == 5));
    }

    #[test]
    fn sweep_statistics() {
        let set = blocks(&[5, 25]);
        let analyzer = SweepAnalyzer::new(&set, 2, CostModel::default()).unwrap();
        let sweep = analyzer.chunk_size_sweep(&[10]).unwrap();
        let s = &sweep[0];

        // 5 targets: one chunk, 0.25 + 0.5.
        // 25 targets: chunks 10/10/5 -> loads [0.6, 0.35], 0.6 + 0.5.
        assert!((s.mean_time_ms - (0.75 + 1.1) / 2.0).abs() < 1e-9);
        assert!((s.p95_time_ms - 1.1).abs() < 1e-9);
        assert!((s.mean_chunks - 2.0).abs() < 1e-12);
        assert!((s.pct_chunked - 50.0).abs() < 1e-12);
        let util = (0.5 + (0.95 / 2.0) / 0.6) / 2.0;
        assert!((s.mean_utilization - util).abs() < 1e-9);
    }

    #[test]
    fn optimal_takes_first_minimum() {
        let summary = |chunk_size, p95| SweepSummary {
            chunk_size,
            blocks: 1,
            mean_time_ms: 0.0,
            p95_time_ms: p95,
            mean_chunks: 1.0,
            pct_chunked: 0.0,
            mean_utilization: 1.0,
        };
        let sweep = [summary(10, 3.0), summary(20, 1.0), summary(30, 1.0), summary(40, 2.0)];
        assert_eq!(optimal(&sweep).unwrap().chunk_size, 20);
        assert!(optimal(&[]).is_none());
    }

    #[test]
    fn threshold_sweep_is_flat_under_default_rule() {
        let set = blocks(&[40, 90, 160, 350, 700]);
        let analyzer = SweepAnalyzer::new(&set, 4, CostModel::default()).unwrap();
        let rows = analyzer.threshold_sweep(&[50, 100, 500], 60).unwrap();
        assert!(rows.windows(2).all(|w| w[0].p95_time_ms == w[1].p95_time_ms));
        assert!(rows.iter().all(|r| (r.pct_chunked - 80.0).abs() < 1e-12));
    }

    #[test]
    fn threshold_sweep_varies_when_gated() {
        let set = blocks(&[40, 90, 160, 350, 700]);
        let analyzer = SweepAnalyzer::new(&set, 4, CostModel::default())
            .unwrap()
            .with_activation(ActivationRule::ThresholdGated);
        let rows = analyzer.threshold_sweep(&[50, 100, 500], 60).unwrap();
        let pct: Vec<_> = rows.iter().map(|r| r.pct_chunked).collect();
        assert_eq!(pct, vec![80.0, 60.0, 20.0]);
        assert!(rows[0].mean_time_ms <= rows[2].mean_time_ms);
    }

    #[test]
    fn strategy_is_pluggable() {
        let set = blocks(&[97, 333, 1_001]);
        let lpt = SweepAnalyzer::new(&set, 3, CostModel::default()).unwrap();
        let rr = SweepAnalyzer::new(&set, 3, CostModel::default())
            .unwrap()
            .with_strategy(Box::new(RoundRobin));
        assert_eq!(rr.strategy().name(), "round-robin");

        let a = lpt.chunk_size_sweep(&[10, 40]).unwrap();
        let b = rr.chunk_size_sweep(&[10, 40]).unwrap();
        for (a, b) in a.iter().zip(&b) {
            assert_eq!(a.mean_chunks, b.mean_chunks);
            assert!(a.p95_time_ms <= b.p95_time_ms + 1e-9);
        }
    }

    #[test]
    fn analyzer_reports_its_workers() {
        let set = blocks(&[10]);
        let analyzer = SweepAnalyzer::new(&set, 6, CostModel::default()).unwrap();
        assert_eq!(analyzer.workers(), 6);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn every_threshold_is_logged() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let set = blocks(&[40, 700]);
        let analyzer = SweepAnalyzer::new(&set, 4, CostModel::default()).unwrap();
        tracing::subscriber::with_default(subscriber, || {
            analyzer.threshold_sweep(&[50, 100, 500], 60).unwrap();
        });

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert_eq!(logs.matches("evaluated threshold").count(), 3);
        for threshold in ["threshold=50", "threshold=100", "threshold=500"] {
            assert!(logs.contains(threshold), "missing {threshold} in {logs}");
        }
    }
}
