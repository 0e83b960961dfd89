use std::collections::{BTreeMap, BTreeSet, HashMap};

use alloy::primitives::{Address, B256};
use anyhow::anyhow;
use tuner::{
    collector::collect_blocks,
    provider::{BlockSummary, StateDiff, StateDiffSource},
};

/// In-memory chain: block summaries by number, diffs by transaction hash. A
/// transaction without a diff fails to trace.
#[derive(Default)]
struct FakeChain {
    blocks: HashMap<u64, BlockSummary>,
    diffs: HashMap<B256, StateDiff>,
    broken_blocks: BTreeSet<u64>,
}

impl FakeChain {
    fn with_block(
        mut self,
        number: u64,
        gas_used: u64,
        txs: Vec<(B256, Option<StateDiff>)>,
    ) -> Self {
        let tx_hashes = txs.iter().map(|(hash, _)| *hash).collect();
        for (hash, diff) in txs {
            if let Some(diff) = diff {
                self.diffs.insert(hash, diff);
            }
        }
        self.blocks.insert(
            number,
            BlockSummary {
                number,
                gas_used,
                tx_hashes,
            },
        );
        self
    }
}

impl StateDiffSource for FakeChain {
    async fn block_summary(&self, number: u64) -> anyhow::Result<Option<BlockSummary>> {
        if self.broken_blocks.contains(&number) {
            return Err(anyhow!("connection reset"));
        }
        Ok(self.blocks.get(&number).cloned())
    }

    async fn state_diff(&self, tx_hash: B256) -> anyhow::Result<StateDiff> {
        self.diffs
            .get(&tx_hash)
            .cloned()
            .ok_or_else(|| anyhow!("trace failed for {tx_hash}"))
    }
}

fn addr(n: u8) -> Address {
    Address::repeat_byte(n)
}

fn slot(n: u8) -> B256 {
    B256::repeat_byte(n)
}

fn tx(n: u8) -> B256 {
    B256::with_last_byte(n)
}

type Section = Vec<(u8, Vec<u8>)>;

fn section(entries: Section) -> BTreeMap<Address, BTreeSet<B256>> {
    entries
        .into_iter()
        .map(|(a, slots)| (addr(a), slots.into_iter().map(slot).collect()))
        .collect()
}

fn diff(pre: Section, post: Section) -> StateDiff {
    StateDiff {
        pre: section(pre),
        post: section(post),
    }
}

#[tokio::test]
async fn accounts_and_slots_dedup_across_transactions() {
    let chain = FakeChain::default().with_block(
        7,
        1_000_000,
        vec![
            (tx(1), Some(diff(vec![(1, vec![1, 2]), (2, vec![])], vec![(1, vec![2, 3])]))),
            // Slot 1 under account 3 is a different target from slot 1 under
            // account 1.
            (tx(2), Some(diff(vec![(1, vec![1]), (3, vec![1])], vec![]))),
        ],
    );

    let blocks = collect_blocks(&chain, 7, 1, 4).await.unwrap();
    assert_eq!(blocks.len(), 1);
    let block = &blocks[0];
    assert_eq!(block.number, Some(7));
    assert_eq!(block.gas_used, 1_000_000);
    assert_eq!(block.tx_count, 2);
    assert_eq!(block.unique_accounts, 3);
    assert_eq!(block.unique_slots, 4);
    assert_eq!(block.total_targets(), 7);
}

#[tokio::test]
async fn failed_trace_is_left_out_of_the_counts() {
    let chain = FakeChain::default().with_block(
        1,
        50_000,
        vec![(tx(1), Some(diff(vec![(1, vec![1])], vec![]))), (tx(2), None)],
    );

    let blocks = collect_blocks(&chain, 1, 1, 1).await.unwrap();
    assert_eq!(blocks[0].tx_count, 2);
    assert_eq!(blocks[0].total_targets(), 2);
}

#[tokio::test]
async fn missing_and_failing_blocks_are_skipped() {
    let mut chain = FakeChain::default()
        .with_block(10, 21_000, vec![(tx(1), Some(diff(vec![(1, vec![])], vec![])))])
        .with_block(12, 0, vec![])
        .with_block(13, 42_000, vec![(tx(2), Some(diff(vec![(2, vec![])], vec![])))]);
    chain.broken_blocks.insert(13);

    let blocks = collect_blocks(&chain, 10, 4, 2).await.unwrap();
    let numbers: Vec<_> = blocks.iter().map(|b| b.number).collect();
    assert_eq!(numbers, [Some(10), Some(12)]);
    assert!(blocks[1].is_empty());
    assert_eq!(blocks[1].total_targets(), 0);
}

#[tokio::test]
async fn nothing_collected_is_an_error() {
    let chain = FakeChain::default();
    let err = collect_blocks(&chain, 100, 5, 4).await.unwrap_err();
    assert!(err.to_string().contains("no blocks collected"));
}

#[tokio::test]
async fn blocks_keep_ascending_order() {
    let chain = (0..25u8).fold(FakeChain::default(), |chain, n| {
        chain.with_block(
            u64::from(n),
            u64::from(n) * 1_000,
            vec![(tx(n), Some(diff(vec![(n, vec![n])], vec![])))],
        )
    });

    let blocks = collect_blocks(&chain, 0, 25, 8).await.unwrap();
    assert_eq!(blocks.len(), 25);
    assert!(blocks.iter().map(|b| b.number).eq((0..25).map(Some)));
    assert!(blocks.iter().all(|b| b.total_targets() == 2));
}
