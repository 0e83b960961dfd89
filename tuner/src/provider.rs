use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use alloy::{
    primitives::{Address, B256},
    providers::{ext::DebugApi as _, Provider},
    rpc::types::{
        eth::{BlockId, BlockTransactionsKind},
        trace::geth::{
            AccountState, DiffMode, GethDebugBuiltInTracerType, GethDebugTracerType,
            GethDebugTracingOptions, GethTrace, PreStateConfig, PreStateFrame,
        },
    },
    transports::Transport,
};
use anyhow::{bail, Context as _};

/// What the collector needs to know about a block before tracing it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockSummary {
    pub number: u64,
    pub gas_used: u64,
    pub tx_hashes: Vec<B256>,
}

/// Storage slots touched per account, before and after a transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateDiff {
    pub pre: BTreeMap<Address, BTreeSet<B256>>,
    pub post: BTreeMap<Address, BTreeSet<B256>>,
}

impl StateDiff {
    /// Every `(account, slots)` entry of both sections.
    pub fn sections(&self) -> impl Iterator<Item = (&Address, &BTreeSet<B256>)> {
        self.pre.iter().chain(self.post.iter())
    }
}

impl From<DiffMode> for StateDiff {
    fn from(DiffMode { pre, post }: DiffMode) -> Self {
        Self {
            pre: touched_slots(pre),
            post: touched_slots(post),
        }
    }
}

fn touched_slots(section: BTreeMap<Address, AccountState>) -> BTreeMap<Address, BTreeSet<B256>> {
    section
        .into_iter()
        .map(|(address, state)| (address, state.storage.into_keys().collect()))
        .collect()
}

/// Source of block summaries and per-transaction state diffs.
pub trait StateDiffSource {
    /// `Ok(None)` if the node does not know the block.
    fn block_summary(
        &self,
        number: u64,
    ) -> impl Future<Output = anyhow::Result<Option<BlockSummary>>> + Send;

    fn state_diff(&self, tx_hash: B256) -> impl Future<Output = anyhow::Result<StateDiff>> + Send;
}

/// [`StateDiffSource`] backed by `eth_getBlockByNumber` and
/// `debug_traceTransaction` with the prestate tracer in diff mode.
pub struct RpcStateDiffSource<ProviderT, TransportT> {
    provider: ProviderT,
    _phantom: std::marker::PhantomData<TransportT>,
}

impl<ProviderT, TransportT> RpcStateDiffSource<ProviderT, TransportT>
where
    ProviderT: Provider<TransportT>,
    TransportT: Transport + Clone,
{
    pub const fn new(provider: ProviderT) -> Self {
        Self {
            provider,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<ProviderT, TransportT> StateDiffSource for RpcStateDiffSource<ProviderT, TransportT>
where
    ProviderT: Provider<TransportT>,
    TransportT: Transport + Clone,
{
    async fn block_summary(&self, number: u64) -> anyhow::Result<Option<BlockSummary>> {
        let Some(block) = self
            .provider
            .get_block(BlockId::from(number), BlockTransactionsKind::Full)
            .await?
        else {
            return Ok(None);
        };

        let gas_used = u64::try_from(block.header.gas_used)
            .with_context(|| format!("gas used of block {number} overflows u64"))?;
        let tx_hashes = block
            .transactions
            .as_transactions()
            .map(|txs| txs.iter().map(|tx| tx.hash).collect())
            .unwrap_or_default();

        Ok(Some(BlockSummary {
            number,
            gas_used,
            tx_hashes,
        }))
    }

    async fn state_diff(&self, tx_hash: B256) -> anyhow::Result<StateDiff> {
        let trace = self
            .provider
            .debug_trace_transaction(tx_hash, prestate_diff_tracing_options())
            .await?;

        match trace {
            GethTrace::PreStateTracer(PreStateFrame::Diff(diff)) => Ok(diff.into()),
            other => bail!("expected a prestate diff trace, got {other:?}"),
        }
    }
}

/// Tracing options for `debug_traceTransaction`: prestate tracer in diff mode.
fn prestate_diff_tracing_options() -> GethDebugTracingOptions {
    GethDebugTracingOptions {
        tracer_config: PreStateConfig {
            diff_mode: Some(true),
        }
        .into(),
        tracer: Some(GethDebugTracerType::BuiltInTracer(
            GethDebugBuiltInTracerType::PreStateTracer,
        )),
        ..GethDebugTracingOptions::default()
    }
}
