//! Block records consumed by the scheduler.
//!
//! A [`Block`] is described only by aggregates: how much gas it used, how many
//! transactions it carried, and how many unique accounts and storage slots
//! have to be proven for its new state root.

use serde::{Deserialize, Serialize};

/// A single sampled transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Name of the [`TransactionProfile`](crate::TransactionProfile) this
    /// transaction was drawn from.
    pub profile: String,
    /// Gas consumed, never below the protocol minimum.
    pub gas: u64,
    /// Accounts touched, at least one (the sender).
    pub accounts: u64,
    /// Storage slots touched.
    pub slots: u64,
}

impl Transaction {
    /// Proof targets contributed by this transaction alone.
    pub const fn targets(&self) -> u64 {
        self.accounts.saturating_add(self.slots)
    }
}

/// An immutable block summary.
///
/// `unique_accounts` and `unique_slots` are exact set cardinalities for blocks
/// collected from a node, and discounted raw totals for synthetic blocks (see
/// [`workload::dedup_factor`](crate::workload::dedup_factor)).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block number, when the block came from a live chain.
    pub number: Option<u64>,
    /// Sum of the contained transactions' gas.
    pub gas_used: u64,
    /// Number of transactions in the block.
    pub tx_count: usize,
    /// Unique accounts touched.
    pub unique_accounts: u64,
    /// Unique `(account, slot)` pairs touched.
    pub unique_slots: u64,
    /// Sampled transactions. Empty for collected blocks.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// A block with no transactions and no targets.
    pub const fn empty() -> Self {
        Self {
            number: None,
            gas_used: 0,
            tx_count: 0,
            unique_accounts: 0,
            unique_slots: 0,
            transactions: Vec::new(),
        }
    }

    /// Builds a block from exact unique counts, as produced by tracing a real
    /// block.
    pub const fn from_exact_counts(
        number: u64,
        gas_used: u64,
        tx_count: usize,
        unique_accounts: u64,
        unique_slots: u64,
    ) -> Self {
        Self {
            number: Some(number),
            gas_used,
            tx_count,
            unique_accounts,
            unique_slots,
            transactions: Vec::new(),
        }
    }

    /// Total proof targets: unique accounts plus unique slots.
    pub const fn total_targets(&self) -> u64 {
        self.unique_accounts.saturating_add(self.unique_slots)
    }

    /// Targets before any deduplication, summed over the contained
    /// transactions.
    pub fn raw_targets(&self) -> u64 {
        self.transactions.iter().map(Transaction::targets).sum()
    }

    /// Whether the block carries no transactions.
    pub const fn is_empty(&self) -> bool {
        self.tx_count == 0
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::empty()
    }
}
