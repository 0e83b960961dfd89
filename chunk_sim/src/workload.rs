//! Synthetic workload model.
//!
//! Transactions are drawn from a small set of archetypes
//! ([`TransactionProfile`]s), each with normally distributed gas, touched
//! accounts and touched storage slots. Blocks are filled greedily up to a gas
//! ceiling, and their touch totals are discounted by [`dedup_factor`] to
//! approximate state shared between transactions of the same block.
//!
//! All randomness comes from the `rng` argument, so a seeded generator gives a
//! replayable block sequence.

use std::f64::consts::TAU;

use rand::{distributions::Distribution, seq::SliceRandom as _, Rng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Block, SimError, Transaction};

/// Intrinsic gas of the cheapest possible transaction.
pub const MIN_TX_GAS: u64 = 21_000;

/// Lower bound on the per-block dedup discount.
pub const MIN_DEDUP_FACTOR: f64 = 0.5;

/// Discount applied per transaction in a block.
pub const DEDUP_SLOPE: f64 = 0.002;

/// Lower edge of every gas band used by [`generate_block_set`].
const MIN_BLOCK_GAS_TARGET: u64 = 100_000;

/// Upper edges of the first three gas bands used by [`generate_block_set`].
/// The fourth band runs up to the gas limit.
const GAS_BANDS: [(u64, u64); 3] = [
    (MIN_BLOCK_GAS_TARGET, 2_000_000),
    (2_000_000, 8_000_000),
    (8_000_000, 15_000_000),
];

/// Lower edge of the last gas band.
const TOP_BAND_START: u64 = 15_000_000;

/// A transaction archetype.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionProfile {
    /// Human readable identifier, e.g. `dex_swap`.
    pub name: String,
    /// Mean gas cost.
    pub gas_mean: f64,
    /// Gas cost standard deviation.
    pub gas_std: f64,
    /// Mean number of touched accounts.
    pub accounts_mean: f64,
    /// Touched accounts standard deviation.
    pub accounts_std: f64,
    /// Mean number of touched storage slots.
    pub slots_mean: f64,
    /// Touched storage slots standard deviation.
    pub slots_std: f64,
    /// Relative selection frequency. Weights of a set need not sum to one.
    pub weight: f64,
}

impl TransactionProfile {
    fn new(
        name: &str,
        gas: (f64, f64),
        accounts: (f64, f64),
        slots: (f64, f64),
        weight: f64,
    ) -> Self {
        Self {
            name: name.to_owned(),
            gas_mean: gas.0,
            gas_std: gas.1,
            accounts_mean: accounts.0,
            accounts_std: accounts.1,
            slots_mean: slots.0,
            slots_std: slots.1,
            weight,
        }
    }

    fn validate(&self) -> Result<(), SimError> {
        let invalid = |reason| SimError::InvalidProfile {
            profile: self.name.clone(),
            reason,
        };

        if !(self.weight.is_finite() && self.weight > 0.0) {
            return Err(invalid("weight must be finite and positive"));
        }
        let params = [
            self.gas_mean,
            self.gas_std,
            self.accounts_mean,
            self.accounts_std,
            self.slots_mean,
            self.slots_std,
        ];
        if params.iter().any(|p| !p.is_finite()) {
            return Err(invalid("distribution parameters must be finite"));
        }
        if [self.gas_mean, self.accounts_mean, self.slots_mean]
            .iter()
            .any(|mean| *mean < 0.0)
        {
            return Err(invalid("means must be non-negative"));
        }
        if [self.gas_std, self.accounts_std, self.slots_std]
            .iter()
            .any(|std| *std < 0.0)
        {
            return Err(invalid("standard deviations must be non-negative"));
        }
        Ok(())
    }
}

/// The transaction mix of a typical payments-heavy chain.
pub fn default_profiles() -> Vec<TransactionProfile> {
    vec![
        TransactionProfile::new(
            "simple_transfer",
            (21_000.0, 0.0),
            (2.0, 0.0),
            (0.0, 0.0),
            0.40,
        ),
        TransactionProfile::new(
            "erc20_transfer",
            (65_000.0, 10_000.0),
            (3.0, 1.0),
            (4.0, 2.0),
            0.30,
        ),
        TransactionProfile::new(
            "dex_swap",
            (180_000.0, 60_000.0),
            (5.0, 2.0),
            (20.0, 10.0),
            0.15,
        ),
        TransactionProfile::new(
            "nft_mint",
            (120_000.0, 30_000.0),
            (3.0, 1.0),
            (6.0, 3.0),
            0.10,
        ),
        TransactionProfile::new(
            "complex_defi",
            (350_000.0, 100_000.0),
            (8.0, 3.0),
            (40.0, 15.0),
            0.05,
        ),
    ]
}

/// A validated, non-empty set of profiles with a cumulative weight table for
/// weighted selection.
#[derive(Clone, Debug)]
pub struct ProfileSet {
    profiles: Vec<TransactionProfile>,
    cumulative: Vec<f64>,
}

impl ProfileSet {
    /// Validates `profiles` and precomputes the cumulative weights.
    pub fn new(profiles: Vec<TransactionProfile>) -> Result<Self, SimError> {
        if profiles.is_empty() {
            return Err(SimError::EmptyProfileSet);
        }
        for profile in &profiles {
            profile.validate()?;
        }

        let cumulative = profiles
            .iter()
            .scan(0.0, |acc, p| {
                *acc += p.weight;
                Some(*acc)
            })
            .collect();

        Ok(Self {
            profiles,
            cumulative,
        })
    }

    /// The profiles, in definition order.
    pub fn profiles(&self) -> &[TransactionProfile] {
        &self.profiles
    }

    /// Sum of all weights.
    pub fn total_weight(&self) -> f64 {
        // Non-empty by construction.
        self.cumulative[self.cumulative.len() - 1]
    }

    /// Picks a profile with probability proportional to its weight.
    ///
    /// Draws `u` uniformly from `[0, total_weight)` and binary searches for the
    /// first cumulative weight strictly greater than `u`.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> &TransactionProfile {
        let u = rng.gen::<f64>() * self.total_weight();
        let idx = self
            .cumulative
            .partition_point(|&c| c <= u)
            .min(self.profiles.len() - 1);
        &self.profiles[idx]
    }
}

/// Normal distribution sampled with the Box-Muller transform.
#[derive(Clone, Copy, Debug)]
pub struct Gaussian {
    mean: f64,
    std_dev: f64,
}

impl Gaussian {
    /// `std_dev` of zero yields `mean` on every draw.
    pub const fn new(mean: f64, std_dev: f64) -> Self {
        Self { mean, std_dev }
    }
}

impl Distribution<f64> for Gaussian {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        // `gen` is in [0, 1); shift so the log argument is never zero.
        let u1 = 1.0 - rng.gen::<f64>();
        let u2 = rng.gen::<f64>();
        let z = (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos();
        self.mean + self.std_dev * z
    }
}

/// Draws from `N(mean, std_dev)`, truncates toward zero and clamps below at
/// `floor`.
fn sample_floored<R: Rng + ?Sized>(rng: &mut R, mean: f64, std_dev: f64, floor: u64) -> u64 {
    // `as` saturates, so large negative draws land on 0 before the floor.
    let drawn = Gaussian::new(mean, std_dev).sample(rng).trunc();
    (drawn.max(0.0) as u64).max(floor)
}

/// Samples one transaction from `profile`.
///
/// Gas, accounts and slots are drawn independently. Gas is floored at
/// [`MIN_TX_GAS`], accounts at one and slots at zero.
pub fn sample_transaction<R: Rng + ?Sized>(
    profile: &TransactionProfile,
    rng: &mut R,
) -> Transaction {
    let gas = sample_floored(rng, profile.gas_mean, profile.gas_std, MIN_TX_GAS);
    let accounts = sample_floored(rng, profile.accounts_mean, profile.accounts_std, 1);
    let slots = sample_floored(rng, profile.slots_mean, profile.slots_std, 0);

    Transaction {
        profile: profile.name.clone(),
        gas,
        accounts,
        slots,
    }
}

/// Fraction of raw touches assumed unique in a block of `tx_count`
/// transactions: `max(0.5, 1 - 0.002 * tx_count)`.
pub fn dedup_factor(tx_count: usize) -> f64 {
    (1.0 - tx_count as f64 * DEDUP_SLOPE).max(MIN_DEDUP_FACTOR)
}

/// Fills a block with sampled transactions until the next one would push gas
/// used past `gas_limit`.
///
/// If the very first transaction does not fit, the result is an empty block.
pub fn generate_block<R: Rng + ?Sized>(
    gas_limit: u64,
    profiles: &ProfileSet,
    rng: &mut R,
) -> Block {
    let mut transactions = Vec::new();
    let mut gas_used = 0u64;
    let mut raw_accounts = 0u64;
    let mut raw_slots = 0u64;

    while gas_used < gas_limit {
        let tx = sample_transaction(profiles.choose(rng), rng);
        match gas_used.checked_add(tx.gas) {
            Some(next) if next <= gas_limit => gas_used = next,
            _ => break,
        }
        raw_accounts = raw_accounts.saturating_add(tx.accounts);
        raw_slots = raw_slots.saturating_add(tx.slots);
        transactions.push(tx);
    }

    let factor = dedup_factor(transactions.len());
    let unique_accounts = (raw_accounts as f64 * factor) as u64;
    let unique_slots = (raw_slots as f64 * factor) as u64;

    Block {
        number: None,
        gas_used,
        tx_count: transactions.len(),
        unique_accounts,
        unique_slots,
        transactions,
    }
}

/// Uniform draw from `[lo, hi]`, with `lo` pulled down to `hi` if needed.
fn gas_target_in<R: Rng + ?Sized>(rng: &mut R, lo: u64, hi: u64) -> u64 {
    rng.gen_range(lo.min(hi)..=hi)
}

/// Generates `block_count` blocks whose gas ceilings are spread over four
/// bands: up to 2M, 2M–8M, 8M–15M and 15M up to `gas_limit`.
///
/// Each band gets a quarter of the blocks. A band that starts at or above
/// `gas_limit` draws from the whole `[100k, gas_limit]` range instead, as do
/// the `block_count % 4` leftover blocks. Ceilings are shuffled before the
/// blocks are generated, so the output is not sorted by size.
pub fn generate_block_set<R: Rng + ?Sized>(
    block_count: usize,
    gas_limit: u64,
    profiles: &ProfileSet,
    rng: &mut R,
) -> Vec<Block> {
    let quartile = block_count / 4;
    let mut gas_targets = Vec::with_capacity(block_count);

    for (lo, hi) in GAS_BANDS
        .into_iter()
        .chain(std::iter::once((TOP_BAND_START, gas_limit)))
    {
        // The first band is always in range, clamped to the limit.
        let in_range = lo == MIN_BLOCK_GAS_TARGET || gas_limit > lo;
        for _ in 0..quartile {
            let target = if in_range {
                gas_target_in(rng, lo, hi.min(gas_limit))
            } else {
                gas_target_in(rng, MIN_BLOCK_GAS_TARGET, gas_limit)
            };
            gas_targets.push(target);
        }
    }
    for _ in gas_targets.len()..block_count {
        gas_targets.push(gas_target_in(rng, MIN_BLOCK_GAS_TARGET, gas_limit));
    }
    gas_targets.shuffle(rng);

    debug!(block_count, gas_limit, "generating synthetic blocks");

    gas_targets
        .into_iter()
        .map(|target| generate_block(target, profiles, rng))
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn transfer_only() -> ProfileSet {
        ProfileSet::new(vec![TransactionProfile::new(
            "simple_transfer",
            (21_000.0, 0.0),
            (2.0, 0.0),
            (0.0, 0.0),
            1.0,
        )])
        .unwrap()
    }

    #[test]
    fn dedup_factor_is_bounded() {
        assert_eq!(dedup_factor(0), 1.0);
        assert!((dedup_factor(100) - 0.8).abs() < 1e-12);
        assert_eq!(dedup_factor(250), 0.5);
        assert_eq!(dedup_factor(1_000_000), 0.5);
        for n in 0..2_000 {
            let f = dedup_factor(n);
            assert!((MIN_DEDUP_FACTOR..=1.0).contains(&f), "{n} -> {f}");
        }
    }

    #[test]
    fn sampled_transactions_respect_floors() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        // Wide distributions centred below the floors.
        let profile = TransactionProfile::new("wild", (0.0, 50_000.0), (0.0, 5.0), (-5.0, 5.0), 1.0);
        for _ in 0..10_000 {
            let tx = sample_transaction(&profile, &mut rng);
            assert!(tx.gas >= MIN_TX_GAS);
            assert!(tx.accounts >= 1);
            assert_eq!(tx.targets(), tx.accounts + tx.slots);
        }
    }

    #[test]
    fn zero_std_dev_is_deterministic() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let set = transfer_only();
        let profile = &set.profiles()[0];
        for _ in 0..100 {
            let tx = sample_transaction(profile, &mut rng);
            assert_eq!((tx.gas, tx.accounts, tx.slots), (21_000, 2, 0));
        }
    }

    #[test]
    fn weighted_choice_follows_weights() {
        let set = ProfileSet::new(default_profiles()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let draws = 100_000;
        let mut counts = vec![0usize; set.profiles().len()];
        for _ in 0..draws {
            let chosen = set.choose(&mut rng);
            let idx = set
                .profiles()
                .iter()
                .position(|p| p.name == chosen.name)
                .unwrap();
            counts[idx] += 1;
        }
        for (profile, count) in set.profiles().iter().zip(counts) {
            let observed = count as f64 / draws as f64;
            let expected = profile.weight / set.total_weight();
            assert!(
                (observed - expected).abs() < 0.01,
                "{}: observed {observed}, expected {expected}",
                profile.name
            );
        }
    }

    #[test]
    fn weights_are_relative() {
        let mut scaled = default_profiles();
        for p in &mut scaled {
            p.weight *= 250.0;
        }
        let a = ProfileSet::new(default_profiles()).unwrap();
        let b = ProfileSet::new(scaled).unwrap();

        let mut rng_a = ChaCha8Rng::seed_from_u64(3);
        let mut rng_b = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..1_000 {
            assert_eq!(a.choose(&mut rng_a).name, b.choose(&mut rng_b).name);
        }
    }

    #[test]
    fn invalid_profiles_are_rejected() {
        assert_eq!(ProfileSet::new(vec![]).unwrap_err(), SimError::EmptyProfileSet);

        let mut zero_weight = default_profiles();
        zero_weight[2].weight = 0.0;
        assert!(matches!(
            ProfileSet::new(zero_weight),
            Err(SimError::InvalidProfile { profile, .. }) if profile == "dex_swap"
        ));

        let mut negative_std = default_profiles();
        negative_std[0].slots_std = -1.0;
        assert!(ProfileSet::new(negative_std).is_err());

        let mut nan_mean = default_profiles();
        nan_mean[4].gas_mean = f64::NAN;
        assert!(ProfileSet::new(nan_mean).is_err());

        for field in 0..3 {
            let mut profile =
                TransactionProfile::new("neg", (50_000.0, 0.0), (3.0, 0.0), (1.0, 0.0), 1.0);
            match field {
                0 => profile.gas_mean = -50_000.0,
                1 => profile.accounts_mean = -3.0,
                _ => profile.slots_mean = -1.0,
            }
            assert_eq!(
                ProfileSet::new(vec![profile]).unwrap_err(),
                SimError::InvalidProfile {
                    profile: "neg".to_owned(),
                    reason: "means must be non-negative",
                }
            );
        }
    }

    #[test]
    fn block_fills_up_to_gas_limit() {
        let block = generate_block(1_000_000, &transfer_only(), &mut ChaCha8Rng::seed_from_u64(0));
        assert_eq!(block.tx_count, 47);
        assert_eq!(block.gas_used, 47 * 21_000);
        assert_eq!(block.transactions.len(), block.tx_count);
        // 94 raw account touches discounted by 0.906.
        assert_eq!(block.unique_accounts, 85);
        assert_eq!(block.unique_slots, 0);
    }

    #[test]
    fn block_never_exceeds_gas_limit() {
        let set = ProfileSet::new(default_profiles()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for limit in [0, 20_999, 21_000, 100_000, 1_000_000, 30_000_000] {
            let block = generate_block(limit, &set, &mut rng);
            assert!(block.gas_used <= limit);
            assert_eq!(
                block.gas_used,
                block.transactions.iter().map(|tx| tx.gas).sum::<u64>()
            );
            assert!(block.total_targets() <= block.raw_targets());
        }
    }

    #[test]
    fn huge_draws_end_the_block_instead_of_overflowing() {
        let set = ProfileSet::new(vec![TransactionProfile::new(
            "whale",
            (1e19, 0.0),
            (1e19, 0.0),
            (1e19, 0.0),
            1.0,
        )])
        .unwrap();
        let block = generate_block(u64::MAX, &set, &mut ChaCha8Rng::seed_from_u64(0));
        assert_eq!(block.tx_count, 1);
        assert_eq!(block.gas_used, 10_000_000_000_000_000_000);
        assert_eq!(block.transactions[0].targets(), u64::MAX);
        assert_eq!(block.total_targets(), u64::MAX);
    }

    #[test]
    fn gas_limit_below_minimum_gives_empty_block() {
        let block = generate_block(20_000, &transfer_only(), &mut ChaCha8Rng::seed_from_u64(0));
        assert!(block.is_empty());
        assert_eq!(block.gas_used, 0);
        assert_eq!(block.total_targets(), 0);
    }

    #[test]
    fn block_set_spans_gas_bands() {
        let set = ProfileSet::new(default_profiles()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let blocks = generate_block_set(202, 20_000_000, &set, &mut rng);
        assert_eq!(blocks.len(), 202);
        assert!(blocks.iter().any(|b| b.gas_used < 2_000_000));
        assert!(blocks.iter().any(|b| b.gas_used >= 15_000_000));
        assert!(blocks.iter().all(|b| b.gas_used <= 20_000_000));
    }

    #[test]
    fn block_set_with_small_limit_stays_in_range() {
        let set = ProfileSet::new(default_profiles()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for limit in [50_000, 1_500_000, 5_000_000] {
            let blocks = generate_block_set(17, limit, &set, &mut rng);
            assert_eq!(blocks.len(), 17);
            assert!(blocks.iter().all(|b| b.gas_used <= limit));
        }
    }
}
