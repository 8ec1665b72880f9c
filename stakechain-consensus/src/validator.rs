//! Validator stake, delegation and stake-weighted selection

use crate::{AccountId, Amount, ConsensusError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Delegator -> validator -> delegated amount
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Delegations {
    entries: HashMap<AccountId, HashMap<AccountId, Amount>>,
}

impl Delegations {
    /// Amount `delegator` has delegated to `validator`
    pub fn delegated(&self, delegator: &str, validator: &str) -> Amount {
        self.entries
            .get(delegator)
            .and_then(|targets| targets.get(validator))
            .copied()
            .unwrap_or(0)
    }

    /// Every delegation made by `delegator`, sorted by validator
    pub fn delegations_of(&self, delegator: &str) -> BTreeMap<AccountId, Amount> {
        self.entries
            .get(delegator)
            .map(|targets| targets.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default()
    }

    /// Total contributed by `delegator` across all validators
    pub fn total_contributed(&self, delegator: &str) -> u128 {
        self.entries
            .get(delegator)
            .map(|targets| targets.values().map(|v| u128::from(*v)).sum())
            .unwrap_or(0)
    }

    /// Total delegated to `validator` by everyone
    pub fn total_delegated_to(&self, validator: &str) -> u128 {
        self.entries
            .values()
            .filter_map(|targets| targets.get(validator))
            .map(|v| u128::from(*v))
            .sum()
    }
}

/// Validator stakes, kept in insertion order so selection is reproducible
#[derive(Debug, Clone, Default)]
pub struct StakeBook {
    order: Vec<AccountId>,
    stakes: HashMap<AccountId, Amount>,
    delegations: Delegations,
}

impl StakeBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increase a validator's stake, registering it on first use
    pub fn add_stake(&mut self, validator: &str, amount: Amount) -> Result<()> {
        let current = self.stake_of(validator);
        let updated = current
            .checked_add(amount)
            .ok_or_else(|| ConsensusError::AmountOverflow { account: validator.to_string() })?;

        if !self.stakes.contains_key(validator) {
            self.order.push(validator.to_string());
        }
        self.stakes.insert(validator.to_string(), updated);

        debug!(validator, amount, total = updated, "Stake added");
        Ok(())
    }

    /// Delegate stake to a validator. The amount counts toward the
    /// validator's selection weight exactly like self-stake.
    pub fn delegate(&mut self, delegator: &str, validator: &str, amount: Amount) -> Result<()> {
        let current = self.delegations.delegated(delegator, validator);
        let updated = current
            .checked_add(amount)
            .ok_or_else(|| ConsensusError::AmountOverflow { account: delegator.to_string() })?;

        // stake first: on overflow neither map changes
        self.add_stake(validator, amount)?;
        self.delegations
            .entries
            .entry(delegator.to_string())
            .or_default()
            .insert(validator.to_string(), updated);

        debug!(delegator, validator, amount, "Stake delegated");
        Ok(())
    }

    /// Current stake of a validator (0 when unknown)
    pub fn stake_of(&self, validator: &str) -> Amount {
        self.stakes.get(validator).copied().unwrap_or(0)
    }

    /// Sum of every stake
    pub fn total_stake(&self) -> u128 {
        self.stakes.values().map(|v| u128::from(*v)).sum()
    }

    /// `(validator, stake)` pairs in insertion order
    pub fn snapshot(&self) -> Vec<(AccountId, Amount)> {
        self.order
            .iter()
            .map(|validator| (validator.clone(), self.stake_of(validator)))
            .collect()
    }

    pub fn delegations(&self) -> &Delegations {
        &self.delegations
    }

    pub fn validator_count(&self) -> usize {
        self.order.len()
    }
}

/// Source of the uniform draw used by selection
pub trait RandomSource {
    /// A value uniformly distributed in `[0, total]`
    fn pick(&mut self, total: f64) -> f64;
}

/// Draws from the thread-local generator
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn pick(&mut self, total: f64) -> f64 {
        rand::thread_rng().gen_range(0.0..=total)
    }
}

/// Reproducible draws from a seeded generator
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandom {
    fn pick(&mut self, total: f64) -> f64 {
        self.rng.gen_range(0.0..=total)
    }
}

/// Replays a fixed list of picks, cycling when exhausted
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    picks: Vec<f64>,
    next: usize,
}

impl ScriptedRandom {
    pub fn new(picks: Vec<f64>) -> Self {
        Self { picks, next: 0 }
    }
}

impl RandomSource for ScriptedRandom {
    fn pick(&mut self, _total: f64) -> f64 {
        if self.picks.is_empty() {
            return 0.0;
        }
        let value = self.picks[self.next % self.picks.len()];
        self.next += 1;
        value
    }
}

/// Stake-weighted lottery over a stake book
pub struct ValidatorSelector {
    source: Box<dyn RandomSource + Send + Sync>,
}

impl ValidatorSelector {
    pub fn new(source: impl RandomSource + Send + Sync + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    /// Pick a validator with probability proportional to its stake.
    ///
    /// Returns `None` only when the total stake is zero.
    pub fn select(&mut self, stakes: &StakeBook) -> Option<AccountId> {
        let snapshot = stakes.snapshot();
        let total = stakes.total_stake();
        if total == 0 {
            return None;
        }

        #[allow(clippy::cast_precision_loss)]
        let total = total as f64;
        let pick = self.source.pick(total).clamp(0.0, total);
        let selected = select_weighted(&snapshot, pick);
        debug!(pick, total, selected = ?selected, "Validator lottery drawn");
        selected
    }
}

impl std::fmt::Debug for ValidatorSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorSelector").finish()
    }
}

/// Cumulative-sum walk: the first validator whose running total reaches
/// `pick` wins. Zero-stake validators are never chosen; if float rounding
/// leaves `pick` past the last sum, the last staked validator wins.
pub fn select_weighted(snapshot: &[(AccountId, Amount)], pick: f64) -> Option<AccountId> {
    let mut cumulative: u128 = 0;
    let mut last_staked = None;

    for (validator, stake) in snapshot {
        if *stake == 0 {
            continue;
        }
        cumulative += u128::from(*stake);
        last_staked = Some(validator);

        #[allow(clippy::cast_precision_loss)]
        let reached = cumulative as f64 >= pick;
        if reached {
            return Some(validator.clone());
        }
    }

    last_staked.cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(entries: &[(&str, Amount)]) -> StakeBook {
        let mut stakes = StakeBook::new();
        for (validator, amount) in entries {
            stakes.add_stake(validator, *amount).unwrap();
        }
        stakes
    }

    #[test]
    fn test_add_stake_accumulates() {
        let mut stakes = book(&[("V1", 100)]);
        stakes.add_stake("V1", 25).unwrap();
        assert_eq!(stakes.stake_of("V1"), 125);
        assert_eq!(stakes.validator_count(), 1);
    }

    #[test]
    fn test_snapshot_keeps_insertion_order() {
        let stakes = book(&[("Zed", 1), ("Amy", 2), ("Max", 3)]);
        let names: Vec<_> = stakes.snapshot().into_iter().map(|(v, _)| v).collect();
        assert_eq!(names, vec!["Zed", "Amy", "Max"]);
    }

    #[test]
    fn test_delegation_adds_weight() {
        let mut stakes = book(&[("V", 50)]);
        stakes.delegate("U", "V", 20).unwrap();

        assert_eq!(stakes.stake_of("V"), 70);
        assert_eq!(stakes.delegations().delegated("U", "V"), 20);
        assert_eq!(stakes.delegations().total_contributed("U"), 20);
        assert_eq!(stakes.delegations().total_delegated_to("V"), 20);
    }

    #[test]
    fn test_delegation_registers_new_validator() {
        let mut stakes = StakeBook::new();
        stakes.delegate("U", "V", 5).unwrap();
        stakes.delegate("U", "W", 7).unwrap();

        assert_eq!(stakes.stake_of("V"), 5);
        let mine = stakes.delegations().delegations_of("U");
        assert_eq!(mine.get("W"), Some(&7));
        assert_eq!(stakes.delegations().total_contributed("U"), 12);
    }

    #[test]
    fn test_overflowing_delegation_changes_nothing() {
        let mut stakes = book(&[("V", Amount::MAX)]);
        assert!(stakes.delegate("U", "V", 1).is_err());
        assert_eq!(stakes.delegations().delegated("U", "V"), 0);
        assert_eq!(stakes.stake_of("V"), Amount::MAX);
    }

    #[test]
    fn test_weighted_pick_boundaries() {
        let stakes = book(&[("A", 100), ("B", 50)]);
        let snapshot = stakes.snapshot();
        assert_eq!(select_weighted(&snapshot, 0.0).as_deref(), Some("A"));
        assert_eq!(select_weighted(&snapshot, 100.0).as_deref(), Some("A"));
        assert_eq!(select_weighted(&snapshot, 100.5).as_deref(), Some("B"));
        assert_eq!(select_weighted(&snapshot, 150.0).as_deref(), Some("B"));
        assert_eq!(select_weighted(&snapshot, 150.0001).as_deref(), Some("B"));
    }

    #[test]
    fn test_zero_stake_never_selected() {
        let stakes = book(&[("Idle", 0), ("A", 10), ("Tail", 0)]);
        let snapshot = stakes.snapshot();
        assert_eq!(select_weighted(&snapshot, 0.0).as_deref(), Some("A"));
        assert_eq!(select_weighted(&snapshot, 10.0).as_deref(), Some("A"));
    }

    #[test]
    fn test_no_stake_no_validator() {
        let mut selector = ValidatorSelector::new(ThreadRandom);
        assert_eq!(selector.select(&StakeBook::new()), None);
        assert_eq!(selector.select(&book(&[("A", 0), ("B", 0)])), None);
    }

    #[test]
    fn test_scripted_selection() {
        let stakes = book(&[("A", 100), ("B", 50)]);
        let mut selector = ValidatorSelector::new(ScriptedRandom::new(vec![0.0, 150.0]));
        assert_eq!(selector.select(&stakes).as_deref(), Some("A"));
        assert_eq!(selector.select(&stakes).as_deref(), Some("B"));
    }

    #[test]
    fn test_seeded_selection_is_reproducible() {
        let stakes = book(&[("A", 100), ("B", 50), ("C", 25)]);
        let mut first = ValidatorSelector::new(SeededRandom::new(7));
        let mut second = ValidatorSelector::new(SeededRandom::new(7));
        for _ in 0..20 {
            assert_eq!(first.select(&stakes), second.select(&stakes));
        }
    }

    #[test]
    fn test_selection_roughly_follows_stake() {
        let stakes = book(&[("A", 300), ("B", 100)]);
        let mut selector = ValidatorSelector::new(SeededRandom::new(42));
        let a_wins = (0..4000)
            .filter(|_| selector.select(&stakes).as_deref() == Some("A"))
            .count();
        // expected 3000
        assert!((2700..3300).contains(&a_wins), "A won {} times", a_wins);
    }
}
