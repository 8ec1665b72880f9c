//! Account balances, mutated only by applying transaction batches

use crate::{AccountId, Amount, ConsensusError, Result, Transaction};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Mapping from account to balance.
///
/// Batches are applied all-or-nothing: transactions run in order against a
/// staged copy of the balances, and the copy replaces the live map only when
/// every transaction in the batch succeeded.
#[derive(Debug, Clone)]
pub struct Ledger {
    balances: HashMap<AccountId, Amount>,
    system_account: AccountId,
}

/// Balances after a batch has been checked but before it is committed
#[derive(Debug)]
#[must_use = "a staged batch does nothing until committed"]
pub struct StagedBalances {
    balances: HashMap<AccountId, Amount>,
    applied: usize,
}

impl StagedBalances {
    /// Number of transactions folded into this stage
    pub fn applied(&self) -> usize {
        self.applied
    }
}

impl Ledger {
    /// Create an empty ledger. `system_account` may mint: it is credited
    /// like any account but never debited.
    pub fn new(system_account: impl Into<AccountId>) -> Self {
        Self {
            balances: HashMap::new(),
            system_account: system_account.into(),
        }
    }

    pub fn system_account(&self) -> &str {
        &self.system_account
    }

    /// Account balance (0 for unknown accounts)
    pub fn balance(&self, account: &str) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Sorted read-only copy of every balance
    pub fn balances(&self) -> BTreeMap<AccountId, Amount> {
        self.balances.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    /// Credit an account outside of any transaction (initial supply)
    pub fn mint(&mut self, account: &str, amount: Amount) -> Result<()> {
        credit(&mut self.balances, account, amount)
    }

    /// Run `transactions` against a copy of the balances.
    ///
    /// For each transaction in order the receiver is credited, then the
    /// sender is debited unless it is the system account. The first debit
    /// that would go below zero fails the whole batch.
    pub fn stage(&self, transactions: &[Transaction]) -> Result<StagedBalances> {
        let mut staged = self.balances.clone();

        for tx in transactions {
            credit(&mut staged, tx.receiver(), tx.amount())?;

            if tx.sender() != self.system_account {
                let available = staged.get(tx.sender()).copied().unwrap_or(0);
                let remaining = available.checked_sub(tx.amount()).ok_or_else(|| {
                    ConsensusError::InsufficientFunds {
                        account: tx.sender().to_string(),
                        needed: tx.amount(),
                        available,
                    }
                })?;
                staged.insert(tx.sender().to_string(), remaining);
            }
        }

        Ok(StagedBalances {
            balances: staged,
            applied: transactions.len(),
        })
    }

    /// Replace the live balances with a staged batch
    pub fn commit(&mut self, staged: StagedBalances) {
        debug!(transactions = staged.applied, "Committing staged balances");
        self.balances = staged.balances;
    }

    /// Stage and commit in one step. On error no balance changes.
    pub fn apply(&mut self, transactions: &[Transaction]) -> Result<()> {
        let staged = self.stage(transactions)?;
        self.commit(staged);
        Ok(())
    }
}

fn credit(balances: &mut HashMap<AccountId, Amount>, account: &str, amount: Amount) -> Result<()> {
    let current = balances.get(account).copied().unwrap_or(0);
    let updated = current
        .checked_add(amount)
        .ok_or_else(|| ConsensusError::AmountOverflow { account: account.to_string() })?;
    balances.insert(account.to_string(), updated);
    Ok(())
}
