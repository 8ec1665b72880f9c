//! Pluggable validity gate for pending transaction batches
//!
//! The consensus engine consults a [`TransactionValidator`] before touching
//! the ledger. Signature checks belong here once a signing scheme exists;
//! none of the validators below verify signatures.

use crate::{Ledger, Transaction};
use tracing::warn;

/// Outcome of validating a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(String),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}

/// Decides whether a pending batch may enter a block
pub trait TransactionValidator {
    fn validate(&self, transactions: &[Transaction], ledger: &Ledger) -> Verdict;
}

/// Accepts every batch. Balance problems still surface when the batch is
/// applied to the ledger.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl TransactionValidator for AcceptAll {
    fn validate(&self, _transactions: &[Transaction], _ledger: &Ledger) -> Verdict {
        Verdict::Accept
    }
}

/// Rejects batches with corrupted content hashes or that the ledger could
/// not fund.
#[derive(Debug, Default, Clone, Copy)]
pub struct StrictValidator;

impl TransactionValidator for StrictValidator {
    fn validate(&self, transactions: &[Transaction], ledger: &Ledger) -> Verdict {
        for (position, tx) in transactions.iter().enumerate() {
            match tx.verify_hash() {
                Ok(true) => {}
                Ok(false) => {
                    return Verdict::Reject(format!("transaction {} content hash mismatch", position));
                }
                Err(e) => return Verdict::Reject(format!("transaction {}: {}", position, e)),
            }
        }

        if let Err(e) = ledger.stage(transactions) {
            warn!(error = %e, "Pending batch cannot be funded");
            return Verdict::Reject(e.to_string());
        }

        Verdict::Accept
    }
}

impl<F> TransactionValidator for F
where
    F: Fn(&[Transaction], &Ledger) -> Verdict,
{
    fn validate(&self, transactions: &[Transaction], ledger: &Ledger) -> Verdict {
        self(transactions, ledger)
    }
}
