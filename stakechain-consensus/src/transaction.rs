//! Value transfers and the pending transaction pool

use crate::{AccountId, Amount, ConsensusError, Hash256, Result};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// An immutable value transfer carrying its own content hash
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    sender: AccountId,
    receiver: AccountId,
    amount: Amount,
    /// Creation time in seconds since the Unix epoch
    timestamp: u64,
    content_hash: Hash256,
    /// Opaque signature bytes. Never verified by this crate.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "hex_opt")]
    signature: Option<Vec<u8>>,
}

/// Fields covered by the content hash (excludes hash and signature)
#[derive(Serialize)]
struct HashableTx<'a> {
    sender: &'a str,
    receiver: &'a str,
    amount: Amount,
    timestamp: u64,
}

impl Transaction {
    /// Create a new transaction stamped with the current time
    pub fn new(sender: impl Into<AccountId>, receiver: impl Into<AccountId>, amount: Amount) -> Result<Self> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| ConsensusError::InvalidTransactions { reason: format!("Time error: {}", e) })?
            .as_secs();
        Self::with_timestamp(sender, receiver, amount, timestamp)
    }

    /// Create a transaction with an explicit timestamp
    pub fn with_timestamp(
        sender: impl Into<AccountId>,
        receiver: impl Into<AccountId>,
        amount: Amount,
        timestamp: u64,
    ) -> Result<Self> {
        let sender = sender.into();
        let receiver = receiver.into();
        let content_hash = Self::compute_hash(&sender, &receiver, amount, timestamp)?;
        Ok(Self {
            sender,
            receiver,
            amount,
            timestamp,
            content_hash,
            signature: None,
        })
    }

    /// Attach signature bytes produced by an external signer
    pub fn with_signature(mut self, signature: Vec<u8>) -> Self {
        self.signature = Some(signature);
        self
    }

    fn compute_hash(sender: &str, receiver: &str, amount: Amount, timestamp: u64) -> Result<Hash256> {
        Hash256::of_json(&HashableTx {
            sender,
            receiver,
            amount,
            timestamp,
        })
    }

    /// Recompute the content hash from the stored fields
    pub fn recompute_hash(&self) -> Result<Hash256> {
        Self::compute_hash(&self.sender, &self.receiver, self.amount, self.timestamp)
    }

    /// Check that the stored content hash matches the fields
    pub fn verify_hash(&self) -> Result<bool> {
        Ok(self.recompute_hash()? == self.content_hash)
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn receiver(&self) -> &str {
        &self.receiver
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn hash(&self) -> Hash256 {
        self.content_hash
    }

    pub fn signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }
}

mod hex_opt {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| hex::decode(s).map_err(de::Error::custom))
            .transpose()
    }
}

/// Ordered pool of transactions awaiting inclusion.
///
/// No validation happens at submission; the pool is emptied only when a block
/// including its contents is committed.
#[derive(Debug, Default, Clone)]
pub struct TransactionPool {
    pending: Vec<Transaction>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transaction to the back of the pool
    pub fn add_transaction(&mut self, tx: Transaction) {
        self.pending.push(tx);
    }

    /// Pending transactions in submission order
    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every pending transaction
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
