//! Error types for the consensus system

use crate::{AccountId, Amount, BlockIndex, Hash256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("No validator available: total stake is zero")]
    NoValidatorAvailable,

    #[error("Invalid transactions: {reason}")]
    InvalidTransactions { reason: String },

    #[error("Insufficient funds for {account}: need {needed}, have {available}")]
    InsufficientFunds {
        account: AccountId,
        needed: Amount,
        available: Amount,
    },

    #[error("Amount overflow for {account}")]
    AmountOverflow { account: AccountId },

    #[error("Linkage error: expected {expected}, got {got}")]
    Linkage { expected: String, got: String },

    #[error("Integrity error at block {index}: {reason}")]
    Integrity { index: BlockIndex, reason: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ConsensusError {
    /// Build a linkage error from two mismatched hashes
    pub fn hash_linkage(expected: &Hash256, got: &Hash256) -> Self {
        ConsensusError::Linkage {
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }

    /// Stable failure name reported by a block-production round
    pub fn reason(&self) -> &'static str {
        match self {
            ConsensusError::NoValidatorAvailable => "No validator available",
            ConsensusError::InvalidTransactions { .. } => "Invalid transactions",
            ConsensusError::InsufficientFunds { .. } => "Insufficient funds",
            ConsensusError::AmountOverflow { .. } => "Amount overflow",
            ConsensusError::Linkage { .. } => "Linkage error",
            ConsensusError::Integrity { .. } => "Integrity error",
            ConsensusError::SerializationError(_) => "Serialization error",
            ConsensusError::ConfigError(_) => "Configuration error",
            ConsensusError::IoError(_) => "I/O error",
        }
    }
}

impl From<serde_json::Error> for ConsensusError {
    fn from(e: serde_json::Error) -> Self {
        ConsensusError::SerializationError(e.to_string())
    }
}
