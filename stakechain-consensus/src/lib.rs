//! Stakechain Consensus Layer - Minimal proof-of-stake ledger
//!
//! This crate maintains an append-only chain of blocks, each committing a batch
//! of transactions through a Merkle root, and picks the producer of every new
//! block with a stake-weighted lottery over the validator stake book.

pub mod hash;
pub mod transaction;
pub mod merkle;
pub mod chain;
pub mod ledger;
pub mod validator;
pub mod validation;
pub mod consensus;
pub mod config;
pub mod node;
pub mod error;

pub use hash::Hash256;
pub use transaction::{Transaction, TransactionPool};
pub use chain::{Block, BlockHeader, Chain};
pub use ledger::Ledger;
pub use validator::{Delegations, RandomSource, SeededRandom, StakeBook, ThreadRandom, ValidatorSelector};
pub use validation::{AcceptAll, StrictValidator, TransactionValidator, Verdict};
pub use consensus::{ConsensusEngine, RewardBook, RoundState};
pub use config::{Allocation, ConsensusConfig, GenesisConfig, ValidationMode};
pub use node::SharedEngine;
pub use error::ConsensusError;

/// Result type for consensus operations
pub type Result<T> = std::result::Result<T, ConsensusError>;

/// Account identifier (plain account name)
pub type AccountId = String;

/// Token amount; non-negative by construction
pub type Amount = u64;

/// Position of a block in the chain
pub type BlockIndex = u64;

/// Network configuration constants
pub mod constants {
    use super::Amount;

    /// Reward credited to the producer of every accepted block
    pub const BLOCK_REWARD: Amount = 10;

    /// Account allowed to mint: credited freely, never debited
    pub const SYSTEM_ACCOUNT: &str = "System";

    /// Validator name recorded on the genesis block
    pub const GENESIS_VALIDATOR: &str = "Genesis";

    /// Block time target (in seconds)
    pub const BLOCK_TIME: u64 = 30;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_reward_constant() {
        assert_eq!(constants::BLOCK_REWARD, 10);
    }

    #[test]
    fn test_system_account_differs_from_genesis_validator() {
        assert_ne!(constants::SYSTEM_ACCOUNT, constants::GENESIS_VALIDATOR);
    }
}
