//! Blockchain data structures: blocks and the hash-linked chain

use crate::merkle::merkle_root;
use crate::{AccountId, Amount, BlockIndex, ConsensusError, Hash256, Result, Transaction};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Block header: every field covered by the block hash
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockHeader {
    /// Block index (0 for genesis block)
    pub index: BlockIndex,

    /// Hash of previous block
    pub previous_hash: Hash256,

    /// Merkle root of transactions in this block
    pub merkle_root: Hash256,

    /// Block timestamp (seconds since the Unix epoch)
    pub timestamp: u64,

    /// Validator who produced this block
    pub validator: AccountId,
}

/// A block in the chain. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    header: BlockHeader,
    transactions: Vec<Transaction>,
    hash: Hash256,
}

impl Block {
    /// Create a new block stamped with the current wall-clock time
    pub fn new(
        index: BlockIndex,
        previous_hash: Hash256,
        transactions: Vec<Transaction>,
        validator: impl Into<AccountId>,
    ) -> Result<Self> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| ConsensusError::Integrity { index, reason: format!("Time error: {}", e) })?
            .as_secs();
        Self::with_timestamp(index, previous_hash, transactions, validator, timestamp)
    }

    /// Create a block with an explicit timestamp. Deterministic in its inputs.
    pub fn with_timestamp(
        index: BlockIndex,
        previous_hash: Hash256,
        transactions: Vec<Transaction>,
        validator: impl Into<AccountId>,
        timestamp: u64,
    ) -> Result<Self> {
        let header = BlockHeader {
            index,
            previous_hash,
            merkle_root: merkle_root(&transactions),
            timestamp,
            validator: validator.into(),
        };
        let hash = Self::hash_header(&header)?;

        Ok(Block {
            header,
            transactions,
            hash,
        })
    }

    /// Create the genesis block.
    ///
    /// Every allocation becomes a transfer from `system_account`, so the
    /// initial balances are committed in block 0 like any other transfer.
    pub fn genesis(
        allocations: &[(AccountId, Amount)],
        system_account: &str,
        validator: &str,
        timestamp: u64,
    ) -> Result<Self> {
        let genesis_transactions = allocations
            .iter()
            .map(|(account, amount)| {
                Transaction::with_timestamp(system_account, account.clone(), *amount, timestamp)
            })
            .collect::<Result<Vec<_>>>()?;

        Self::with_timestamp(0, Hash256::ZERO, genesis_transactions, validator, timestamp)
    }

    fn hash_header(header: &BlockHeader) -> Result<Hash256> {
        Hash256::of_json(header)
    }

    /// Recompute the block hash from the header
    pub fn compute_hash(&self) -> Result<Hash256> {
        Self::hash_header(&self.header)
    }

    /// Check that the stored hash, Merkle root and transaction hashes all
    /// match their recomputed values
    pub fn verify(&self) -> Result<()> {
        let index = self.header.index;

        for (position, tx) in self.transactions.iter().enumerate() {
            if !tx.verify_hash()? {
                return Err(ConsensusError::Integrity {
                    index,
                    reason: format!("transaction {} content hash mismatch", position),
                });
            }
        }

        let calculated_root = merkle_root(&self.transactions);
        if calculated_root != self.header.merkle_root {
            return Err(ConsensusError::Integrity {
                index,
                reason: format!(
                    "merkle root mismatch: stored {}, computed {}",
                    self.header.merkle_root, calculated_root
                ),
            });
        }

        let calculated_hash = self.compute_hash()?;
        if calculated_hash != self.hash {
            return Err(ConsensusError::Integrity {
                index,
                reason: format!("block hash mismatch: stored {}, computed {}", self.hash, calculated_hash),
            });
        }

        Ok(())
    }

    /// Whether a transaction with this content hash is committed in the block
    pub fn contains_transaction(&self, tx_hash: &Hash256) -> bool {
        self.transactions.iter().any(|tx| tx.hash() == *tx_hash)
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn hash(&self) -> Hash256 {
        self.hash
    }

    pub fn index(&self) -> BlockIndex {
        self.header.index
    }

    pub fn previous_hash(&self) -> Hash256 {
        self.header.previous_hash
    }

    pub fn merkle_root(&self) -> Hash256 {
        self.header.merkle_root
    }

    pub fn timestamp(&self) -> u64 {
        self.header.timestamp
    }

    pub fn validator(&self) -> &str {
        &self.header.validator
    }
}

/// Append-only, hash-linked sequence of blocks seeded with a genesis block
#[derive(Debug, Clone)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    /// Create a chain from its genesis block
    pub fn new(genesis: Block) -> Result<Self> {
        if genesis.index() != 0 {
            return Err(ConsensusError::Linkage {
                expected: "index 0".to_string(),
                got: format!("index {}", genesis.index()),
            });
        }
        if !genesis.previous_hash().is_zero() {
            return Err(ConsensusError::hash_linkage(&Hash256::ZERO, &genesis.previous_hash()));
        }
        genesis.verify()?;

        Ok(Chain { blocks: vec![genesis] })
    }

    /// Append a block whose previous hash is the current tip hash.
    ///
    /// On error the chain is left untouched.
    pub fn append(&mut self, block: Block) -> Result<()> {
        let tip = self.tip();
        if block.previous_hash() != tip.hash() {
            return Err(ConsensusError::hash_linkage(&tip.hash(), &block.previous_hash()));
        }

        let expected_index = tip.index() + 1;
        if block.index() != expected_index {
            return Err(ConsensusError::Linkage {
                expected: format!("index {}", expected_index),
                got: format!("index {}", block.index()),
            });
        }

        block.verify()?;

        debug!(index = block.index(), hash = %block.hash(), "Appending block");
        self.blocks.push(block);
        Ok(())
    }

    /// The most recently appended block
    pub fn tip(&self) -> &Block {
        // never empty: `new` always stores the genesis block
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn genesis(&self) -> &Block {
        &self.blocks[0]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, index: BlockIndex) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Walk the whole chain, re-checking every hash and every link
    pub fn verify(&self) -> Result<()> {
        let genesis = self.genesis();
        if !genesis.previous_hash().is_zero() {
            return Err(ConsensusError::hash_linkage(&Hash256::ZERO, &genesis.previous_hash()));
        }

        for (position, block) in self.blocks.iter().enumerate() {
            block.verify()?;
            if block.index() != position as BlockIndex {
                return Err(ConsensusError::Linkage {
                    expected: format!("index {}", position),
                    got: format!("index {}", block.index()),
                });
            }
        }

        for pair in self.blocks.windows(2) {
            if pair[1].previous_hash() != pair[0].hash() {
                return Err(ConsensusError::hash_linkage(&pair[0].hash(), &pair[1].previous_hash()));
            }
        }

        Ok(())
    }
}
