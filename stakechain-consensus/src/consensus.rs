//! Consensus engine for the stakechain ledger
//!
//! One call to [`ConsensusEngine::produce_block`] runs a full production
//! round: select a validator by stake, gate the pending batch, apply it to the
//! ledger, build and append the block, pay the producer and clear the pool.
//! A round that fails at any gate leaves every piece of state unchanged.

use crate::config::{ConsensusConfig, ValidationMode};
use crate::validation::{AcceptAll, StrictValidator, TransactionValidator, Verdict};
use crate::validator::{RandomSource, SeededRandom, StakeBook, ThreadRandom, ValidatorSelector};
use crate::{AccountId, Amount, Block, BlockIndex, Chain, ConsensusError, Hash256, Ledger, Result, Transaction, TransactionPool};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Accumulated block rewards per validator
#[derive(Debug, Clone, Default)]
pub struct RewardBook {
    rewards: BTreeMap<AccountId, Amount>,
}

impl RewardBook {
    pub fn reward_of(&self, validator: &str) -> Amount {
        self.rewards.get(validator).copied().unwrap_or(0)
    }

    /// Reward total after crediting `amount`, without recording it
    fn credited(&self, validator: &str, amount: Amount) -> Result<Amount> {
        self.reward_of(validator)
            .checked_add(amount)
            .ok_or_else(|| ConsensusError::AmountOverflow { account: validator.to_string() })
    }

    pub fn rewards(&self) -> &BTreeMap<AccountId, Amount> {
        &self.rewards
    }
}

/// Where the most recent production round ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundState {
    /// No round has run yet
    Idle,
    /// A validator won the lottery
    ValidatorSelected { validator: AccountId },
    /// The pending batch passed the validity gate
    TransactionsValidated { validator: AccountId },
    /// The block was appended and the reward paid
    Committed { index: BlockIndex, hash: Hash256 },
    /// The round stopped at a gate; nothing changed
    Rejected { reason: String },
}

/// The main consensus engine. Owns the chain, ledger, stake book, reward
/// book and pending pool.
pub struct ConsensusEngine {
    /// Current state of the last round
    state: RoundState,

    chain: Chain,
    ledger: Ledger,
    stakes: StakeBook,
    rewards: RewardBook,
    transaction_pool: TransactionPool,

    selector: ValidatorSelector,
    validator: Box<dyn TransactionValidator + Send + Sync>,

    /// Configuration
    config: ConsensusConfig,
}

impl std::fmt::Debug for ConsensusEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsensusEngine")
            .field("state", &self.state)
            .field("height", &self.chain.len())
            .field("pending", &self.transaction_pool.pending_count())
            .finish()
    }
}

impl ConsensusEngine {
    /// Create an engine from configuration: builds the genesis block, seeds
    /// the ledger and picks the validity gate and randomness source.
    pub fn new(config: ConsensusConfig) -> Result<Self> {
        config.validate()?;

        let validator: Box<dyn TransactionValidator + Send + Sync> = match config.validation {
            ValidationMode::Permissive => Box::new(AcceptAll),
            ValidationMode::Strict => Box::new(StrictValidator),
        };
        let selector = match config.rng_seed {
            Some(seed) => ValidatorSelector::new(SeededRandom::new(seed)),
            None => ValidatorSelector::new(ThreadRandom),
        };

        Self::with_parts(config, selector, validator)
    }

    /// Create an engine with an explicit randomness source
    pub fn with_random_source(config: ConsensusConfig, source: impl RandomSource + Send + Sync + 'static) -> Result<Self> {
        let mut engine = Self::new(config)?;
        engine.selector = ValidatorSelector::new(source);
        Ok(engine)
    }

    fn with_parts(
        config: ConsensusConfig,
        selector: ValidatorSelector,
        validator: Box<dyn TransactionValidator + Send + Sync>,
    ) -> Result<Self> {
        let genesis = Block::genesis(
            &config.allocations(),
            &config.system_account,
            &config.genesis.validator,
            config.genesis.timestamp,
        )?;

        let mut ledger = Ledger::new(config.system_account.clone());
        ledger.mint(&config.system_account, config.genesis.system_supply)?;
        ledger.apply(genesis.transactions())?;

        let chain = Chain::new(genesis)?;
        info!(hash = %chain.genesis().hash(), allocations = config.genesis.allocations.len(), "Genesis block created");

        Ok(Self {
            state: RoundState::Idle,
            chain,
            ledger,
            stakes: StakeBook::new(),
            rewards: RewardBook::default(),
            transaction_pool: TransactionPool::new(),
            selector,
            validator,
            config,
        })
    }

    /// Replace the validity gate
    pub fn set_validator(&mut self, validator: impl TransactionValidator + Send + Sync + 'static) {
        self.validator = Box::new(validator);
    }

    /// Add a transaction to the pool. No validation happens here.
    pub fn submit_transaction(&mut self, transaction: Transaction) {
        debug!(tx = %transaction.hash(), "Transaction submitted");
        self.transaction_pool.add_transaction(transaction);
    }

    /// Add self-stake to a validator
    pub fn stake(&mut self, validator: &str, amount: Amount) -> Result<()> {
        self.stakes.add_stake(validator, amount)
    }

    /// Delegate stake from `delegator` to `validator`
    pub fn delegate(&mut self, delegator: &str, validator: &str, amount: Amount) -> Result<()> {
        self.stakes.delegate(delegator, validator, amount)
    }

    /// Run one block-production round and return the new block's hash.
    ///
    /// On error the chain, ledger, stake book, rewards and pool are exactly
    /// as they were before the call.
    pub fn produce_block(&mut self) -> Result<Hash256> {
        match self.run_round() {
            Ok(hash) => Ok(hash),
            Err(e) => {
                warn!(reason = e.reason(), error = %e, "Block production rejected");
                self.state = RoundState::Rejected { reason: e.to_string() };
                Err(e)
            }
        }
    }

    /// Like [`produce_block`](Self::produce_block) but reports failure as
    /// its named reason
    pub fn produce_block_report(&mut self) -> std::result::Result<Hash256, String> {
        self.produce_block().map_err(|e| e.reason().to_string())
    }

    fn run_round(&mut self) -> Result<Hash256> {
        let validator = self
            .selector
            .select(&self.stakes)
            .ok_or(ConsensusError::NoValidatorAvailable)?;
        info!(validator = %validator, "Validator selected");
        self.state = RoundState::ValidatorSelected { validator: validator.clone() };

        let transactions = self.transaction_pool.pending().to_vec();
        if let Verdict::Reject(reason) = self.validator.validate(&transactions, &self.ledger) {
            return Err(ConsensusError::InvalidTransactions { reason });
        }
        self.state = RoundState::TransactionsValidated { validator: validator.clone() };

        // everything fallible happens before the first mutation
        let staged = self.ledger.stage(&transactions)?;
        let reward = self.rewards.credited(&validator, self.config.block_reward)?;

        let tip = self.chain.tip();
        let block = Block::new(tip.index() + 1, tip.hash(), transactions, validator.clone())?;
        let index = block.index();
        let hash = block.hash();
        let tx_count = block.transactions().len();

        self.chain.append(block)?;
        self.ledger.commit(staged);
        self.rewards.rewards.insert(validator.clone(), reward);
        self.transaction_pool.clear();

        info!(index, hash = %hash, validator = %validator, transactions = tx_count, reward, "Block committed");
        self.state = RoundState::Committed { index, hash };
        Ok(hash)
    }

    /// Get the state of the last round
    pub fn state(&self) -> &RoundState {
        &self.state
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn stakes(&self) -> &StakeBook {
        &self.stakes
    }

    pub fn rewards(&self) -> &RewardBook {
        &self.rewards
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    pub fn pending_count(&self) -> usize {
        self.transaction_pool.pending_count()
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        self.transaction_pool.pending()
    }

    /// Whether the periodic producer should run a round now
    pub fn should_propose_block(&self) -> bool {
        self.transaction_pool.pending_count() >= self.config.min_transactions_to_propose
    }

    /// Current chain length (genesis included)
    pub fn height(&self) -> usize {
        self.chain.len()
    }
}
