//! Shared, task-safe handle around the consensus engine
//!
//! Every mutation takes the write lock, so block production and transaction
//! submission are serialized the same way as in a single-threaded driver.

use crate::{
    AccountId, Amount, Block, ConsensusEngine, Hash256, Result, RoundState, Transaction,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Cloneable handle to an engine shared between tasks
#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<RwLock<ConsensusEngine>>,
}

impl SharedEngine {
    pub fn new(engine: ConsensusEngine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    pub async fn submit_transaction(&self, transaction: Transaction) {
        self.inner.write().await.submit_transaction(transaction);
    }

    pub async fn stake(&self, validator: &str, amount: Amount) -> Result<()> {
        self.inner.write().await.stake(validator, amount)
    }

    pub async fn delegate(&self, delegator: &str, validator: &str, amount: Amount) -> Result<()> {
        self.inner.write().await.delegate(delegator, validator, amount)
    }

    pub async fn produce_block(&self) -> Result<Hash256> {
        self.inner.write().await.produce_block()
    }

    pub async fn height(&self) -> usize {
        self.inner.read().await.height()
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.read().await.pending_count()
    }

    pub async fn state(&self) -> RoundState {
        self.inner.read().await.state().clone()
    }

    pub async fn balances(&self) -> BTreeMap<AccountId, Amount> {
        self.inner.read().await.ledger().balances()
    }

    pub async fn rewards(&self) -> BTreeMap<AccountId, Amount> {
        self.inner.read().await.rewards().rewards().clone()
    }

    pub async fn stakes(&self) -> Vec<(AccountId, Amount)> {
        self.inner.read().await.stakes().snapshot()
    }

    /// Copy of every block on the chain
    pub async fn blocks(&self) -> Vec<Block> {
        self.inner.read().await.chain().blocks().to_vec()
    }

    pub async fn verify_chain(&self) -> Result<()> {
        self.inner.read().await.chain().verify()
    }

    /// Run a production round every `interval` while enough transactions
    /// are pending. Returns once `shutdown` flips to `true` or its sender
    /// is dropped.
    pub async fn run_block_producer(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        info!(interval_secs = interval.as_secs(), "Block producer started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let mut engine = self.inner.write().await;
                    if !engine.should_propose_block() {
                        debug!(pending = engine.pending_count(), "Not enough pending transactions");
                        continue;
                    }
                    if let Err(e) = engine.produce_block() {
                        warn!(reason = e.reason(), "Round failed, transactions stay pending");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Block producer stopped");
    }
}
