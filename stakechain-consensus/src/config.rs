//! Configuration for the consensus engine

use crate::{constants, AccountId, Amount, ConsensusError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which validity gate the engine runs before applying a batch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Accept every batch; the ledger still refuses overdrafts
    #[default]
    Permissive,
    /// Check content hashes and balances before applying
    Strict,
}

/// Initial account allocation committed in the genesis block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Allocation {
    pub account: AccountId,
    pub amount: Amount,
}

/// Genesis block configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GenesisConfig {
    /// Genesis timestamp; fixed so every node derives the same genesis hash
    pub timestamp: u64,
    /// Validator name recorded on block 0
    pub validator: AccountId,
    /// Balance credited to the system account before block 0
    pub system_supply: Amount,
    pub allocations: Vec<Allocation>,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            timestamp: 0,
            validator: constants::GENESIS_VALIDATOR.to_string(),
            system_supply: 10_000,
            allocations: vec![
                Allocation { account: "Maria".to_string(), amount: 1_000 },
                Allocation { account: "Ivan".to_string(), amount: 1_000 },
            ],
        }
    }
}

/// Consensus engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Reward credited to the producer of each block
    pub block_reward: Amount,

    /// Minting account: credited freely, never debited
    pub system_account: AccountId,

    /// Validity gate run before the ledger is touched
    pub validation: ValidationMode,

    /// Pending transactions needed before the periodic producer runs a round
    pub min_transactions_to_propose: usize,

    /// Periodic producer interval (seconds)
    pub block_interval_secs: u64,

    /// Seed for validator selection; thread-local randomness when absent
    pub rng_seed: Option<u64>,

    pub genesis: GenesisConfig,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            block_reward: constants::BLOCK_REWARD,
            system_account: constants::SYSTEM_ACCOUNT.to_string(),
            validation: ValidationMode::default(),
            min_transactions_to_propose: 1,
            block_interval_secs: constants::BLOCK_TIME,
            rng_seed: None,
            genesis: GenesisConfig::default(),
        }
    }
}

impl ConsensusConfig {
    /// Load configuration from a TOML or JSON file (by extension)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConsensusError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: ConsensusConfig = if path.extension() == Some(std::ffi::OsStr::new("json")) {
            serde_json::from_str(&content)
                .map_err(|e| ConsensusError::ConfigError(format!("Failed to parse JSON config: {}", e)))?
        } else {
            toml::from_str(&content)
                .map_err(|e| ConsensusError::ConfigError(format!("Failed to parse TOML config: {}", e)))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML or JSON file (by extension)
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = if path.extension() == Some(std::ffi::OsStr::new("json")) {
            serde_json::to_string_pretty(self)
                .map_err(|e| ConsensusError::ConfigError(format!("Failed to serialize JSON: {}", e)))?
        } else {
            toml::to_string_pretty(self)
                .map_err(|e| ConsensusError::ConfigError(format!("Failed to serialize TOML: {}", e)))?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
            .map_err(|e| ConsensusError::ConfigError(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Candidate config locations, most specific first
    pub fn get_default_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("stakechain.toml")];

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".stakechain").join("config.toml"));
            paths.push(home.join(".stakechain").join("config.json"));
        }

        paths
    }

    /// Load from the first default location that exists, else defaults
    pub fn load_default() -> Result<Self> {
        for path in Self::get_default_config_paths() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }
        Ok(Self::default())
    }

    /// Check the configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.system_account.trim().is_empty() {
            return Err(ConsensusError::ConfigError("System account must not be empty".to_string()));
        }

        if self.block_interval_secs == 0 {
            return Err(ConsensusError::ConfigError("Block interval must be positive".to_string()));
        }

        let mut total: Amount = 0;
        for allocation in &self.genesis.allocations {
            if allocation.account == self.system_account {
                return Err(ConsensusError::ConfigError(
                    "Genesis allocations must not target the system account".to_string(),
                ));
            }
            if allocation.account.trim().is_empty() {
                return Err(ConsensusError::ConfigError("Allocation account must not be empty".to_string()));
            }
            total = total.checked_add(allocation.amount).ok_or_else(|| {
                ConsensusError::ConfigError("Genesis allocations overflow".to_string())
            })?;
        }

        Ok(())
    }

    /// Genesis allocations as `(account, amount)` pairs
    pub fn allocations(&self) -> Vec<(AccountId, Amount)> {
        self.genesis
            .allocations
            .iter()
            .map(|a| (a.account.clone(), a.amount))
            .collect()
    }
}
