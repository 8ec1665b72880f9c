//! Stakechain node - drives the proof-of-stake ledger from the command line

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use stakechain_consensus::{Amount, Block, ConsensusConfig, ConsensusEngine, SharedEngine, Transaction};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "stakechain-node")]
#[command(about = "Proof-of-stake ledger node")]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Where to write the configuration
        #[arg(long, default_value = "stakechain.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Run the reference scenario and print the resulting chain
    Demo {
        /// Seed for validator selection
        #[arg(long)]
        seed: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Produce blocks periodically until Ctrl+C
    Run {
        /// Validator stake as NAME=AMOUNT (repeatable)
        #[arg(long = "stake", value_parser = parse_stake)]
        stakes: Vec<(String, Amount)>,

        /// Transfer to submit at startup as FROM:TO:AMOUNT (repeatable)
        #[arg(long = "transfer", value_parser = parse_transfer)]
        transfers: Vec<(String, String, Amount)>,

        /// Override the configured block interval (seconds)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Show the effective configuration
    Status,
}

#[derive(Serialize)]
struct BlockSummary {
    index: u64,
    hash: String,
    previous_hash: String,
    merkle_root: String,
    validator: String,
    transactions: usize,
    time: String,
}

#[derive(Serialize)]
struct ChainReport {
    blocks: Vec<BlockSummary>,
    balances: BTreeMap<String, Amount>,
    rewards: BTreeMap<String, Amount>,
    stakes: Vec<(String, Amount)>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("stakechain_consensus={},stakechain_node={}", log_level, log_level))
        .init();

    match cli.command {
        Commands::Init { path, force } => init_config(path, force),
        Commands::Demo { seed, json } => {
            let config = load_config(cli.config)?;
            run_demo(config, seed, json)
        }
        Commands::Run { stakes, transfers, interval } => {
            let config = load_config(cli.config)?;
            run_node(config, stakes, transfers, interval).await
        }
        Commands::Status => {
            let config = load_config(cli.config)?;
            println!("{}", toml::to_string_pretty(&config).context("Failed to render configuration")?);
            Ok(())
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<ConsensusConfig> {
    let config = match path {
        Some(path) => ConsensusConfig::load_from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ConsensusConfig::load_default().context("Failed to load default configuration")?,
    };
    Ok(config)
}

fn init_config(path: PathBuf, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    ConsensusConfig::default()
        .save_to_file(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Configuration written to {}", path.display());
    Ok(())
}

fn run_demo(mut config: ConsensusConfig, seed: Option<u64>, json: bool) -> Result<()> {
    if seed.is_some() {
        config.rng_seed = seed;
    }
    let mut engine = ConsensusEngine::new(config)?;

    engine.stake("V1", 100)?;
    engine.stake("V2", 50)?;
    engine.delegate("User1", "V1", 20)?;

    engine.submit_transaction(Transaction::new("Maria", "Ivan", 10)?);
    match engine.produce_block() {
        Ok(hash) => info!(%hash, "Demo block committed"),
        Err(e) => warn!(reason = e.reason(), "Demo block rejected"),
    }

    // an account that was never funded
    engine.submit_transaction(Transaction::new("Alice", "Bob", 50)?);
    match engine.produce_block() {
        Ok(hash) => info!(%hash, "Demo block committed"),
        Err(e) => warn!(reason = e.reason(), "Demo block rejected"),
    }

    let report = ChainReport {
        blocks: engine.chain().blocks().iter().map(summarize).collect(),
        balances: engine.ledger().balances(),
        rewards: engine.rewards().rewards().clone(),
        stakes: engine.stakes().snapshot(),
    };
    print_report(&report, json)
}

async fn run_node(
    config: ConsensusConfig,
    stakes: Vec<(String, Amount)>,
    transfers: Vec<(String, String, Amount)>,
    interval: Option<u64>,
) -> Result<()> {
    let interval = Duration::from_secs(interval.unwrap_or(config.block_interval_secs).max(1));
    let node = SharedEngine::new(ConsensusEngine::new(config)?);

    for (validator, amount) in &stakes {
        node.stake(validator, *amount).await?;
    }
    for (from, to, amount) in transfers {
        node.submit_transaction(Transaction::new(from, to, amount)?).await;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let producer = {
        let node = node.clone();
        tokio::spawn(async move { node.run_block_producer(interval, shutdown_rx).await })
    };

    info!(validators = stakes.len(), pending = node.pending_count().await, "Node started");
    info!("Press Ctrl+C to stop");

    signal::ctrl_c().await?;
    info!("Shutting down node...");
    shutdown_tx.send(true)?;
    producer.await?;

    let blocks = node.blocks().await;
    let report = ChainReport {
        blocks: blocks.iter().map(summarize).collect(),
        balances: node.balances().await,
        rewards: node.rewards().await,
        stakes: node.stakes().await,
    };
    print_report(&report, false)
}

fn summarize(block: &Block) -> BlockSummary {
    let time = i64::try_from(block.timestamp())
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| block.timestamp().to_string());

    BlockSummary {
        index: block.index(),
        hash: block.hash().to_hex(),
        previous_hash: block.previous_hash().to_hex(),
        merkle_root: block.merkle_root().to_hex(),
        validator: block.validator().to_string(),
        transactions: block.transactions().len(),
        time,
    }
}

fn print_report(report: &ChainReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for block in &report.blocks {
        println!("Block {} [{}] by {}", block.index, block.time, block.validator);
        println!("  hash:        {}", block.hash);
        println!("  previous:    {}", block.previous_hash);
        println!("  merkle root: {}", block.merkle_root);
        println!("  txs:         {}", block.transactions);
    }
    println!("Balances:");
    for (account, balance) in &report.balances {
        println!("  {:<10} {}", account, balance);
    }
    println!("Rewards:");
    for (validator, reward) in &report.rewards {
        println!("  {:<10} {}", validator, reward);
    }
    println!("Stakes:");
    for (validator, stake) in &report.stakes {
        println!("  {:<10} {}", validator, stake);
    }
    Ok(())
}

fn parse_stake(s: &str) -> std::result::Result<(String, Amount), String> {
    let (name, amount) = s.split_once('=').ok_or_else(|| format!("expected NAME=AMOUNT, got '{}'", s))?;
    let amount = amount.parse().map_err(|e| format!("invalid amount '{}': {}", amount, e))?;
    Ok((name.to_string(), amount))
}

fn parse_transfer(s: &str) -> std::result::Result<(String, String, Amount), String> {
    let parts: Vec<&str> = s.split(':').collect();
    match parts.as_slice() {
        [from, to, amount] => {
            let amount = amount.parse().map_err(|e| format!("invalid amount '{}': {}", amount, e))?;
            Ok((from.to_string(), to.to_string(), amount))
        }
        _ => Err(format!("expected FROM:TO:AMOUNT, got '{}'", s)),
    }
}
