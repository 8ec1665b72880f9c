//! End-to-end tests for the stakechain ledger

use proptest::prelude::*;
use stakechain_consensus::merkle::{merkle_root, merkle_root_of};
use stakechain_consensus::validator::{select_weighted, ScriptedRandom};
use stakechain_consensus::*;

use std::time::Duration;
use tokio::sync::watch;

fn tx(from: &str, to: &str, amount: Amount) -> Transaction {
    Transaction::with_timestamp(from, to, amount, 1_700_000_000).unwrap()
}

fn seeded_config(seed: u64) -> ConsensusConfig {
    ConsensusConfig {
        rng_seed: Some(seed),
        ..Default::default()
    }
}

#[test]
fn test_complete_round_flow() {
    let mut engine = ConsensusEngine::new(seeded_config(42)).unwrap();
    engine.stake("V1", 100).unwrap();
    engine.stake("V2", 50).unwrap();
    engine.delegate("User1", "V1", 20).unwrap();
    assert_eq!(engine.stakes().stake_of("V1"), 120);

    engine.submit_transaction(tx("Maria", "Ivan", 10));
    let hash = engine.produce_block().unwrap();

    let tip = engine.chain().tip();
    assert_eq!(tip.hash(), hash);
    assert_eq!(tip.index(), 1);
    assert_eq!(tip.previous_hash(), engine.chain().genesis().hash());
    assert_eq!(tip.merkle_root(), merkle_root(tip.transactions()));
    assert!(["V1", "V2"].contains(&tip.validator()));
    assert_eq!(engine.rewards().reward_of(tip.validator()), 10);

    assert_eq!(engine.ledger().balance("Maria"), 990);
    assert_eq!(engine.ledger().balance("Ivan"), 1_010);
    assert_eq!(engine.pending_count(), 0);
    assert!(engine.chain().verify().is_ok());
}

#[test]
fn test_unfunded_sender_keeps_chain_at_genesis() {
    let mut engine = ConsensusEngine::new(ConsensusConfig::default()).unwrap();
    engine.stake("V1", 100).unwrap();
    engine.stake("V2", 50).unwrap();
    engine.submit_transaction(tx("Alice", "Bob", 50));

    let result = engine.produce_block();

    assert_eq!(result.as_ref().map_err(ConsensusError::reason).err(), Some("Insufficient funds"));
    assert_eq!(engine.height(), 1);
    assert!(engine.rewards().rewards().is_empty());
    assert_eq!(engine.ledger().balance("Bob"), 0);
}

#[test]
fn test_same_seed_same_chain_of_validators() {
    let run = |seed| {
        let mut engine = ConsensusEngine::new(seeded_config(seed)).unwrap();
        engine.stake("A", 100).unwrap();
        engine.stake("B", 50).unwrap();
        engine.stake("C", 25).unwrap();
        (0..10)
            .map(|_| {
                engine.produce_block().unwrap();
                engine.chain().tip().validator().to_string()
            })
            .collect::<Vec<_>>()
    };

    assert_eq!(run(7), run(7));
}

#[test]
fn test_genesis_is_deterministic() {
    let first = ConsensusEngine::new(ConsensusConfig::default()).unwrap();
    let second = ConsensusEngine::new(ConsensusConfig::default()).unwrap();
    assert_eq!(first.chain().genesis().hash(), second.chain().genesis().hash());
    assert_eq!(first.chain().genesis().previous_hash(), Hash256::ZERO);
    assert_eq!(first.chain().genesis().transactions().len(), 2);
}

#[test]
fn test_tampered_block_rejected() {
    let engine = ConsensusEngine::new(ConsensusConfig::default()).unwrap();
    let genesis = engine.chain().genesis().clone();
    let mut chain = Chain::new(genesis.clone()).unwrap();

    let block = Block::new(1, genesis.hash(), vec![tx("Maria", "Ivan", 10)], "V1").unwrap();
    let mut json = serde_json::to_value(&block).unwrap();
    json["transactions"][0]["amount"] = serde_json::json!(10_000);
    let tampered: Block = serde_json::from_value(json).unwrap();

    assert!(matches!(chain.append(tampered), Err(ConsensusError::Integrity { .. })));
    assert!(chain.append(block).is_ok());
}

#[test]
fn test_wrong_parent_rejected() {
    let engine = ConsensusEngine::new(ConsensusConfig::default()).unwrap();
    let mut chain = Chain::new(engine.chain().genesis().clone()).unwrap();

    let orphan = Block::new(1, Hash256::digest(b"elsewhere"), Vec::new(), "V1").unwrap();
    assert!(matches!(chain.append(orphan), Err(ConsensusError::Linkage { .. })));
    assert_eq!(chain.len(), 1);
}

#[tokio::test]
async fn test_shared_engine_producer() {
    let engine = ConsensusEngine::with_random_source(ConsensusConfig::default(), ScriptedRandom::new(vec![0.0]))
        .unwrap();
    let node = SharedEngine::new(engine);
    node.stake("V1", 100).await.unwrap();
    node.submit_transaction(tx("Maria", "Ivan", 5)).await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let producer = {
        let node = node.clone();
        tokio::spawn(async move { node.run_block_producer(Duration::from_millis(10), shutdown_rx).await })
    };

    tokio::time::timeout(Duration::from_secs(5), async {
        while node.height().await < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    shutdown_tx.send(true).unwrap();
    producer.await.unwrap();
    assert_eq!(node.rewards().await.get("V1"), Some(&10));
}

proptest! {
    #[test]
    fn prop_merkle_root_tracks_leaves(
        leaves in prop::collection::vec(any::<[u8; 32]>(), 1..40),
        flip in any::<prop::sample::Index>(),
    ) {
        let hashes: Vec<Hash256> = leaves.iter().copied().map(Hash256::from_bytes).collect();
        let root = merkle_root_of(&hashes);
        prop_assert_eq!(root, merkle_root_of(&hashes));

        let mut changed = hashes.clone();
        let at = flip.index(changed.len());
        let mut bytes = *changed[at].as_bytes();
        bytes[0] ^= 0xff;
        changed[at] = Hash256::from_bytes(bytes);
        prop_assert_ne!(root, merkle_root_of(&changed));
    }

    #[test]
    fn prop_ledger_batches_are_atomic(
        amounts in prop::collection::vec(1u64..400, 1..12),
    ) {
        let mut ledger = Ledger::new("System");
        ledger.mint("A", 1_000).unwrap();
        let before = ledger.balances();

        let batch: Vec<Transaction> = amounts.iter().map(|amount| tx("A", "B", *amount)).collect();
        let total: u64 = amounts.iter().sum();

        match ledger.apply(&batch) {
            Ok(()) => {
                prop_assert!(total <= 1_000);
                prop_assert_eq!(ledger.balance("A"), 1_000 - total);
                prop_assert_eq!(ledger.balance("B"), total);
            }
            Err(_) => {
                prop_assert!(total > 1_000);
                prop_assert_eq!(ledger.balances(), before);
            }
        }
    }

    #[test]
    fn prop_delegation_adds_exactly_its_amount(
        own in 0u64..1_000_000,
        delegated in prop::collection::vec(0u64..1_000_000, 0..8),
    ) {
        let mut stakes = StakeBook::new();
        stakes.add_stake("V", own).unwrap();
        for (i, amount) in delegated.iter().enumerate() {
            stakes.delegate(&format!("D{}", i), "V", *amount).unwrap();
        }

        let total: u64 = own + delegated.iter().sum::<u64>();
        prop_assert_eq!(stakes.stake_of("V"), total);
        prop_assert_eq!(stakes.delegations().total_delegated_to("V"), u128::from(total - own));
    }

    #[test]
    fn prop_selection_never_picks_zero_stake(
        stakes in prop::collection::vec(0u64..100, 1..10),
        fraction in 0.0f64..=1.0,
    ) {
        let snapshot: Vec<(AccountId, Amount)> = stakes
            .iter()
            .enumerate()
            .map(|(i, s)| (format!("V{}", i), *s))
            .collect();
        let total: u64 = stakes.iter().sum();

        match select_weighted(&snapshot, fraction * total as f64) {
            Some(winner) => {
                let stake = snapshot.iter().find(|(v, _)| *v == winner).map(|(_, s)| *s);
                prop_assert!(stake.unwrap_or(0) > 0);
            }
            None => prop_assert_eq!(total, 0),
        }
    }

    #[test]
    fn prop_transaction_hash_is_stable(
        amount in any::<u64>(),
        timestamp in any::<u64>(),
    ) {
        let first = Transaction::with_timestamp("S", "R", amount, timestamp).unwrap();
        let second = Transaction::with_timestamp("S", "R", amount, timestamp).unwrap();
        prop_assert_eq!(first.hash(), second.hash());
        prop_assert!(first.verify_hash().unwrap());
    }
}
