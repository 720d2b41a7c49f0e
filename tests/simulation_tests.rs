//! End-to-end simulation tests driven through the public engine API with a
//! hand-advanced clock.

use chainscope::engine::{
    AUTO_TX_INTERVAL_MS, MINING_DELAY_MS, PROPAGATION_CLEAR_MS, PROPAGATION_SETTLE_MS,
    PROPAGATION_STAGGER_MS,
};
use chainscope::{Engine, ManualClock};

fn new_engine() -> Engine<ManualClock> {
    Engine::new(ManualClock::new(0))
}

// Long enough for mining plus the slowest peer's full propagation window.
const FULL_CYCLE_MS: u64 =
    MINING_DELAY_MS + 3 * PROPAGATION_STAGGER_MS + PROPAGATION_SETTLE_MS + PROPAGATION_CLEAR_MS;

#[test]
fn fresh_network_has_five_nodes_on_genesis() {
    let engine = new_engine();
    let state = engine.state();
    assert_eq!(state.nodes.len(), 5);
    for node in &state.nodes {
        assert_eq!(node.blocks.len(), 1);
        assert_eq!(node.blocks[0].hash, "genesis");
        assert_eq!(node.blocks[0].previous_hash, "none");
        assert!(!node.is_mining);
        assert!(!node.is_active);
    }
    assert_eq!(state.selected_node, 'A');
    assert_eq!(state.block_counter, 0);
    assert!(state.network_pulse);
    assert!(!state.auto_transactions);
}

#[test]
fn manual_transaction_travels_pool_to_block() {
    let mut engine = new_engine();
    engine
        .submit_transaction("Flavio", "Laura", 1.0, "BTC")
        .unwrap();
    assert_eq!(engine.state().transaction_pool.len(), 1);

    let id = engine.mine_block().unwrap();
    assert_eq!(id, 1);
    // The pool drains at request time, not at completion.
    assert!(engine.state().transaction_pool.is_empty());
    assert!(engine.state().node('A').unwrap().is_mining);

    engine.clock_mut().set(MINING_DELAY_MS);
    engine.tick().unwrap();

    let a = engine.state().node('A').unwrap();
    assert_eq!(a.blocks.len(), 2);
    assert_eq!(a.blocks_mined, 1);
    let block = a.blocks.last().unwrap();
    assert_eq!(block.transactions.len(), 1);
    assert_eq!(block.transactions[0].from, "Flavio");
    assert_eq!(block.transactions[0].to, "Laura");
    assert_eq!(block.previous_hash, "genesis");
    assert_eq!(engine.state().block_counter, 1);
}

#[test]
fn propagation_resolves_to_identical_chains() {
    let mut engine = new_engine();
    engine
        .submit_transaction("Alice", "Bob", 5.0, "ETH")
        .unwrap();
    engine.mine_block().unwrap();

    engine.clock_mut().set(FULL_CYCLE_MS);
    engine.tick().unwrap();

    let state = engine.state();
    assert!(state.propagations.is_empty());
    let reference: Vec<&str> = state.nodes[0]
        .blocks
        .iter()
        .map(|b| b.hash.as_str())
        .collect();
    assert_eq!(reference.len(), 2);
    for node in &state.nodes {
        let hashes: Vec<&str> = node.blocks.iter().map(|b| b.hash.as_str()).collect();
        assert_eq!(hashes, reference);
        assert!(!node.is_active);
        assert!(!node.is_mining);
    }
    assert_eq!(engine.pending_events(), 0);
}

#[test]
fn block_counter_advances_once_per_mined_block() {
    let mut engine = new_engine();
    for round in 1..=3u64 {
        engine
            .submit_transaction("Charlie", "Diana", 2.0, "ADA")
            .unwrap();
        engine.mine_block().unwrap();
        engine.clock_mut().set(round * FULL_CYCLE_MS);
        engine.tick().unwrap();
        assert_eq!(engine.state().block_counter, round);
    }
    // Genesis plus three mined blocks, on every node.
    for node in &engine.state().nodes {
        assert_eq!(node.blocks.len(), 4);
    }
    // Each block links to its predecessor.
    let a = engine.state().node('A').unwrap();
    for pair in a.blocks.windows(2) {
        assert_eq!(pair[1].previous_hash, pair[0].hash);
    }
}

#[test]
fn pool_is_consumed_oldest_first_with_remainder_kept() {
    let mut engine = new_engine();
    for name in ["first", "second", "third", "fourth"] {
        engine.submit_transaction(name, "Laura", 1.0, "SOL").unwrap();
    }
    engine.mine_block().unwrap();
    // One transaction over the three-per-block cap stays pooled.
    assert_eq!(engine.state().transaction_pool.len(), 1);
    assert_eq!(engine.state().transaction_pool[0].from, "fourth");

    engine.clock_mut().set(MINING_DELAY_MS);
    engine.tick().unwrap();
    let block = engine.state().node('A').unwrap().blocks.last().cloned().unwrap();
    let senders: Vec<&str> = block.transactions.iter().map(|t| t.from.as_str()).collect();
    assert_eq!(senders, vec!["first", "second", "third"]);
}

#[test]
fn mining_origin_follows_the_selected_node() {
    let mut engine = new_engine();
    engine.select_node('D');
    engine.submit_transaction("Eve", "Frank", 3.0, "BTC").unwrap();
    engine.mine_block().unwrap();

    assert!(engine.state().node('D').unwrap().is_mining);
    engine.clock_mut().set(MINING_DELAY_MS);
    engine.tick().unwrap();

    let d = engine.state().node('D').unwrap();
    assert_eq!(d.blocks_mined, 1);
    assert_eq!(d.blocks.len(), 2);
    // Propagations fan out from the origin to the other four nodes.
    let state = engine.state();
    assert_eq!(state.propagations.len(), 4);
    assert!(state.propagations.iter().all(|p| p.from_node == 'D'));
}

#[test]
fn auto_transactions_follow_the_interval_until_disabled() {
    let mut engine = new_engine();
    engine.set_auto_transactions(true);

    engine.clock_mut().set(AUTO_TX_INTERVAL_MS - 1);
    engine.tick().unwrap();
    assert!(engine.state().transaction_pool.is_empty());

    engine.clock_mut().set(AUTO_TX_INTERVAL_MS);
    engine.tick().unwrap();
    assert_eq!(engine.state().transaction_pool.len(), 1);
    assert!(engine.state().transaction_pool[0].id.starts_with("auto_tx_"));

    engine.clock_mut().set(3 * AUTO_TX_INTERVAL_MS);
    engine.tick().unwrap();
    assert_eq!(engine.state().transaction_pool.len(), 3);

    engine.set_auto_transactions(false);
    engine.clock_mut().set(10 * AUTO_TX_INTERVAL_MS);
    engine.tick().unwrap();
    assert_eq!(engine.state().transaction_pool.len(), 3);
}

#[test]
fn reenabling_auto_transactions_starts_a_fresh_interval() {
    let mut engine = new_engine();
    engine.set_auto_transactions(true);
    engine.clock_mut().set(AUTO_TX_INTERVAL_MS);
    engine.tick().unwrap();
    assert_eq!(engine.state().transaction_pool.len(), 1);

    engine.set_auto_transactions(false);
    engine.clock_mut().set(AUTO_TX_INTERVAL_MS + 100);
    engine.tick().unwrap();
    engine.set_auto_transactions(true);

    // The next generation is a full interval after re-enabling, not a
    // leftover of the earlier schedule.
    engine.clock_mut().set(2 * AUTO_TX_INTERVAL_MS);
    engine.tick().unwrap();
    assert_eq!(engine.state().transaction_pool.len(), 1);
    engine.clock_mut().set(AUTO_TX_INTERVAL_MS + 100 + AUTO_TX_INTERVAL_MS);
    engine.tick().unwrap();
    assert_eq!(engine.state().transaction_pool.len(), 2);
}

#[test]
fn speed_is_captured_when_mining_is_requested() {
    let mut engine = new_engine();
    engine.submit_transaction("Alice", "Bob", 1.0, "BTC").unwrap();
    engine.mine_block().unwrap();
    // Moving the slider mid-flight must not reschedule this block's
    // propagation.
    engine.set_speed(5);

    let last_clear_at_1x = FULL_CYCLE_MS;
    engine.clock_mut().set(last_clear_at_1x - 1);
    engine.tick().unwrap();
    assert!(!engine.state().propagations.is_empty());

    engine.clock_mut().set(last_clear_at_1x);
    engine.tick().unwrap();
    assert!(engine.state().propagations.is_empty());
}
