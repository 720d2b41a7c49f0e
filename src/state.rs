//! Simulation state and its transitions.
//!
//! All of the session's mutable state lives in one [`SimState`] value. The
//! transition functions below are pure: each takes the current state by
//! reference and returns the next state, so the whole machine can be
//! exercised without a rendering surface. [`StateStore`] owns the current
//! state and notifies subscribed listeners on every commit.

use crate::types::{Block, NodeId, Propagation, SimNode, Transaction};

/// The five nodes and their fixed layout coordinates.
pub const NODE_LAYOUT: [(NodeId, f64, f64); 5] = [
    ('A', 150.0, 90.0),
    ('B', 580.0, 90.0),
    ('C', 230.0, 340.0),
    ('D', 480.0, 340.0),
    ('E', 360.0, 160.0),
];

/// Blocks consume at most this many transactions from the pool front.
pub const MAX_TRANSACTIONS_PER_BLOCK: usize = 3;

/// Propagation speed bounds for the user-facing slider.
pub const MIN_SPEED: u32 = 1;
pub const MAX_SPEED: u32 = 5;

/// Complete simulation state: nodes, the shared transaction pool, in-flight
/// propagations, the global block counter, and the UI selection/toggles.
#[derive(Debug, Clone)]
pub struct SimState {
    pub nodes: Vec<SimNode>,
    pub transaction_pool: Vec<Transaction>,
    pub propagations: Vec<Propagation>,
    /// Advances by one per mined block, shared across all nodes.
    pub block_counter: u64,
    pub selected_node: NodeId,
    pub network_pulse: bool,
    pub auto_transactions: bool,
    pub propagation_speed: u32,
}

impl SimState {
    /// Fresh session: five nodes, each seeded with an identical genesis
    /// block stamped at `now` (milliseconds since the epoch).
    pub fn new(now: u64) -> Self {
        let genesis = Block::genesis(now);
        let nodes = NODE_LAYOUT
            .iter()
            .map(|&(id, x, y)| SimNode::new(id, x, y, genesis.clone()))
            .collect();
        SimState {
            nodes,
            transaction_pool: Vec::new(),
            propagations: Vec::new(),
            block_counter: 0,
            selected_node: 'A',
            network_pulse: true,
            auto_transactions: false,
            propagation_speed: MIN_SPEED,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&SimNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Sum of blocks mined by every node.
    pub fn total_mined(&self) -> u32 {
        self.nodes.iter().map(|n| n.blocks_mined).sum()
    }
}

/// Append a transaction to the back of the shared pool.
pub fn enqueue_transaction(state: &SimState, tx: Transaction) -> SimState {
    let mut next = state.clone();
    next.transaction_pool.push(tx);
    next
}

/// Remove up to `max` transactions from the front of the pool, preserving
/// the relative order of the remainder. Returns the next state and the
/// drained transactions (oldest first).
pub fn drain_pool(state: &SimState, max: usize) -> (SimState, Vec<Transaction>) {
    let mut next = state.clone();
    let take = max.min(next.transaction_pool.len());
    let drained = next.transaction_pool.drain(..take).collect();
    (next, drained)
}

/// Start the mining animation on the origin node. Only the origin is
/// flagged; every other node is explicitly idle.
pub fn begin_mining(state: &SimState, origin: NodeId) -> SimState {
    let mut next = state.clone();
    for node in &mut next.nodes {
        node.is_mining = node.id == origin;
        node.is_active = node.id == origin;
    }
    next
}

/// Finish mining: append the block to the origin's chain, credit its mined
/// counter, advance the global block counter, and drop all activity flags.
pub fn finish_mining(state: &SimState, origin: NodeId, block: &Block) -> SimState {
    let mut next = state.clone();
    for node in &mut next.nodes {
        if node.id == origin {
            node.blocks.push(block.clone());
            node.blocks_mined += 1;
        }
        node.is_mining = false;
        node.is_active = false;
    }
    next.block_counter = block.id;
    next
}

/// Record a new in-flight propagation (progress 0).
pub fn add_propagation(state: &SimState, prop: Propagation) -> SimState {
    let mut next = state.clone();
    next.propagations.push(prop);
    next
}

/// Mark one propagation's transfer animation as complete.
pub fn complete_propagation(state: &SimState, prop_id: &str) -> SimState {
    let mut next = state.clone();
    for prop in &mut next.propagations {
        if prop.id == prop_id {
            prop.progress = 1.0;
        }
    }
    next
}

/// A peer receives its copy of the block: the block value is appended to
/// that node's local chain and the node lights up as communicating.
pub fn settle_block(state: &SimState, to: NodeId, block: &Block) -> SimState {
    let mut next = state.clone();
    for node in &mut next.nodes {
        if node.id == to {
            node.is_active = true;
            node.blocks.push(block.clone());
        }
    }
    next
}

/// Close out one propagation: remove its record and quiet every node.
pub fn remove_propagation(state: &SimState, prop_id: &str) -> SimState {
    let mut next = state.clone();
    next.propagations.retain(|p| p.id != prop_id);
    for node in &mut next.nodes {
        node.is_active = false;
    }
    next
}

pub fn select_node(state: &SimState, id: NodeId) -> SimState {
    let mut next = state.clone();
    if next.node(id).is_some() {
        next.selected_node = id;
    }
    next
}

pub fn set_speed(state: &SimState, speed: u32) -> SimState {
    let mut next = state.clone();
    next.propagation_speed = speed.clamp(MIN_SPEED, MAX_SPEED);
    next
}

pub fn set_network_pulse(state: &SimState, enabled: bool) -> SimState {
    let mut next = state.clone();
    next.network_pulse = enabled;
    next
}

pub fn set_auto_transactions(state: &SimState, enabled: bool) -> SimState {
    let mut next = state.clone();
    next.auto_transactions = enabled;
    next
}

/// Listener invoked with the new state after every commit.
pub type Listener = Box<dyn FnMut(&SimState)>;

/// Owner of the current [`SimState`]. Consumers that need to react to
/// changes (the renderer, a test harness) subscribe a listener; every
/// commit replaces the state and notifies all listeners in order.
pub struct StateStore {
    state: SimState,
    listeners: Vec<Listener>,
}

impl StateStore {
    pub fn new(state: SimState) -> Self {
        StateStore {
            state,
            listeners: Vec::new(),
        }
    }

    pub fn state(&self) -> &SimState {
        &self.state
    }

    pub fn subscribe(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    pub fn commit(&mut self, next: SimState) {
        self.state = next;
        for listener in &mut self.listeners {
            listener(&self.state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory;

    fn sample_tx(id: &str) -> Transaction {
        Transaction {
            id: id.to_string(),
            from: "Alice".to_string(),
            to: "Bob".to_string(),
            amount: 10.0,
            currency: "BTC".to_string(),
            timestamp: 0,
            fee: 1,
        }
    }

    #[test]
    fn all_nodes_seeded_with_genesis() {
        let state = SimState::new(42);
        assert_eq!(state.nodes.len(), 5);
        for node in &state.nodes {
            assert_eq!(node.blocks.len(), 1);
            assert_eq!(node.blocks[0].id, 0);
            assert_eq!(node.blocks[0].hash, "genesis");
        }
        assert_eq!(state.selected_node, 'A');
        assert_eq!(state.block_counter, 0);
    }

    #[test]
    fn drain_takes_from_front_and_preserves_order() {
        let mut state = SimState::new(0);
        for id in ["t1", "t2", "t3", "t4", "t5"] {
            state = enqueue_transaction(&state, sample_tx(id));
        }
        let (next, drained) = drain_pool(&state, MAX_TRANSACTIONS_PER_BLOCK);
        let drained_ids: Vec<_> = drained.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(drained_ids, vec!["t1", "t2", "t3"]);
        let left: Vec<_> = next.transaction_pool.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(left, vec!["t4", "t5"]);
    }

    #[test]
    fn drain_of_short_pool_takes_everything() {
        let mut state = SimState::new(0);
        state = enqueue_transaction(&state, sample_tx("only"));
        let (next, drained) = drain_pool(&state, MAX_TRANSACTIONS_PER_BLOCK);
        assert_eq!(drained.len(), 1);
        assert!(next.transaction_pool.is_empty());
    }

    #[test]
    fn begin_mining_flags_only_the_origin() {
        let state = SimState::new(0);
        let next = begin_mining(&state, 'C');
        for node in &next.nodes {
            assert_eq!(node.is_mining, node.id == 'C');
            assert_eq!(node.is_active, node.id == 'C');
        }
    }

    #[test]
    fn finish_mining_appends_and_credits_origin_only() {
        let state = begin_mining(&SimState::new(0), 'B');
        let block = factory::create_new_block(1, Vec::new(), "genesis").unwrap();
        let next = finish_mining(&state, 'B', &block);
        for node in &next.nodes {
            assert!(!node.is_mining);
            assert!(!node.is_active);
            if node.id == 'B' {
                assert_eq!(node.blocks.len(), 2);
                assert_eq!(node.blocks_mined, 1);
            } else {
                assert_eq!(node.blocks.len(), 1);
                assert_eq!(node.blocks_mined, 0);
            }
        }
        assert_eq!(next.block_counter, 1);
    }

    #[test]
    fn settle_and_remove_propagation() {
        let state = SimState::new(0);
        let block = factory::create_new_block(1, Vec::new(), "genesis").unwrap();
        let prop = Propagation::new('A', 'D', 1);
        let with_prop = add_propagation(&state, prop.clone());
        assert_eq!(with_prop.propagations.len(), 1);

        let advanced = complete_propagation(&with_prop, &prop.id);
        assert_eq!(advanced.propagations[0].progress, 1.0);

        let settled = settle_block(&advanced, 'D', &block);
        let d = settled.node('D').unwrap();
        assert!(d.is_active);
        assert_eq!(d.blocks.len(), 2);

        let cleared = remove_propagation(&settled, &prop.id);
        assert!(cleared.propagations.is_empty());
        assert!(cleared.nodes.iter().all(|n| !n.is_active));
    }

    #[test]
    fn speed_is_clamped_to_slider_range() {
        let state = SimState::new(0);
        assert_eq!(set_speed(&state, 0).propagation_speed, MIN_SPEED);
        assert_eq!(set_speed(&state, 3).propagation_speed, 3);
        assert_eq!(set_speed(&state, 9).propagation_speed, MAX_SPEED);
    }

    #[test]
    fn select_node_ignores_unknown_ids() {
        let state = SimState::new(0);
        assert_eq!(select_node(&state, 'E').selected_node, 'E');
        assert_eq!(select_node(&state, 'Z').selected_node, 'A');
    }

    #[test]
    fn store_notifies_subscribers_on_commit() {
        use std::cell::Cell;
        use std::rc::Rc;

        let mut store = StateStore::new(SimState::new(0));
        let commits = Rc::new(Cell::new(0u32));
        let seen = Rc::clone(&commits);
        store.subscribe(Box::new(move |state| {
            seen.set(seen.get() + 1);
            assert_eq!(state.nodes.len(), 5);
        }));

        let next = enqueue_transaction(store.state(), sample_tx("t1"));
        store.commit(next);
        let next = select_node(store.state(), 'B');
        store.commit(next);

        assert_eq!(commits.get(), 2);
        assert_eq!(store.state().selected_node, 'B');
        assert_eq!(store.state().transaction_pool.len(), 1);
    }
}
