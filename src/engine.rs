//! Mining/propagation orchestrator.
//!
//! The original behavior is a timed sequence: a fixed mining delay on the
//! origin node, then a staggered propagation window per peer. Instead of
//! free-running timers, the engine keeps an explicit queue of scheduled
//! events with absolute due times and applies them whenever [`Engine::tick`]
//! observes that the clock has passed them. The clock is a trait, so the
//! whole sequence is deterministic under [`ManualClock`] in tests, while the
//! binary drives it with [`SystemClock`] from its frame loop.
//!
//! Due times are fixed at scheduling: once a block is mined, its propagation
//! runs to completion at the speed captured when mining was requested, even
//! if the slider moves afterwards.

use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};

use crate::error::{Result, VizError};
use crate::factory;
use crate::state::{self, SimState, StateStore, MAX_TRANSACTIONS_PER_BLOCK};
use crate::types::{Block, NodeId, Propagation};

/// Simulated mining takes this long, regardless of the speed slider.
pub const MINING_DELAY_MS: u64 = 2_000;
/// Peers start receiving the block `index * stagger / speed` after mining.
pub const PROPAGATION_STAGGER_MS: u64 = 200;
/// Delay between a peer's transfer animation finishing and the block
/// settling onto its chain, divided by speed.
pub const PROPAGATION_SETTLE_MS: u64 = 500;
/// Delay between settling and the propagation record being cleared,
/// divided by speed.
pub const PROPAGATION_CLEAR_MS: u64 = 1_000;
/// Cadence of the automatic transaction generator.
pub const AUTO_TX_INTERVAL_MS: u64 = 3_000;

/// Source of the current time in milliseconds since the UNIX epoch.
pub trait Clock {
    fn now_millis(&self) -> u64;
}

/// Wall-clock time, used by the binary.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Hand-advanced clock for deterministic tests.
pub struct ManualClock {
    now: u64,
}

impl ManualClock {
    pub fn new(now: u64) -> Self {
        ManualClock { now }
    }

    pub fn advance(&mut self, millis: u64) {
        self.now += millis;
    }

    pub fn set(&mut self, now: u64) {
        self.now = now;
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now
    }
}

/// A deferred state mutation.
#[derive(Debug, Clone)]
enum SimEvent {
    /// Mining delay elapsed on the origin: append the block there and fan
    /// out one propagation per peer. Carries the speed captured when mining
    /// was requested.
    FinishMining {
        origin: NodeId,
        block: Block,
        speed: u32,
    },
    /// The transfer animation along one edge reached the peer.
    CompletePropagation { prop_id: String },
    /// The peer appends its copy of the block and lights up.
    SettleBlock { to: NodeId, block: Block },
    /// The propagation record is dropped and activity flags clear.
    RemovePropagation { prop_id: String },
    /// Repeating generator tick while automatic transactions are on.
    AutoTransaction,
}

#[derive(Debug)]
struct Scheduled {
    due_at: u64,
    seq: u64,
    event: SimEvent,
}

/// Drives the simulation: owns the [`StateStore`], accepts user operations,
/// and applies scheduled events as the clock passes their due times.
pub struct Engine<C: Clock> {
    clock: C,
    store: StateStore,
    schedule: Vec<Scheduled>,
    seq: u64,
}

impl<C: Clock> Engine<C> {
    pub fn new(clock: C) -> Self {
        let state = SimState::new(clock.now_millis());
        Engine {
            clock,
            store: StateStore::new(state),
            schedule: Vec::new(),
            seq: 0,
        }
    }

    pub fn state(&self) -> &SimState {
        self.store.state()
    }

    pub fn subscribe(&mut self, listener: state::Listener) {
        self.store.subscribe(listener);
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Number of events still waiting on the clock.
    pub fn pending_events(&self) -> usize {
        self.schedule.len()
    }

    fn schedule(&mut self, due_at: u64, event: SimEvent) {
        self.schedule.push(Scheduled {
            due_at,
            seq: self.seq,
            event,
        });
        self.seq += 1;
    }

    /// Validate and enqueue a user-entered transaction. The entry form
    /// enforces the same rules before calling in.
    pub fn submit_transaction(
        &mut self,
        from: &str,
        to: &str,
        amount: f64,
        currency: &str,
    ) -> Result<()> {
        if from.trim().is_empty() || to.trim().is_empty() {
            return Err(VizError::Transaction(
                "sender and recipient are required".to_string(),
            ));
        }
        if amount <= 0.0 {
            return Err(VizError::Transaction(
                "amount must be greater than zero".to_string(),
            ));
        }
        let tx = factory::create_transaction(from.trim(), to.trim(), amount, currency)?;
        let next = state::enqueue_transaction(self.store.state(), tx);
        self.store.commit(next);
        Ok(())
    }

    /// Request a new block mined by the currently selected node.
    ///
    /// Drains up to three transactions from the pool front, falling back to
    /// synthesized fillers when the pool is empty. Returns the new block's
    /// id. A request while the origin is still mining is rejected rather
    /// than interleaved; propagation timers already in flight are never
    /// cancelled.
    pub fn mine_block(&mut self) -> Result<u64> {
        let snapshot = self.store.state().clone();
        let origin = snapshot.selected_node;
        // One mine at a time network-wide: a second request from any origin
        // before the delay elapses would reuse the stale block counter.
        if let Some(miner) = snapshot.nodes.iter().find(|n| n.is_mining) {
            return Err(VizError::Mining(format!(
                "node {} is already mining a block",
                miner.id
            )));
        }

        let new_block_id = snapshot.block_counter + 1;
        let (drained_state, pooled) = state::drain_pool(&snapshot, MAX_TRANSACTIONS_PER_BLOCK);
        let transactions = if pooled.is_empty() {
            factory::generate_transactions(new_block_id)?
        } else {
            pooled
        };

        let previous_hash = snapshot
            .node(origin)
            .map(|n| n.last_hash().to_string())
            .unwrap_or_else(|| "genesis".to_string());
        let block = factory::create_new_block(new_block_id, transactions, &previous_hash)?;
        let speed = snapshot.propagation_speed;

        info!(
            "node {} mining block #{} ({} transactions)",
            origin,
            new_block_id,
            block.transactions.len()
        );

        let next = state::begin_mining(&drained_state, origin);
        self.store.commit(next);
        let due = self.clock.now_millis() + MINING_DELAY_MS;
        self.schedule(
            due,
            SimEvent::FinishMining {
                origin,
                block,
                speed,
            },
        );
        Ok(new_block_id)
    }

    pub fn select_node(&mut self, id: NodeId) {
        let next = state::select_node(self.store.state(), id);
        self.store.commit(next);
    }

    pub fn set_speed(&mut self, speed: u32) {
        let next = state::set_speed(self.store.state(), speed);
        self.store.commit(next);
    }

    pub fn set_network_pulse(&mut self, enabled: bool) {
        let next = state::set_network_pulse(self.store.state(), enabled);
        self.store.commit(next);
    }

    /// Toggle the 3-second automatic transaction generator. Disabling
    /// removes the pending generator tick, so re-enabling starts a fresh
    /// interval; mining and propagation timers are untouched.
    pub fn set_auto_transactions(&mut self, enabled: bool) {
        let next = state::set_auto_transactions(self.store.state(), enabled);
        self.store.commit(next);
        if enabled {
            if !self
                .schedule
                .iter()
                .any(|s| matches!(s.event, SimEvent::AutoTransaction))
            {
                let due = self.clock.now_millis() + AUTO_TX_INTERVAL_MS;
                self.schedule(due, SimEvent::AutoTransaction);
            }
        } else {
            self.schedule
                .retain(|s| !matches!(s.event, SimEvent::AutoTransaction));
        }
    }

    /// Apply every event whose due time has passed, in due-time order.
    /// Returns how many events fired.
    pub fn tick(&mut self) -> Result<usize> {
        let now = self.clock.now_millis();
        let mut fired = 0;
        loop {
            let next_index = self
                .schedule
                .iter()
                .enumerate()
                .filter(|(_, s)| s.due_at <= now)
                .min_by_key(|(_, s)| (s.due_at, s.seq))
                .map(|(i, _)| i);
            match next_index {
                Some(index) => {
                    let scheduled = self.schedule.remove(index);
                    self.apply(scheduled)?;
                    fired += 1;
                }
                None => break,
            }
        }
        Ok(fired)
    }

    fn apply(&mut self, scheduled: Scheduled) -> Result<()> {
        let base = scheduled.due_at;
        match scheduled.event {
            SimEvent::FinishMining {
                origin,
                block,
                speed,
            } => {
                let mut next = state::finish_mining(self.store.state(), origin, &block);
                let peers: Vec<NodeId> = next
                    .nodes
                    .iter()
                    .map(|n| n.id)
                    .filter(|&id| id != origin)
                    .collect();
                let speed = u64::from(speed.max(1));
                for (index, peer) in peers.into_iter().enumerate() {
                    next = state::add_propagation(&next, Propagation::new(origin, peer, block.id));
                    let prop_id = Propagation::key(block.id, peer);
                    let transfer_done = base + (index as u64 * PROPAGATION_STAGGER_MS) / speed;
                    let settle_at = transfer_done + PROPAGATION_SETTLE_MS / speed;
                    let clear_at = settle_at + PROPAGATION_CLEAR_MS / speed;
                    self.schedule(
                        transfer_done,
                        SimEvent::CompletePropagation {
                            prop_id: prop_id.clone(),
                        },
                    );
                    self.schedule(
                        settle_at,
                        SimEvent::SettleBlock {
                            to: peer,
                            block: block.clone(),
                        },
                    );
                    self.schedule(clear_at, SimEvent::RemovePropagation { prop_id });
                }
                debug!("block #{} mined by node {}, propagating", block.id, origin);
                self.store.commit(next);
            }
            SimEvent::CompletePropagation { prop_id } => {
                let next = state::complete_propagation(self.store.state(), &prop_id);
                self.store.commit(next);
            }
            SimEvent::SettleBlock { to, block } => {
                let next = state::settle_block(self.store.state(), to, &block);
                self.store.commit(next);
            }
            SimEvent::RemovePropagation { prop_id } => {
                let next = state::remove_propagation(self.store.state(), &prop_id);
                self.store.commit(next);
            }
            SimEvent::AutoTransaction => {
                if self.store.state().auto_transactions {
                    let tx = factory::generate_auto_transaction()?;
                    debug!("auto transaction {} -> {} queued", tx.from, tx.to);
                    let next = state::enqueue_transaction(self.store.state(), tx);
                    self.store.commit(next);
                    self.schedule(base + AUTO_TX_INTERVAL_MS, SimEvent::AutoTransaction);
                }
            }
        }
        Ok(())
    }
}
