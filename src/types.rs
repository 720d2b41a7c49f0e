//! Core records of the simulated network: transactions, blocks, nodes and
//! in-flight propagations. Everything here is plain data; the state machine
//! that moves it lives in `state` and `engine`.

/// Network nodes are named 'A' through 'E' for the lifetime of a session.
pub type NodeId = char;

/// A pending or confirmed transfer. Immutable once created; transactions
/// leave the pool only by being consumed into a block.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub from: String,
    pub to: String,
    pub amount: f64,
    pub currency: String,
    /// Milliseconds since the UNIX epoch.
    pub timestamp: u64,
    pub fee: u32,
}

/// A block in a node's local chain copy.
///
/// `previous_hash` links to the prior block on the *same node's* chain.
/// Propagation copies blocks by value, so the "same" block held by two nodes
/// is a structurally identical copy, never a shared reference. The hash and
/// merkle root are fabricated teaching stand-ins, not cryptographic values.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Globally monotonic across the whole simulation (one shared counter).
    pub id: u64,
    pub hash: String,
    pub previous_hash: String,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub nonce: u32,
    pub merkle_root: String,
}

impl Block {
    /// The genesis block seeded identically into every node at startup.
    pub fn genesis(timestamp: u64) -> Self {
        Block {
            id: 0,
            hash: "genesis".to_string(),
            previous_hash: "none".to_string(),
            timestamp,
            transactions: Vec::new(),
            nonce: 0,
            merkle_root: "genesis".to_string(),
        }
    }
}

/// One of the five network nodes, with its layout position and local chain.
#[derive(Debug, Clone, PartialEq)]
pub struct SimNode {
    pub id: NodeId,
    pub x: f64,
    pub y: f64,
    pub blocks: Vec<Block>,
    pub is_active: bool,
    pub is_mining: bool,
    pub blocks_mined: u32,
}

impl SimNode {
    pub fn new(id: NodeId, x: f64, y: f64, genesis: Block) -> Self {
        SimNode {
            id,
            x,
            y,
            blocks: vec![genesis],
            is_active: false,
            is_mining: false,
            blocks_mined: 0,
        }
    }

    /// Hash of the most recent block on this node's chain copy.
    pub fn last_hash(&self) -> &str {
        self.blocks.last().map(|b| b.hash.as_str()).unwrap_or("genesis")
    }
}

/// An in-flight block transfer along one edge of the network. Ephemeral:
/// created when a block starts propagating to a peer, removed once that
/// peer's animation window closes.
#[derive(Debug, Clone, PartialEq)]
pub struct Propagation {
    pub id: String,
    pub from_node: NodeId,
    pub to_node: NodeId,
    pub block_id: u64,
    pub progress: f64,
}

impl Propagation {
    /// Unique key for a (block, destination) pair.
    pub fn key(block_id: u64, to_node: NodeId) -> String {
        format!("prop_{}_{}", block_id, to_node)
    }

    pub fn new(from_node: NodeId, to_node: NodeId, block_id: u64) -> Self {
        Propagation {
            id: Self::key(block_id, to_node),
            from_node,
            to_node,
            block_id,
            progress: 0.0,
        }
    }
}
