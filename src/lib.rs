//! # Chainscope
//!
//! An educational, in-terminal visualization of blockchain concepts: five
//! animated network nodes, simulated block mining, simulated propagation
//! and a shared transaction pool. This is a teaching aid, not a blockchain:
//! hashes are fabricated strings, nothing is signed, nothing persists and
//! no bytes cross a network.
//!
//! The simulation core is split from the presentation so it can be driven
//! headlessly:
//! - `types`: the transaction/block/node/propagation records
//! - `factory`: synthetic transaction and block construction
//! - `state`: one explicit state struct, pure transitions, observable store
//! - `engine`: the timed mining/propagation sequence over a clock trait
//! - `ui`: the tui/crossterm presentation layer

pub mod engine;
pub mod error;
pub mod factory;
pub mod state;
pub mod types;
pub mod ui;

// Re-export commonly used types for convenience
pub use engine::{Clock, Engine, ManualClock, SystemClock};
pub use error::{Result, VizError};
pub use state::{SimState, StateStore};
pub use types::{Block, NodeId, Propagation, SimNode, Transaction};
