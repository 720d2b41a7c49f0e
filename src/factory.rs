//! Factories for synthetic transactions and blocks.
//!
//! Every value produced here is a teaching prop: ids are only
//! probabilistically unique, the merkle root is a formatted label rather
//! than a tree, and the block hash is a reversible base64 slice with no
//! pre-image resistance whatsoever.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::encode;
use once_cell::sync::Lazy;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::error::{Result, VizError};
use crate::types::{Block, Transaction};

/// Fixed roster used for automatically generated transactions.
pub static PARTICIPANTS: Lazy<Vec<&'static str>> =
    Lazy::new(|| vec!["Alice", "Bob", "Charlie", "Diana", "Eve", "Frank"]);

/// Currencies offered by the transaction entry form and the generators.
pub static CURRENCIES: Lazy<Vec<&'static str>> = Lazy::new(|| vec!["BTC", "ETH", "ADA", "SOL"]);

/// Nonces are picked uniformly below this bound; there is no difficulty
/// target to satisfy.
pub const NONCE_BOUND: u32 = 1_000_000;

/// Current time in milliseconds since the UNIX epoch.
pub fn now_millis() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| VizError::Time(format!("Time error: {}", e)))
        .map(|d| d.as_millis() as u64)
}

/// Short random id suffix, lowercased to keep ids easy to read in the UI.
fn random_suffix() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

fn random_participant_pair() -> (&'static str, &'static str) {
    let mut rng = thread_rng();
    let from = PARTICIPANTS[rng.gen_range(0..PARTICIPANTS.len())];
    // Resample the recipient until it differs; self-transfers never appear.
    let mut to = PARTICIPANTS[rng.gen_range(0..PARTICIPANTS.len())];
    while to == from {
        to = PARTICIPANTS[rng.gen_range(0..PARTICIPANTS.len())];
    }
    (from, to)
}

fn random_currency() -> &'static str {
    CURRENCIES[thread_rng().gen_range(0..CURRENCIES.len())]
}

/// Build a transaction from user-supplied fields. The caller (the entry
/// form) is responsible for rejecting empty names and non-positive amounts
/// before this is invoked; the fee is rolled here in [1, 5].
pub fn create_transaction(from: &str, to: &str, amount: f64, currency: &str) -> Result<Transaction> {
    let timestamp = now_millis()?;
    Ok(Transaction {
        id: format!("tx_{}_{}", timestamp, random_suffix()),
        from: from.to_string(),
        to: to.to_string(),
        amount,
        currency: currency.to_string(),
        timestamp,
        fee: thread_rng().gen_range(1..=5),
    })
}

/// One synthetic transaction from the fixed roster, used by the automatic
/// transaction timer. Amount in [1, 50], fee in [1, 3].
pub fn generate_auto_transaction() -> Result<Transaction> {
    let timestamp = now_millis()?;
    let (from, to) = random_participant_pair();
    Ok(Transaction {
        id: format!("auto_tx_{}_{}", timestamp, random_suffix()),
        from: from.to_string(),
        to: to.to_string(),
        amount: f64::from(thread_rng().gen_range(1u32..=50)),
        currency: random_currency().to_string(),
        timestamp,
        fee: thread_rng().gen_range(1..=3),
    })
}

/// Filler transactions for a block mined while the pool is empty. Produces
/// 1 to 3 transactions with amount in [1, 100] and fee in [1, 5].
pub fn generate_transactions(block_id: u64) -> Result<Vec<Transaction>> {
    let timestamp = now_millis()?;
    let count = thread_rng().gen_range(1..=3);
    let mut transactions = Vec::with_capacity(count);
    for i in 0..count {
        let (from, to) = random_participant_pair();
        transactions.push(Transaction {
            id: format!("tx_{}_{}_{}", block_id, i, timestamp),
            from: from.to_string(),
            to: to.to_string(),
            amount: f64::from(thread_rng().gen_range(1u32..=100)),
            currency: random_currency().to_string(),
            timestamp: timestamp + i as u64 * 1000,
            fee: thread_rng().gen_range(1..=5),
        });
    }
    Ok(transactions)
}

/// Fabricated block hash: the concatenated header fields, base64-encoded,
/// truncated to 16 characters and prefixed `hash_`. Deterministic for fixed
/// inputs and trivially invertible; a pedagogical stand-in only.
pub fn calculate_block_hash(
    previous_hash: &str,
    merkle_root: &str,
    nonce: u32,
    block_id: u64,
) -> String {
    let hash_input = format!("{}{}{}{}", previous_hash, merkle_root, nonce, block_id);
    let encoded = encode(hash_input);
    let end = encoded.len().min(16);
    format!("hash_{}", &encoded[..end])
}

/// Assemble a block from already-drained transactions and the previous hash
/// of the mining node's local chain.
pub fn create_new_block(
    block_id: u64,
    transactions: Vec<Transaction>,
    previous_hash: &str,
) -> Result<Block> {
    // Looks structured but is not a Merkle tree over transaction hashes.
    let merkle_root = format!("merkle_{}_{}", block_id, transactions.len());
    let nonce = thread_rng().gen_range(0..NONCE_BOUND);
    let hash = calculate_block_hash(previous_hash, &merkle_root, nonce, block_id);
    Ok(Block {
        id: block_id,
        hash,
        previous_hash: previous_hash.to_string(),
        timestamp: now_millis()?,
        transactions,
        nonce,
        merkle_root,
    })
}
