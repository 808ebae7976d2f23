use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::transaction::Transaction;

/// How many nonces are tried between two cancellation checks.
const CANCEL_POLL_INTERVAL: u64 = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MiningError {
    #[error("mining cancelled: chain tip moved")]
    Cancelled,
}

/// A single block in the blockchain holding a list of transactions.
/// Field order is the wire record order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: i64, // Unix timestamp (UTC)
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub nonce: u64,   // Proof-of-Work nonce
    pub hash: String, // Cached hash of the block
}

/// True when `hash` starts with `difficulty` hex zeros.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    hash.len() >= difficulty as usize && hash.chars().take(difficulty as usize).all(|c| c == '0')
}

impl Block {
    /// Create the genesis block (first block in the chain).
    pub fn genesis() -> Self {
        Self::new(0, Utc::now().timestamp(), Vec::new(), String::from("0"))
    }

    /// Create a new block (not mined yet). Call `mine()` to perform PoW.
    pub fn new(
        index: u64,
        timestamp: i64,
        transactions: Vec<Transaction>,
        previous_hash: String,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp,
            transactions,
            previous_hash,
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// Hash input: `index:timestamp:[records]:previous_hash:nonce`.
    pub(crate) fn preimage(&self, nonce: u64) -> String {
        let records: Vec<String> =
            self.transactions.iter().map(Transaction::canonical_record).collect();
        format!(
            "{}:{}:[{}]:{}:{}",
            self.index,
            self.timestamp,
            records.join(","),
            self.previous_hash,
            nonce
        )
    }

    /// SHA-256 over every field except `hash`, with the given nonce.
    fn hash_with_nonce(&self, nonce: u64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.preimage(nonce).as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Compute the SHA-256 hash of this block using its fields
    /// (excluding the `hash` field itself).
    pub fn compute_hash(&self) -> String {
        self.hash_with_nonce(self.nonce)
    }

    /// Find the first nonce, counting up from the current one, whose hash
    /// meets `difficulty`. Does not touch the block. `cancelled` is polled
    /// periodically and aborts the search.
    pub fn search_proof_of_work(
        &self,
        difficulty: u32,
        cancelled: impl Fn() -> bool,
    ) -> Result<(u64, String), MiningError> {
        let mut nonce = self.nonce;
        loop {
            let hash = self.hash_with_nonce(nonce);
            if meets_difficulty(&hash, difficulty) {
                return Ok((nonce, hash));
            }
            nonce = nonce.wrapping_add(1);
            if nonce % CANCEL_POLL_INTERVAL == 0 && cancelled() {
                return Err(MiningError::Cancelled);
            }
        }
    }

    /// Perform Proof-of-Work by finding a nonce that yields a hash
    /// starting with `difficulty` leading zeros (in hex).
    pub fn mine(&mut self, difficulty: u32) {
        // a search that is never cancelled always returns Ok
        if let Ok((nonce, hash)) = self.search_proof_of_work(difficulty, || false) {
            self.nonce = nonce;
            self.hash = hash;
        }
    }

    /// Like [`Block::mine`] but gives up once `cancelled` reports true.
    /// The block is unchanged when cancelled.
    pub fn mine_cancellable(
        &mut self,
        difficulty: u32,
        cancelled: impl Fn() -> bool,
    ) -> Result<(), MiningError> {
        let (nonce, hash) = self.search_proof_of_work(difficulty, cancelled)?;
        self.nonce = nonce;
        self.hash = hash;
        Ok(())
    }

    /// Validate that the block's cached `hash` matches its content and
    /// satisfies the PoW difficulty. (Does NOT validate chain linkage.)
    pub fn is_valid(&self, difficulty: u32) -> bool {
        self.hash == self.compute_hash() && meets_difficulty(&self.hash, difficulty)
    }
}
