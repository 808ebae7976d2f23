pub mod block;
pub mod model;

pub use block::{Block, MiningError, meets_difficulty};
pub use model::{Blockchain, ChainError, is_valid_chain, select_best_chain};

/// Default Proof-of-Work difficulty (number of leading zeros).
pub const DEFAULT_DIFFICULTY: u32 = 4;

/// Amount credited to the miner of each block.
pub const MINING_REWARD: u64 = 100;
