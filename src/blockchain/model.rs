use log::debug;
use thiserror::Error;

use super::Block;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("block #{got} does not follow tip #{tip}")]
    BadIndex { tip: u64, got: u64 },
    #[error("block previous_hash does not match the tip")]
    BadLink,
    #[error("block hash is stale or misses the difficulty target")]
    BadProof,
}

/// Validate a whole chain: genesis shape, linkage, hashes and PoW.
pub fn is_valid_chain(chain: &[Block], difficulty: u32) -> bool {
    let Some(genesis) = chain.first() else {
        return false;
    };

    if genesis.index != 0
        || genesis.previous_hash != "0"
        || !genesis.transactions.is_empty()
        || genesis.hash != genesis.compute_hash()
    {
        return false;
    }

    chain.windows(2).all(|pair| {
        let (prev, current) = (&pair[0], &pair[1]);
        current.index == prev.index + 1
            && current.previous_hash == prev.hash
            && current.is_valid(difficulty)
    })
}

/// Longest-valid-chain rule. Returns the candidate to adopt, if any.
///
/// A candidate qualifies when it is strictly longer than `local_len` and
/// passes [`is_valid_chain`]. Among qualifying candidates the longest wins;
/// on equal length the first one in iteration order is kept.
pub fn select_best_chain<I>(local_len: usize, candidates: I, difficulty: u32) -> Option<Vec<Block>>
where
    I: IntoIterator<Item = Vec<Block>>,
{
    let mut best: Option<Vec<Block>> = None;
    let mut max_len = local_len;

    for candidate in candidates {
        if candidate.len() <= max_len {
            continue;
        }
        if !is_valid_chain(&candidate, difficulty) {
            debug!("discarding invalid candidate chain (len={})", candidate.len());
            continue;
        }
        max_len = candidate.len();
        best = Some(candidate);
    }

    best
}

/// Simple in-memory blockchain with Proof-of-Work.
#[derive(Debug, Clone)]
pub struct Blockchain {
    pub chain: Vec<Block>,
    pub difficulty: u32,
    pub mining_reward: u64,
}

impl Blockchain {
    /// Initialize a new blockchain with a genesis block.
    pub fn new(difficulty: u32, mining_reward: u64) -> Self {
        Self {
            chain: vec![Block::genesis()],
            difficulty,
            mining_reward,
        }
    }

    /// Return the last block in the chain.
    pub fn last_block(&self) -> &Block {
        // never empty: built with a genesis block and only replaced by valid chains
        &self.chain[self.chain.len() - 1]
    }

    /// Append an already mined block on top of the tip.
    pub fn append(&mut self, block: Block) -> Result<(), ChainError> {
        let tip = self.last_block();
        if block.index != tip.index + 1 {
            return Err(ChainError::BadIndex {
                tip: tip.index,
                got: block.index,
            });
        }
        if block.previous_hash != tip.hash {
            return Err(ChainError::BadLink);
        }
        if !block.is_valid(self.difficulty) {
            return Err(ChainError::BadProof);
        }
        self.chain.push(block);
        Ok(())
    }

    /// Swap in a chain chosen by fork-choice.
    pub fn replace_chain(&mut self, chain: Vec<Block>) {
        if !chain.is_empty() {
            self.chain = chain;
        }
    }

    pub fn is_valid_chain(&self) -> bool {
        is_valid_chain(&self.chain, self.difficulty)
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }
}
