use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::blockchain::{Block, Blockchain, ChainError, MiningError, select_best_chain};
use crate::config::NodeConfig;
use crate::network::{ChainFetcher, ChainRepresentation, FetchError, PeerRegistry};
use crate::transaction::{Ledger, Sender, Transaction};
use crate::wallet::public_key_from_address;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RejectionReason {
    #[error("transaction signature invalid")]
    InvalidSignature,
    #[error("sender address is not a public key")]
    UnknownSender,
}

#[derive(Debug, Error)]
pub enum MineError {
    #[error(transparent)]
    Mining(#[from] MiningError),
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// A freshly sealed block and the transactions in it that the ledger refused.
#[derive(Debug, Clone, Serialize)]
pub struct MinedBlock {
    pub block: Block,
    pub unapplied: Vec<Transaction>,
}

/// Snapshot of the local chain's health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainStatus {
    pub valid: bool,
    pub length: usize,
    pub difficulty: u32,
}

/// Chain, ledger and pending pool: one consistency domain.
struct NodeState {
    blockchain: Blockchain,
    ledger: Ledger,
    pending: Vec<Transaction>,
}

/// A ledger node: owns the chain, the pending pool, the balances and the
/// peer set, and serializes every mutation through one lock.
pub struct Node {
    state: Mutex<NodeState>,
    peers: PeerRegistry,
    fetcher: Arc<dyn ChainFetcher>,
    peer_timeout: Duration,
    total_supply: u64,
    /// Bumped whenever the tip changes; in-flight mining watches it.
    tip_generation: AtomicU64,
}

impl Node {
    pub fn new(config: &NodeConfig, fetcher: Arc<dyn ChainFetcher>) -> Self {
        let node = Self {
            state: Mutex::new(NodeState {
                blockchain: Blockchain::new(config.difficulty, config.mining_reward),
                ledger: Ledger::new(config.total_supply),
                pending: Vec::new(),
            }),
            peers: PeerRegistry::new(),
            fetcher,
            peer_timeout: config.peer_timeout,
            total_supply: config.total_supply,
            tip_generation: AtomicU64::new(0),
        };
        for peer in &config.peers {
            node.register_peer(peer);
        }
        node
    }

    fn state(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get_chain(&self) -> ChainRepresentation {
        ChainRepresentation::new(self.state().blockchain.chain.clone())
    }

    pub fn height(&self) -> usize {
        self.state().blockchain.len()
    }

    pub fn difficulty(&self) -> u32 {
        self.state().blockchain.difficulty()
    }

    /// Seconds between the last two blocks, if there are two.
    pub fn last_interval_secs(&self) -> Option<i64> {
        let state = self.state();
        let chain = &state.blockchain.chain;
        match chain.len() {
            0 | 1 => None,
            n => Some((chain[n - 1].timestamp - chain[n - 2].timestamp).max(0)),
        }
    }

    pub fn get_balance(&self, address: &str) -> u64 {
        self.state().ledger.get_balance(address)
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.state().pending.clone()
    }

    /// Validity, length and difficulty read under a single lock.
    pub fn chain_status(&self) -> ChainStatus {
        let state = self.state();
        ChainStatus {
            valid: state.blockchain.is_valid_chain(),
            length: state.blockchain.len(),
            difficulty: state.blockchain.difficulty(),
        }
    }

    pub fn register_peer(&self, raw: &str) -> Option<String> {
        let peer = self.peers.add(raw)?;
        debug!("registered peer {peer}");
        Some(peer)
    }

    pub fn peers(&self) -> Vec<String> {
        self.peers.all()
    }

    /// Queue a transaction for the next block. Returns the index of the block
    /// it is expected to land in.
    pub fn create_transaction(&self, tx: Transaction) -> Result<u64, RejectionReason> {
        if let Sender::Address(sender) = &tx.sender {
            let Some(public_key) = public_key_from_address(sender) else {
                warn!("rejecting transaction from {sender}: not a public key");
                return Err(RejectionReason::UnknownSender);
            };
            if !tx.is_valid(Some(&public_key)) {
                warn!("rejecting transaction from {sender}: signature invalid");
                return Err(RejectionReason::InvalidSignature);
            }
        }

        let mut state = self.state();
        state.pending.push(tx);
        let hint = state.blockchain.last_block().index + 1;
        debug!("pending pool size now {}", state.pending.len());
        Ok(hint)
    }

    /// Seal the pending pool plus a reward for `miner` into a new block.
    ///
    /// The nonce search runs without the state lock. If another block is
    /// appended or a peer chain adopted meanwhile, the search stops and
    /// `MiningError::Cancelled` is returned; nothing is committed.
    pub fn mine_pending_transactions(&self, miner: &str) -> Result<MinedBlock, MineError> {
        let (mut block, difficulty, taken, generation) = {
            let state = self.state();
            // the tip only moves under this lock, so the pair stays consistent
            let generation = self.tip_generation.load(Ordering::SeqCst);
            let tip = state.blockchain.last_block();
            let mut txs = state.pending.clone();
            txs.push(Transaction::reward(miner, state.blockchain.mining_reward));
            let block = Block::new(
                tip.index + 1,
                Utc::now().timestamp(),
                txs,
                tip.hash.clone(),
            );
            (block, state.blockchain.difficulty(), state.pending.len(), generation)
        };

        block.mine_cancellable(difficulty, || {
            self.tip_generation.load(Ordering::SeqCst) != generation
        })?;

        let mut state = self.state();
        if self.tip_generation.load(Ordering::SeqCst) != generation {
            return Err(MiningError::Cancelled.into());
        }
        state.blockchain.append(block.clone())?;
        self.tip_generation.fetch_add(1, Ordering::SeqCst);
        // anything submitted while mining stays queued
        state.pending.drain(..taken);

        let mut unapplied = Vec::new();
        for tx in &block.transactions {
            if let Err(e) = state.ledger.apply(tx) {
                warn!(
                    "block #{}: ledger refused {:?} -> {} ({}): {e}",
                    block.index, tx.sender, tx.receiver, tx.amount
                );
                unapplied.push(tx.clone());
            }
        }

        info!(
            "sealed block #{} (hash={}, nonce={}, txs={})",
            block.index,
            block.hash,
            block.nonce,
            block.transactions.len()
        );
        Ok(MinedBlock { block, unapplied })
    }

    /// Abort any in-flight mining; it returns `MiningError::Cancelled`.
    pub fn cancel_mining(&self) {
        self.tip_generation.fetch_add(1, Ordering::SeqCst);
    }

    async fn fetch_candidate(&self, peer: &str) -> Option<Vec<Block>> {
        let result = match tokio::time::timeout(self.peer_timeout, self.fetcher.fetch(peer)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(peer.to_string())),
        };
        match result {
            Ok(rep) => Some(rep.chain),
            Err(e) => {
                warn!("skipping peer: {e}");
                None
            }
        }
    }

    /// Longest-valid-chain consensus against every known peer.
    ///
    /// Peers are queried concurrently, each under its own timeout. When a
    /// longer valid chain is adopted the pending pool is dropped and the
    /// ledger is replayed from the new genesis. Returns whether the local
    /// chain was replaced.
    pub async fn resolve_conflicts(&self) -> bool {
        let peers = self.peers.all();
        let candidates: Vec<Vec<Block>> = join_all(peers.iter().map(|p| self.fetch_candidate(p)))
            .await
            .into_iter()
            .flatten()
            .collect();

        let mut state = self.state();
        let difficulty = state.blockchain.difficulty();
        let Some(chain) = select_best_chain(state.blockchain.len(), candidates, difficulty) else {
            debug!("kept local chain (len={})", state.blockchain.len());
            return false;
        };

        let ledger = Ledger::replay(
            self.total_supply,
            chain.iter().flat_map(|b| b.transactions.iter()),
        );
        let dropped = state.pending.len();
        state.blockchain.replace_chain(chain);
        state.ledger = ledger;
        state.pending.clear();
        self.tip_generation.fetch_add(1, Ordering::SeqCst);

        info!(
            "adopted peer chain (len={}), dropped {} pending transactions",
            state.blockchain.len(),
            dropped
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::is_valid_chain;
    use crate::wallet::{address_of, generate_keypair};
    use async_trait::async_trait;
    use std::collections::HashMap;

    const DIFF: u32 = 2;

    /// Serves canned answers per peer; `None` means the peer hangs.
    #[derive(Default)]
    struct StubFetcher {
        answers: HashMap<String, Option<Vec<Block>>>,
    }

    #[async_trait]
    impl ChainFetcher for StubFetcher {
        async fn fetch(&self, peer: &str) -> Result<ChainRepresentation, FetchError> {
            match self.answers.get(peer) {
                Some(Some(chain)) => Ok(ChainRepresentation::new(chain.clone())),
                Some(None) => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Err(FetchError::Timeout(peer.to_string()))
                }
                None => Err(FetchError::Unreachable {
                    peer: peer.to_string(),
                    reason: "connection refused".into(),
                }),
            }
        }
    }

    fn test_config() -> NodeConfig {
        NodeConfig {
            difficulty: DIFF,
            peer_timeout: Duration::from_millis(100),
            ..NodeConfig::default()
        }
    }

    fn node_with(fetcher: StubFetcher) -> Node {
        Node::new(&test_config(), Arc::new(fetcher))
    }

    fn signed(sk: &secp256k1::SecretKey, from: &str, to: &str, amount: u64) -> Transaction {
        let mut tx = Transaction::new(Sender::Address(from.to_string()), to, amount);
        tx.sign(sk).unwrap();
        tx
    }

    #[test]
    fn transfer_then_mine_updates_balances() {
        let node = node_with(StubFetcher::default());
        let (sk_a, pk_a) = generate_keypair();
        let a = address_of(&pk_a);
        let (_, pk_b) = generate_keypair();
        let b = address_of(&pk_b);

        assert_eq!(node.create_transaction(signed(&sk_a, &a, &b, 10)), Ok(1));

        let mined = node.mine_pending_transactions("miner").unwrap();
        assert!(mined.unapplied.is_empty());
        assert_eq!(mined.block.index, 1);
        assert_eq!(mined.block.transactions.len(), 2);
        assert!(mined.block.transactions[1].is_reward());
        assert!(mined.block.hash.starts_with("00"));

        assert_eq!(
            node.chain_status(),
            ChainStatus {
                valid: true,
                length: 2,
                difficulty: DIFF
            }
        );
        assert!(node.pending_transactions().is_empty());
        assert_eq!(node.get_balance(&a), 1_000_000 - 10);
        assert_eq!(node.get_balance(&b), 10);
        assert_eq!(node.get_balance("miner"), 100);
    }

    #[test]
    fn forged_signature_is_rejected() {
        let node = node_with(StubFetcher::default());
        let (_, pk_a) = generate_keypair();
        let (sk_mallory, pk_mallory) = generate_keypair();
        let mallory = address_of(&pk_mallory);

        node.create_transaction(signed(&sk_mallory, &mallory, "x", 1)).unwrap();
        let before = node.pending_transactions();

        // signed by mallory, claims to be from a
        let mut forged = signed(&sk_mallory, &mallory, "mallory", 50);
        forged.sender = Sender::Address(address_of(&pk_a));
        assert_eq!(
            node.create_transaction(forged),
            Err(RejectionReason::InvalidSignature)
        );

        let unsigned = Transaction::new(Sender::Address(address_of(&pk_a)), "mallory", 50);
        assert_eq!(
            node.create_transaction(unsigned),
            Err(RejectionReason::InvalidSignature)
        );

        let bogus = Transaction::new(Sender::Address("alice".into()), "mallory", 50);
        assert_eq!(node.create_transaction(bogus), Err(RejectionReason::UnknownSender));

        assert_eq!(node.pending_transactions(), before);
    }

    #[test]
    fn overspend_is_reported_not_fatal() {
        let node = node_with(StubFetcher::default());
        let (sk, pk) = generate_keypair();
        let a = address_of(&pk);
        node.create_transaction(signed(&sk, &a, "b", 2_000_000)).unwrap();

        let mined = node.mine_pending_transactions("miner").unwrap();
        assert_eq!(mined.unapplied.len(), 1);
        assert_eq!(mined.unapplied[0].amount, 2_000_000);
        assert_eq!(node.height(), 2);
        assert_eq!(node.get_balance("b"), 0);
        assert_eq!(node.get_balance("miner"), 100);
    }

    #[test]
    fn empty_pool_still_mints_reward() {
        let node = node_with(StubFetcher::default());
        node.mine_pending_transactions("m").unwrap();
        node.mine_pending_transactions("m").unwrap();
        assert_eq!(node.height(), 3);
        assert_eq!(node.get_balance("m"), 200);
        assert!(node.chain_status().valid);
    }

    #[test]
    fn cancel_mining_stops_in_flight_search() {
        // unreachable target: only cancellation ends this search
        let node = Node::new(
            &NodeConfig {
                difficulty: 64,
                ..test_config()
            },
            Arc::new(StubFetcher::default()),
        );
        let (sk, pk) = generate_keypair();
        let a = address_of(&pk);
        node.create_transaction(signed(&sk, &a, "b", 1)).unwrap();

        let result = std::thread::scope(|s| {
            let miner = s.spawn(|| node.mine_pending_transactions("m"));
            while !miner.is_finished() {
                node.cancel_mining();
                std::thread::sleep(Duration::from_millis(10));
            }
            miner.join().unwrap()
        });

        assert!(matches!(result, Err(MineError::Mining(MiningError::Cancelled))));
        assert_eq!(node.height(), 1);
        assert_eq!(node.pending_transactions().len(), 1);
        assert_eq!(node.get_balance("m"), 0);
    }

    #[test]
    fn tip_change_before_snapshot_does_not_cancel() {
        let node = node_with(StubFetcher::default());
        let result = std::thread::scope(|s| {
            // the miner blocks on the snapshot while the tip generation moves
            let held = node.state();
            let miner = s.spawn(|| node.mine_pending_transactions("m"));
            std::thread::sleep(Duration::from_millis(50));
            node.cancel_mining();
            drop(held);
            miner.join().unwrap()
        });

        let mined = result.unwrap();
        assert_eq!(mined.block.index, 1);
        assert_eq!(node.height(), 2);
        assert_eq!(node.get_balance("m"), 100);
    }

    /// Chain of `len` blocks mined at `DIFF`, rewarding `miner` each time.
    fn peer_chain(len: usize, miner: &str) -> Vec<Block> {
        let peer = node_with(StubFetcher::default());
        while peer.height() < len {
            peer.mine_pending_transactions(miner).unwrap();
        }
        peer.get_chain().chain
    }

    #[actix_web::test]
    async fn adopts_longest_valid_peer_chain() {
        let longer = peer_chain(4, "peer-miner");
        let mut tampered = peer_chain(6, "cheat");
        tampered[2].transactions[0].amount = 5_000;

        let mut answers = HashMap::new();
        answers.insert("a:1".to_string(), Some(longer.clone()));
        answers.insert("b:1".to_string(), Some(tampered));
        answers.insert("c:1".to_string(), None); // hangs
        let node = node_with(StubFetcher { answers });
        for p in ["a:1", "b:1", "c:1", "d:1"] {
            node.register_peer(p);
        }

        node.mine_pending_transactions("local").unwrap();
        let (sk, pk) = generate_keypair();
        let a = address_of(&pk);
        node.create_transaction(signed(&sk, &a, "b", 5)).unwrap();

        assert!(node.resolve_conflicts().await);
        assert_eq!(node.get_chain().chain, longer);
        assert!(node.pending_transactions().is_empty());
        assert_eq!(node.get_balance("local"), 0);
        assert_eq!(node.get_balance("peer-miner"), 300);

        // nothing longer left
        assert!(!node.resolve_conflicts().await);
    }

    #[actix_web::test]
    async fn keeps_local_chain_without_better_candidates() {
        let mut answers = HashMap::new();
        answers.insert("short:1".to_string(), Some(peer_chain(2, "p")));
        let node = node_with(StubFetcher { answers });
        node.register_peer("short:1");
        node.register_peer("down:1");
        node.mine_pending_transactions("local").unwrap();
        node.mine_pending_transactions("local").unwrap();

        let before = node.get_chain();
        assert!(!node.resolve_conflicts().await);
        assert_eq!(node.get_chain(), before);
        assert_eq!(node.get_balance("local"), 200);
    }

    #[actix_web::test]
    async fn mined_chain_validates_after_adoption() {
        let mut answers = HashMap::new();
        answers.insert("a:1".to_string(), Some(peer_chain(3, "p")));
        let node = node_with(StubFetcher { answers });
        node.register_peer("http://a:1/");

        assert!(node.resolve_conflicts().await);
        node.mine_pending_transactions("local").unwrap();
        let chain = node.get_chain().chain;
        assert_eq!(chain.len(), 4);
        assert!(is_valid_chain(&chain, DIFF));
        assert_eq!(node.get_balance("p"), 200);
        assert_eq!(node.get_balance("local"), 100);
    }
}
