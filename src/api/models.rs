use crate::blockchain::Block;
use crate::node::Node;
use crate::transaction::{Sender, Transaction};
use serde::{Deserialize, Serialize};

/// Shared application state: the node owns chain, pool, ledger and peers.
pub struct AppState {
    pub node: Node,
}

/* ---------- Chain API Models ---------- */

#[derive(Deserialize)]
pub struct MineRequest {
    pub miner_address: String,
}

#[derive(Serialize)]
pub struct MineResponse {
    pub block: Block,
    pub unapplied: usize,
}

/* ---------- TX API Models ---------- */

#[derive(Deserialize)]
pub struct NewTxRequest {
    pub sender: Option<String>,
    pub receiver: String,
    pub amount: u64,
    pub signature: Option<String>,
}

impl From<NewTxRequest> for Transaction {
    fn from(req: NewTxRequest) -> Self {
        Transaction {
            sender: Sender::from(req.sender),
            receiver: req.receiver,
            amount: req.amount,
            signature: req.signature,
        }
    }
}

#[derive(Serialize)]
pub struct NewTxResponse {
    pub block_index: u64,
}

#[derive(Serialize)]
pub struct MempoolResponse {
    pub size: usize,
    pub transactions: Vec<Transaction>,
}

/* ---------- Peer API Models ---------- */

#[derive(Deserialize)]
pub struct RegisterNodesRequest {
    pub nodes: Vec<String>,
}

#[derive(Serialize)]
pub struct NodesResponse {
    pub total_nodes: Vec<String>,
}

#[derive(Serialize)]
pub struct ResolveResponse {
    pub replaced: bool,
    pub length: usize,
}

#[derive(serde::Serialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: u64,
}

#[derive(serde::Serialize)]
pub struct StatsResponse {
    pub height: usize,
    pub difficulty: u32,
    pub last_interval_secs: Option<i64>,
    pub mempool_size: usize,
    pub peers: usize,
}
