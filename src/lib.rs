//! Proof-of-work ledger node: signed transfers, mined blocks, balance
//! accounting and longest-valid-chain consensus, served over HTTP.

pub mod api;
pub mod blockchain;
pub mod config;
pub mod network;
pub mod node;
pub mod transaction;
pub mod wallet;
