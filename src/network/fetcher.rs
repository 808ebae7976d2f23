use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blockchain::Block;

/// A node's chain as published on `GET /api/v1/chain/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRepresentation {
    pub length: usize,
    pub chain: Vec<Block>,
}

impl ChainRepresentation {
    pub fn new(chain: Vec<Block>) -> Self {
        Self {
            length: chain.len(),
            chain,
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("peer {peer} unreachable: {reason}")]
    Unreachable { peer: String, reason: String },
    #[error("peer {peer} answered with status {status}")]
    Status { peer: String, status: u16 },
    #[error("peer {peer} sent a malformed chain: {reason}")]
    Malformed { peer: String, reason: String },
    #[error("peer {0} timed out")]
    Timeout(String),
}

/// Source of candidate chains for fork-choice.
#[async_trait]
pub trait ChainFetcher: Send + Sync {
    async fn fetch(&self, peer: &str) -> Result<ChainRepresentation, FetchError>;
}

/// Fetches `http://{peer}/api/v1/chain/`.
pub struct HttpChainFetcher {
    client: reqwest::Client,
}

impl HttpChainFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ChainFetcher for HttpChainFetcher {
    async fn fetch(&self, peer: &str) -> Result<ChainRepresentation, FetchError> {
        let url = format!("http://{peer}/api/v1/chain/");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Unreachable {
                peer: peer.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                peer: peer.to_string(),
                status: status.as_u16(),
            });
        }

        let rep = resp
            .json::<ChainRepresentation>()
            .await
            .map_err(|e| FetchError::Malformed {
                peer: peer.to_string(),
                reason: e.to_string(),
            })?;

        if rep.length != rep.chain.len() {
            return Err(FetchError::Malformed {
                peer: peer.to_string(),
                reason: format!("claims {} blocks, sent {}", rep.length, rep.chain.len()),
            });
        }
        Ok(rep)
    }
}
