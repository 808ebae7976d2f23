use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::blockchain::{DEFAULT_DIFFICULTY, MINING_REWARD};
use crate::transaction::TOTAL_SUPPLY;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}: cannot parse {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("DIFFICULTY must be between 0 and 64, got {0}")]
    Difficulty(u32),
}

/// Node settings, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    pub difficulty: u32,
    pub mining_reward: u64,
    pub total_supply: u64,
    pub peer_timeout: Duration,
    pub peers: Vec<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: MINING_REWARD,
            total_supply: TOTAL_SUPPLY,
            peer_timeout: Duration::from_millis(3_000),
            peers: Vec::new(),
        }
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

impl NodeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key/value source; unset keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let d = Self::default();

        let difficulty = parse(&lookup, "DIFFICULTY", d.difficulty)?;
        if difficulty > 64 {
            return Err(ConfigError::Difficulty(difficulty));
        }

        let peers = lookup("PEERS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host: lookup("HOST").unwrap_or(d.host),
            port: parse(&lookup, "PORT", d.port)?,
            difficulty,
            mining_reward: parse(&lookup, "MINING_REWARD", d.mining_reward)?,
            total_supply: parse(&lookup, "TOTAL_SUPPLY", d.total_supply)?,
            peer_timeout: Duration::from_millis(parse(
                &lookup,
                "PEER_TIMEOUT_MS",
                d.peer_timeout.as_millis() as u64,
            )?),
            peers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<NodeConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        NodeConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(from_pairs(&[]).unwrap(), NodeConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let cfg = from_pairs(&[
            ("PORT", "5001"),
            ("DIFFICULTY", "2"),
            ("PEER_TIMEOUT_MS", "250"),
            ("PEERS", "http://a:1, b:2,,"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 5001);
        assert_eq!(cfg.difficulty, 2);
        assert_eq!(cfg.peer_timeout, Duration::from_millis(250));
        assert_eq!(cfg.peers, vec!["http://a:1".to_string(), "b:2".to_string()]);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(
            from_pairs(&[("PORT", "eighty")]),
            Err(ConfigError::Invalid {
                key: "PORT",
                value: "eighty".into()
            })
        );
        assert_eq!(from_pairs(&[("DIFFICULTY", "65")]), Err(ConfigError::Difficulty(65)));
    }
}
