use std::collections::BTreeSet;
use std::sync::Mutex;

use reqwest::Url;

/// Known peers as `host:port`. Kept sorted so fork-choice walks them in a
/// stable order.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: Mutex<BTreeSet<String>>,
}

/// Reduce `http://host:port/...` to `host:port`; bare `host:port` is kept.
pub fn normalize_peer(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match Url::parse(raw) {
        Ok(url) if url.has_host() => {
            let host = url.host_str()?;
            Some(match url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            })
        }
        // "127.0.0.1:5001" has no scheme, "localhost:5001" parses as scheme "localhost"
        _ => Some(raw.trim_end_matches('/').to_string()),
    }
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer. Returns the normalized id, or `None` if the input is empty.
    pub fn add(&self, raw: &str) -> Option<String> {
        let peer = normalize_peer(raw)?;
        self.peers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(peer.clone());
        Some(peer)
    }

    pub fn all(&self) -> Vec<String> {
        self.peers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}
