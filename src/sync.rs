//! Peer registry for TallyChain
//!
//! Holds the set of peer addresses this node reconciles its chain against.
//! Addresses are normalized to `host:port` and deduplicated; there is no
//! ordering, scoring or discovery.

use crate::error::ChainError;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Reduce `http://host:port/path` (or a bare `host:port`) to `host:port`.
pub fn normalize_address(address: &str) -> Result<String, ChainError> {
    let trimmed = address.trim();
    let without_scheme = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .unwrap_or(trimmed);
    let authority = without_scheme.split('/').next().unwrap_or_default();

    if authority.is_empty() || authority.chars().any(char::is_whitespace) {
        return Err(ChainError::NetworkError(format!(
            "Invalid peer address: {:?}",
            address
        )));
    }
    Ok(authority.to_string())
}

#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    peers: Arc<RwLock<HashSet<String>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer. Returns `true` if the address was not known before.
    pub async fn register(&self, address: &str) -> Result<bool, ChainError> {
        let address = normalize_address(address)?;
        let inserted = self.peers.write().await.insert(address.clone());
        if inserted {
            info!(peer = %address, "registered peer");
        }
        Ok(inserted)
    }

    /// Register a batch of peers. Every address is checked first; if any is
    /// invalid nothing is registered. Returns how many addresses were new.
    pub async fn register_all<S: AsRef<str>>(&self, addresses: &[S]) -> Result<usize, ChainError> {
        let normalized = addresses
            .iter()
            .map(|address| normalize_address(address.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut peers = self.peers.write().await;
        let mut added = 0;
        for address in normalized {
            if peers.insert(address.clone()) {
                info!(peer = %address, "registered peer");
                added += 1;
            }
        }
        Ok(added)
    }

    /// Snapshot of all known peers, sorted for stable output.
    pub async fn peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.peers.read().await.iter().cloned().collect();
        peers.sort();
        peers
    }

    pub async fn contains(&self, address: &str) -> bool {
        match normalize_address(address) {
            Ok(address) => self.peers.read().await.contains(&address),
            Err(_) => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }
}
