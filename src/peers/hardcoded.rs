//! The bounded fallback peer list used when the seed/DNS-discovered peer
//! set is empty (spec.md §4.2). Persisted so a restart doesn't have to
//! reprobe from scratch, but always capped at `MAX_FALLBACK_PEERS` and
//! probed for liveness on load.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use super::persist;
use crate::error::Result;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Persisted {
    peers: Vec<String>,
    timestamp: i64,
    count: usize,
}

pub struct HardcodedPeers {
    path: PathBuf,
    max: usize,
}

impl HardcodedPeers {
    pub fn new(path: PathBuf, max: usize) -> Self {
        Self { path, max }
    }

    /// Loads the persisted list, falling back to `defaults` (truncated to
    /// `max`) when nothing has been persisted yet.
    pub fn load(&self, defaults: &[String]) -> Vec<String> {
        let persisted: Persisted = persist::load(&self.path);
        if persisted.peers.is_empty() {
            defaults.iter().take(self.max).cloned().collect()
        } else {
            persisted.peers.into_iter().take(self.max).collect()
        }
    }

    pub fn persist(&self, peers: &[String]) -> Result<()> {
        let truncated: Vec<String> = peers.iter().take(self.max).cloned().collect();
        let snapshot = Persisted {
            count: truncated.len(),
            peers: truncated,
            timestamp: chrono::Utc::now().timestamp(),
        };
        persist::save(&self.path, "hardcoded_peers.cbor", &snapshot)
    }

    /// Connects to every candidate in parallel with a short timeout and
    /// returns only the ones that accepted a TCP connection, capped at
    /// `max`. Used once at startup to prune stale fallback entries rather
    /// than discovering them dead mid-resolution.
    pub async fn probe_live(&self, candidates: &[String], connect_timeout: Duration) -> Vec<String> {
        let mut set = tokio::task::JoinSet::new();
        for addr in candidates.iter().cloned() {
            set.spawn(async move {
                match timeout(connect_timeout, TcpStream::connect(&addr)).await {
                    Ok(Ok(_)) => Some(addr),
                    _ => {
                        debug!(peer = %addr, "fallback peer unreachable during startup probe");
                        None
                    }
                }
            });
        }

        let mut live = Vec::new();
        while let Some(result) = set.join_next().await {
            if let Ok(Some(addr)) = result {
                live.push(addr);
            }
        }
        live.truncate(self.max);
        info!(live = live.len(), candidates = candidates.len(), "probed fallback peers");
        live
    }
}
