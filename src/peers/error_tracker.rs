//! General TCP/peer connection error tracking (spec.md §4.2).
//! `FullNodePeers` has its own, stricter semantics and does not use this
//! tracker — this one is for plain connection failures, independent of
//! whether the peer ever answered a name-proof query.

use std::collections::HashMap;
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::persist;
use crate::error::Result;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Persisted {
    errors: HashMap<String, u32>,
    timestamp: i64,
}

pub struct PeerErrorTracker {
    errors: Mutex<HashMap<String, u32>>,
    max_errors: u32,
    path: PathBuf,
}

impl PeerErrorTracker {
    pub fn new(path: PathBuf, max_errors: u32) -> Self {
        let persisted: Persisted = persist::load(&path);
        Self {
            errors: Mutex::new(persisted.errors),
            max_errors,
            path,
        }
    }

    pub fn should_exclude(&self, peer: &str) -> bool {
        self.errors.lock().get(peer).copied().unwrap_or(0) >= self.max_errors
    }

    pub fn record_error(&self, peer: &str) -> Result<()> {
        {
            let mut errors = self.errors.lock();
            *errors.entry(peer.to_string()).or_insert(0) += 1;
        }
        debug!(peer, "recorded peer connection error");
        self.persist()
    }

    pub fn reset_errors(&self, peer: &str) -> Result<()> {
        {
            self.errors.lock().remove(peer);
        }
        self.persist()
    }

    pub fn reset_all(&self) -> Result<()> {
        {
            self.errors.lock().clear();
        }
        self.persist()
    }

    /// Drops candidates over the connection-error threshold. Unlike
    /// `FullNodePeers::filter_excluded`, this tracker does not itself
    /// implement the "clear everything if the whole pool is excluded"
    /// recovery rule — that's handled once, downstream, by the full-node
    /// reputation filter the result is chained into.
    pub fn filter_excluded(&self, candidates: &[String]) -> Vec<String> {
        candidates
            .iter()
            .filter(|p| !self.should_exclude(p))
            .cloned()
            .collect()
    }

    fn persist(&self) -> Result<()> {
        let snapshot = Persisted {
            errors: self.errors.lock().clone(),
            timestamp: chrono::Utc::now().timestamp(),
        };
        persist::save(&self.path, "peer_errors.cbor", &snapshot)
    }
}
