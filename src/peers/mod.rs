//! Full-node peer registry (spec.md §4.2): the bounded fallback list, the
//! per-peer connection-error tracker, and the reputation-weighted
//! selection algorithm, composed behind a single entry point the resolver
//! calls into.

mod error_tracker;
mod fullnode;
mod hardcoded;
mod persist;

pub use error_tracker::PeerErrorTracker;
pub use fullnode::{FullNodePeers, Selection};
pub use hardcoded::HardcodedPeers;

use std::path::Path;
use std::time::Duration;

use tracing::warn;

use crate::config::Config;
use crate::error::Result;
use crate::metrics::HsknsMetrics;
use std::sync::Arc;

/// Owns every peer-related store and exposes the one operation the
/// resolver actually needs: "give me a peer to ask, and somewhere to fall
/// back to if it fails."
pub struct PeerRegistry {
    fullnode: FullNodePeers,
    connection_errors: PeerErrorTracker,
    hardcoded: HardcodedPeers,
    seed_peers: Vec<String>,
}

impl PeerRegistry {
    pub fn new(state_dir: &Path, config: &Config) -> Self {
        let fullnode = FullNodePeers::new(state_dir.join("fullnode_peers.cbor"), crate::constants::MAX_ERRORS);
        let connection_errors =
            PeerErrorTracker::new(state_dir.join("peer_errors.cbor"), crate::constants::MAX_ERRORS);
        let hardcoded = HardcodedPeers::new(state_dir.join("hardcoded_peers.cbor"), crate::constants::MAX_FALLBACK_PEERS);
        Self {
            fullnode,
            connection_errors,
            hardcoded,
            seed_peers: config.seed_peers.clone(),
        }
    }

    /// Opts the full-node reputation store into recording a metric when
    /// it has to clear every peer's error count (spec.md §4.2 step 1's
    /// recovery rule, spec.md §8's "exclusion recovery" property).
    pub fn with_metrics(mut self, metrics: Arc<HsknsMetrics>) -> Self {
        self.fullnode = self.fullnode.with_metrics(metrics);
        self
    }

    /// Probes the persisted fallback list (or the configured seed peers,
    /// the first time) for liveness. Should run once at startup.
    pub async fn refresh_fallback_peers(&self) {
        let candidates = self.hardcoded.load(&self.seed_peers);
        let live = self
            .hardcoded
            .probe_live(&candidates, Duration::from_millis(crate::constants::PEER_CONNECT_TIMEOUT_MS))
            .await;
        if let Err(err) = self.hardcoded.persist(&live) {
            warn!(error = %err, "failed to persist refreshed fallback peer list");
        }
    }

    fn candidate_pool(&self) -> Vec<String> {
        let persisted = self.hardcoded.load(&self.seed_peers);
        if persisted.is_empty() {
            self.seed_peers.clone()
        } else {
            persisted
        }
    }

    /// Runs the full spec.md §4.2 selection pipeline: exclude peers over
    /// the connection-error threshold, then hand the rest to the
    /// full-node reputation selector.
    ///
    /// spec.md §4.2 step 1's "never blacklist every peer at once" recovery
    /// has to apply across *both* exclusion filters, not just the
    /// full-node one: if the connection tracker alone excludes the whole
    /// pool, `fullnode.filter_excluded` receives an empty slice and (by
    /// its own contract) leaves it empty rather than recovering, since it
    /// has nothing to tell it the pool wasn't empty to begin with. Reset
    /// the connection tracker first in that case so the full-node filter
    /// still gets the real pool to work with.
    pub fn select_peer(&self, name_hash: &[u8; 32]) -> Option<Selection> {
        let pool = self.candidate_pool();
        let mut filtered = self.connection_errors.filter_excluded(&pool);
        if filtered.is_empty() && !pool.is_empty() {
            if let Err(err) = self.connection_errors.reset_all() {
                warn!(error = %err, "failed to persist connection-error reset during recovery");
            }
            filtered = pool.clone();
        }
        let filtered = self.fullnode.filter_excluded(&filtered).ok()?;
        self.fullnode.select(name_hash, &filtered)
    }

    pub fn record_connection_error(&self, peer: &str) -> Result<()> {
        self.connection_errors.record_error(peer)
    }

    pub fn record_proof_success(&self, peer: &str, advertised_network: bool) -> Result<()> {
        self.connection_errors.reset_errors(peer)?;
        self.fullnode.record_success(peer, advertised_network)
    }

    pub fn record_notfound(&self, peer: &str) -> Result<()> {
        self.fullnode.record_notfound(peer)
    }
}
