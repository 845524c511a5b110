//! A trust-minimized recursive resolver for the Handshake naming
//! blockchain, plus a DANE/TLSA certificate verifier for names it
//! resolves.
//!
//! This crate is a library: it has no CLI or server loop of its own. A
//! caller supplies a [`config::Config`], an [`hsk::SpvClient`]
//! implementation (the headers-only chain client and peer-wire protocol
//! are out of scope here — see spec §1), and a data directory, and gets
//! back a [`Hskns`] handle to resolve names and verify certificates
//! through.

pub mod blocklist;
pub mod cache;
pub mod config;
pub mod constants;
pub mod dane;
pub mod dns;
pub mod error;
pub mod hsk;
pub mod metrics;
pub mod peers;
pub mod resolver;

use std::path::Path;
use std::sync::Arc;

pub use dane::{DaneOutcome, DaneVerifier};
pub use dns::DNSPacket;
pub use error::{HsknsError, Result};
pub use resolver::Resolver;

use blocklist::Blocklist;
use cache::ResponseCache;
use config::Config;
use hsk::SpvClient;
use peers::PeerRegistry;

/// The single composed value this crate hands callers (spec.md §9:
/// "prefer a single composed `Resolver` value constructed at startup and
/// threaded through"). Owns the resolver, the DANE verifier built on top
/// of it, and the metrics registry; lifetime is the application's.
pub struct Hskns {
    pub resolver: Arc<Resolver>,
    pub dane: DaneVerifier,
    pub metrics: Arc<metrics::HsknsMetrics>,
}

impl Hskns {
    /// Initialization order per spec.md §9: load persisted peer files,
    /// construct the cache, register the ad-block predicate, ready.
    pub fn init(data_dir: &Path, config: Config, spv: Arc<dyn SpvClient>) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;

        let metrics = Arc::new(metrics::HsknsMetrics::new().map_err(|err| {
            HsknsError::PersistenceFailure {
                what: "metrics registry",
                source: Arc::new(std::io::Error::other(err.to_string())),
            }
        })?);

        let peers = Arc::new(PeerRegistry::new(data_dir, &config).with_metrics(metrics.clone()));
        let cache = Arc::new(ResponseCache::new(config.tree_interval).with_metrics(metrics.clone()));

        let blocklist = Arc::new(Blocklist::new());
        let blacklist_path = config.data_dir.join("adblock_blacklist.txt");
        if blacklist_path.exists() {
            blocklist.reload(&blacklist_path)?;
        }

        let resolver = Arc::new(
            Resolver::new(config, cache, peers, spv, blocklist).with_metrics(metrics.clone()),
        );
        let dane = DaneVerifier::new(resolver.clone()).with_metrics(metrics.clone());

        Ok(Self {
            resolver,
            dane,
            metrics,
        })
    }
}
