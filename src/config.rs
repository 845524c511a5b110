//! Plain configuration data. Loading this from a file or environment is an
//! external collaborator's job (spec.md §1) — this module only defines the
//! knobs of spec.md §6 and their defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::blocklist::BlockingMode;

#[derive(Debug, Clone)]
pub struct Config {
    /// Aging-window length in blocks (default 36).
    pub tree_interval: u64,

    /// Fallback TTL used when a synthesized record carries none.
    pub dns_cache_ttl_seconds: u32,

    /// Cap on the verified-fallback peer list.
    pub max_fallback_peers: usize,

    /// Full-node peer TCP port.
    pub mainnet_port: u16,

    /// Error count at which a peer is excluded from selection.
    pub max_errors: u32,

    /// If true, the blacklist loader also consults the stricter list set.
    pub privacy_mode: bool,

    /// How a blocked domain is answered.
    pub blocking_mode: BlockingMode,

    /// Directory holding `peer_errors.cbor`, `fullnode_peers.cbor`,
    /// the fallback-peers file, and `adblock_blacklist.txt`.
    pub data_dir: PathBuf,

    /// Upstream conventional DNS server used for non-Handshake names.
    pub upstream_dns: std::net::SocketAddr,

    pub peer_connect_timeout: Duration,
    pub peer_read_timeout: Duration,

    /// Handshake TLDs this resolver treats as on-chain (everything else
    /// is forwarded to `upstream_dns`).
    pub handshake_tlds: Vec<String>,

    /// Bootstrap full-node peers consulted before any have been learned
    /// or persisted.
    pub seed_peers: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tree_interval: crate::constants::TREE_INTERVAL,
            dns_cache_ttl_seconds: crate::constants::DNS_CACHE_TTL_SECONDS,
            max_fallback_peers: crate::constants::MAX_FALLBACK_PEERS,
            mainnet_port: crate::constants::MAINNET_PORT,
            max_errors: crate::constants::MAX_ERRORS,
            privacy_mode: false,
            blocking_mode: BlockingMode::NxDomain,
            data_dir: PathBuf::from("."),
            upstream_dns: crate::constants::FORWARD_DNS_SERVER
                .parse()
                .expect("default upstream is a valid socket address"),
            peer_connect_timeout: Duration::from_millis(crate::constants::PEER_CONNECT_TIMEOUT_MS),
            peer_read_timeout: Duration::from_millis(crate::constants::PEER_READ_TIMEOUT_MS),
            handshake_tlds: Vec::new(),
            seed_peers: Vec::new(),
        }
    }
}

impl Config {
    pub fn is_handshake_tld(&self, tld: &str) -> bool {
        self.handshake_tlds.iter().any(|t| t == tld)
    }
}
