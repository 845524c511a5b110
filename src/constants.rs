/// Default aging-window length in blocks (spec.md §3, the chain's tree
/// interval).
pub const TREE_INTERVAL: u64 = 36;

/// Fallback TTL (seconds) applied when a synthesized response carries no
/// usable TTL of its own.
pub const DNS_CACHE_TTL_SECONDS: u32 = 300;

/// Cap on the verified-fallback peer list.
pub const MAX_FALLBACK_PEERS: usize = 10;

/// Full-node peer TCP port on mainnet.
pub const MAINNET_PORT: u16 = 12038;

/// Error count at which a peer is excluded from selection.
pub const MAX_ERRORS: u32 = 3;

/// Sweep popularity threshold: counters above this are prefetched instead
/// of dropped.
pub const POPULARITY_THRESHOLD: u32 = 2;

pub const PEER_CONNECT_TIMEOUT_MS: u64 = 3_000;
pub const PEER_READ_TIMEOUT_MS: u64 = 10_000;

pub const FORWARD_DNS_SERVER: &str = "1.1.1.1:53";
