use std::sync::Arc;
use thiserror::Error;

/// Unified error type for the resolver, cache, peer registry and DANE
/// verifier — the error taxonomy of spec.md §7.
#[derive(Debug, Clone, Error)]
pub enum HsknsError {
    #[error("io error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("dns wire format error: {0}")]
    Parse(#[from] crate::dns::ParseError),

    /// Every candidate peer refused or timed out.
    #[error("no peer reachable for {name}")]
    Unreachable { name: String },

    /// Every responding full node returned `notfound`.
    #[error("name not found on chain: {name}")]
    NotFound { name: String },

    /// A peer's response failed structural or cryptographic checks.
    #[error("bad proof from peer {peer}: {reason}")]
    BadProof { peer: String, reason: String },

    /// Cached bytes failed to parse back into a `DNSPacket`.
    #[error("cache entry for {name} is corrupt")]
    CacheCorrupt { name: String },

    /// Persisting peer/cache state to disk failed; in-memory state is
    /// still authoritative.
    #[error("failed to persist {what}: {source}")]
    PersistenceFailure {
        what: &'static str,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// DANE on a non-443 port, or a TLSA record with an unsupported
    /// usage/selector/matching combination.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// DANE: TLSA records exist but none matched the presented chain.
    #[error("presented certificate chain does not match any TLSA record")]
    Mismatch,
}

impl From<std::io::Error> for HsknsError {
    fn from(err: std::io::Error) -> Self {
        HsknsError::Io(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, HsknsError>;
