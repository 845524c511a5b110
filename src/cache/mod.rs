//! Response cache keyed on `(qname, qtype, qclass)` with a two-phase aging
//! policy driven by a blockchain-height clock (spec.md §4.1).
//!
//! Block height is a tamper-resistant clock tied to the proof validity
//! window: the 36-block aging interval matches the on-chain name-tree
//! commitment cadence, so a decision to refetch roughly coincides with the
//! opportunity for a new committed proof.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::dns::{DNSPacket, DNSResourceClass, DNSResourceType};
use crate::metrics::HsknsMetrics;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub name: String,
    pub qtype: DNSResourceType,
    pub qclass: DNSResourceClass,
}

impl CacheKey {
    pub fn new(name: &str, qtype: DNSResourceType, qclass: DNSResourceClass) -> Self {
        Self {
            name: name.trim_end_matches('.').to_lowercase(),
            qtype,
            qclass,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    bytes: Vec<u8>,
    expiry_ms: u64,
    counter: u32,
    last_count_reset_height: u64,
    last_access_height: u64,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Applies the aging-window reset rule in place and returns the
/// post-reset, pre-increment counter baseline. Shared between `get` and
/// the sweep so both observe the same window boundary.
fn maybe_reset_window(entry: &mut CacheEntry, current_height: u64, tree_interval: u64) {
    if current_height.saturating_sub(entry.last_count_reset_height) >= tree_interval {
        entry.counter = 0;
        entry.last_count_reset_height = current_height;
    }
}

pub struct ResponseCache {
    entries: DashMap<CacheKey, CacheEntry>,
    tree_interval: u64,
    prefetch_tx: mpsc::UnboundedSender<CacheKey>,
    prefetch_rx: parking_lot::Mutex<Option<mpsc::UnboundedReceiver<CacheKey>>>,
    metrics: Option<Arc<HsknsMetrics>>,
}

impl ResponseCache {
    pub fn new(tree_interval: u64) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            entries: DashMap::new(),
            tree_interval,
            prefetch_tx: tx,
            prefetch_rx: parking_lot::Mutex::new(Some(rx)),
            metrics: None,
        }
    }

    /// Opts the sweep into recording `cache_swept_dropped`/
    /// `cache_swept_prefetched` (SPEC_FULL §2's "evictions/prefetches"
    /// metric coverage) at the same point it logs them.
    pub fn with_metrics(mut self, metrics: Arc<HsknsMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Takes the receiving half of the prefetch channel so a caller can
    /// spawn the worker that drains it and re-resolves each key (spec.md
    /// §5 / §9's sweeper-pushes/worker-drains split). Returns `None` if
    /// already taken.
    pub fn take_prefetch_receiver(&self) -> Option<mpsc::UnboundedReceiver<CacheKey>> {
        self.prefetch_rx.lock().take()
    }

    /// spec.md §4.1 `get`: returns the stored bytes regardless of
    /// wall-clock expiry — freshness is a caller/sweep decision, not a
    /// lazy-eviction one.
    pub fn get(&self, key: &CacheKey, current_height: u64) -> Option<Vec<u8>> {
        let mut entry = self.entries.get_mut(key)?;
        maybe_reset_window(&mut entry, current_height, self.tree_interval);
        entry.counter += 1;
        entry.last_access_height = current_height;
        trace!(name = %key.name, counter = entry.counter, "cache hit");
        Some(entry.bytes.clone())
    }

    pub fn put(&self, key: CacheKey, bytes: Vec<u8>, ttl_sec: u32, current_height: u64) {
        let expiry_ms = now_ms() + ttl_sec as u64 * 1000;
        debug!(name = %key.name, ttl_sec, "caching response");
        self.entries.insert(
            key,
            CacheEntry {
                bytes,
                expiry_ms,
                counter: 0,
                last_count_reset_height: current_height,
                last_access_height: current_height,
            },
        );
    }

    pub fn remove(&self, key: &CacheKey) {
        self.entries.remove(key);
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// spec.md §4.1 sweep. Expired + popular (`counter > 2`) entries are
    /// prefetched and kept; expired + unpopular entries are dropped;
    /// non-expired entries are untouched. Returns the number of entries
    /// that were dropped, for callers that want a log line.
    pub fn cleanup_expired_entries(&self, current_height: u64) -> usize {
        let now = now_ms();
        let mut to_drop = Vec::new();
        let mut to_prefetch = Vec::new();

        for mut entry in self.entries.iter_mut() {
            if now <= entry.expiry_ms {
                continue;
            }
            maybe_reset_window(&mut entry, current_height, self.tree_interval);
            if entry.counter > crate::constants::POPULARITY_THRESHOLD {
                to_prefetch.push(entry.key().clone());
            } else {
                to_drop.push(entry.key().clone());
            }
        }

        for key in &to_prefetch {
            // Best-effort: a closed receiver (no worker spawned yet) just
            // means prefetch is a no-op this sweep, not an error.
            let _ = self.prefetch_tx.send(key.clone());
        }
        if let Some(metrics) = &self.metrics {
            if !to_prefetch.is_empty() {
                metrics.cache_swept_prefetched.inc_by(to_prefetch.len() as u64);
            }
        }

        let dropped = to_drop.len();
        for key in to_drop {
            self.entries.remove(&key);
        }
        if dropped > 0 {
            debug!(dropped, "swept unpopular expired cache entries");
            if let Some(metrics) = &self.metrics {
                metrics.cache_swept_dropped.inc_by(dropped as u64);
            }
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parses cached wire bytes back into a `DNSPacket`, surfacing
/// `CacheCorrupt` (and removing the entry) instead of panicking — spec.md
/// §4.3's "corrupt cached bytes must be deleted and the query retried".
pub fn decode_cached(cache: &ResponseCache, key: &CacheKey, bytes: &[u8]) -> Option<DNSPacket> {
    match DNSPacket::from_wire(bytes) {
        Ok(packet) => Some(packet),
        Err(_) => {
            cache.remove(key);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> CacheKey {
        CacheKey::new("site.hns", DNSResourceType::A, DNSResourceClass::IN)
    }

    #[test]
    fn put_then_get_returns_the_just_inserted_bytes() {
        let cache = ResponseCache::new(36);
        cache.put(key(), vec![1, 2, 3], 300, 100);
        assert_eq!(cache.get(&key(), 100), Some(vec![1, 2, 3]));
    }

    #[test]
    fn put_then_remove_leaves_get_returning_none() {
        let cache = ResponseCache::new(36);
        cache.put(key(), vec![1, 2, 3], 300, 100);
        cache.remove(&key());
        assert_eq!(cache.get(&key(), 100), None);
    }

    #[test]
    fn get_within_one_window_only_increments_counter() {
        let cache = ResponseCache::new(36);
        cache.put(key(), vec![9], 300, 1000);
        cache.get(&key(), 1010);
        cache.get(&key(), 1020);
        let entry = cache.entries.get(&key()).unwrap();
        assert_eq!(entry.counter, 2);
        assert_eq!(entry.last_count_reset_height, 1000);
    }

    #[test]
    fn get_spanning_two_windows_resets_counter_to_one() {
        let cache = ResponseCache::new(36);
        cache.put(key(), vec![9], 300, 1000);
        cache.get(&key(), 1010); // counter = 1, same window
        cache.get(&key(), 1000 + 36); // window boundary crossed
        let entry = cache.entries.get(&key()).unwrap();
        assert_eq!(entry.counter, 1);
        assert_eq!(entry.last_count_reset_height, 1000 + 36);
    }

    #[tokio::test]
    async fn sweep_drops_unpopular_and_prefetches_popular_expired_entries() {
        let cache = ResponseCache::new(36);
        let mut rx = cache.take_prefetch_receiver().unwrap();

        // Three expired entries (ttl 0 means expiry == insert time, already
        // in the past by the time we sweep) with counters 1, 2, 5.
        let low = CacheKey::new("low.hns", DNSResourceType::A, DNSResourceClass::IN);
        let mid = CacheKey::new("mid.hns", DNSResourceType::A, DNSResourceClass::IN);
        let popular = CacheKey::new("popular.hns", DNSResourceType::A, DNSResourceClass::IN);

        for k in [&low, &mid, &popular] {
            cache.put(k.clone(), vec![0], 0, 100);
        }
        for _ in 0..1 {
            cache.get(&low, 100);
        }
        for _ in 0..2 {
            cache.get(&mid, 100);
        }
        for _ in 0..5 {
            cache.get(&popular, 100);
        }

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let dropped = cache.cleanup_expired_entries(100);

        assert_eq!(dropped, 2);
        assert!(!cache.contains(&low));
        assert!(!cache.contains(&mid));
        assert!(cache.contains(&popular));

        let prefetched = rx.try_recv().unwrap();
        assert_eq!(prefetched, popular);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn sweep_increments_metrics_when_wired() {
        let metrics = Arc::new(crate::metrics::HsknsMetrics::new().unwrap());
        let cache = ResponseCache::new(36).with_metrics(metrics.clone());

        let dropped_key = CacheKey::new("dropped.hns", DNSResourceType::A, DNSResourceClass::IN);
        let prefetched_key = CacheKey::new("prefetched.hns", DNSResourceType::A, DNSResourceClass::IN);

        for k in [&dropped_key, &prefetched_key] {
            cache.put(k.clone(), vec![0], 0, 100);
        }
        cache.get(&dropped_key, 100);
        for _ in 0..5 {
            cache.get(&prefetched_key, 100);
        }

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        cache.cleanup_expired_entries(100);

        let exported = metrics.export().unwrap();
        assert!(exported.contains("hskns_cache_swept_dropped_total 1"));
        assert!(exported.contains("hskns_cache_swept_prefetched_total 1"));
    }
}
