//! Prometheus collectors for the components this crate actually owns: the
//! cache, the peer registry, and the DANE verifier. No HTTP exposition
//! surface — handing the registry to an HTTP endpoint is an external
//! collaborator's job (spec.md §1).

use prometheus::{opts, IntCounter, IntCounterVec, IntGauge, Registry};

pub struct HsknsMetrics {
    registry: Registry,

    pub cache_hits: IntCounter,
    pub cache_misses: IntCounter,
    pub cache_size: IntGauge,
    pub cache_swept_dropped: IntCounter,
    pub cache_swept_prefetched: IntCounter,

    pub peer_errors: IntCounter,
    pub peer_proof_successes: IntCounter,
    pub peer_notfound: IntCounter,
    pub peer_exclusion_resets: IntCounter,

    pub blocked_queries: IntCounter,

    pub dane_results: IntCounterVec,
}

impl HsknsMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let cache_hits = IntCounter::with_opts(opts!("hskns_cache_hits_total", "Total cache hits"))?;
        let cache_misses =
            IntCounter::with_opts(opts!("hskns_cache_misses_total", "Total cache misses"))?;
        let cache_size = IntGauge::with_opts(opts!("hskns_cache_size", "Current cache entry count"))?;
        let cache_swept_dropped = IntCounter::with_opts(opts!(
            "hskns_cache_swept_dropped_total",
            "Expired unpopular entries dropped by the sweep"
        ))?;
        let cache_swept_prefetched = IntCounter::with_opts(opts!(
            "hskns_cache_swept_prefetched_total",
            "Expired popular entries queued for prefetch by the sweep"
        ))?;

        let peer_errors = IntCounter::with_opts(opts!(
            "hskns_peer_errors_total",
            "Total connection/proof errors recorded against peers"
        ))?;
        let peer_proof_successes = IntCounter::with_opts(opts!(
            "hskns_peer_proof_successes_total",
            "Total successful name-tree proofs received"
        ))?;
        let peer_notfound = IntCounter::with_opts(opts!(
            "hskns_peer_notfound_total",
            "Total notfound responses from full-node peers"
        ))?;
        let peer_exclusion_resets = IntCounter::with_opts(opts!(
            "hskns_peer_exclusion_resets_total",
            "Times every candidate peer was excluded and error counts were cleared"
        ))?;

        let blocked_queries = IntCounter::with_opts(opts!(
            "hskns_blocked_queries_total",
            "Queries answered with a sinkhole due to the ad-block filter"
        ))?;

        let dane_results = IntCounterVec::new(
            opts!("hskns_dane_results_total", "DANE verification outcomes"),
            &["outcome"],
        )?;

        registry.register(Box::new(cache_hits.clone()))?;
        registry.register(Box::new(cache_misses.clone()))?;
        registry.register(Box::new(cache_size.clone()))?;
        registry.register(Box::new(cache_swept_dropped.clone()))?;
        registry.register(Box::new(cache_swept_prefetched.clone()))?;
        registry.register(Box::new(peer_errors.clone()))?;
        registry.register(Box::new(peer_proof_successes.clone()))?;
        registry.register(Box::new(peer_notfound.clone()))?;
        registry.register(Box::new(peer_exclusion_resets.clone()))?;
        registry.register(Box::new(blocked_queries.clone()))?;
        registry.register(Box::new(dane_results.clone()))?;

        Ok(Self {
            registry,
            cache_hits,
            cache_misses,
            cache_size,
            cache_swept_dropped,
            cache_swept_prefetched,
            peer_errors,
            peer_proof_successes,
            peer_notfound,
            peer_exclusion_resets,
            blocked_queries,
            dane_results,
        })
    }

    pub fn record_dane_outcome(&self, outcome: &str) {
        self.dane_results.with_label_values(&[outcome]).inc();
    }

    /// Renders every registered metric in Prometheus text exposition
    /// format; handing this string to an HTTP handler is left to the
    /// caller.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        use prometheus::{Encoder, TextEncoder};
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}

impl Default for HsknsMetrics {
    fn default() -> Self {
        Self::new().expect("metric registration with static names cannot fail")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_registers_without_error() {
        let metrics = HsknsMetrics::new().unwrap();
        metrics.cache_hits.inc();
        metrics.record_dane_outcome("ok");
        let exported = metrics.export().unwrap();
        assert!(exported.contains("hskns_cache_hits_total"));
        assert!(exported.contains("hskns_dane_results_total"));
    }
}
