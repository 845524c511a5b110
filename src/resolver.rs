//! The recursive resolver (spec.md §4.3): routes a query to the on-chain
//! Handshake path or conventional DNS, drives proof fetch through the peer
//! registry, and assembles the DNS response handed back to callers.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::blocklist::{Blocklist, BlockingMode};
use crate::cache::{decode_cached, CacheKey, ResponseCache};
use crate::config::Config;
use crate::dns::{
    extract_tld, DNSPacket, DNSQuestion, DNSResource, DNSResourceClass, DNSResourceType, DnsRCode,
    RData,
};
use crate::error::{HsknsError, Result};
use crate::hsk::{self, HskResource, ProofResult, SpvClient};
use crate::metrics::HsknsMetrics;
use crate::peers::PeerRegistry;

pub struct Resolver {
    config: Config,
    cache: Arc<ResponseCache>,
    peers: Arc<PeerRegistry>,
    spv: Arc<dyn SpvClient>,
    blocklist: Arc<Blocklist>,
    metrics: Option<Arc<HsknsMetrics>>,
}

impl Resolver {
    pub fn new(
        config: Config,
        cache: Arc<ResponseCache>,
        peers: Arc<PeerRegistry>,
        spv: Arc<dyn SpvClient>,
        blocklist: Arc<Blocklist>,
    ) -> Self {
        Self {
            config,
            cache,
            peers,
            spv,
            blocklist,
            metrics: None,
        }
    }

    /// Opts this resolver into Prometheus observation at its decision
    /// points (sinkhole, cache hit/miss, peer outcome), mirroring
    /// heimdall's `Option<Arc<DnsMetrics>>` field on its own resolver.
    pub fn with_metrics(mut self, metrics: Arc<HsknsMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// spec.md §4.3's public operation. Cancellation-safe: every mutation
    /// to peer or cache state happens only after its network exchange has
    /// fully completed (spec.md §5).
    pub async fn resolve(&self, name: &str, qtype: DNSResourceType) -> Result<Option<DNSPacket>> {
        if self.blocklist.is_blocked(name) && matches!(qtype, DNSResourceType::A | DNSResourceType::AAAA) {
            debug!(name, "blocked domain, returning sinkhole");
            if let Some(metrics) = &self.metrics {
                metrics.blocked_queries.inc();
            }
            return Ok(Some(self.sinkhole(name, qtype)));
        }

        let tld = extract_tld(name);
        if self.config.is_handshake_tld(&tld) {
            self.resolve_handshake(name, &tld, qtype).await
        } else {
            self.resolve_conventional(name, qtype).await
        }
    }

    fn sinkhole(&self, name: &str, qtype: DNSResourceType) -> DNSPacket {
        let question = DNSQuestion {
            labels: name.split('.').filter(|l| !l.is_empty()).map(str::to_string).collect(),
            qtype,
            qclass: DNSResourceClass::IN,
        };
        match self.config.blocking_mode {
            BlockingMode::NxDomain => DNSPacket::respond(0, question, DnsRCode::NxDomain),
            BlockingMode::ZeroIp => {
                let mut packet = DNSPacket::respond(0, question.clone(), DnsRCode::NoError);
                packet.answers.push(DNSResource {
                    name: name.to_string(),
                    rtype: qtype,
                    rclass: DNSResourceClass::IN,
                    ttl: self.config.dns_cache_ttl_seconds,
                    rdata: RData::A(Ipv4Addr::UNSPECIFIED),
                });
                packet
            }
            BlockingMode::CustomIp(ip) => {
                let mut packet = DNSPacket::respond(0, question, DnsRCode::NoError);
                if let std::net::IpAddr::V4(v4) = ip {
                    packet.answers.push(DNSResource {
                        name: name.to_string(),
                        rtype: qtype,
                        rclass: DNSResourceClass::IN,
                        ttl: self.config.dns_cache_ttl_seconds,
                        rdata: RData::A(v4),
                    });
                }
                packet
            }
        }
    }

    async fn resolve_handshake(&self, name: &str, tld: &str, qtype: DNSResourceType) -> Result<Option<DNSPacket>> {
        let height = self.spv.current_height();
        let qname_key = CacheKey::new(name, qtype, DNSResourceClass::IN);

        if let Some(bytes) = self.cache.get(&qname_key, height) {
            if let Some(packet) = decode_cached(&self.cache, &qname_key, &bytes) {
                if let Some(metrics) = &self.metrics {
                    metrics.cache_hits.inc();
                    metrics.cache_size.set(self.cache.len() as i64);
                }
                return Ok(Some(packet));
            }
            debug!(name, "cached entry was corrupt, retrying as a miss");
        }
        if let Some(metrics) = &self.metrics {
            metrics.cache_misses.inc();
        }

        // DS/TLSA are published at the exact queried name; everything
        // else (A/AAAA/NS/TXT under a Handshake TLD) is resolved from the
        // TLD's own proof, which carries NS + GLUE records.
        let proof_target = match qtype {
            DNSResourceType::DS | DNSResourceType::TLSA => name.to_string(),
            _ => tld.to_string(),
        };

        let records = match self.fetch_proof(&proof_target).await? {
            None => return Ok(None),
            Some(None) => {
                let question = DNSQuestion {
                    labels: name.split('.').filter(|l| !l.is_empty()).map(str::to_string).collect(),
                    qtype,
                    qclass: DNSResourceClass::IN,
                };
                return Ok(Some(DNSPacket::respond(0, question, DnsRCode::NxDomain)));
            }
            Some(Some(records)) => records,
        };

        let decoded: Vec<DNSResource> = records
            .iter()
            .filter_map(|r| match hsk::decode_record(&proof_target, r) {
                Ok(rr) => Some(rr),
                Err(err) => {
                    warn!(proof_target, error = %err, "skipping undecodable record");
                    None
                }
            })
            .collect();

        if proof_target != name {
            // Exact-name proof (DS/TLSA): the decoded records already
            // carry the right owner name, cache them directly.
            let answer = self.build_answer(name, qtype, &decoded);
            self.cache_and_return(qname_key, height, answer)
        } else {
            // TLD proof: synthesize and cache the tld/NS entry
            // independently, then synthesize the qname's own answer from
            // the same decode pass without sharing the cache entry
            // (spec.md §9's open question: keep these separate).
            let ns_key = CacheKey::new(tld, DNSResourceType::NS, DNSResourceClass::IN);
            let ns_packet = self.build_tld_packet(tld, &decoded);
            let ns_ttl = ns_packet.min_ttl(self.config.dns_cache_ttl_seconds);
            self.cache.put(ns_key, ns_packet.to_wire(), ns_ttl, height);

            let answer = self.build_answer(name, qtype, &decoded);
            self.cache_and_return(qname_key, height, answer)
        }
    }

    fn cache_and_return(&self, key: CacheKey, height: u64, packet: DNSPacket) -> Result<Option<DNSPacket>> {
        let ttl = packet.min_ttl(self.config.dns_cache_ttl_seconds);
        self.cache.put(key, packet.to_wire(), ttl, height);
        if let Some(metrics) = &self.metrics {
            metrics.cache_size.set(self.cache.len() as i64);
        }
        Ok(Some(packet))
    }

    fn build_tld_packet(&self, tld: &str, decoded: &[DNSResource]) -> DNSPacket {
        let question = DNSQuestion {
            labels: tld.split('.').filter(|l| !l.is_empty()).map(str::to_string).collect(),
            qtype: DNSResourceType::NS,
            qclass: DNSResourceClass::IN,
        };
        let mut packet = DNSPacket::respond(0, question, DnsRCode::NoError);
        for rr in decoded {
            match rr.rtype {
                DNSResourceType::NS => packet.authorities.push(rr.clone()),
                DNSResourceType::A | DNSResourceType::AAAA => packet.resources.push(rr.clone()),
                _ => {}
            }
        }
        packet
    }

    /// Builds the final answer for `(name, qtype)` out of a decoded
    /// record set, matching by owner name and type (spec.md §4.3 point 3).
    fn build_answer(&self, name: &str, qtype: DNSResourceType, decoded: &[DNSResource]) -> DNSPacket {
        let question = DNSQuestion {
            labels: name.split('.').filter(|l| !l.is_empty()).map(str::to_string).collect(),
            qtype,
            qclass: DNSResourceClass::IN,
        };
        let mut packet = DNSPacket::respond(0, question, DnsRCode::NoError);
        let normalized = name.trim_end_matches('.').to_lowercase();
        for rr in decoded {
            if rr.rtype == qtype && rr.name.trim_end_matches('.').to_lowercase() == normalized {
                packet.answers.push(rr.clone());
            }
        }
        packet
    }

    /// Selects a peer, requests a proof, and fails over per spec.md §4.2.
    /// `Ok(None)` means every candidate timed out/errored (caller surfaces
    /// SERVFAIL); `Ok(Some(None))` means every responding peer said
    /// `notfound`; `Ok(Some(Some(records)))` is a successful proof.
    async fn fetch_proof(&self, target: &str) -> Result<Option<Option<Vec<HskResource>>>> {
        let name_hash = name_hash(target);
        let Some(selection) = self.peers.select_peer(&name_hash) else {
            return Err(HsknsError::Unreachable { name: target.to_string() });
        };

        let mut candidates = vec![selection.chosen];
        candidates.extend(selection.ordered_rest);

        let mut any_notfound = false;
        for peer in candidates {
            let outcome = timeout(
                self.config.peer_connect_timeout + self.config.peer_read_timeout,
                self.spv.get_proof(
                    &peer,
                    target,
                    self.config.peer_connect_timeout,
                    self.config.peer_read_timeout,
                ),
            )
            .await;

            match outcome {
                Ok(Ok(ProofResult::Found {
                    records,
                    advertised_network,
                })) => {
                    if let Err(err) = self.peers.record_proof_success(&peer, advertised_network) {
                        warn!(peer, error = %err, "failed to persist proof success");
                    }
                    if let Some(metrics) = &self.metrics {
                        metrics.peer_proof_successes.inc();
                    }
                    info!(peer, target, "proof received");
                    return Ok(Some(Some(records)));
                }
                Ok(Ok(ProofResult::NotFound)) => {
                    any_notfound = true;
                    if let Err(err) = self.peers.record_notfound(&peer) {
                        warn!(peer, error = %err, "failed to persist notfound reputation hit");
                    }
                    if let Some(metrics) = &self.metrics {
                        metrics.peer_notfound.inc();
                    }
                    debug!(peer, target, "peer reported notfound");
                }
                Ok(Err(HsknsError::BadProof { reason, .. })) => {
                    warn!(peer, target, reason, "bad proof, trying next peer");
                    if let Err(err) = self.peers.record_connection_error(&peer) {
                        warn!(peer, error = %err, "failed to persist connection error");
                    }
                    if let Some(metrics) = &self.metrics {
                        metrics.peer_errors.inc();
                    }
                }
                Ok(Err(err)) => {
                    warn!(peer, target, error = %err, "peer connection error");
                    if let Err(err) = self.peers.record_connection_error(&peer) {
                        warn!(peer, error = %err, "failed to persist connection error");
                    }
                    if let Some(metrics) = &self.metrics {
                        metrics.peer_errors.inc();
                    }
                }
                Err(_) => {
                    warn!(peer, target, "peer timed out");
                    if let Err(err) = self.peers.record_connection_error(&peer) {
                        warn!(peer, error = %err, "failed to persist connection error");
                    }
                    if let Some(metrics) = &self.metrics {
                        metrics.peer_errors.inc();
                    }
                }
            }
        }

        if any_notfound {
            Ok(Some(None))
        } else {
            Ok(None)
        }
    }

    /// Conventional (non-Handshake) DNS forwarding over UDP, per spec.md
    /// §4.3 point 4. No caching beyond whatever the upstream resolver
    /// itself implies — this crate's cache is Handshake-specific.
    async fn resolve_conventional(&self, name: &str, qtype: DNSResourceType) -> Result<Option<DNSPacket>> {
        let query = DNSPacket::query(rand::random(), name, qtype);
        let wire = query.to_wire();

        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(self.config.upstream_dns).await?;
        socket.send(&wire).await?;

        let mut buf = [0u8; 4096];
        let len = match timeout(self.config.peer_read_timeout, socket.recv(&mut buf)).await {
            Ok(Ok(len)) => len,
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => {
                warn!(name, upstream = %self.config.upstream_dns, "conventional DNS forward timed out");
                return Ok(None);
            }
        };

        match DNSPacket::from_wire(&buf[..len]) {
            Ok(packet) => Ok(Some(packet)),
            Err(err) => Err(err.into()),
        }
    }
}

/// SHA-256 of the lowercased, trailing-dot-trimmed name — the 32-byte
/// `nameHash` spec.md §4.2's selection algorithm is keyed on.
pub fn name_hash(name: &str) -> [u8; 32] {
    let normalized = name.trim_end_matches('.').to_lowercase();
    let digest = ring::digest::digest(&ring::digest::SHA256, normalized.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(digest.as_ref());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct StubSpv {
        height: AtomicU64,
        response: ProofResult,
    }

    #[async_trait]
    impl SpvClient for StubSpv {
        fn current_height(&self) -> u64 {
            self.height.load(Ordering::Relaxed)
        }

        async fn get_proof(
            &self,
            _peer: &str,
            _name: &str,
            _connect_timeout: Duration,
            _read_timeout: Duration,
        ) -> Result<ProofResult> {
            Ok(self.response.clone())
        }
    }

    fn resolver_with(response: ProofResult, config: Config) -> (Resolver, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ResponseCache::new(config.tree_interval));
        let peers = Arc::new(PeerRegistry::new(dir.path(), &config));
        let spv = Arc::new(StubSpv {
            height: AtomicU64::new(100),
            response,
        });
        let blocklist = Arc::new(Blocklist::new());
        (Resolver::new(config, cache, peers, spv, blocklist), dir)
    }

    fn handshake_config() -> Config {
        let mut config = Config::default();
        config.handshake_tlds = vec!["woodbur".to_string()];
        config.seed_peers = vec!["127.0.0.1:12038".to_string()];
        config
    }

    #[tokio::test]
    async fn cold_handshake_lookup_answers_from_glue_and_caches_two_entries() {
        let mut name_glue = b"nathan.woodbur.\0".to_vec();
        name_glue.extend_from_slice(&[93, 184, 216, 34]);
        let records = vec![
            HskResource {
                rtype: hsk::HSK_NS,
                data: b"nathan.woodbur.".to_vec(),
            },
            HskResource {
                rtype: hsk::HSK_GLUE4,
                data: name_glue,
            },
        ];
        let (resolver, _dir) = resolver_with(
            ProofResult::Found {
                records,
                advertised_network: true,
            },
            handshake_config(),
        );

        let answer = resolver
            .resolve("nathan.woodbur", DNSResourceType::A)
            .await
            .unwrap()
            .expect("expected a response");
        assert_eq!(answer.answers.len(), 1);
        assert_eq!(answer.answers[0].rdata, RData::A(Ipv4Addr::new(93, 184, 216, 34)));

        let height = resolver.spv.current_height();
        assert!(resolver
            .cache
            .get(&CacheKey::new("woodbur", DNSResourceType::NS, DNSResourceClass::IN), height)
            .is_some());
        assert!(resolver
            .cache
            .get(&CacheKey::new("nathan.woodbur", DNSResourceType::A, DNSResourceClass::IN), height)
            .is_some());
    }

    #[tokio::test]
    async fn notfound_from_every_peer_yields_nxdomain() {
        let (resolver, _dir) = resolver_with(ProofResult::NotFound, handshake_config());
        let answer = resolver
            .resolve("ghost.woodbur", DNSResourceType::A)
            .await
            .unwrap()
            .expect("expected an nxdomain response, not none");
        assert_eq!(answer.header.rcode, u8::from(DnsRCode::NxDomain));
    }

    #[tokio::test]
    async fn blocked_domain_short_circuits_to_sinkhole() {
        let dir = tempfile::tempdir().unwrap();
        let config = handshake_config();
        let cache = Arc::new(ResponseCache::new(config.tree_interval));
        let peers = Arc::new(PeerRegistry::new(dir.path(), &config));
        let spv = Arc::new(StubSpv {
            height: AtomicU64::new(100),
            response: ProofResult::NotFound,
        });
        let blocklist = Arc::new(Blocklist::from_domains(["ads.example.com".to_string()]));
        let resolver = Resolver::new(config, cache, peers, spv, blocklist);

        let answer = resolver
            .resolve("sub.ads.example.com", DNSResourceType::A)
            .await
            .unwrap()
            .expect("expected a sinkhole response");
        assert_eq!(answer.header.rcode, u8::from(DnsRCode::NxDomain));
        assert_eq!(resolver.cache().len(), 0);
    }
}
