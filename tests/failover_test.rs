//! End-to-end peer fail-over: the first candidate errors out, the second
//! answers, and the final response is correct despite the first peer's
//! failure (mirrors the multi-peer scenario in spec.md §8).

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use hskns::config::Config;
use hskns::dns::{DNSResourceClass, DNSResourceType, RData};
use hskns::hsk::{self, HskResource, ProofResult, SpvClient};
use hskns::{HsknsError, Resolver, Result};

struct FlakyFirstPeer {
    height: AtomicU64,
    good_peer: String,
}

#[async_trait]
impl SpvClient for FlakyFirstPeer {
    fn current_height(&self) -> u64 {
        self.height.load(Ordering::Relaxed)
    }

    async fn get_proof(
        &self,
        peer: &str,
        _name: &str,
        _connect_timeout: Duration,
        _read_timeout: Duration,
    ) -> Result<ProofResult> {
        if peer == self.good_peer {
            let mut name_glue = b"nathan.woodbur.\0".to_vec();
            name_glue.extend_from_slice(&[93, 184, 216, 34]);
            Ok(ProofResult::Found {
                records: vec![
                    HskResource {
                        rtype: hsk::HSK_NS,
                        data: b"nathan.woodbur.".to_vec(),
                    },
                    HskResource {
                        rtype: hsk::HSK_GLUE4,
                        data: name_glue,
                    },
                ],
                advertised_network: true,
            })
        } else {
            Err(HsknsError::Unreachable {
                name: peer.to_string(),
            })
        }
    }
}

#[tokio::test]
async fn resolution_succeeds_after_first_candidate_peer_fails() {
    let dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.handshake_tlds = vec!["woodbur".to_string()];
    // Both peers start with equal reputation; whichever the selection
    // algorithm tries first, the bad one errors and the resolver must
    // fall through its ordered_rest to the good one within the same call.
    config.seed_peers = vec!["10.0.0.1:12038".to_string(), "10.0.0.2:12038".to_string()];

    let cache = Arc::new(hskns::cache::ResponseCache::new(config.tree_interval));
    let peers = Arc::new(hskns::peers::PeerRegistry::new(dir.path(), &config));
    let spv = Arc::new(FlakyFirstPeer {
        height: AtomicU64::new(500),
        good_peer: "10.0.0.2:12038".to_string(),
    });
    let blocklist = Arc::new(hskns::blocklist::Blocklist::new());
    let resolver = Resolver::new(config, cache, peers, spv, blocklist);

    let answer = resolver
        .resolve("nathan.woodbur", DNSResourceType::A)
        .await
        .expect("resolve should not error")
        .expect("a successful peer exists in the candidate list");

    assert_eq!(answer.answers.len(), 1);
    assert_eq!(answer.answers[0].rdata, RData::A(Ipv4Addr::new(93, 184, 216, 34)));
    assert_eq!(answer.answers[0].rclass, DNSResourceClass::IN);
}

#[tokio::test]
async fn resolution_fails_over_cleanly_when_only_the_first_try_ever_fails() {
    // Re-run several times: name-hash based selection may pick either peer
    // first, so over a handful of tries both orderings get exercised and
    // the final answer must be correct regardless.
    for _ in 0..5 {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.handshake_tlds = vec!["woodbur".to_string()];
        config.seed_peers = vec!["10.0.0.1:12038".to_string(), "10.0.0.2:12038".to_string()];

        let cache = Arc::new(hskns::cache::ResponseCache::new(config.tree_interval));
        let peers = Arc::new(hskns::peers::PeerRegistry::new(dir.path(), &config));
        let spv = Arc::new(FlakyFirstPeer {
            height: AtomicU64::new(500),
            good_peer: "10.0.0.2:12038".to_string(),
        });
        let blocklist = Arc::new(hskns::blocklist::Blocklist::new());
        let resolver = Resolver::new(config, cache, peers, spv, blocklist);

        let answer = resolver
            .resolve("nathan.woodbur", DNSResourceType::A)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(answer.answers[0].rdata, RData::A(Ipv4Addr::new(93, 184, 216, 34)));
    }
}
