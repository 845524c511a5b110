//! Handshake on-chain record translation and the external collaborator
//! interfaces the resolver drives: a headers-only SPV client and the
//! peer-to-peer `getproof` exchange (spec.md §3, §4.3, §6).
//!
//! The SPV header chain, its Blake2b+SHA3+XOR header hash, and the wire
//! encoding of `getheaders`/`headers`/`getproof`/`proof` messages are
//! explicitly out of scope (spec.md §1) — this module only defines the
//! trait boundary a real implementation of those would satisfy, and the
//! pure decode step that turns a received proof's records into DNS data.

use std::net::{Ipv4Addr, Ipv6Addr};

use async_trait::async_trait;

use crate::dns::{DNSResource, DNSResourceClass, DNSResourceType, RData};
use crate::error::{HsknsError, Result};

/// One record as emitted by the on-chain name-tree proof (spec.md §3
/// "Handshake resource record").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HskResource {
    pub rtype: u8,
    pub data: Vec<u8>,
}

pub const HSK_NS: u8 = 0;
pub const HSK_GLUE4: u8 = 1;
pub const HSK_GLUE6: u8 = 2;
pub const HSK_SYNTH4: u8 = 3;
pub const HSK_SYNTH6: u8 = 4;
pub const HSK_DS: u8 = 5;
pub const HSK_TXT: u8 = 6;

/// Outcome of a `getproof` exchange with a full node.
#[derive(Debug, Clone)]
pub enum ProofResult {
    Found {
        records: Vec<HskResource>,
        /// Whether the peer advertised the `NETWORK` service bit during
        /// its handshake (spec.md §4.2's verified-peer criterion).
        advertised_network: bool,
    },
    NotFound,
}

/// The SPV/peer-network boundary: a headers-only chain client that also
/// knows how to reach full nodes for name-tree proofs. Left as a trait
/// because its wire format and header-hash primitive are out of scope —
/// a real implementation speaks `getheaders`/`headers`/`getproof`/`proof`
/// over TCP port `MAINNET_PORT` against the addresses the peer registry
/// hands it.
#[async_trait]
pub trait SpvClient: Send + Sync {
    /// Current chain tip height, used as the cache's aging-window clock.
    fn current_height(&self) -> u64;

    /// Requests a name-tree proof for `name` from `peer` (an `ip:port`
    /// string). `connect_timeout`/`read_timeout` bound the two
    /// suspension points spec.md §5 calls out.
    async fn get_proof(
        &self,
        peer: &str,
        name: &str,
        connect_timeout: std::time::Duration,
        read_timeout: std::time::Duration,
    ) -> Result<ProofResult>;
}

/// Decodes a single Handshake record into the DNS resource it represents,
/// tagging it against `owner`. `owner` is the name the resulting record is
/// attached to — the TLD for NS/GLUE rows, the exact qname for DS/TLSA.
///
/// SYNTH4/SYNTH6 remain an explicit stub: the wire format is a
/// Handshake-specific base32 encoding of the address inside the owner
/// name, and spec.md §9 is explicit that its precise layout isn't
/// available here — guessing a layout would silently produce wrong
/// addresses rather than a visible failure, so this returns
/// `NotSupported` instead.
pub fn decode_record(owner: &str, record: &HskResource) -> Result<DNSResource> {
    match record.rtype {
        HSK_NS => {
            let host = std::str::from_utf8(&record.data)
                .map_err(|_| HsknsError::BadProof {
                    peer: owner.to_string(),
                    reason: "NS record is not valid UTF-8".to_string(),
                })?
                .to_string();
            Ok(DNSResource {
                name: owner.to_string(),
                rtype: DNSResourceType::NS,
                rclass: DNSResourceClass::IN,
                ttl: crate::constants::DNS_CACHE_TTL_SECONDS,
                rdata: RData::Ns(host),
            })
        }
        HSK_GLUE4 => decode_glue4(owner, &record.data),
        HSK_GLUE6 => decode_glue6(owner, &record.data),
        HSK_SYNTH4 | HSK_SYNTH6 => Err(HsknsError::NotSupported(
            "SYNTH4/SYNTH6 base32 address decoding is not implemented".to_string(),
        )),
        HSK_DS => Ok(DNSResource {
            name: owner.to_string(),
            rtype: DNSResourceType::DS,
            rclass: DNSResourceClass::IN,
            ttl: crate::constants::DNS_CACHE_TTL_SECONDS,
            rdata: RData::Ds(record.data.clone()),
        }),
        HSK_TXT => {
            let text = String::from_utf8_lossy(&record.data).into_owned();
            Ok(DNSResource {
                name: owner.to_string(),
                rtype: DNSResourceType::TXT,
                rclass: DNSResourceClass::IN,
                ttl: crate::constants::DNS_CACHE_TTL_SECONDS,
                rdata: RData::Txt(vec![text]),
            })
        }
        other => Err(HsknsError::BadProof {
            peer: owner.to_string(),
            reason: format!("unknown Handshake record type {other}"),
        }),
    }
}

/// GLUE4 is `name\0 + 4-byte v4`; the legacy bare-IP form (exactly 4
/// bytes, no name) is also accepted for backward compatibility.
fn decode_glue4(fallback_owner: &str, data: &[u8]) -> Result<DNSResource> {
    let (owner, addr_bytes) = split_glue(data, 4, fallback_owner)?;
    let octets: [u8; 4] = addr_bytes
        .try_into()
        .map_err(|_| HsknsError::BadProof {
            peer: fallback_owner.to_string(),
            reason: "GLUE4 payload is not 4 bytes".to_string(),
        })?;
    Ok(DNSResource {
        name: owner,
        rtype: DNSResourceType::A,
        rclass: DNSResourceClass::IN,
        ttl: crate::constants::DNS_CACHE_TTL_SECONDS,
        rdata: RData::A(Ipv4Addr::from(octets)),
    })
}

fn decode_glue6(fallback_owner: &str, data: &[u8]) -> Result<DNSResource> {
    let (owner, addr_bytes) = split_glue(data, 16, fallback_owner)?;
    let octets: [u8; 16] = addr_bytes
        .try_into()
        .map_err(|_| HsknsError::BadProof {
            peer: fallback_owner.to_string(),
            reason: "GLUE6 payload is not 16 bytes".to_string(),
        })?;
    Ok(DNSResource {
        name: owner,
        rtype: DNSResourceType::AAAA,
        rclass: DNSResourceClass::IN,
        ttl: crate::constants::DNS_CACHE_TTL_SECONDS,
        rdata: RData::Aaaa(Ipv6Addr::from(octets)),
    })
}

/// Splits a GLUE payload into `(owner name, address bytes)`. If the
/// payload is exactly `addr_len` bytes, it's the legacy bare-IP form and
/// `fallback_owner` is used as the name; otherwise it's `name\0addr`.
fn split_glue<'a>(data: &'a [u8], addr_len: usize, fallback_owner: &str) -> Result<(String, &'a [u8])> {
    if data.len() == addr_len {
        return Ok((fallback_owner.to_string(), data));
    }
    let nul = data
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| HsknsError::BadProof {
            peer: fallback_owner.to_string(),
            reason: "GLUE payload missing name terminator".to_string(),
        })?;
    let name = std::str::from_utf8(&data[..nul])
        .map_err(|_| HsknsError::BadProof {
            peer: fallback_owner.to_string(),
            reason: "GLUE owner name is not valid UTF-8".to_string(),
        })?
        .to_string();
    Ok((name, &data[nul + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_ns_record() {
        let rr = HskResource {
            rtype: HSK_NS,
            data: b"ns1.example.".to_vec(),
        };
        let decoded = decode_record("woodbur", &rr).unwrap();
        assert_eq!(decoded.rtype, DNSResourceType::NS);
        assert_eq!(decoded.rdata, RData::Ns("ns1.example.".to_string()));
    }

    #[test]
    fn decodes_glue4_with_embedded_name() {
        let mut data = b"ns1.woodbur.\0".to_vec();
        data.extend_from_slice(&[93, 184, 216, 34]);
        let rr = HskResource {
            rtype: HSK_GLUE4,
            data,
        };
        let decoded = decode_record("woodbur", &rr).unwrap();
        assert_eq!(decoded.name, "ns1.woodbur.");
        assert_eq!(decoded.rdata, RData::A(Ipv4Addr::new(93, 184, 216, 34)));
    }

    #[test]
    fn decodes_legacy_bare_ip_glue4() {
        let rr = HskResource {
            rtype: HSK_GLUE4,
            data: vec![1, 2, 3, 4],
        };
        let decoded = decode_record("ns1.woodbur.", &rr).unwrap();
        assert_eq!(decoded.name, "ns1.woodbur.");
        assert_eq!(decoded.rdata, RData::A(Ipv4Addr::new(1, 2, 3, 4)));
    }

    #[test]
    fn decodes_glue6() {
        let mut data = b"ns1.woodbur.\0".to_vec();
        data.extend_from_slice(&[0u8; 15]);
        data.push(1);
        let rr = HskResource {
            rtype: HSK_GLUE6,
            data,
        };
        let decoded = decode_record("woodbur", &rr).unwrap();
        assert_eq!(decoded.rdata, RData::Aaaa(Ipv6Addr::new(0, 0, 0, 0, 0, 0, 0, 1)));
    }

    #[test]
    fn synth_records_are_explicitly_not_supported() {
        let rr = HskResource {
            rtype: HSK_SYNTH4,
            data: vec![0u8; 8],
        };
        assert!(matches!(
            decode_record("woodbur", &rr),
            Err(HsknsError::NotSupported(_))
        ));
    }

    #[test]
    fn decodes_ds_and_txt() {
        let ds = HskResource {
            rtype: HSK_DS,
            data: vec![1, 2, 3, 4],
        };
        assert_eq!(decode_record("woodbur", &ds).unwrap().rdata, RData::Ds(vec![1, 2, 3, 4]));

        let txt = HskResource {
            rtype: HSK_TXT,
            data: b"hello".to_vec(),
        };
        assert_eq!(
            decode_record("woodbur", &txt).unwrap().rdata,
            RData::Txt(vec!["hello".to_string()])
        );
    }
}
