//! DANE/TLSA certificate verification (spec.md §4.4, RFC 6698). Composes
//! the resolver (for the TLSA and A lookups), a direct client-side TLS
//! socket, and RFC 6698's usage/selector/matching rules.

use std::net::Ipv4Addr;
use std::sync::Arc;

use der::{Decode, Encode};
use ring::digest;
use rustls::pki_types::{CertificateDer, ServerName};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;
use x509_cert::Certificate;

use crate::dns::{DNSResourceType, RData};
use crate::error::{HsknsError, Result};
use crate::metrics::HsknsMetrics;
use crate::resolver::Resolver;

/// A single TLSA record as carried in a decoded DNS answer.
#[derive(Debug, Clone)]
struct TlsaRecord {
    usage: u8,
    selector: u8,
    matching: u8,
    data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct CertInfo {
    pub subject: String,
    pub issuer: String,
    pub spki_fingerprint_sha256: String,
}

#[derive(Debug, Clone)]
pub enum DaneOutcome {
    Ok {
        matched_record: usize,
        cert: CertInfo,
    },
    Mismatch {
        cert: CertInfo,
    },
    NoTlsa,
    NotSupported(String),
}

pub struct DaneVerifier {
    resolver: Arc<Resolver>,
    metrics: Option<Arc<HsknsMetrics>>,
}

impl DaneVerifier {
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self {
            resolver,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<HsknsMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn record(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_dane_outcome(outcome);
        }
    }

    pub async fn verify(&self, https_url: &str) -> Result<DaneOutcome> {
        let (host, port) = parse_https_url(https_url)?;
        if port != 443 {
            self.record("not_supported");
            return Ok(DaneOutcome::NotSupported(format!(
                "DANE is only supported on port 443, got {port}"
            )));
        }

        let tlsa_records = self.fetch_tlsa(&host).await?;
        if tlsa_records.is_empty() {
            self.record("no_tlsa");
            return Ok(DaneOutcome::NoTlsa);
        }

        let addr = self.fetch_address(&host).await?;
        let chain = self.fetch_chain(&host, addr).await?;

        let outcome = match_chain_against_tlsa(&chain, &tlsa_records)?;
        self.record(match &outcome {
            DaneOutcome::Ok { .. } => "ok",
            DaneOutcome::Mismatch { .. } => "mismatch",
            DaneOutcome::NoTlsa => "no_tlsa",
            DaneOutcome::NotSupported(_) => "not_supported",
        });
        Ok(outcome)
    }

    async fn fetch_tlsa(&self, host: &str) -> Result<Vec<TlsaRecord>> {
        let name = format!("_443._tcp.{host}");
        let packet = self.resolver.resolve(&name, DNSResourceType::TLSA).await?;
        let Some(packet) = packet else {
            return Ok(Vec::new());
        };
        Ok(packet
            .answers
            .into_iter()
            .filter_map(|rr| match rr.rdata {
                RData::Tlsa {
                    usage,
                    selector,
                    matching,
                    data,
                } => Some(TlsaRecord {
                    usage,
                    selector,
                    matching,
                    data,
                }),
                _ => None,
            })
            .collect())
    }

    async fn fetch_address(&self, host: &str) -> Result<Ipv4Addr> {
        let packet = self.resolver.resolve(host, DNSResourceType::A).await?;
        let packet = packet.ok_or_else(|| HsknsError::Unreachable { name: host.to_string() })?;
        packet
            .answers
            .into_iter()
            .find_map(|rr| match rr.rdata {
                RData::A(addr) => Some(addr),
                _ => None,
            })
            .ok_or_else(|| HsknsError::Unreachable { name: host.to_string() })
    }

    async fn fetch_chain(&self, host: &str, addr: Ipv4Addr) -> Result<Vec<CertificateDer<'static>>> {
        // Idempotent: rustls 0.23 needs a process-wide default crypto
        // provider installed once before building any ClientConfig.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let config = rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyVerifier))
            .with_no_client_auth();
        let connector = TlsConnector::from(Arc::new(config));

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| HsknsError::BadProof {
                peer: host.to_string(),
                reason: "invalid SNI host name".to_string(),
            })?;

        let stream = TcpStream::connect((addr, 443)).await?;
        let tls_stream = connector
            .connect(server_name, stream)
            .await
            .map_err(|err| HsknsError::BadProof {
                peer: host.to_string(),
                reason: format!("TLS handshake failed: {err}"),
            })?;

        let (_, conn) = tls_stream.get_ref();
        let chain = conn
            .peer_certificates()
            .ok_or_else(|| HsknsError::BadProof {
                peer: host.to_string(),
                reason: "server presented no certificate chain".to_string(),
            })?;
        Ok(chain.iter().map(|c| c.clone().into_owned()).collect())
    }
}

fn parse_https_url(url: &str) -> Result<(String, u16)> {
    let without_scheme = url.strip_prefix("https://").unwrap_or(url);
    let authority = without_scheme.split('/').next().unwrap_or(without_scheme);
    match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port.parse().map_err(|_| HsknsError::BadProof {
                peer: url.to_string(),
                reason: "invalid port in URL".to_string(),
            })?;
            Ok((host.to_string(), port))
        }
        None => Ok((authority.to_string(), 443)),
    }
}

/// The matching loop of spec.md §4.4 point 4, factored out of `verify` so
/// it can be exercised directly against a synthetic chain in tests.
fn match_chain_against_tlsa(
    chain: &[CertificateDer<'_>],
    tlsa_records: &[TlsaRecord],
) -> Result<DaneOutcome> {
    let leaf = chain
        .first()
        .ok_or_else(|| HsknsError::Unreachable { name: "dane".to_string() })?;
    let leaf_cert = parse_cert(leaf)?;
    let leaf_info = cert_info(&leaf_cert)?;

    for (index, tlsa) in tlsa_records.iter().enumerate() {
        let candidate = match tlsa.usage {
            2 => chain.get(1),
            3 => chain.first(),
            other => {
                debug!(usage = other, "skipping TLSA record with unsupported usage");
                continue;
            }
        };
        let Some(candidate) = candidate else { continue };

        let Some(selected_bytes) = select_bytes(candidate, tlsa.selector) else {
            debug!(selector = tlsa.selector, "skipping TLSA record with unsupported selector");
            continue;
        };

        let Some(computed) = apply_matching(&selected_bytes, tlsa.matching) else {
            debug!(matching = tlsa.matching, "skipping TLSA record with unsupported matching type");
            continue;
        };

        if computed == tlsa.data {
            return Ok(DaneOutcome::Ok {
                matched_record: index,
                cert: leaf_info,
            });
        }
    }

    Ok(DaneOutcome::Mismatch { cert: leaf_info })
}

fn parse_cert(der: &CertificateDer<'_>) -> Result<Certificate> {
    Certificate::from_der(der.as_ref()).map_err(|err| HsknsError::BadProof {
        peer: "dane".to_string(),
        reason: format!("failed to parse X.509 certificate: {err}"),
    })
}

fn cert_info(cert: &Certificate) -> Result<CertInfo> {
    let spki_der = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|err| HsknsError::BadProof {
            peer: "dane".to_string(),
            reason: format!("failed to re-encode SPKI: {err}"),
        })?;
    let fingerprint = digest::digest(&digest::SHA256, &spki_der);
    Ok(CertInfo {
        subject: cert.tbs_certificate.subject.to_string(),
        issuer: cert.tbs_certificate.issuer.to_string(),
        spki_fingerprint_sha256: hex::encode(fingerprint.as_ref()),
    })
}

/// Selector 0 is the full cert DER (already what `CertificateDer` holds);
/// selector 1 is the SubjectPublicKeyInfo DER. Any other value is
/// unsupported (spec.md §4.4 point 4).
fn select_bytes(der: &CertificateDer<'_>, selector: u8) -> Option<Vec<u8>> {
    match selector {
        0 => Some(der.as_ref().to_vec()),
        1 => {
            let cert = parse_cert(der).ok()?;
            cert.tbs_certificate.subject_public_key_info.to_der().ok()
        }
        _ => None,
    }
}

/// Matching 0 is exact bytes, 1 is SHA-256, 2 is SHA-512.
fn apply_matching(bytes: &[u8], matching: u8) -> Option<Vec<u8>> {
    match matching {
        0 => Some(bytes.to_vec()),
        1 => Some(digest::digest(&digest::SHA256, bytes).as_ref().to_vec()),
        2 => Some(digest::digest(&digest::SHA512, bytes).as_ref().to_vec()),
        _ => None,
    }
}

#[derive(Debug)]
struct AcceptAnyVerifier;

impl rustls::client::danger::ServerCertVerifier for AcceptAnyVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_url_with_default_port() {
        assert_eq!(parse_https_url("https://nathan.woodbur").unwrap(), ("nathan.woodbur".to_string(), 443));
    }

    #[test]
    fn parses_url_with_explicit_port_and_path() {
        assert_eq!(
            parse_https_url("https://nathan.woodbur:8443/path").unwrap(),
            ("nathan.woodbur".to_string(), 8443)
        );
    }

    #[test]
    fn matching_zero_is_exact_bytes() {
        assert_eq!(apply_matching(b"hello", 0), Some(b"hello".to_vec()));
    }

    #[test]
    fn matching_one_is_sha256() {
        let expected = digest::digest(&digest::SHA256, b"hello").as_ref().to_vec();
        assert_eq!(apply_matching(b"hello", 1), Some(expected));
    }

    #[test]
    fn unsupported_matching_value_is_skipped() {
        assert_eq!(apply_matching(b"hello", 99), None);
    }

    fn self_signed_chain() -> Vec<CertificateDer<'static>> {
        let certified = rcgen::generate_simple_self_signed(vec!["nathan.woodbur".to_string()]).unwrap();
        let der = certified.cert.der().clone();
        vec![der.clone(), der]
    }

    /// spec.md §8: "for every combination of (usage, selector, matching),
    /// given a synthetic chain whose selected portion hashes to the TLSA
    /// data, `verify` reports DANE_OK; flipping any byte yields
    /// DANE_MISMATCH."
    #[test]
    fn matches_every_usage_selector_matching_combination() {
        let chain = self_signed_chain();

        for usage in [2u8, 3] {
            for selector in [0u8, 1] {
                for matching in [0u8, 1, 2] {
                    let target_index = if usage == 2 { 1 } else { 0 };
                    let selected = select_bytes(&chain[target_index], selector).unwrap();
                    let data = apply_matching(&selected, matching).unwrap();

                    let record = TlsaRecord {
                        usage,
                        selector,
                        matching,
                        data: data.clone(),
                    };
                    let outcome = match_chain_against_tlsa(&chain, std::slice::from_ref(&record)).unwrap();
                    assert!(
                        matches!(outcome, DaneOutcome::Ok { matched_record: 0, .. }),
                        "usage={usage} selector={selector} matching={matching} did not match"
                    );

                    let mut flipped = data;
                    flipped[0] ^= 0xFF;
                    let bad_record = TlsaRecord {
                        usage,
                        selector,
                        matching,
                        data: flipped,
                    };
                    let mismatch = match_chain_against_tlsa(&chain, std::slice::from_ref(&bad_record)).unwrap();
                    assert!(matches!(mismatch, DaneOutcome::Mismatch { .. }));
                }
            }
        }
    }

    #[test]
    fn unsupported_usage_is_skipped_and_yields_mismatch() {
        let chain = self_signed_chain();
        let record = TlsaRecord {
            usage: 1,
            selector: 0,
            matching: 0,
            data: vec![0; 4],
        };
        let outcome = match_chain_against_tlsa(&chain, &[record]).unwrap();
        assert!(matches!(outcome, DaneOutcome::Mismatch { .. }));
    }
}
