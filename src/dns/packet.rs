//! A full DNS message: header + four sections. This is the wire format
//! stored in the cache and handed to clients — spec.md §3's "opaque
//! wire-format DNS message bytes".

use super::common::ParseError;
use super::enums::{DNSResourceClass, DNSResourceType, DnsRCode};
use super::header::DNSHeader;
use super::question::DNSQuestion;
use super::resource::DNSResource;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSPacket {
    pub header: DNSHeader,
    pub questions: Vec<DNSQuestion>,
    pub answers: Vec<DNSResource>,
    pub authorities: Vec<DNSResource>,
    pub resources: Vec<DNSResource>,
}

impl DNSPacket {
    pub fn query(id: u16, name: &str, qtype: DNSResourceType) -> Self {
        DNSPacket {
            header: DNSHeader {
                id,
                rd: true,
                qdcount: 1,
                ..Default::default()
            },
            questions: vec![DNSQuestion {
                labels: name.split('.').filter(|l| !l.is_empty()).map(str::to_string).collect(),
                qtype,
                qclass: DNSResourceClass::IN,
            }],
            answers: Vec::new(),
            authorities: Vec::new(),
            resources: Vec::new(),
        }
    }

    pub fn respond(id: u16, question: DNSQuestion, rcode: DnsRCode) -> Self {
        DNSPacket {
            header: DNSHeader {
                id,
                qr: true,
                rd: true,
                ra: true,
                rcode: rcode.into(),
                qdcount: 1,
                ..Default::default()
            },
            questions: vec![question],
            answers: Vec::new(),
            authorities: Vec::new(),
            resources: Vec::new(),
        }
    }

    fn sync_counts(&mut self) {
        self.header.qdcount = self.questions.len() as u16;
        self.header.ancount = self.answers.len() as u16;
        self.header.nscount = self.authorities.len() as u16;
        self.header.arcount = self.resources.len() as u16;
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut packet = self.clone();
        packet.sync_counts();

        let mut out = Vec::new();
        packet.header.write(&mut out);
        for q in &packet.questions {
            q.write(&mut out);
        }
        for section in [&packet.answers, &packet.authorities, &packet.resources] {
            for rr in section {
                rr.write(&mut out);
            }
        }
        out
    }

    pub fn from_wire(buf: &[u8]) -> Result<Self, ParseError> {
        let (header, mut cursor) = DNSHeader::read(buf)?;

        let mut questions = Vec::with_capacity(header.qdcount as usize);
        for _ in 0..header.qdcount {
            let (q, next) = DNSQuestion::read(buf, cursor)?;
            questions.push(q);
            cursor = next;
        }

        let mut answers = Vec::with_capacity(header.ancount as usize);
        for _ in 0..header.ancount {
            let (rr, next) = DNSResource::read(buf, cursor)?;
            answers.push(rr);
            cursor = next;
        }

        let mut authorities = Vec::with_capacity(header.nscount as usize);
        for _ in 0..header.nscount {
            let (rr, next) = DNSResource::read(buf, cursor)?;
            authorities.push(rr);
            cursor = next;
        }

        let mut resources = Vec::with_capacity(header.arcount as usize);
        for _ in 0..header.arcount {
            let (rr, next) = DNSResource::read(buf, cursor)?;
            resources.push(rr);
            cursor = next;
        }

        Ok(DNSPacket {
            header,
            questions,
            answers,
            authorities,
            resources,
        })
    }

    /// Minimum TTL across answers+authorities, spec.md §4.3 point 3 — used
    /// as the cache TTL when synthesizing a response from a proof.
    pub fn min_ttl(&self, default: u32) -> u32 {
        self.answers
            .iter()
            .chain(self.authorities.iter())
            .map(|rr| rr.ttl)
            .min()
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::resource::RData;
    use std::net::Ipv4Addr;

    #[test]
    fn round_trips_a_full_response() {
        let mut packet = DNSPacket::query(0xBEEF, "site.hns", DNSResourceType::A);
        packet.header.qr = true;
        packet.answers.push(DNSResource {
            name: "site.hns".into(),
            rtype: DNSResourceType::A,
            rclass: DNSResourceClass::IN,
            ttl: 300,
            rdata: RData::A(Ipv4Addr::new(1, 2, 3, 4)),
        });

        let wire = packet.to_wire();
        let decoded = DNSPacket::from_wire(&wire).unwrap();
        assert_eq!(decoded.header.id, 0xBEEF);
        assert_eq!(decoded.answers.len(), 1);
        assert_eq!(decoded.min_ttl(300), 300);
    }

    #[test]
    fn corrupt_bytes_fail_to_parse() {
        let garbage = [0u8, 1, 2];
        assert!(DNSPacket::from_wire(&garbage).is_err());
    }
}
