//! Resource record representation used in ANSWER/AUTHORITY/ADDITIONAL
//! sections — the synthesized DNS side of the Handshake-record translator
//! (spec.md §4.3's type table).

use std::net::{Ipv4Addr, Ipv6Addr};

use super::enums::{DNSResourceClass, DNSResourceType};
use super::name::{decode_name, encode_name};
use super::question::{read_u16, read_u32};
use super::ParseError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Ns(String),
    Cname(String),
    Soa {
        mname: String,
        rname: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    Txt(Vec<String>),
    Ds(Vec<u8>),
    Tlsa {
        usage: u8,
        selector: u8,
        matching: u8,
        data: Vec<u8>,
    },
    Raw(Vec<u8>),
}

impl RData {
    pub fn write(&self, out: &mut Vec<u8>) {
        match self {
            RData::A(addr) => out.extend_from_slice(&addr.octets()),
            RData::Aaaa(addr) => out.extend_from_slice(&addr.octets()),
            RData::Ns(name) | RData::Cname(name) => out.extend(encode_name(name)),
            RData::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                out.extend(encode_name(mname));
                out.extend(encode_name(rname));
                out.extend_from_slice(&serial.to_be_bytes());
                out.extend_from_slice(&refresh.to_be_bytes());
                out.extend_from_slice(&retry.to_be_bytes());
                out.extend_from_slice(&expire.to_be_bytes());
                out.extend_from_slice(&minimum.to_be_bytes());
            }
            RData::Txt(chunks) => {
                for chunk in chunks {
                    let bytes = chunk.as_bytes();
                    let len = bytes.len().min(255);
                    out.push(len as u8);
                    out.extend_from_slice(&bytes[..len]);
                }
            }
            RData::Ds(bytes) => out.extend_from_slice(bytes),
            RData::Tlsa {
                usage,
                selector,
                matching,
                data,
            } => {
                out.push(*usage);
                out.push(*selector);
                out.push(*matching);
                out.extend_from_slice(data);
            }
            RData::Raw(bytes) => out.extend_from_slice(bytes),
        }
    }

    fn read(
        packet: &[u8],
        rtype: DNSResourceType,
        start: usize,
        len: usize,
    ) -> Result<Self, ParseError> {
        let slice = packet
            .get(start..start + len)
            .ok_or(ParseError::InvalidAnswerSection)?;
        match rtype {
            DNSResourceType::A => {
                let octets: [u8; 4] = slice.try_into().map_err(|_| ParseError::InvalidAnswerSection)?;
                Ok(RData::A(Ipv4Addr::from(octets)))
            }
            DNSResourceType::AAAA => {
                let octets: [u8; 16] =
                    slice.try_into().map_err(|_| ParseError::InvalidAnswerSection)?;
                Ok(RData::Aaaa(Ipv6Addr::from(octets)))
            }
            DNSResourceType::NS => {
                let (name, _) = decode_name(packet, start).map_err(|_| ParseError::InvalidAnswerSection)?;
                Ok(RData::Ns(name))
            }
            DNSResourceType::CNAME => {
                let (name, _) = decode_name(packet, start).map_err(|_| ParseError::InvalidAnswerSection)?;
                Ok(RData::Cname(name))
            }
            DNSResourceType::SOA => {
                let mut cursor = start;
                let (mname, after_m) =
                    decode_name(packet, cursor).map_err(|_| ParseError::InvalidAnswerSection)?;
                cursor = after_m;
                let (rname, after_r) =
                    decode_name(packet, cursor).map_err(|_| ParseError::InvalidAnswerSection)?;
                cursor = after_r;
                let serial = read_u32(packet, &mut cursor).ok_or(ParseError::InvalidAnswerSection)?;
                let refresh = read_u32(packet, &mut cursor).ok_or(ParseError::InvalidAnswerSection)?;
                let retry = read_u32(packet, &mut cursor).ok_or(ParseError::InvalidAnswerSection)?;
                let expire = read_u32(packet, &mut cursor).ok_or(ParseError::InvalidAnswerSection)?;
                let minimum = read_u32(packet, &mut cursor).ok_or(ParseError::InvalidAnswerSection)?;
                Ok(RData::Soa {
                    mname,
                    rname,
                    serial,
                    refresh,
                    retry,
                    expire,
                    minimum,
                })
            }
            DNSResourceType::TXT => {
                let mut chunks = Vec::new();
                let mut i = 0;
                while i < slice.len() {
                    let chunk_len = slice[i] as usize;
                    i += 1;
                    let end = (i + chunk_len).min(slice.len());
                    chunks.push(String::from_utf8_lossy(&slice[i..end]).into_owned());
                    i = end;
                }
                Ok(RData::Txt(chunks))
            }
            DNSResourceType::DS => Ok(RData::Ds(slice.to_vec())),
            DNSResourceType::TLSA => {
                if slice.len() < 3 {
                    return Err(ParseError::InvalidAnswerSection);
                }
                Ok(RData::Tlsa {
                    usage: slice[0],
                    selector: slice[1],
                    matching: slice[2],
                    data: slice[3..].to_vec(),
                })
            }
            DNSResourceType::OPT | DNSResourceType::Unknown => Ok(RData::Raw(slice.to_vec())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DNSResource {
    pub name: String,
    pub rtype: DNSResourceType,
    pub rclass: DNSResourceClass,
    pub ttl: u32,
    pub rdata: RData,
}

impl DNSResource {
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend(encode_name(&self.name));
        out.extend_from_slice(&u16::from(self.rtype).to_be_bytes());
        out.extend_from_slice(&u16::from(self.rclass).to_be_bytes());
        out.extend_from_slice(&self.ttl.to_be_bytes());

        let mut rdata = Vec::new();
        self.rdata.write(&mut rdata);
        out.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        out.extend_from_slice(&rdata);
    }

    pub fn read(packet: &[u8], pos: usize) -> Result<(Self, usize), ParseError> {
        let (name, mut cursor) =
            decode_name(packet, pos).map_err(|_| ParseError::InvalidAnswerSection)?;
        let rtype = read_u16(packet, &mut cursor).ok_or(ParseError::InvalidAnswerSection)?;
        let rclass = read_u16(packet, &mut cursor).ok_or(ParseError::InvalidAnswerSection)?;
        let ttl = read_u32(packet, &mut cursor).ok_or(ParseError::InvalidAnswerSection)?;
        let rdlength = read_u16(packet, &mut cursor).ok_or(ParseError::InvalidAnswerSection)? as usize;
        let rtype: DNSResourceType = rtype.into();
        let rdata = RData::read(packet, rtype, cursor, rdlength)?;
        cursor += rdlength;

        Ok((
            DNSResource {
                name,
                rtype,
                rclass: rclass.into(),
                ttl,
                rdata,
            },
            cursor,
        ))
    }
}
