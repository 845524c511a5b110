//! DNS record type/class tags used on the wire between this resolver and
//! its clients. Trimmed to the types the resolver actually produces or
//! forwards (spec.md §6); unknown wire values round-trip through the
//! `Unknown` variant rather than being rejected.

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DNSResourceType {
    #[default]
    Unknown,
    A,
    NS,
    CNAME,
    SOA,
    TXT,
    AAAA,
    DS,
    TLSA,
    OPT,
}

impl From<u16> for DNSResourceType {
    fn from(value: u16) -> Self {
        match value {
            1 => DNSResourceType::A,
            2 => DNSResourceType::NS,
            5 => DNSResourceType::CNAME,
            6 => DNSResourceType::SOA,
            16 => DNSResourceType::TXT,
            28 => DNSResourceType::AAAA,
            41 => DNSResourceType::OPT,
            43 => DNSResourceType::DS,
            52 => DNSResourceType::TLSA,
            _ => DNSResourceType::Unknown,
        }
    }
}

impl From<DNSResourceType> for u16 {
    fn from(value: DNSResourceType) -> Self {
        match value {
            DNSResourceType::A => 1,
            DNSResourceType::NS => 2,
            DNSResourceType::CNAME => 5,
            DNSResourceType::SOA => 6,
            DNSResourceType::TXT => 16,
            DNSResourceType::AAAA => 28,
            DNSResourceType::OPT => 41,
            DNSResourceType::DS => 43,
            DNSResourceType::TLSA => 52,
            DNSResourceType::Unknown => 0,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DNSResourceClass {
    #[default]
    Unknown,
    IN,
    CS,
    CH,
    HS,
}

impl From<u16> for DNSResourceClass {
    fn from(value: u16) -> Self {
        match value {
            1 => DNSResourceClass::IN,
            2 => DNSResourceClass::CS,
            3 => DNSResourceClass::CH,
            4 => DNSResourceClass::HS,
            _ => DNSResourceClass::Unknown,
        }
    }
}

impl From<DNSResourceClass> for u16 {
    fn from(value: DNSResourceClass) -> Self {
        match value {
            DNSResourceClass::IN => 1,
            DNSResourceClass::CS => 2,
            DNSResourceClass::CH => 3,
            DNSResourceClass::HS => 4,
            DNSResourceClass::Unknown => 0,
        }
    }
}

/// DNS response codes (RFC 1035 §4.1.1), limited to the ones this resolver
/// can itself produce.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DnsRCode {
    #[default]
    NoError,
    ServFail,
    NxDomain,
    Refused,
}

impl From<DnsRCode> for u8 {
    fn from(value: DnsRCode) -> Self {
        match value {
            DnsRCode::NoError => 0,
            DnsRCode::ServFail => 2,
            DnsRCode::NxDomain => 3,
            DnsRCode::Refused => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_types() {
        for (wire, ty) in [
            (1u16, DNSResourceType::A),
            (2, DNSResourceType::NS),
            (28, DNSResourceType::AAAA),
            (43, DNSResourceType::DS),
            (52, DNSResourceType::TLSA),
            (16, DNSResourceType::TXT),
        ] {
            assert_eq!(DNSResourceType::from(wire), ty);
            assert_eq!(u16::from(ty), wire);
        }
    }

    #[test]
    fn unknown_type_round_trips_to_zero() {
        assert_eq!(DNSResourceType::from(9999), DNSResourceType::Unknown);
        assert_eq!(u16::from(DNSResourceType::Unknown), 0);
    }
}
