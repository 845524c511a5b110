use super::enums::{DNSResourceClass, DNSResourceType};
use super::name::{decode_name, encode_name};
use super::ParseError;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSQuestion {
    pub labels: Vec<String>,
    pub qtype: DNSResourceType,
    pub qclass: DNSResourceClass,
}

impl DNSQuestion {
    pub fn name(&self) -> String {
        self.labels.join(".")
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend(encode_name(&self.name()));
        out.extend_from_slice(&u16::from(self.qtype).to_be_bytes());
        out.extend_from_slice(&u16::from(self.qclass).to_be_bytes());
    }

    pub fn read(packet: &[u8], pos: usize) -> Result<(Self, usize), ParseError> {
        let (name, mut cursor) =
            decode_name(packet, pos).map_err(|_| ParseError::InvalidQuestionSection)?;
        let labels = if name == "." {
            Vec::new()
        } else {
            name.split('.').map(str::to_string).collect()
        };
        let qtype = read_u16(packet, &mut cursor).ok_or(ParseError::InvalidQuestionSection)?;
        let qclass = read_u16(packet, &mut cursor).ok_or(ParseError::InvalidQuestionSection)?;
        Ok((
            DNSQuestion {
                labels,
                qtype: qtype.into(),
                qclass: qclass.into(),
            },
            cursor,
        ))
    }
}

pub(crate) fn read_u16(packet: &[u8], cursor: &mut usize) -> Option<u16> {
    let bytes = packet.get(*cursor..*cursor + 2)?;
    *cursor += 2;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

pub(crate) fn read_u32(packet: &[u8], cursor: &mut usize) -> Option<u32> {
    let bytes = packet.get(*cursor..*cursor + 4)?;
    *cursor += 4;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_question() {
        let q = DNSQuestion {
            labels: vec!["nathan".into(), "woodbur".into()],
            qtype: DNSResourceType::A,
            qclass: DNSResourceClass::IN,
        };
        let mut wire = Vec::new();
        q.write(&mut wire);
        let (decoded, consumed) = DNSQuestion::read(&wire, 0).unwrap();
        assert_eq!(consumed, wire.len());
        assert_eq!(decoded, q);
    }
}
