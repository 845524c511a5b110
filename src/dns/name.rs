//! Domain name wire encoding, decoding (with compression-pointer support)
//! and the TLD extraction rule from spec.md §4.3 point 2.

use std::io;

const MAX_LABEL_LEN: usize = 63;
const MAX_POINTER_JUMPS: usize = 64;

pub fn encode_name(name: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() + 2);
    let trimmed = name.trim_end_matches('.');
    if !trimmed.is_empty() {
        for label in trimmed.split('.') {
            let bytes = label.as_bytes();
            out.push(bytes.len().min(MAX_LABEL_LEN) as u8);
            out.extend_from_slice(&bytes[..bytes.len().min(MAX_LABEL_LEN)]);
        }
    }
    out.push(0);
    out
}

/// Reads a name starting at `pos` in `packet`, following compression
/// pointers as needed. Returns the joined dotted name and the offset just
/// past the name *in the original uncompressed stream* (the caller's
/// cursor only advances past the first pointer, never into the jump).
pub fn decode_name(packet: &[u8], pos: usize) -> io::Result<(String, usize)> {
    let mut labels: Vec<String> = Vec::new();
    let mut cursor = pos;
    let mut end_of_name: Option<usize> = None;
    let mut jumps = 0;

    loop {
        let len = *packet
            .get(cursor)
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "truncated name"))?;

        if len == 0 {
            cursor += 1;
            if end_of_name.is_none() {
                end_of_name = Some(cursor);
            }
            break;
        }

        if len & 0xC0 == 0xC0 {
            let second = *packet.get(cursor + 1).ok_or_else(|| {
                io::Error::new(io::ErrorKind::UnexpectedEof, "truncated pointer")
            })?;
            if end_of_name.is_none() {
                end_of_name = Some(cursor + 2);
            }
            jumps += 1;
            if jumps > MAX_POINTER_JUMPS {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "pointer loop"));
            }
            cursor = (((len & 0x3F) as usize) << 8) | second as usize;
            continue;
        }

        if len as usize > MAX_LABEL_LEN {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "label too long"));
        }

        let start = cursor + 1;
        let end = start + len as usize;
        let label = packet
            .get(start..end)
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "truncated label"))?;
        labels.push(String::from_utf8_lossy(label).into_owned());
        cursor = end;
    }

    let joined = if labels.is_empty() {
        ".".to_string()
    } else {
        labels.join(".")
    };
    Ok((joined, end_of_name.unwrap_or(cursor)))
}

/// Extracts the TLD (last label) of a name, lowercasing only ASCII A-Z and
/// preserving every other byte — matches the on-chain canonicalization
/// rule spec.md §4.3 requires, which is stricter than `str::to_lowercase`.
pub fn extract_tld(name: &str) -> String {
    let trimmed = name.trim_end_matches('.');
    let last = trimmed.rsplit('.').next().unwrap_or(trimmed);
    last.chars()
        .map(|c| {
            if c.is_ascii_uppercase() {
                c.to_ascii_lowercase()
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tld_from_multi_label_name() {
        assert_eq!(extract_tld("A.B.C"), "c");
    }

    #[test]
    fn single_label_is_its_own_tld() {
        assert_eq!(extract_tld("foo"), "foo");
    }

    #[test]
    fn preserves_non_az_bytes() {
        assert_eq!(extract_tld("Foo-1.bAR_"), "bar_");
    }

    #[test]
    fn encode_decode_round_trip() {
        let wire = encode_name("sub.example.hns");
        let (name, end) = decode_name(&wire, 0).unwrap();
        assert_eq!(name, "sub.example.hns");
        assert_eq!(end, wire.len());
    }

    #[test]
    fn decode_follows_compression_pointer() {
        let mut packet = encode_name("example.hns");
        let pointer_target = 0u16;
        let pointer = [0xC0 | (pointer_target >> 8) as u8, pointer_target as u8];
        packet.extend_from_slice(&pointer);
        let (name, end) = decode_name(&packet, packet.len() - 2).unwrap();
        assert_eq!(name, "example.hns");
        assert_eq!(end, packet.len());
    }

    #[test]
    fn decode_rejects_pointer_loops() {
        // A pointer that points at itself must not hang or overflow.
        let packet = [0xC0u8, 0x00];
        assert!(decode_name(&packet, 0).is_err());
    }
}
