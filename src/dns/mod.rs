pub mod common;
pub mod enums;
pub mod header;
pub mod name;
pub mod packet;
pub mod question;
pub mod resource;

pub use common::ParseError;
pub use enums::{DNSResourceClass, DNSResourceType, DnsRCode};
pub use header::DNSHeader;
pub use name::extract_tld;
pub use packet::DNSPacket;
pub use question::DNSQuestion;
pub use resource::{DNSResource, RData};
