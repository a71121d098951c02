//! Header bit-packing and the small enums carried in it.
//!
//! Grounded on `MessageParser::parse`'s header decode and `Message::to_vec`'s
//! header encode in the teacher's `src/dns.rs`; `Opcode`/`Rcode`/`QR` keep the
//! teacher's `src/types.rs` shapes.

use num_derive::FromPrimitive;
use strum_macros::Display;

/// Query or Response bit.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum QR {
    #[default]
    Query,
    Response,
}

impl QR {
    pub fn from_bool(b: bool) -> QR {
        if b {
            QR::Response
        } else {
            QR::Query
        }
    }

    pub fn to_bool(self) -> bool {
        matches!(self, QR::Response)
    }
}

/// Kind of query. Only `Query` is ever produced by this crate's encoder, but
/// a decoded response may legally carry others.
#[derive(Copy, Clone, Debug, Display, FromPrimitive, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Query = 0,
    IQuery = 1,
    Status = 2,
    Notify = 4,
    Update = 5,
}

impl Default for Opcode {
    fn default() -> Self {
        Opcode::Query
    }
}

/// Response codes. See [rfc1035] and the IANA DNS Parameters registry.
///
/// [rfc1035]: https://datatracker.ietf.org/doc/html/rfc1035
#[derive(Copy, Clone, Debug, Display, FromPrimitive, PartialEq, Eq)]
#[repr(u16)]
pub enum Rcode {
    NoError = 0,
    FormErr = 1,
    ServFail = 2,
    NXDomain = 3,
    NotImp = 4,
    Refused = 5,
    YXDomain = 6,
    YXRRSet = 7,
    NXRRSet = 8,
    NotAuth = 9,
    NotZone = 10,
}

impl Default for Rcode {
    fn default() -> Self {
        Rcode::NoError
    }
}

/// The 12-byte fixed header, decoded/encoded as a unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    pub id: u16,
    pub qr: QR,
    pub opcode: Opcode,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub z: bool,
    pub ad: bool,
    pub cd: bool,
    pub rcode: Rcode,

    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}
