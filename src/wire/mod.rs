//! Wire format: encode/decode of DNS messages per RFC 1035 and the EDNS(0)
//! extension per RFC 6891 (component C1).

mod edns;
mod header;
mod message;
mod name;
mod record;

pub use edns::Extension;
pub use header::{Header, Opcode, Rcode, QR};
pub use message::{Message, Question, Record};
pub use name::{read_name, write_name};
pub use record::{parse_rdata, write_rdata, Class, Mx, Resource, Soa, Srv, Type};
