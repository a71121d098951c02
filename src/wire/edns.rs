//! EDNS(0), carried as a pseudo-record of type OPT in the additional
//! section (RFC 6891).
//!
//! Grounded on the teacher's `src/dns.rs` (`Extension::parse`/`Extension::write`)
//! and `src/types.rs` (`Extension` fields).

use crate::error::Error;
use std::net::SocketAddr;

/// The EDNS(0) pseudo-record. `class` on the owning `Record` carries the
/// requestor's UDP payload size; `ttl` carries the extended RCODE, version,
/// and flags, per RFC 6891 section 6.1.3.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Extension {
    pub payload_size: u16,
    pub extended_rcode: u8,
    pub version: u8,
    pub dnssec_ok: bool,
    pub options: Vec<(u16, Vec<u8>)>,
}

impl Extension {
    /// Decodes the OPT RDATA given the record's `class` (payload size) and
    /// `ttl` (packed rcode/version/flags) fields plus the RDATA bytes.
    pub fn parse(class: u16, ttl: u32, rdata: &[u8], endpoint: SocketAddr) -> Result<Extension, Error> {
        let extended_rcode = ((ttl >> 24) & 0xff) as u8;
        let version = ((ttl >> 16) & 0xff) as u8;
        let dnssec_ok = (ttl >> 15) & 0x1 == 1;

        let mut options = Vec::new();
        let mut pos = 0;
        while pos < rdata.len() {
            if pos + 4 > rdata.len() {
                return Err(Error::WireFormat {
                    endpoint,
                    reason: "truncated EDNS option header".to_string(),
                });
            }
            let code = u16::from_be_bytes([rdata[pos], rdata[pos + 1]]);
            let len = u16::from_be_bytes([rdata[pos + 2], rdata[pos + 3]]) as usize;
            let data_start = pos + 4;
            let data_end = data_start + len;
            let data = rdata
                .get(data_start..data_end)
                .ok_or_else(|| Error::WireFormat {
                    endpoint,
                    reason: "truncated EDNS option data".to_string(),
                })?;
            options.push((code, data.to_vec()));
            pos = data_end;
        }

        Ok(Extension {
            payload_size: class,
            extended_rcode,
            version,
            dnssec_ok,
            options,
        })
    }

    /// Packs this extension into the `(class, ttl, rdata)` triple a Record
    /// encoder writes for an OPT record.
    pub fn write(&self) -> (u16, u32, Vec<u8>) {
        let class = self.payload_size;
        let mut ttl = (self.extended_rcode as u32) << 24 | (self.version as u32) << 16;
        if self.dnssec_ok {
            ttl |= 1 << 15;
        }

        let mut rdata = Vec::new();
        for (code, data) in &self.options {
            rdata.extend_from_slice(&code.to_be_bytes());
            rdata.extend_from_slice(&(data.len() as u16).to_be_bytes());
            rdata.extend_from_slice(data);
        }

        (class, ttl, rdata)
    }
}
