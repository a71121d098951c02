//! Domain name encode/decode on the wire: length-prefixed labels terminated
//! by a zero octet, with compression-pointer following on decode.
//!
//! Grounded on the teacher's `src/io.rs` (`DNSReadExt::read_qname`) for the
//! pointer-following shape and loop-rejection rule ("a pointer must point
//! strictly earlier than where we started reading this name"), and on
//! `src/dns.rs`'s `Message::write_qname` for the encode side.

use crate::error::Error;
use std::net::SocketAddr;

const POINTER_TAG: u8 = 0b1100_0000;
const MAX_NAME_LEN: usize = 255;
const MAX_LABEL_LEN: usize = 63;

/// Reads a name starting at `start` in `buf`. Returns the decoded, dotted,
/// lowercase-preserving name (root is `"."`) and the number of bytes
/// consumed from `buf[start..]` *ignoring any compression pointer jump*
/// (the pointer itself, 2 bytes, counts; whatever it points at does not).
pub fn read_name(buf: &[u8], start: usize, endpoint: SocketAddr) -> Result<(String, usize), Error> {
    let mut name = String::new();
    let mut pos = start;
    let mut consumed: Option<usize> = None;
    let mut jumps = 0usize;

    loop {
        let len = *buf.get(pos).ok_or_else(|| wire_err(endpoint, "truncated name"))?;

        if len == 0 {
            pos += 1;
            if consumed.is_none() {
                consumed = Some(pos - start);
            }
            if name.is_empty() {
                name.push('.');
            }
            break;
        }

        match len & POINTER_TAG {
            0x00 => {
                let label_len = len as usize;
                if label_len > MAX_LABEL_LEN {
                    return Err(wire_err(endpoint, "label exceeds 63 octets"));
                }
                let label_start = pos + 1;
                let label_end = label_start + label_len;
                let label = buf
                    .get(label_start..label_end)
                    .ok_or_else(|| wire_err(endpoint, "truncated label"))?;
                if !label.is_ascii() {
                    return Err(wire_err(endpoint, "non-ASCII label"));
                }
                name.push_str(std::str::from_utf8(label).unwrap());
                name.push('.');
                pos = label_end;

                if name.len() > MAX_NAME_LEN {
                    return Err(wire_err(endpoint, "name exceeds 255 octets"));
                }
            }
            POINTER_TAG => {
                let b2 = *buf
                    .get(pos + 1)
                    .ok_or_else(|| wire_err(endpoint, "truncated pointer"))?;
                let ptr = (((len & !POINTER_TAG) as usize) << 8) | b2 as usize;

                if ptr >= pos {
                    return Err(wire_err(endpoint, "compression pointer does not point strictly earlier"));
                }

                if consumed.is_none() {
                    consumed = Some(pos + 2 - start);
                }

                jumps += 1;
                if jumps > MAX_NAME_LEN {
                    return Err(wire_err(endpoint, "too many compression pointer jumps"));
                }

                pos = ptr;
            }
            _ => return Err(wire_err(endpoint, "unsupported label length prefix")),
        }
    }

    Ok((name, consumed.unwrap_or(pos - start)))
}

/// Writes `name` (a dotted domain, trailing dot optional) as length-prefixed
/// labels into `buf`, without compression (the spec allows a conforming
/// encoder to omit it, §4.1).
pub fn write_name(buf: &mut Vec<u8>, name: &str) -> Result<(), Error> {
    let ascii = idna::domain_to_ascii(name).map_err(|e| {
        Error::WireFormat {
            endpoint: "0.0.0.0:0".parse().unwrap(),
            reason: format!("invalid domain name '{name}': {e}"),
        }
    })?;

    if !ascii.is_empty() && ascii != "." {
        for label in ascii.split_terminator('.') {
            if label.is_empty() {
                return Err(Error::WireFormat {
                    endpoint: "0.0.0.0:0".parse().unwrap(),
                    reason: format!("empty label in domain name '{name}'"),
                });
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(Error::WireFormat {
                    endpoint: "0.0.0.0:0".parse().unwrap(),
                    reason: format!("label '{label}' longer than 63 characters"),
                });
            }
            buf.push(label.len() as u8);
            buf.extend_from_slice(label.as_bytes());
        }
    }

    buf.push(0);
    Ok(())
}

fn wire_err(endpoint: SocketAddr, reason: &str) -> Error {
    Error::WireFormat {
        endpoint,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> SocketAddr {
        "127.0.0.1:53".parse().unwrap()
    }

    #[test]
    fn round_trips_a_simple_name() {
        let mut buf = Vec::new();
        write_name(&mut buf, "example.com.").unwrap();

        let (name, consumed) = read_name(&buf, 0, endpoint()).unwrap();
        assert_eq!(name, "example.com.");
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn root_name_is_a_single_zero_octet() {
        let mut buf = Vec::new();
        write_name(&mut buf, ".").unwrap();
        assert_eq!(buf, vec![0u8]);

        let (name, consumed) = read_name(&buf, 0, endpoint()).unwrap();
        assert_eq!(name, ".");
        assert_eq!(consumed, 1);
    }

    #[test]
    fn follows_a_compression_pointer() {
        let mut buf = Vec::new();
        write_name(&mut buf, "example.com.").unwrap();
        let target = buf.len();
        // second name: a "www" label followed by a pointer back to `target`.
        buf.push(3);
        buf.extend_from_slice(b"www");
        buf.push(0xc0 | ((target >> 8) as u8));
        buf.push((target & 0xff) as u8);

        let (name, _) = read_name(&buf, target, endpoint()).unwrap();
        assert_eq!(name, "example.com.");

        let (name, consumed) = read_name(&buf, target + 4, endpoint()).unwrap();
        assert_eq!(name, "www.example.com.");
        assert_eq!(consumed, 6);
    }

    #[test]
    fn rejects_a_pointer_that_does_not_point_strictly_earlier() {
        // a pointer at offset 0 pointing at itself.
        let buf = vec![0xc0, 0x00];
        let err = read_name(&buf, 0, endpoint()).unwrap_err();
        assert!(matches!(err, Error::WireFormat { .. }));
    }

    #[test]
    fn rejects_a_label_longer_than_63_octets() {
        let err = write_name(&mut Vec::new(), &"a".repeat(64)).unwrap_err();
        assert!(matches!(err, Error::WireFormat { .. }));
    }
}
