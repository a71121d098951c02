//! The full message: header, question, and the three record sections.
//!
//! Grounded on the teacher's `src/dns.rs` (`MessageParser`'s decode loop and
//! `Message::to_vec`'s encoder) and `src/types.rs` (`Message`/`Question`
//! field layout).

use std::net::SocketAddr;

use byteorder::{BigEndian, WriteBytesExt};

use crate::error::Error;
use crate::wire::header::{Header, Opcode, Rcode, QR};
use crate::wire::name::{read_name, write_name};
use crate::wire::record::{parse_rdata, write_rdata, Resource};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Question {
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub name: String,
    pub r#type: u16,
    pub class: u16,
    pub ttl: u32,
    pub resource: Resource,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<Record>,
    pub authorities: Vec<Record>,
    pub additionals: Vec<Record>,
}

impl Message {
    /// Decodes a full message from `buf` as received from `endpoint`.
    pub fn parse(buf: &[u8], endpoint: SocketAddr) -> Result<Message, Error> {
        if buf.len() < 12 {
            return Err(wire_err(endpoint, "message shorter than the 12-byte header"));
        }

        let flags1 = buf[2];
        let flags2 = buf[3];

        let header = Header {
            id: u16::from_be_bytes([buf[0], buf[1]]),
            qr: QR::from_bool(flags1 & 0x80 != 0),
            opcode: num_traits::FromPrimitive::from_u8((flags1 >> 3) & 0x0f)
                .ok_or_else(|| wire_err(endpoint, "unrecognized opcode"))?,
            aa: flags1 & 0x04 != 0,
            tc: flags1 & 0x02 != 0,
            rd: flags1 & 0x01 != 0,
            ra: flags2 & 0x80 != 0,
            z: flags2 & 0x40 != 0,
            ad: flags2 & 0x20 != 0,
            cd: flags2 & 0x10 != 0,
            rcode: num_traits::FromPrimitive::from_u8(flags2 & 0x0f)
                .unwrap_or(Rcode::NoError),
            qdcount: u16::from_be_bytes([buf[4], buf[5]]),
            ancount: u16::from_be_bytes([buf[6], buf[7]]),
            nscount: u16::from_be_bytes([buf[8], buf[9]]),
            arcount: u16::from_be_bytes([buf[10], buf[11]]),
        };

        let mut pos = 12usize;
        let mut questions = Vec::with_capacity(header.qdcount as usize);
        for _ in 0..header.qdcount {
            let (name, consumed) = read_name(buf, pos, endpoint)?;
            pos += consumed;
            let tail = buf
                .get(pos..pos + 4)
                .ok_or_else(|| wire_err(endpoint, "truncated question"))?;
            questions.push(Question {
                name,
                qtype: u16::from_be_bytes([tail[0], tail[1]]),
                qclass: u16::from_be_bytes([tail[2], tail[3]]),
            });
            pos += 4;
        }

        let mut parse_records = |count: u16, pos: &mut usize| -> Result<Vec<Record>, Error> {
            let mut records = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (name, consumed) = read_name(buf, *pos, endpoint)?;
                *pos += consumed;
                let head = buf
                    .get(*pos..*pos + 10)
                    .ok_or_else(|| wire_err(endpoint, "truncated record header"))?;
                let raw_type = u16::from_be_bytes([head[0], head[1]]);
                let class = u16::from_be_bytes([head[2], head[3]]);
                let ttl = u32::from_be_bytes([head[4], head[5], head[6], head[7]]);
                let rdlength = u16::from_be_bytes([head[8], head[9]]) as usize;
                *pos += 10;

                let resource = parse_rdata(buf, *pos, rdlength, raw_type, class, ttl, endpoint)?;
                *pos += rdlength;

                records.push(Record {
                    name,
                    r#type: raw_type,
                    class,
                    ttl,
                    resource,
                });
            }
            Ok(records)
        };

        let answers = parse_records(header.ancount, &mut pos)?;
        let authorities = parse_records(header.nscount, &mut pos)?;
        let additionals = parse_records(header.arcount, &mut pos)?;

        Ok(Message {
            header,
            questions,
            answers,
            authorities,
            additionals,
        })
    }

    /// Encodes this message for transmission. Counts are recomputed from the
    /// actual section lengths rather than trusted from `header`.
    pub fn to_vec(&self) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::with_capacity(512);

        let mut flags1 = 0u8;
        if self.header.qr.to_bool() {
            flags1 |= 0x80;
        }
        flags1 |= (self.header.opcode as u8) << 3;
        if self.header.aa {
            flags1 |= 0x04;
        }
        if self.header.tc {
            flags1 |= 0x02;
        }
        if self.header.rd {
            flags1 |= 0x01;
        }

        let mut flags2 = 0u8;
        if self.header.ra {
            flags2 |= 0x80;
        }
        if self.header.z {
            flags2 |= 0x40;
        }
        if self.header.ad {
            flags2 |= 0x20;
        }
        if self.header.cd {
            flags2 |= 0x10;
        }
        flags2 |= self.header.rcode as u8 & 0x0f;

        buf.write_u16::<BigEndian>(self.header.id)?;
        buf.push(flags1);
        buf.push(flags2);
        buf.write_u16::<BigEndian>(self.questions.len() as u16)?;
        buf.write_u16::<BigEndian>(self.answers.len() as u16)?;
        buf.write_u16::<BigEndian>(self.authorities.len() as u16)?;
        buf.write_u16::<BigEndian>(self.additionals.len() as u16)?;

        for q in &self.questions {
            write_name(&mut buf, &q.name)?;
            buf.write_u16::<BigEndian>(q.qtype)?;
            buf.write_u16::<BigEndian>(q.qclass)?;
        }

        for record in self
            .answers
            .iter()
            .chain(self.authorities.iter())
            .chain(self.additionals.iter())
        {
            write_record(&mut buf, record)?;
        }

        Ok(buf)
    }
}

fn write_record(buf: &mut Vec<u8>, record: &Record) -> Result<(), Error> {
    write_name(buf, &record.name)?;
    buf.write_u16::<BigEndian>(record.r#type)?;
    buf.write_u16::<BigEndian>(record.class)?;
    buf.write_u32::<BigEndian>(record.ttl)?;

    let mut rdata = Vec::new();
    write_rdata(&mut rdata, &record.resource)?;

    buf.write_u16::<BigEndian>(rdata.len() as u16)?;
    buf.extend_from_slice(&rdata);
    Ok(())
}

fn wire_err(endpoint: SocketAddr, reason: &str) -> Error {
    Error::WireFormat {
        endpoint,
        reason: reason.to_string(),
    }
}
