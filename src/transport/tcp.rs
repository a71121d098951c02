//! TCP transport: a fresh connection per attempt, 2-byte big-endian length
//! prefix per RFC 1035 section 4.2.2. No connection pooling or pipelining
//! (DESIGN.md: Open Question decision).
//!
//! Grounded on the teacher's `src/clients/tcp.rs` (`TcpClient::exchange`),
//! ported to `tokio::net::TcpStream`.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use byteorder::{BigEndian, WriteBytesExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{classify_io_error, Error, Result};
use crate::transport::Transport;
use crate::wire::Message;

#[derive(Debug, Default)]
pub struct TcpTransport;

#[async_trait]
impl Transport for TcpTransport {
    async fn exchange(
        &self,
        endpoint: SocketAddr,
        query: &Message,
        timeout: Option<Duration>,
    ) -> Result<Message> {
        let connect = TcpStream::connect(endpoint);
        let mut stream = match timeout {
            Some(d) => tokio::time::timeout(d, connect)
                .await
                .map_err(|_| Error::Timeout { endpoint, elapsed: d })?
                .map_err(|e| classify_io_error(endpoint, e))?,
            None => connect.await.map_err(|e| classify_io_error(endpoint, e))?,
        };

        let wire = query.to_vec()?;
        let mut framed = Vec::with_capacity(wire.len() + 2);
        framed.write_u16::<BigEndian>(wire.len() as u16)?;
        framed.extend_from_slice(&wire);

        let write = stream.write_all(&framed);
        match timeout {
            Some(d) => tokio::time::timeout(d, write)
                .await
                .map_err(|_| Error::Timeout { endpoint, elapsed: d })?
                .map_err(|e| classify_io_error(endpoint, e))?,
            None => write.await.map_err(|e| classify_io_error(endpoint, e))?,
        };

        let mut len_buf = [0u8; 2];
        let read_len = stream.read_exact(&mut len_buf);
        match timeout {
            Some(d) => tokio::time::timeout(d, read_len)
                .await
                .map_err(|_| Error::Timeout { endpoint, elapsed: d })?
                .map_err(|e| classify_io_error(endpoint, e))?,
            None => read_len.await.map_err(|e| classify_io_error(endpoint, e))?,
        };
        let response_len = u16::from_be_bytes(len_buf) as usize;

        let mut response = vec![0u8; response_len];
        let read_body = stream.read_exact(&mut response);
        match timeout {
            Some(d) => tokio::time::timeout(d, read_body)
                .await
                .map_err(|_| Error::Timeout { endpoint, elapsed: d })?
                .map_err(|e| classify_io_error(endpoint, e))?,
            None => read_body.await.map_err(|e| classify_io_error(endpoint, e))?,
        };

        Message::parse(&response, endpoint)
    }
}
