//! UDP transport: one datagram out, one datagram in, per attempt.
//!
//! Grounded on the teacher's `src/clients/udp.rs` (`UdpClient::exchange`)
//! for the single-socket-per-attempt shape, ported to `tokio::net::UdpSocket`
//! and `tokio::time::timeout` the way RoeeJ-heimdall's resolver drives its
//! UDP path.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::trace;

use crate::error::{classify_io_error, Error, Result};
use crate::transport::Transport;
use crate::wire::Message;

/// Maximum UDP response this transport will accept. The EDNS(0) payload
/// size advertised by the engine governs what a well-behaved server sends;
/// this is a hard backstop against a misbehaving one.
const MAX_UDP_RESPONSE: usize = 4096;

#[derive(Debug, Default)]
pub struct UdpTransport;

#[async_trait]
impl Transport for UdpTransport {
    async fn exchange(
        &self,
        endpoint: SocketAddr,
        query: &Message,
        timeout: Option<Duration>,
    ) -> Result<Message> {
        let local_addr: SocketAddr = if endpoint.is_ipv4() {
            "0.0.0.0:0".parse().unwrap()
        } else {
            "[::]:0".parse().unwrap()
        };

        let socket = UdpSocket::bind(local_addr)
            .await
            .map_err(|e| classify_io_error(endpoint, e))?;
        socket
            .connect(endpoint)
            .await
            .map_err(|e| classify_io_error(endpoint, e))?;

        let wire = query.to_vec()?;

        let send = socket.send(&wire);
        match timeout {
            Some(d) => tokio::time::timeout(d, send)
                .await
                .map_err(|_| Error::Timeout { endpoint, elapsed: d })?
                .map_err(|e| classify_io_error(endpoint, e))?,
            None => send.await.map_err(|e| classify_io_error(endpoint, e))?,
        };

        let deadline = timeout.map(|d| tokio::time::Instant::now() + d);
        let mut buf = vec![0u8; MAX_UDP_RESPONSE];

        loop {
            let remaining = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                    if remaining.is_zero() {
                        return Err(Error::Timeout {
                            endpoint,
                            elapsed: timeout.unwrap(),
                        });
                    }
                    Some(remaining)
                }
                None => None,
            };

            let recv = socket.recv(&mut buf);
            let n = match remaining {
                Some(d) => tokio::time::timeout(d, recv)
                    .await
                    .map_err(|_| Error::Timeout { endpoint, elapsed: timeout.unwrap() })?
                    .map_err(|e| classify_io_error(endpoint, e))?,
                None => recv.await.map_err(|e| classify_io_error(endpoint, e))?,
            };

            let response = match Message::parse(&buf[..n], endpoint) {
                Ok(response) => response,
                Err(_) => {
                    trace!(%endpoint, "discarding malformed UDP datagram");
                    continue;
                }
            };

            if response.header.id != query.header.id {
                trace!(%endpoint, expected = query.header.id, got = response.header.id, "discarding mismatched transaction id");
                continue;
            }
            if response.questions != query.questions {
                trace!(%endpoint, "discarding response with mismatched question");
                continue;
            }

            return Ok(response);
        }
    }
}
