//! Transport layer: sends an encoded message to one name server and returns
//! the raw decoded response (component C2).
//!
//! Grounded on the teacher's `clients::Exchanger` trait shape (`src/clients/mod.rs`),
//! reworked from blocking std sockets to `async_trait` over `tokio::net`
//! following RoeeJ-heimdall's resolver (`other_examples/.../resolver.rs`),
//! which is the pack's only async DNS transport to learn the pattern from.

mod tcp;
mod udp;

pub use tcp::TcpTransport;
pub use udp::UdpTransport;

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::wire::Message;

/// One way of reaching a name server. `UdpTransport` and `TcpTransport` are
/// the two the engine chooses between per §4.2/§4.3; tests substitute a
/// mock implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `query` to `endpoint` and waits up to `timeout` for a reply
    /// (`None` meaning no deadline). Implementations classify I/O failures
    /// via [`crate::error::classify_io_error`] rather than returning raw
    /// `Io` errors, so the engine can make retry/failover decisions.
    async fn exchange(
        &self,
        endpoint: SocketAddr,
        query: &Message,
        timeout: Option<Duration>,
    ) -> Result<Message>;
}
