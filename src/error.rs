//! The crate-wide error taxonomy.
//!
//! Every fallible public operation returns [`Error`]. Variants line up with
//! the classification table in the engine's retry/failover logic: wire
//! errors disable the current server and move on, transient transport
//! errors retry the same server, permanent ones disable and move on, and so
//! on. See [`Error::is_transient`] and [`Error::is_permanent`].

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::wire::Question;

pub type Result<T> = std::result::Result<T, Error>;

/// A single name server, as seen by a failed attempt, for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TriedServer {
    pub endpoint: SocketAddr,
    pub attempts: u32,
}

#[derive(Error, Debug)]
pub enum Error {
    /// The wire message was malformed: short read, a label or pointer that
    /// violates RFC 1035 framing, a compression loop, etc. The attempt is
    /// aborted but the server is not disabled for a wire-format error on a
    /// server reached via a previously working transport path -- the engine
    /// still disables it per §4.5, but callers should know this is not a
    /// reachability problem.
    #[error("malformed DNS message from {endpoint}: {reason}")]
    WireFormat {
        endpoint: SocketAddr,
        reason: String,
    },

    /// The per-attempt deadline elapsed before a response arrived.
    #[error("timed out waiting for {endpoint} after {elapsed:?}")]
    Timeout {
        endpoint: SocketAddr,
        elapsed: Duration,
    },

    /// A transport error that the transport's `is_transient` predicate
    /// classifies as worth retrying against the same server (connection
    /// reset, host unreachable, refused after first packet, ...).
    #[error("transient transport error talking to {endpoint}: {source}")]
    TransientTransport {
        endpoint: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// A transport error that will not improve by retrying the same server
    /// (e.g. address-family-not-supported). The server is disabled.
    #[error("permanent transport error talking to {endpoint}: {source}")]
    PermanentTransport {
        endpoint: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The response decoded cleanly but carried a non-`NoError` RCODE.
    #[error("{endpoint} returned DNS error {rcode} for {question:?}")]
    DnsResponse {
        endpoint: SocketAddr,
        rcode: crate::wire::Rcode,
        question: Question,
    },

    /// The caller's cancellation signal fired before or during an attempt.
    #[error("query was cancelled")]
    Cancelled,

    /// No server in the pool could be reached at all.
    #[error("no server reachable after trying {tried:?}")]
    ConnectionTimeout { tried: Vec<TriedServer> },

    /// A transport/codec failure that doesn't fit cleanly above but exhausted
    /// the server list; wraps the last observed inner error.
    #[error("connection error: {source}")]
    ConnectionError {
        #[source]
        source: Box<Error>,
    },

    /// Raw OS-level I/O failure that doesn't classify as transient or
    /// permanent on its own (e.g. failed to bind a local socket).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A `ClientOptions` value failed validation at construction time.
    #[error("invalid resolver configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Mirrors §7: should the engine retry the *same* server?
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::TransientTransport { .. })
    }

    /// Mirrors §7: should the engine disable the server and move to the next?
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Error::PermanentTransport { .. } | Error::WireFormat { .. }
        )
    }

    pub fn endpoint(&self) -> Option<SocketAddr> {
        match self {
            Error::WireFormat { endpoint, .. }
            | Error::Timeout { endpoint, .. }
            | Error::TransientTransport { endpoint, .. }
            | Error::PermanentTransport { endpoint, .. }
            | Error::DnsResponse { endpoint, .. } => Some(*endpoint),
            _ => None,
        }
    }
}

/// Classifies a raw `io::Error` observed by a transport into transient vs.
/// permanent, per §4.2. Transports call this to build the right [`Error`]
/// variant.
pub fn classify_io_error(endpoint: SocketAddr, err: std::io::Error) -> Error {
    use std::io::ErrorKind::*;

    match err.kind() {
        ConnectionReset | ConnectionRefused | ConnectionAborted | NotConnected | TimedOut
        | Interrupted | WouldBlock => Error::TransientTransport {
            endpoint,
            source: err,
        },
        // AddrNotAvailable / Unsupported cover "address family not supported"
        // on most platforms; std doesn't expose a dedicated ErrorKind for it.
        AddrNotAvailable | Unsupported => Error::PermanentTransport {
            endpoint,
            source: err,
        },
        _ => Error::TransientTransport {
            endpoint,
            source: err,
        },
    }
}
