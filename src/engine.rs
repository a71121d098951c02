//! Query engine (§4.5, C3): orchestrates cache, server pool, transport, and
//! response classification into `query`/`query_async`/`query_reverse`.
//!
//! Grounded on the teacher's `src/clients/resolver.rs` (`Resolver::lookup`:
//! build `Message`, call the client, inspect `rcode`, walk `answers`) for
//! the overall shape, generalized into the full retry/failover state
//! machine, and on RoeeJ-heimdall's resolver
//! (`other_examples/.../resolver.rs`) for the per-server retry loop and the
//! UDP-truncated-response-triggers-TCP-retry control flow. Cancellation
//! (`CancellationToken`, raced against each transport call) follows
//! `yaleman-goatns`'s use of the same `tokio-util` primitive for
//! in-flight-request teardown.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::audit::{AuditTrail, Event};
use crate::cache::ResponseCache;
use crate::config::ClientOptions;
use crate::error::{Error, Result, TriedServer};
use crate::health::HealthProber;
use crate::pool::ServerPool;
use crate::transport::{TcpTransport, Transport, UdpTransport};
use crate::wire::{Extension, Header, Message, Opcode, Question, Record, Resource, QR};

/// The UDP payload size this crate advertises via EDNS(0) on every request
/// (§4.1). Negotiated-down sizes observed from a server's own OPT record
/// are tracked separately per `NameServer`.
const ADVERTISED_UDP_PAYLOAD_SIZE: u16 = 4096;

/// The outcome of one logical query: the decoded message plus an optional
/// audit trail (populated only when `enable_audit_trail` is set).
#[derive(Clone, Debug)]
pub struct QueryResponse {
    pub message: Message,
    pub audit: Option<AuditTrail>,
}

/// An error from a logical query, carrying whatever audit trail had
/// accumulated up to the point of failure (§4.7/§7: "attached to any
/// thrown error").
#[derive(Debug)]
pub struct QueryFailure {
    pub error: Error,
    pub audit: Option<AuditTrail>,
}

impl std::fmt::Display for QueryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.error, f)
    }
}

impl std::error::Error for QueryFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Result alias for the engine's public entry points.
pub type QueryResult<T> = std::result::Result<T, QueryFailure>;

/// A stub resolver client: a server pool, a response cache, and the
/// transports used to reach the pool, wired together by the state machine
/// in [`Client::query_async`].
pub struct Client {
    pool: Arc<ServerPool>,
    cache: Arc<ResponseCache>,
    options: ClientOptions,
    udp: Arc<dyn Transport>,
    tcp: Arc<dyn Transport>,
    health: Arc<HealthProber>,
    txid: AtomicU16,
}

impl Client {
    /// Builds a client talking to `servers` (in the order given). Returns
    /// `Err(Error::InvalidConfig)` if `options` fails validation or the
    /// server list is empty.
    pub fn new(servers: Vec<SocketAddr>, options: ClientOptions) -> Result<Client> {
        Self::with_transports(servers, options, Arc::new(UdpTransport), Arc::new(TcpTransport))
    }

    /// As [`Client::new`], but with the transports injected -- the seam
    /// tests use to substitute a mock.
    pub fn with_transports(
        servers: Vec<SocketAddr>,
        options: ClientOptions,
        udp: Arc<dyn Transport>,
        tcp: Arc<dyn Transport>,
    ) -> Result<Client> {
        options.validate()?;
        if servers.is_empty() {
            return Err(Error::InvalidConfig("at least one name server is required".to_string()));
        }

        let mut seed_bytes = [0u8; 2];
        rand::thread_rng().fill(&mut seed_bytes);

        Ok(Client {
            pool: Arc::new(ServerPool::new(servers)),
            cache: Arc::new(ResponseCache::new(options.min_cache_ttl)),
            options,
            udp,
            tcp,
            health: Arc::new(HealthProber::new()),
            txid: AtomicU16::new(u16::from_be_bytes(seed_bytes)),
        })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn pool(&self) -> &ServerPool {
        &self.pool
    }

    fn next_txid(&self) -> u16 {
        self.txid.fetch_add(1, Ordering::Relaxed)
    }

    /// Cooperative-suspension entry point: runs the full cache/pool/
    /// transport/classify state machine for one `(name, qtype, qclass)`
    /// question. `cancel` is checked at every loop boundary and raced
    /// against every in-flight transport call; a token already cancelled
    /// on entry returns `Error::Cancelled` without making any transport
    /// call at all (§4.5, §6, §8 property 7).
    #[instrument(skip(self, cancel), fields(name = %name, qtype, qclass))]
    pub async fn query_async(
        &self,
        name: &str,
        qtype: u16,
        qclass: u16,
        cancel: CancellationToken,
    ) -> QueryResult<QueryResponse> {
        let mut audit = self
            .options
            .enable_audit_trail
            .then(|| AuditTrail::new(now_utc()));

        match self.query_inner(name, qtype, qclass, &cancel, &mut audit).await {
            Ok(message) => Ok(QueryResponse { message, audit }),
            Err(error) => Err(QueryFailure { error, audit }),
        }
    }

    async fn query_inner(
        &self,
        name: &str,
        qtype: u16,
        qclass: u16,
        cancel: &CancellationToken,
        audit: &mut Option<AuditTrail>,
    ) -> Result<Message> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if self.options.use_cache {
            if let Some(cached) = self.cache.get(name, qtype, qclass) {
                if let Some(a) = audit.as_mut() {
                    a.push(Event::CacheHit { name: name.to_string() });
                }
                debug!(name, "cache hit");
                return Ok(cached);
            }
            if let Some(a) = audit.as_mut() {
                a.push(Event::CacheMiss { name: name.to_string() });
            }
        }

        self.health.maybe_probe(Arc::clone(&self.pool), Arc::clone(&self.udp)).await;

        let question = Question {
            name: name.to_string(),
            qtype,
            qclass,
        };

        let ordering = self.pool.ordering(self.options.use_random_server);
        if ordering.is_empty() {
            return Err(Error::InvalidConfig("server pool is empty".to_string()));
        }

        let mut tried = Vec::new();
        let mut last_error: Option<Error> = None;

        'servers: for server in &ordering {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let mut attempts_used = 0u32;
            let max_attempts = 1 + self.options.retries;

            while attempts_used < max_attempts {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                attempts_used += 1;

                match self.attempt(server.endpoint, &question, audit, cancel).await {
                    Ok(message) => {
                        if let Some(rcode_err) = self.classify_rcode(&message, &question, server.endpoint) {
                            if let Some(a) = audit.as_mut() {
                                a.push(Event::Failure {
                                    endpoint: Some(server.endpoint),
                                    reason: rcode_err.to_string(),
                                });
                            }
                            last_error = Some(rcode_err);
                            if self.options.continue_on_dns_error {
                                break;
                            } else {
                                return Err(last_error.unwrap());
                            }
                        }

                        self.pool.record_success(server.endpoint, question.clone());

                        if self.options.use_cache && message.header.rcode == crate::wire::Rcode::NoError {
                            self.cache.insert(name, qtype, qclass, message.clone());
                        }

                        info!(endpoint = %server.endpoint, "query succeeded");
                        tried.push(TriedServer {
                            endpoint: server.endpoint,
                            attempts: attempts_used,
                        });
                        return Ok(message);
                    }
                    Err(e) => {
                        if matches!(e, Error::Cancelled) {
                            return Err(e);
                        }

                        if let Some(a) = audit.as_mut() {
                            a.push(Event::Failure {
                                endpoint: Some(server.endpoint),
                                reason: e.to_string(),
                            });
                        }

                        if e.is_permanent() {
                            warn!(endpoint = %server.endpoint, error = %e, "disabling server");
                            self.pool.disable(server.endpoint);
                            if let Some(a) = audit.as_mut() {
                                a.push(Event::ServerDisabled {
                                    endpoint: server.endpoint,
                                    reason: e.to_string(),
                                });
                            }
                            last_error = Some(e);
                            break;
                        }

                        last_error = Some(e);
                        // transient: loop again against the same server, up to max_attempts
                    }
                }
            }

            tried.push(TriedServer {
                endpoint: server.endpoint,
                attempts: attempts_used,
            });
            continue 'servers;
        }

        match last_error {
            Some(e) if self.options.throw_errors => Err(e),
            _ => Err(Error::ConnectionTimeout { tried }),
        }
    }

    /// If `message`'s RCODE is not `NoError`, builds the `DnsResponse`
    /// error the engine classifies on; otherwise `None`.
    fn classify_rcode(&self, message: &Message, question: &Question, endpoint: SocketAddr) -> Option<Error> {
        if message.header.rcode == crate::wire::Rcode::NoError {
            None
        } else {
            Some(Error::DnsResponse {
                endpoint,
                rcode: message.header.rcode,
                question: question.clone(),
            })
        }
    }

    /// Sends one query to `endpoint`, over UDP unless `use_tcp_only` is set,
    /// upgrading to TCP on a truncated UDP response without consuming a
    /// retry (Open Question decision: truncation is not counted against
    /// `retries`). Every transport call is raced against `cancel`.
    async fn attempt(
        &self,
        endpoint: SocketAddr,
        question: &Question,
        audit: &mut Option<AuditTrail>,
        cancel: &CancellationToken,
    ) -> Result<Message> {
        let query = self.build_query(question);
        let timeout = self.options.timeout.as_duration();

        let response = if self.options.use_tcp_only {
            if let Some(a) = audit.as_mut() {
                a.push(Event::Attempt { endpoint, transport: "tcp", attempt: 1 });
            }
            let started = Instant::now();
            let response = race_cancel(cancel, self.tcp.exchange(endpoint, &query, timeout)).await?;
            if let Some(a) = audit.as_mut() {
                a.push(Event::Response { endpoint, rcode: response.header.rcode, elapsed: started.elapsed() });
            }
            response
        } else {
            if let Some(a) = audit.as_mut() {
                a.push(Event::Attempt { endpoint, transport: "udp", attempt: 1 });
            }
            let started = Instant::now();
            let udp_response = race_cancel(cancel, self.udp.exchange(endpoint, &query, timeout)).await?;

            if udp_response.header.tc && self.options.use_tcp_fallback {
                if let Some(a) = audit.as_mut() {
                    a.push(Event::TruncatedUpgrade { endpoint });
                    a.push(Event::Attempt { endpoint, transport: "tcp", attempt: 1 });
                }
                let started = Instant::now();
                let response = race_cancel(cancel, self.tcp.exchange(endpoint, &query, timeout)).await?;
                if let Some(a) = audit.as_mut() {
                    a.push(Event::Response { endpoint, rcode: response.header.rcode, elapsed: started.elapsed() });
                }
                response
            } else {
                if let Some(a) = audit.as_mut() {
                    a.push(Event::Response { endpoint, rcode: udp_response.header.rcode, elapsed: started.elapsed() });
                }
                udp_response
            }
        };

        Ok(self.capture_and_strip_opt(endpoint, response))
    }

    /// Captures the server's negotiated UDP payload size from the response's
    /// OPT pseudo-record, if present, then strips that record from the
    /// additional section before returning the message to the caller
    /// (§4.5: "capture its UDP size into the server record" then discard).
    fn capture_and_strip_opt(&self, endpoint: SocketAddr, mut message: Message) -> Message {
        if let Some(pos) = message.additionals.iter().position(|r| r.r#type == 41) {
            let opt = message.additionals.remove(pos);
            if let Resource::Opt(extension) = opt.resource {
                self.pool.record_udp_payload_size(endpoint, extension.payload_size);
            }
        }
        message
    }

    fn build_query(&self, question: &Question) -> Message {
        let extension = Extension {
            payload_size: ADVERTISED_UDP_PAYLOAD_SIZE,
            extended_rcode: 0,
            version: 0,
            dnssec_ok: false,
            options: Vec::new(),
        };
        let (class, ttl, _) = extension.write();

        let opt_record = Record {
            name: ".".to_string(),
            r#type: 41,
            class,
            ttl,
            resource: Resource::Opt(extension),
        };

        Message {
            header: Header {
                id: self.next_txid(),
                qr: QR::Query,
                opcode: Opcode::Query,
                rd: self.options.recursion_desired,
                qdcount: 1,
                ..Header::default()
            },
            questions: vec![question.clone()],
            additionals: vec![opt_record],
            ..Message::default()
        }
    }

    /// Blocking entry point: drives [`Client::query_async`] to completion on
    /// a dedicated current-thread runtime, for callers outside an async
    /// context.
    pub fn query(&self, name: &str, qtype: u16, qclass: u16, cancel: CancellationToken) -> QueryResult<QueryResponse> {
        let rt = blocking_runtime().map_err(|error| QueryFailure { error, audit: None })?;
        rt.block_on(self.query_async(name, qtype, qclass, cancel))
    }

    /// Blocking reverse lookup: resolves the PTR record for `addr`.
    pub fn query_reverse(&self, addr: IpAddr, cancel: CancellationToken) -> QueryResult<QueryResponse> {
        let rt = blocking_runtime().map_err(|error| QueryFailure { error, audit: None })?;
        rt.block_on(self.query_reverse_async(addr, cancel))
    }

    /// Cooperative-suspension reverse lookup: builds the `in-addr.arpa`/
    /// `ip6.arpa` question for `addr` and queries it as PTR/IN.
    pub async fn query_reverse_async(&self, addr: IpAddr, cancel: CancellationToken) -> QueryResult<QueryResponse> {
        let name = reverse_lookup_name(addr);
        self.query_async(&name, 12 /* PTR */, 1 /* IN */, cancel).await
    }
}

/// Races `fut` against `cancel`, returning `Error::Cancelled` if the token
/// fires first. This is what arms cancellation into the transport deadline
/// (§5): an in-flight UDP/TCP exchange is abandoned the moment `cancel`
/// fires, not just checked between attempts.
async fn race_cancel<T>(cancel: &CancellationToken, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

fn blocking_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(Error::Io)
}

fn reverse_lookup_name(addr: IpAddr) -> String {
    match addr {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            format!("{}.{}.{}.{}.in-addr.arpa.", o[3], o[2], o[1], o[0])
        }
        IpAddr::V6(v6) => {
            let mut nibbles = String::with_capacity(64);
            for byte in v6.octets().iter().rev() {
                nibbles.push_str(&format!("{:x}.{:x}.", byte & 0x0f, byte >> 4));
            }
            format!("{nibbles}ip6.arpa.")
        }
    }
}

fn now_utc() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}
