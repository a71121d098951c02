//! Name server pool (§4.4, C4): the ordered list of configured servers, each
//! independently enabled or disabled, with rotation and a degraded mode.
//!
//! No direct teacher counterpart (the teacher's `Resolver<E>` addresses a
//! single server); grounded on the spec's pool rules plus the teacher's
//! plain-struct-with-methods style (e.g. `src/types.rs`'s `Message`).

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Mutex;

use crate::wire::Question;

/// The RFC 1035 default UDP payload size, assumed until EDNS(0) negotiates
/// a larger one with a server (§3).
const DEFAULT_UDP_PAYLOAD_SIZE: u16 = 512;

/// One configured name server. `enabled` flips to `false` when the engine
/// classifies a failure against it as permanent (§4.5); it is never removed
/// from the pool, only skipped. `last_successful_request` and
/// `negotiated_udp_payload_size` are updated on every successful response
/// (§4.5 step 5, §4.6) and drive the health prober's re-probe question.
#[derive(Debug)]
pub struct NameServer {
    pub endpoint: SocketAddr,
    enabled: AtomicBool,
    last_successful_request: Mutex<Option<Question>>,
    negotiated_udp_payload_size: AtomicU16,
}

impl NameServer {
    pub fn new(endpoint: SocketAddr) -> NameServer {
        NameServer {
            endpoint,
            enabled: AtomicBool::new(true),
            last_successful_request: Mutex::new(None),
            negotiated_udp_payload_size: AtomicU16::new(DEFAULT_UDP_PAYLOAD_SIZE),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    pub fn last_successful_request(&self) -> Option<Question> {
        self.last_successful_request.lock().unwrap().clone()
    }

    pub fn negotiated_udp_payload_size(&self) -> u16 {
        self.negotiated_udp_payload_size.load(Ordering::Acquire)
    }
}

impl Clone for NameServer {
    fn clone(&self) -> Self {
        NameServer {
            endpoint: self.endpoint,
            enabled: AtomicBool::new(self.is_enabled()),
            last_successful_request: Mutex::new(self.last_successful_request()),
            negotiated_udp_payload_size: AtomicU16::new(self.negotiated_udp_payload_size()),
        }
    }
}

/// The ordered set of servers a query may be sent to. Rotation (for
/// `use_random_server`) moves the front server to the back of the deque
/// once per logical query rather than reshuffling, so ordering stays
/// stable for diagnostics (§4.4).
pub struct ServerPool {
    servers: Mutex<VecDeque<NameServer>>,
    count: usize,
}

impl ServerPool {
    pub fn new(endpoints: Vec<SocketAddr>) -> ServerPool {
        let count = endpoints.len();
        ServerPool {
            servers: Mutex::new(endpoints.into_iter().map(NameServer::new).collect()),
            count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns the ordering to try for one logical query: enabled servers
    /// first (starting after the rotation point, wrapping), then -- if
    /// every server is disabled -- the full list anyway (degraded mode,
    /// §4.4: "a pool with no enabled servers tries all of them rather than
    /// failing without an attempt").
    pub fn ordering(&self, rotate: bool) -> Vec<NameServer> {
        let mut guard = self.servers.lock().unwrap();
        if guard.is_empty() {
            return Vec::new();
        }

        if rotate {
            if let Some(front) = guard.pop_front() {
                guard.push_back(front);
            }
        }

        let all: Vec<NameServer> = guard.iter().cloned().collect();
        drop(guard);

        let enabled: Vec<NameServer> = all.iter().filter(|s| s.is_enabled()).cloned().collect();

        if enabled.is_empty() {
            all
        } else {
            enabled
        }
    }

    pub fn servers(&self) -> Vec<NameServer> {
        self.servers.lock().unwrap().iter().cloned().collect()
    }

    /// Marks the server at `endpoint` disabled, if present in the pool.
    pub fn disable(&self, endpoint: SocketAddr) {
        let guard = self.servers.lock().unwrap();
        if let Some(server) = guard.iter().find(|s| s.endpoint == endpoint) {
            server.disable();
        }
    }

    /// Marks the server at `endpoint` enabled, if present in the pool.
    pub fn enable(&self, endpoint: SocketAddr) {
        let guard = self.servers.lock().unwrap();
        if let Some(server) = guard.iter().find(|s| s.endpoint == endpoint) {
            server.enable();
        }
    }

    /// Records a successful exchange with `endpoint`: re-enables it and
    /// remembers `question` as the one to re-probe with while disabled
    /// (§4.5 step 5).
    pub fn record_success(&self, endpoint: SocketAddr, question: Question) {
        let guard = self.servers.lock().unwrap();
        if let Some(server) = guard.iter().find(|s| s.endpoint == endpoint) {
            server.enable();
            *server.last_successful_request.lock().unwrap() = Some(question);
        }
    }

    /// Records the UDP payload size `endpoint` negotiated via EDNS(0).
    pub fn record_udp_payload_size(&self, endpoint: SocketAddr, size: u16) {
        let guard = self.servers.lock().unwrap();
        if let Some(server) = guard.iter().find(|s| s.endpoint == endpoint) {
            server.negotiated_udp_payload_size.store(size, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn ordering_without_rotation_is_stable() {
        let pool = ServerPool::new(vec![addr(1), addr(2), addr(3)]);
        let first: Vec<_> = pool.ordering(false).iter().map(|s| s.endpoint).collect();
        let second: Vec<_> = pool.ordering(false).iter().map(|s| s.endpoint).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec![addr(1), addr(2), addr(3)]);
    }

    #[test]
    fn rotation_advances_by_one_each_call() {
        let pool = ServerPool::new(vec![addr(1), addr(2), addr(3)]);
        let first: Vec<_> = pool.ordering(true).iter().map(|s| s.endpoint).collect();
        let second: Vec<_> = pool.ordering(true).iter().map(|s| s.endpoint).collect();
        assert_eq!(first, vec![addr(2), addr(3), addr(1)]);
        assert_eq!(second, vec![addr(3), addr(1), addr(2)]);
    }

    #[test]
    fn disabled_servers_are_skipped_unless_all_are_disabled() {
        let pool = ServerPool::new(vec![addr(1), addr(2)]);
        pool.disable(addr(1));

        let ordering: Vec<_> = pool.ordering(false).iter().map(|s| s.endpoint).collect();
        assert_eq!(ordering, vec![addr(2)]);

        pool.disable(addr(2));
        let degraded: Vec<_> = pool.ordering(false).iter().map(|s| s.endpoint).collect();
        assert_eq!(degraded.len(), 2, "a fully disabled pool falls back to trying everyone");
    }

    #[test]
    fn empty_pool_has_no_ordering() {
        let pool = ServerPool::new(vec![]);
        assert!(pool.ordering(true).is_empty());
        assert!(pool.is_empty());
    }
}
