//! Response cache (§4.4, C5): keyed on the canonicalized question, with a
//! per-entry expiry derived from the record TTLs and a configurable floor.
//!
//! Grounded on RoeeJ-heimdall's `DashMap`-backed resolver cache
//! (`other_examples/.../resolver.rs`) for the concurrent-map shape, since
//! the teacher has no cache of its own.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::wire::{Message, Resource};

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
struct CacheKey {
    name: String,
    qtype: u16,
    qclass: u16,
}

impl CacheKey {
    fn new(name: &str, qtype: u16, qclass: u16) -> CacheKey {
        CacheKey {
            name: name.trim_end_matches('.').to_ascii_lowercase(),
            qtype,
            qclass,
        }
    }
}

struct Entry {
    message: Message,
    expires_at: Instant,
}

/// A sharded, concurrent response cache. Entries expire lazily: a read past
/// `expires_at` is treated as a miss and removed.
pub struct ResponseCache {
    entries: DashMap<CacheKey, Entry>,
    min_ttl: Option<Duration>,
}

impl ResponseCache {
    pub fn new(min_ttl: Option<Duration>) -> ResponseCache {
        ResponseCache {
            entries: DashMap::new(),
            min_ttl,
        }
    }

    pub fn get(&self, name: &str, qtype: u16, qclass: u16) -> Option<Message> {
        let key = CacheKey::new(name, qtype, qclass);
        let hit = self.entries.get(&key)?;
        if hit.expires_at <= Instant::now() {
            drop(hit);
            self.entries.remove(&key);
            return None;
        }
        Some(hit.message.clone())
    }

    /// Inserts `message` as the answer for `(name, qtype, qclass)`, with a
    /// TTL computed across the answer, authority, and additional sections
    /// (§3/§4.3), floored by `min_ttl` if configured. A response with no
    /// applicable TTL at all -- no records, or a zero TTL and no floor --
    /// is not cached.
    pub fn insert(&self, name: &str, qtype: u16, qclass: u16, message: Message) {
        let base_ttl = match computed_ttl(&message) {
            Some(ttl) if ttl > 0 => ttl,
            _ => return,
        };

        let mut ttl = Duration::from_secs(base_ttl as u64);
        if let Some(floor) = self.min_ttl {
            ttl = ttl.max(floor);
        }

        let key = CacheKey::new(name, qtype, qclass);
        self.entries.insert(
            key,
            Entry {
                message,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The TTL to cache `message` under, or `None` if nothing in it yields one.
/// A response carrying answers uses the minimum TTL across every record in
/// the answer, authority, and additional sections; a response with no
/// answers (a negative/NXDOMAIN-style response) instead uses the SOA
/// `minimum` field from the authority section, per RFC 2308's negative
/// caching convention.
fn computed_ttl(message: &Message) -> Option<u32> {
    if message.answers.is_empty() {
        message.authorities.iter().find_map(|r| match &r.resource {
            Resource::Soa(soa) => Some(soa.minimum.min(r.ttl)),
            _ => None,
        })
    } else {
        message
            .answers
            .iter()
            .chain(message.authorities.iter())
            .chain(message.additionals.iter())
            .map(|r| r.ttl)
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Header;

    fn message_with_ttl(ttl: u32) -> Message {
        Message {
            header: Header::default(),
            answers: vec![crate::wire::Record {
                name: "example.com.".to_string(),
                r#type: 1,
                class: 1,
                ttl,
                resource: crate::wire::Resource::A("127.0.0.1".parse().unwrap()),
            }],
            ..Message::default()
        }
    }

    #[test]
    fn miss_before_insert() {
        let cache = ResponseCache::new(None);
        assert!(cache.get("example.com.", 1, 1).is_none());
    }

    #[test]
    fn hit_after_insert_is_case_and_trailing_dot_insensitive() {
        let cache = ResponseCache::new(None);
        cache.insert("Example.Com.", 1, 1, message_with_ttl(300));

        assert!(cache.get("example.com", 1, 1).is_some());
        assert!(cache.get("EXAMPLE.COM.", 1, 1).is_some());
    }

    #[test]
    fn distinguishes_qtype_and_qclass() {
        let cache = ResponseCache::new(None);
        cache.insert("example.com.", 1, 1, message_with_ttl(300));

        assert!(cache.get("example.com.", 28, 1).is_none());
        assert!(cache.get("example.com.", 1, 3).is_none());
    }

    #[test]
    fn min_ttl_floors_a_shorter_answer_ttl() {
        let cache = ResponseCache::new(Some(Duration::from_secs(60)));
        cache.insert("example.com.", 1, 1, message_with_ttl(1));

        // Can't observe the floored expiry directly without sleeping; just
        // confirm the entry is present immediately after insert.
        assert!(cache.get("example.com.", 1, 1).is_some());
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let cache = ResponseCache::new(None);
        cache.insert("example.com.", 1, 1, message_with_ttl(1));
        std::thread::sleep(Duration::from_millis(1100));
        assert!(cache.get("example.com.", 1, 1).is_none());
    }

    #[test]
    fn zero_ttl_answer_with_no_floor_is_not_cached() {
        let cache = ResponseCache::new(None);
        cache.insert("example.com.", 1, 1, message_with_ttl(0));
        assert!(cache.get("example.com.", 1, 1).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn empty_response_is_not_cached() {
        let cache = ResponseCache::new(None);
        cache.insert("example.com.", 1, 1, Message::default());
        assert!(cache.is_empty());
    }

    #[test]
    fn negative_response_uses_soa_minimum() {
        let cache = ResponseCache::new(None);
        let message = Message {
            authorities: vec![crate::wire::Record {
                name: "example.com.".to_string(),
                r#type: 6,
                class: 1,
                ttl: 3600,
                resource: crate::wire::Resource::Soa(crate::wire::Soa {
                    mname: "ns1.example.com.".to_string(),
                    rname: "hostmaster.example.com.".to_string(),
                    serial: 1,
                    refresh: 7200,
                    retry: 3600,
                    expire: 1209600,
                    minimum: 300,
                }),
            }],
            ..Message::default()
        };

        cache.insert("nope.example.com.", 1, 1, message);
        assert!(cache.get("nope.example.com.", 1, 1).is_some());
    }
}
