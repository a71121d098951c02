//! Audit trail (§4.7, C7): an append-only, human-readable transcript of one
//! logical query, attached to the response (or the error) when
//! `enable_audit_trail` is set.
//!
//! Grounded on the teacher's `src/display.rs` (`impl fmt::Display for
//! Message`, which renders a dig-style header/question/answer dump),
//! restructured from a one-shot `Display` impl over a finished `Message`
//! into a builder the engine appends lines to as the state machine runs.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::wire::{Message, Rcode};

#[derive(Clone, Debug)]
pub(crate) enum Event {
    CacheHit { name: String },
    CacheMiss { name: String },
    Attempt { endpoint: SocketAddr, transport: &'static str, attempt: u32 },
    TruncatedUpgrade { endpoint: SocketAddr },
    Response { endpoint: SocketAddr, rcode: Rcode, elapsed: Duration },
    ServerDisabled { endpoint: SocketAddr, reason: String },
    Failure { endpoint: Option<SocketAddr>, reason: String },
}

/// Collects [`Event`]s for one logical query. Cheap to construct; the
/// engine only bothers building one when `ClientOptions::enable_audit_trail`
/// is set.
#[derive(Clone, Debug, Default)]
pub struct AuditTrail {
    started_at_utc: Option<DateTime<Utc>>,
    events: Vec<Event>,
}

impl AuditTrail {
    pub fn new(now: DateTime<Utc>) -> AuditTrail {
        AuditTrail {
            started_at_utc: Some(now),
            events: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl fmt::Display for AuditTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ts) = self.started_at_utc {
            writeln!(f, ";; query started {}", ts.to_rfc3339())?;
        }
        for event in &self.events {
            match event {
                Event::CacheHit { name } => writeln!(f, ";; cache hit for {name}")?,
                Event::CacheMiss { name } => writeln!(f, ";; cache miss for {name}")?,
                Event::Attempt { endpoint, transport, attempt } => {
                    writeln!(f, ";; attempt {attempt} via {transport} to {endpoint}")?
                }
                Event::TruncatedUpgrade { endpoint } => {
                    writeln!(f, ";; response from {endpoint} truncated, upgrading to tcp")?
                }
                Event::Response { endpoint, rcode, elapsed } => {
                    writeln!(f, ";; response from {endpoint}: {rcode} in {elapsed:?}")?
                }
                Event::ServerDisabled { endpoint, reason } => {
                    writeln!(f, ";; disabling {endpoint}: {reason}")?
                }
                Event::Failure { endpoint, reason } => match endpoint {
                    Some(endpoint) => writeln!(f, ";; failure from {endpoint}: {reason}")?,
                    None => writeln!(f, ";; failure: {reason}")?,
                },
            }
        }
        Ok(())
    }
}

/// Renders `message` the way the teacher's `Display for Message` does: a
/// dig-style opcode/status/flags header line followed by a per-section
/// record dump. Kept distinct from [`AuditTrail`], which narrates the
/// engine's decisions rather than the message contents.
pub fn format_message(message: &Message) -> String {
    use std::fmt::Write as _;
    let mut out = String::new();
    let h = &message.header;
    let _ = writeln!(
        out,
        ";; ->>HEADER<<- opcode: {}, status: {}, id: {}",
        h.opcode, h.rcode, h.id
    );
    let _ = writeln!(
        out,
        ";; flags: {}{}{}{}{}{}; QUERY: {}, ANSWER: {}, AUTHORITY: {}, ADDITIONAL: {}",
        if h.qr.to_bool() { "qr " } else { "" },
        if h.aa { "aa " } else { "" },
        if h.tc { "tc " } else { "" },
        if h.rd { "rd " } else { "" },
        if h.ra { "ra " } else { "" },
        if h.ad { "ad " } else { "" },
        message.questions.len(),
        message.answers.len(),
        message.authorities.len(),
        message.additionals.len(),
    );

    if !message.questions.is_empty() {
        let _ = writeln!(out, "\n;; QUESTION SECTION:");
        for q in &message.questions {
            let _ = writeln!(out, ";{}\t{}\t{}", q.name, q.qclass, q.qtype);
        }
    }
    if !message.answers.is_empty() {
        let _ = writeln!(out, "\n;; ANSWER SECTION:");
        for r in &message.answers {
            let _ = writeln!(out, "{}\t{}\t{:?}", r.name, r.ttl, r.resource);
        }
    }
    if !message.authorities.is_empty() {
        let _ = writeln!(out, "\n;; AUTHORITY SECTION:");
        for r in &message.authorities {
            let _ = writeln!(out, "{}\t{}\t{:?}", r.name, r.ttl, r.resource);
        }
    }
    if !message.additionals.is_empty() {
        let _ = writeln!(out, "\n;; ADDITIONAL SECTION:");
        for r in &message.additionals {
            let _ = writeln!(out, "{}\t{}\t{:?}", r.name, r.ttl, r.resource);
        }
    }

    out
}
