//! Resolver configuration (§6, §4.10).
//!
//! `ClientOptions` is plain data with a `Default` matching the spec's table
//! of defaults, constructed directly or via the small `with_*` builder
//! methods below. Every field remains a public, directly-settable field
//! (the spec calls them "mutable after construction"); the builder methods
//! are just convenient chaining sugar over that.

use std::time::Duration;

use crate::error::{Error, Result};

/// A query timeout. `Finite` participates in validation (§6: "must be in
/// (0, int-max-ms] or infinite"); `Infinite` disables the per-attempt
/// deadline entirely.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timeout {
    Finite(Duration),
    Infinite,
}

impl Timeout {
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Timeout::Finite(d) => Some(*d),
            Timeout::Infinite => None,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Timeout::Finite(d) => {
                let ms = d.as_millis();
                if ms == 0 || ms > i32::MAX as u128 {
                    return Err(Error::InvalidConfig(format!(
                        "timeout must be in (0, {}] ms or infinite, got {}ms",
                        i32::MAX,
                        ms
                    )));
                }
                Ok(())
            }
            Timeout::Infinite => Ok(()),
        }
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Timeout::Finite(Duration::from_secs(5))
    }
}

#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Upgrade to TCP and re-resolve when a UDP response has TC=1.
    pub use_tcp_fallback: bool,

    /// Skip UDP entirely and always use TCP.
    pub use_tcp_only: bool,

    /// Attach a human-readable transcript to every response/error (§4.7).
    pub enable_audit_trail: bool,

    /// Set the RD bit on outgoing requests.
    pub recursion_desired: bool,

    /// Additional attempts per server beyond the first.
    pub retries: u32,

    /// Surface a non-`NoError` RCODE as an error rather than returning it.
    pub throw_errors: bool,

    /// Consult and populate the response cache.
    pub use_cache: bool,

    /// Floor applied to any computed cache TTL.
    pub min_cache_ttl: Option<Duration>,

    /// Rotate the server pool by one position per logical query.
    pub use_random_server: bool,

    /// On a DNS-level error response, move to the next server instead of
    /// failing the whole query immediately.
    pub continue_on_dns_error: bool,

    /// Per-attempt deadline.
    pub timeout: Timeout,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            use_tcp_fallback: true,
            use_tcp_only: false,
            enable_audit_trail: false,
            recursion_desired: true,
            retries: 5,
            throw_errors: false,
            use_cache: true,
            min_cache_ttl: None,
            use_random_server: true,
            continue_on_dns_error: true,
            timeout: Timeout::default(),
        }
    }
}

impl ClientOptions {
    pub fn validate(&self) -> Result<()> {
        self.timeout.validate()
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tcp_only(mut self, tcp_only: bool) -> Self {
        self.use_tcp_only = tcp_only;
        self
    }

    pub fn with_audit_trail(mut self, enabled: bool) -> Self {
        self.enable_audit_trail = enabled;
        self
    }

    pub fn with_min_cache_ttl(mut self, ttl: Duration) -> Self {
        self.min_cache_ttl = Some(ttl);
        self
    }
}
