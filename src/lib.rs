//! A stub DNS resolver client: send a question to a pool of configured name
//! servers over UDP or TCP, get back a decoded answer.
//!
//! # Usage
//!
//! ```rust,no_run
//! use stub_resolver::{Client, ClientOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new(
//!     vec!["8.8.8.8:53".parse().unwrap()],
//!     ClientOptions::default(),
//! )?;
//!
//! let response = client
//!     .query_async("example.com.", 1 /* A */, 1 /* IN */, CancellationToken::new())
//!     .await?;
//! println!("{:?}", response.message.answers);
//! # Ok(())
//! # }
//! ```
//!
//! A blocking caller outside an async context uses [`Client::query`], which
//! drives the same state machine to completion on a dedicated runtime.
//!
//! # Modules
//!
//! * [`wire`] -- RFC 1035 message encode/decode, plus EDNS(0) (RFC 6891).
//! * [`transport`] -- UDP and TCP exchange of one encoded message.
//! * [`cache`] -- the TTL-aware response cache.
//! * [`pool`] -- the name server pool, rotation, and disable/enable.
//! * [`engine`] -- the query state machine ([`Client`]).
//! * [`health`] -- background re-probing of disabled servers.
//! * [`audit`] -- the per-query audit trail.
//! * [`error`] -- the crate-wide error taxonomy.
//! * [`config`] -- [`ClientOptions`].

pub mod audit;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod pool;
pub mod transport;
pub mod wire;

pub use config::ClientOptions;
pub use engine::{Client, QueryFailure, QueryResponse, QueryResult};
pub use error::{Error, Result};
