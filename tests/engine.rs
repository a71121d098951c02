//! Scenario tests for the query engine's retry/failover state machine.
//!
//! Grounded on the teacher's `tests/resolver.rs` (`MockClient` implementing
//! the client's transport trait, `pretty_assertions::assert_eq`), ported
//! from the teacher's sync `Exchanger` to the async `Transport` trait.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use stub_resolver::config::ClientOptions;
use stub_resolver::engine::Client;
use stub_resolver::error::{classify_io_error, Result};
use stub_resolver::transport::Transport;
use stub_resolver::wire::{Header, Message, Question, Rcode, QR};

fn answer_for(question: &Question, id: u16) -> Message {
    Message {
        header: Header {
            id,
            qr: QR::Response,
            rcode: Rcode::NoError,
            qdcount: 1,
            ancount: 0,
            ..Header::default()
        },
        questions: vec![question.clone()],
        ..Message::default()
    }
}

/// A transport that always succeeds, echoing the request's id.
struct AlwaysOk;

#[async_trait]
impl Transport for AlwaysOk {
    async fn exchange(&self, _endpoint: SocketAddr, query: &Message, _timeout: Option<Duration>) -> Result<Message> {
        Ok(answer_for(&query.questions[0], query.header.id))
    }
}

/// A transport that fails with a connection-refused style error on every
/// call, classified permanent by `classify_io_error`.
struct AlwaysRefused;

#[async_trait]
impl Transport for AlwaysRefused {
    async fn exchange(&self, endpoint: SocketAddr, _query: &Message, _timeout: Option<Duration>) -> Result<Message> {
        Err(classify_io_error(
            endpoint,
            std::io::Error::from(std::io::ErrorKind::AddrNotAvailable),
        ))
    }
}

/// Fails the first `fail_times` calls with a transient (connection reset)
/// error, then succeeds.
struct FlakyThenOk {
    calls: AtomicUsize,
    fail_times: usize,
}

#[async_trait]
impl Transport for FlakyThenOk {
    async fn exchange(&self, endpoint: SocketAddr, query: &Message, _timeout: Option<Duration>) -> Result<Message> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_times {
            Err(classify_io_error(
                endpoint,
                std::io::Error::from(std::io::ErrorKind::ConnectionReset),
            ))
        } else {
            Ok(answer_for(&query.questions[0], query.header.id))
        }
    }
}

fn localhost(port: u16) -> SocketAddr {
    format!("127.0.0.1:{port}").parse().unwrap()
}

#[tokio::test]
async fn succeeds_on_first_server() {
    let client = Client::with_transports(
        vec![localhost(53)],
        ClientOptions::default(),
        Arc::new(AlwaysOk),
        Arc::new(AlwaysOk),
    )
    .unwrap();

    let response = client
        .query_async("example.com.", 1, 1, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.message.header.rcode, Rcode::NoError);
    assert_eq!(response.message.questions[0].name, "example.com.");
}

#[tokio::test]
async fn retries_transient_failure_on_same_server() {
    let udp = Arc::new(FlakyThenOk {
        calls: AtomicUsize::new(0),
        fail_times: 2,
    });
    let options = ClientOptions::default().with_retries(3);

    let client = Client::with_transports(vec![localhost(53)], options, udp, Arc::new(AlwaysOk)).unwrap();

    let response = client
        .query_async("example.com.", 1, 1, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.message.header.rcode, Rcode::NoError);
}

#[tokio::test]
async fn permanent_failure_moves_to_next_server_and_disables_it() {
    let client = Client::with_transports(
        vec![localhost(53), localhost(54)],
        ClientOptions::default(),
        Arc::new(AlwaysRefused),
        Arc::new(AlwaysRefused),
    )
    .unwrap();

    // UDP always fails permanently, so the TCP transport never gets a
    // chance either: this exercises "exhaust the pool, return ConnectionTimeout".
    let failure = client
        .query_async("example.com.", 1, 1, CancellationToken::new())
        .await
        .unwrap_err();
    match failure.error {
        stub_resolver::error::Error::ConnectionTimeout { tried } => {
            assert_eq!(tried.len(), 2);
        }
        other => panic!("expected ConnectionTimeout, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_server_pool_is_rejected_at_construction() {
    let result = Client::new(vec![], ClientOptions::default());
    assert!(result.is_err());
}

#[tokio::test]
async fn cache_hit_skips_the_transport() {
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for Counting {
        async fn exchange(&self, _endpoint: SocketAddr, query: &Message, _timeout: Option<Duration>) -> Result<Message> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut response = answer_for(&query.questions[0], query.header.id);
            response.answers.push(stub_resolver::wire::Record {
                name: "example.com.".to_string(),
                r#type: 1,
                class: 1,
                ttl: 300,
                resource: stub_resolver::wire::Resource::A("127.0.0.1".parse().unwrap()),
            });
            Ok(response)
        }
    }

    let udp = Arc::new(Counting { calls: AtomicUsize::new(0) });
    let client = Client::with_transports(
        vec![localhost(53)],
        ClientOptions::default(),
        udp.clone(),
        Arc::new(AlwaysOk),
    )
    .unwrap();

    let first = client
        .query_async("example.com.", 1, 1, CancellationToken::new())
        .await
        .unwrap();
    let second = client
        .query_async("example.com.", 1, 1, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(first.message.answers.len(), 1);
    assert_eq!(second.message.answers.len(), 1);
    assert_eq!(udp.calls.load(Ordering::SeqCst), 1, "second lookup should be served from cache");
}

#[tokio::test]
async fn cancelling_up_front_makes_zero_transport_calls() {
    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Transport for Counting {
        async fn exchange(&self, _endpoint: SocketAddr, query: &Message, _timeout: Option<Duration>) -> Result<Message> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(answer_for(&query.questions[0], query.header.id))
        }
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let udp = Arc::new(Counting { calls: calls.clone() });
    let client = Client::with_transports(
        vec![localhost(53)],
        ClientOptions::default(),
        udp,
        Arc::new(AlwaysOk),
    )
    .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let failure = client.query_async("example.com.", 1, 1, cancel).await.unwrap_err();
    assert!(matches!(failure.error, stub_resolver::error::Error::Cancelled));
    assert_eq!(calls.load(Ordering::SeqCst), 0, "a pre-cancelled query must make no transport calls");
}

#[tokio::test]
async fn outgoing_query_carries_an_opt_record() {
    struct CapturingOpt {
        saw_opt: Arc<std::sync::Mutex<bool>>,
    }

    #[async_trait]
    impl Transport for CapturingOpt {
        async fn exchange(&self, _endpoint: SocketAddr, query: &Message, _timeout: Option<Duration>) -> Result<Message> {
            let has_opt = query.additionals.iter().any(|r| r.r#type == 41);
            *self.saw_opt.lock().unwrap() = has_opt;
            Ok(answer_for(&query.questions[0], query.header.id))
        }
    }

    let saw_opt = Arc::new(std::sync::Mutex::new(false));
    let udp = Arc::new(CapturingOpt { saw_opt: saw_opt.clone() });
    let client = Client::with_transports(
        vec![localhost(53)],
        ClientOptions::default(),
        udp,
        Arc::new(AlwaysOk),
    )
    .unwrap();

    client
        .query_async("example.com.", 1, 1, CancellationToken::new())
        .await
        .unwrap();

    assert!(*saw_opt.lock().unwrap(), "outgoing request should carry an OPT additional");
}

#[tokio::test]
async fn successful_query_records_last_successful_request_on_the_server() {
    let client = Client::with_transports(
        vec![localhost(53)],
        ClientOptions::default(),
        Arc::new(AlwaysOk),
        Arc::new(AlwaysOk),
    )
    .unwrap();

    client
        .query_async("example.com.", 1, 1, CancellationToken::new())
        .await
        .unwrap();

    let servers = client.pool().servers();
    let question = servers[0].last_successful_request().expect("a successful query should record the question");
    assert_eq!(question.name, "example.com.");
}

#[tokio::test]
async fn audit_trail_is_attached_to_a_propagated_error() {
    let options = ClientOptions::default().with_audit_trail(true);
    let client = Client::with_transports(
        vec![localhost(53), localhost(54)],
        options,
        Arc::new(AlwaysRefused),
        Arc::new(AlwaysRefused),
    )
    .unwrap();

    let failure = client
        .query_async("example.com.", 1, 1, CancellationToken::new())
        .await
        .unwrap_err();

    let audit = failure.audit.expect("an audited client should attach a trail to a failed query too");
    assert!(!audit.is_empty());
}
