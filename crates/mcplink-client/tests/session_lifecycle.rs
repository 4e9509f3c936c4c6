//! End-to-end session scenarios over the scripted in-memory transport

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{Reply, ScriptedTransport, init_tracing, initialize_result, test_config, tool_server};
use futures::future::join_all;
use mcplink_client::{Client, SessionState, ToolArguments};
use mcplink_protocol::{Error, ErrorKind};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio_test::{assert_err, assert_ok};

const TIMEOUT: Duration = Duration::from_secs(2);

async fn open_ready() -> (Client<Arc<ScriptedTransport>>, Arc<ScriptedTransport>) {
    init_tracing();
    let transport = ScriptedTransport::ready();
    let client = Client::open_with(Arc::clone(&transport), test_config())
        .await
        .expect("session should open");
    (client, transport)
}

// =============================================================================
// ESTABLISHMENT
// =============================================================================

#[tokio::test]
async fn test_happy_path() {
    let (client, transport) = open_ready().await;

    assert_eq!(client.state(), SessionState::Initialized);
    assert_eq!(client.session_id(), "abc");
    assert_eq!(
        client.endpoint().as_str(),
        "http://localhost:8080/messages?sessionId=abc"
    );
    assert_eq!(client.server_info(), Some(initialize_result()));

    let pong = client
        .invoke("ping", ToolArguments::new(), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(pong, json!("pong"));

    let posts = transport.posts();
    assert_eq!(posts.len(), 3);
    assert_eq!(posts[0]["id"], json!(1));
    assert_eq!(posts[0]["method"], json!("initialize"));
    assert_eq!(posts[0]["params"]["protocolVersion"], json!("2024-11-05"));
    assert_eq!(posts[0]["params"]["capabilities"], json!({}));
    assert_eq!(
        posts[1],
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"})
    );
    assert_eq!(
        posts[2],
        json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": {"name": "ping", "arguments": {}}
        })
    );
}

#[tokio::test]
async fn test_noise_before_endpoint_is_skipped() {
    let transport = ScriptedTransport::new(tool_server);
    transport.push(": hello\n\nevent: message\ndata: {\"jsonrpc\":\"2.0\",\"method\":\"x\"}\n\n");
    transport.announce("/messages?sessionId=late");

    let client = Client::open_with(Arc::clone(&transport), test_config())
        .await
        .unwrap();
    assert_eq!(client.session_id(), "late");
}

#[tokio::test]
async fn test_negotiation_timeout_releases_stream() {
    let transport = ScriptedTransport::new(tool_server);
    transport.push("event: message\ndata: {}\n\n");
    let mut config = test_config();
    config.negotiation_timeout = Duration::from_millis(150);

    let err = Client::open_with(Arc::clone(&transport), config)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NegotiationTimeout);
    assert!(transport.posts().is_empty());
    assert!(transport.stream_released());
}

#[tokio::test]
async fn test_stream_closed_before_endpoint() {
    let transport = ScriptedTransport::new(tool_server);
    transport.hang_up();

    let err = Client::open_with(Arc::clone(&transport), test_config())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportClosed);
}

#[tokio::test]
async fn test_invalid_endpoint_aborts_open() {
    let transport = ScriptedTransport::new(tool_server);
    transport.announce("mailto:someone@example.com");

    let err = Client::open_with(Arc::clone(&transport), test_config())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidEndpoint);
    assert!(err.is_session_fatal());
}

#[tokio::test]
async fn test_handshake_error_response_fails_open() {
    let transport = ScriptedTransport::new(|message: &Value| match message.get("id") {
        Some(id) => Reply::OnStream(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": -32602, "message": "Unsupported protocol version"}
        })),
        None => Reply::Nothing,
    });
    transport.announce("/messages?sessionId=abc");

    let err = Client::open_with(Arc::clone(&transport), test_config())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HandshakeFailed);
    assert!(err.to_string().contains("Unsupported protocol version"));
    // No initialized notification after a failed initialize
    assert!(transport.posts_for("notifications/initialized").is_empty());
}

#[tokio::test]
async fn test_handshake_timeout_leaves_session_failed() {
    let transport = ScriptedTransport::new(|_: &Value| Reply::Nothing);
    transport.announce("/messages?sessionId=abc");
    let mut config = test_config();
    config.handshake_timeout = Duration::from_millis(100);

    let client = Client::connect(Arc::clone(&transport), config).await.unwrap();
    assert_eq!(client.state(), SessionState::Discovered);

    let err = client.initialize().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HandshakeFailed);
    assert_eq!(client.state(), SessionState::Failed);

    let err = client
        .invoke("ping", ToolArguments::new(), TIMEOUT)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SessionNotReady { ref state } if state == "failed"));
}

#[tokio::test]
async fn test_stalled_initialize_post_fails_open() {
    let transport = ScriptedTransport::new(|message: &Value| match message["method"].as_str() {
        Some("initialize") => Reply::Hang,
        _ => tool_server(message),
    });
    transport.announce("/messages?sessionId=abc");
    let mut config = test_config();
    config.handshake_timeout = Duration::from_millis(100);

    let err = tokio::time::timeout(TIMEOUT, Client::open_with(Arc::clone(&transport), config))
        .await
        .expect("open must honour the handshake timeout")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HandshakeFailed);
    assert_eq!(transport.posts_for("initialize").len(), 1);
    assert!(transport.posts_for("notifications/initialized").is_empty());
}

#[tokio::test]
async fn test_inline_replies_are_correlated() {
    let transport = ScriptedTransport::new(|message: &Value| match tool_server(message) {
        Reply::OnStream(reply) => Reply::Inline(reply),
        other => other,
    });
    transport.announce("/messages?sessionId=abc");

    let client = Client::open_with(Arc::clone(&transport), test_config())
        .await
        .unwrap();
    let pong = client
        .invoke("ping", ToolArguments::new(), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(pong, json!("pong"));
}

// =============================================================================
// GATING
// =============================================================================

#[tokio::test]
async fn test_invoke_before_handshake_sends_nothing() {
    let transport = ScriptedTransport::ready();
    let client = Client::connect(Arc::clone(&transport), test_config())
        .await
        .unwrap();

    let err = client
        .invoke("ping", ToolArguments::new(), TIMEOUT)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SessionNotReady { ref state } if state == "discovered"));
    assert_err!(client.list_tools(TIMEOUT).await);
    assert_err!(client.send_request("tools/call", None).await);
    assert!(transport.posts().is_empty());

    assert_ok!(client.initialize().await);
    assert_ok!(client.invoke("ping", ToolArguments::new(), TIMEOUT).await);
}

#[tokio::test]
async fn test_initialize_twice_is_rejected() {
    let (client, transport) = open_ready().await;
    let err = client.initialize().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SessionNotReady);
    assert_eq!(transport.posts_for("initialize").len(), 1);
}

// =============================================================================
// CORRELATION
// =============================================================================

#[tokio::test]
async fn test_timeout_leaves_session_usable() {
    let (client, _transport) = open_ready().await;
    client
        .invoke("ping", ToolArguments::new(), TIMEOUT)
        .await
        .unwrap();

    let started = Instant::now();
    let err = client
        .invoke("slow", ToolArguments::new(), Duration::from_secs(1))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, Error::RequestTimeout { id: 3, .. }), "{err:?}");
    assert!(!err.is_session_fatal());
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(3));
    assert_eq!(client.in_flight(), 0);

    let pong = client
        .invoke("ping", ToolArguments::new(), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(pong, json!("pong"));
}

#[tokio::test]
async fn test_stalled_post_times_out_and_session_stays_usable() {
    let (client, _transport) = open_ready().await;

    let started = Instant::now();
    let err = tokio::time::timeout(
        Duration::from_secs(5),
        client.invoke("hang", ToolArguments::new(), Duration::from_millis(200)),
    )
    .await
    .expect("invoke must honour its own timeout")
    .unwrap_err();

    assert!(matches!(err, Error::RequestTimeout { ref method, .. } if method == "tools/call"), "{err:?}");
    assert!(!err.is_session_fatal());
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(client.in_flight(), 0);
    assert_eq!(client.state(), SessionState::Initialized);

    let pong = client
        .invoke("ping", ToolArguments::new(), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(pong, json!("pong"));
}

#[tokio::test]
async fn test_unmatched_response_is_dropped() {
    let (client, transport) = open_ready().await;
    transport.push_message(&json!({"jsonrpc": "2.0", "id": 999, "result": {"stray": true}}));

    // Queued behind the stray response on the same stream
    let pong = client
        .invoke("ping", ToolArguments::new(), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(pong, json!("pong"));
    assert_eq!(client.unmatched_responses(), 1);
    assert_eq!(client.state(), SessionState::Initialized);
}

#[tokio::test]
async fn test_out_of_order_responses() {
    let (client, transport) = open_ready().await;

    let first = client
        .send_request("tools/call", Some(json!({"name": "slow", "arguments": {}})))
        .await
        .unwrap();
    let second = client
        .send_request("tools/call", Some(json!({"name": "slow", "arguments": {}})))
        .await
        .unwrap();
    assert_eq!((first.id(), second.id()), (2, 3));

    transport.push_message(&json!({"jsonrpc": "2.0", "id": 3, "result": "second"}));
    transport.push_message(&json!({"jsonrpc": "2.0", "id": 999, "result": "noise"}));
    transport.push_message(&json!({"jsonrpc": "2.0", "id": 2, "result": "first"}));

    let second = second.await_response(TIMEOUT).await.unwrap();
    let first = first.await_response(TIMEOUT).await.unwrap();
    assert_eq!(first.result(), Some(&json!("first")));
    assert_eq!(second.result(), Some(&json!("second")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_invokes_get_unique_ids() {
    const N: usize = 64;
    let (client, transport) = open_ready().await;

    let calls = (0..N).map(|i| {
        let client = client.clone();
        async move {
            let mut arguments = ToolArguments::new();
            arguments.insert("n".to_string(), json!(i));
            client.invoke("echo", arguments, TIMEOUT).await
        }
    });
    let results = join_all(calls).await;

    for (i, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap(), json!({"n": i}));
    }
    let ids: HashSet<u64> = transport
        .posts_for("tools/call")
        .iter()
        .map(|p| p["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids.len(), N);
    assert!(!ids.contains(&1));
}

#[tokio::test]
async fn test_tool_error_is_typed_and_not_fatal() {
    let (client, _transport) = open_ready().await;

    let err = client
        .invoke("fail", ToolArguments::new(), TIMEOUT)
        .await
        .unwrap_err();
    match &err {
        Error::ToolInvocation { code, message, .. } => {
            assert_eq!(*code, -32000);
            assert_eq!(message, "upstream rejected the request");
        }
        other => panic!("expected ToolInvocation, got {other:?}"),
    }
    assert!(!err.is_session_fatal());
    assert!(client.is_ready());
}

#[tokio::test]
async fn test_send_failure_is_scoped_to_the_call() {
    let transport = ScriptedTransport::new(|message: &Value| {
        if message["params"]["name"] == "broken" {
            Reply::Fail("POST returned 502 Bad Gateway".to_string())
        } else {
            tool_server(message)
        }
    });
    transport.announce("/messages?sessionId=abc");
    let client = Client::open_with(Arc::clone(&transport), test_config())
        .await
        .unwrap();

    let err = client
        .invoke("broken", ToolArguments::new(), TIMEOUT)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Send);
    assert_eq!(client.in_flight(), 0);
    assert_ok!(client.invoke("ping", ToolArguments::new(), TIMEOUT).await);
}

#[tokio::test]
async fn test_list_tools() {
    let (client, _transport) = open_ready().await;
    let tools = client.list_tools(TIMEOUT).await.unwrap();
    let names: Vec<&str> = tools["tools"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    assert_eq!(names, vec!["ping", "slow", "fail", "echo"]);
}

// =============================================================================
// TEARDOWN
// =============================================================================

#[tokio::test]
async fn test_close_resolves_pending_requests() {
    let (client, transport) = open_ready().await;

    let waiter = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .invoke("slow", ToolArguments::new(), Duration::from_secs(10))
                .await
        })
    };
    while client.in_flight() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    client.close();
    let err = waiter.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::SessionClosed));
    assert_eq!(client.state(), SessionState::Closed);

    let posts_before = transport.posts().len();
    let err = client
        .invoke("ping", ToolArguments::new(), TIMEOUT)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SessionClosed));
    assert_eq!(transport.posts().len(), posts_before);

    // Second close is a no-op
    client.close();
}

#[tokio::test]
async fn test_server_hang_up_closes_session() {
    let (client, transport) = open_ready().await;

    let pending = client
        .send_request("tools/call", Some(json!({"name": "slow", "arguments": {}})))
        .await
        .unwrap();
    transport.hang_up();

    let err = pending.await_response(Duration::from_secs(5)).await.unwrap_err();
    assert!(matches!(err, Error::SessionClosed));
    assert_eq!(client.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_duplicate_endpoint_event_is_ignored() {
    let (client, transport) = open_ready().await;
    transport.announce("/elsewhere?sessionId=other");

    let pong = client
        .invoke("ping", ToolArguments::new(), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(pong, json!("pong"));
    assert_eq!(client.session_id(), "abc");
    assert_eq!(
        client.endpoint().as_str(),
        "http://localhost:8080/messages?sessionId=abc"
    );
}
