//! Command and broadcast channels over real loopback TCP.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use fabric::{
    CallError, CommandClient, CommandEnvelope, CommandHandler, CommandPool, CommandServer, FabricError, Publisher,
    Subscription,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Map, Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LinesCodec};

const TIMEOUT: Duration = Duration::from_secs(2);

/// Appends every `push` to a log and returns the sequence number it got.
#[derive(Default)]
struct Sequencer {
    next: AtomicU64,
}

#[async_trait]
impl CommandHandler for Sequencer {
    type Error = String;

    fn service(&self) -> &'static str {
        "sequencer"
    }

    async fn handle(&self, command: CommandEnvelope) -> Result<Value, String> {
        match command.action.as_str() {
            "push" => {
                let seq = self.next.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"seq": seq, "echo": command.data.get("value")}))
            }
            "sleep" => {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Ok(Value::Null)
            }
            "update" => Err(format!(
                "record not found: {}",
                command.data.get("id").and_then(Value::as_str).unwrap_or_default()
            )),
            "dump" => Ok(json!({"blob": "x".repeat(2 * fabric::frame::MAX_FRAME_LEN)})),
            "explode" => panic!("handler bug"),
            other => Err(format!("unknown action: {other}")),
        }
    }
}

fn data(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

async fn start_sequencer() -> (fabric::ServerHandle, String) {
    let server = CommandServer::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().to_string();
    (server.spawn(Arc::new(Sequencer::default())), addr)
}

#[tokio::test]
async fn sequential_calls_on_one_connection_are_observed_in_order() {
    let (handle, addr) = start_sequencer().await;
    let mut client = CommandClient::connect(addr, TIMEOUT).await.unwrap();

    for i in 0..20 {
        let response = client
            .call("push", data(json!({"value": i})), TIMEOUT)
            .await
            .unwrap();
        assert!(response.success);
        let data = response.data.unwrap();
        assert_eq!(data["seq"], json!(i));
        assert_eq!(data["echo"], json!(i));
    }

    handle.stop().await;
}

#[tokio::test]
async fn domain_failure_is_a_response_not_a_transport_fault() {
    let (handle, addr) = start_sequencer().await;
    let mut client = CommandClient::new(addr, TIMEOUT);

    let response = client
        .call("update", data(json!({"id": "missing"})), TIMEOUT)
        .await
        .unwrap();
    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("record not found: missing"));

    match client.request("update", data(json!({"id": "x"}))).await {
        Err(CallError::Rejected(message)) => assert_eq!(message, "record not found: x"),
        other => panic!("expected rejection, got {other:?}"),
    }

    handle.stop().await;
}

#[tokio::test]
async fn malformed_frames_get_a_failure_reply_and_the_loop_keeps_serving() {
    let (handle, addr) = start_sequencer().await;

    let stream = TcpStream::connect(&addr).await.unwrap();
    let mut raw = Framed::new(stream, LinesCodec::new());
    for garbage in ["{oops", r#"{"data":{}}"#, "[]"] {
        raw.send(garbage).await.unwrap();
        let reply: Value = serde_json::from_str(&raw.next().await.unwrap().unwrap()).unwrap();
        assert_eq!(reply["success"], json!(false));
        assert!(reply["error"].as_str().unwrap().starts_with("Malformed envelope"));
    }

    raw.send(r#"{"action":"explode","data":{}}"#).await.unwrap();
    let reply: Value = serde_json::from_str(&raw.next().await.unwrap().unwrap()).unwrap();
    assert_eq!(reply["success"], json!(false));

    let mut client = CommandClient::new(addr, TIMEOUT);
    let response = client.call("push", Map::new(), TIMEOUT).await.unwrap();
    assert!(response.success);

    handle.stop().await;
}

#[tokio::test]
async fn unreachable_endpoint_is_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let mut client = CommandClient::new(addr, Duration::from_millis(500));
    let err = client.call("push", Map::new(), TIMEOUT).await.unwrap_err();
    assert!(matches!(err, FabricError::Unavailable { .. }));
    assert!(!err.outcome_unknown());
}

#[tokio::test]
async fn connect_is_bounded_by_the_call_timeout() {
    // Blackholed address: the connect neither succeeds nor is refused.
    let mut client = CommandClient::new("10.255.255.1:9", Duration::from_secs(30));
    let started = std::time::Instant::now();
    let err = client
        .call("push", Map::new(), Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(err.is_transport());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn oversized_reply_is_a_failure_response_on_a_live_connection() {
    let (handle, addr) = start_sequencer().await;
    let mut client = CommandClient::new(addr, TIMEOUT);

    let response = client.call("dump", Map::new(), TIMEOUT).await.unwrap();
    assert!(!response.success);
    assert_eq!(
        response.error.as_deref(),
        Some(format!("Malformed envelope: response exceeds {} bytes", fabric::frame::MAX_FRAME_LEN).as_str())
    );
    assert!(client.is_connected());

    let response = client.call("push", data(json!({"value": "next"})), TIMEOUT).await.unwrap();
    assert_eq!(response.data.unwrap()["echo"], json!("next"));

    handle.stop().await;
}

#[tokio::test]
async fn timeout_discards_the_connection() {
    let (handle, addr) = start_sequencer().await;
    let mut client = CommandClient::new(addr, TIMEOUT);

    let err = client
        .call("sleep", Map::new(), Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, FabricError::Timeout { .. }));
    assert!(err.outcome_unknown());
    assert!(!client.is_connected());

    // The late reply to `sleep` must not be read as the answer to `push`.
    let response = client.call("push", data(json!({"value": "after"})), TIMEOUT).await.unwrap();
    assert_eq!(response.data.unwrap()["echo"], json!("after"));

    handle.stop().await;
}

#[tokio::test]
async fn concurrent_callers_through_a_pool_are_serialized_by_the_server() {
    let (handle, addr) = start_sequencer().await;
    let pool = Arc::new(CommandPool::new(addr, TIMEOUT));

    let calls = (0..16).map(|i| {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.request("push", data(json!({"value": i}))).await })
    });
    let mut seqs: Vec<u64> = Vec::new();
    for call in calls {
        let value = call.await.unwrap().unwrap();
        seqs.push(value["seq"].as_u64().unwrap());
    }
    seqs.sort_unstable();
    assert_eq!(seqs, (0..16).collect::<Vec<u64>>());
    assert!(pool.idle_connections() > 0);

    handle.stop().await;
}

#[tokio::test]
async fn subscriber_receives_matching_frames_in_publish_order() {
    let publisher = Publisher::bind("127.0.0.1:0").await.unwrap();
    let addr = publisher.local_addr().unwrap().to_string();

    let mut products = Subscription::connect(&addr, ["product."]).await.unwrap();
    let mut everything = Subscription::connect(&addr, [""]).await.unwrap().into_stream();
    publisher.wait_for_subscribers(2).await;

    for n in 0..5 {
        publisher.publish("product.created", &json!({"n": n})).unwrap();
        publisher.publish("order.created", &json!({"n": n})).unwrap();
    }

    for n in 0..5 {
        let frame = products.next_frame().await.unwrap().unwrap();
        assert_eq!(frame.topic, "product.created");
        assert_eq!(frame.payload, json!({"n": n}));
    }
    for n in 0..5 {
        let product = everything.next().await.unwrap().unwrap();
        let order = everything.next().await.unwrap().unwrap();
        assert_eq!((product.topic.as_str(), order.topic.as_str()), ("product.created", "order.created"));
        assert_eq!(order.payload, json!({"n": n}));
    }

    publisher.shutdown();
}

#[tokio::test]
async fn late_subscriber_never_sees_earlier_frames_and_publisher_is_not_blocked() {
    let publisher = Publisher::bind("127.0.0.1:0").await.unwrap();
    let addr = publisher.local_addr().unwrap().to_string();

    // Nobody is listening yet: publishing neither fails nor waits.
    for n in 0..100 {
        assert_eq!(publisher.publish("product.created", &json!({"n": n})).unwrap(), 0);
    }

    let mut late = Subscription::connect(&addr, ["product"]).await.unwrap();
    publisher.wait_for_subscribers(1).await;
    publisher.publish("product.created", &json!({"n": "first-after-join"})).unwrap();

    let frame = late.next_frame().await.unwrap().unwrap();
    assert_eq!(frame.payload, json!({"n": "first-after-join"}));

    publisher.shutdown();
}

#[tokio::test]
async fn subscription_ends_when_publisher_shuts_down() {
    let publisher = Publisher::bind("127.0.0.1:0").await.unwrap();
    let addr = publisher.local_addr().unwrap().to_string();

    let mut subscription = Subscription::connect(&addr, ["order"]).await.unwrap();
    publisher.wait_for_subscribers(1).await;
    assert_eq!(publisher.subscriber_count(), 1);

    publisher.shutdown();
    let next = tokio::time::timeout(TIMEOUT, subscription.next_frame()).await.unwrap();
    assert!(next.is_none());
}
