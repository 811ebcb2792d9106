//! Integration tests for the gateway against fake services on loopback TCP.

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::ServiceName;
use fabric::{CommandEnvelope, CommandHandler, CommandServer, Endpoints, ServerHandle, ServiceEndpoints};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

/// Answers every action with the command it received.
///
/// A string value of `"missing"` is rejected as not found, `"slow"` sleeps
/// past the gateway timeout, and a blank `name` fails validation.
struct Echo {
    service: &'static str,
}

#[async_trait]
impl CommandHandler for Echo {
    type Error = String;

    fn service(&self) -> &'static str {
        self.service
    }

    async fn handle(&self, command: CommandEnvelope) -> Result<Value, String> {
        let values: Vec<&str> = command.data.values().filter_map(Value::as_str).collect();
        if values.contains(&"missing") {
            return Err(format!("{} not found: missing", self.service));
        }
        if values.contains(&"slow") {
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
        if command.data.get("name") == Some(&json!("")) {
            return Err("Validation error: name must not be blank".to_string());
        }
        Ok(json!({"action": command.action, "data": command.data}))
    }
}

struct Setup {
    app: axum::Router,
    servers: Vec<ServerHandle>,
}

impl Setup {
    async fn stop(self) {
        for server in self.servers {
            server.stop().await;
        }
    }
}

/// Fake product, inventory, pricing and order services. Customer points at
/// a port nothing listens on.
async fn setup() -> Setup {
    let mut endpoints = Endpoints::default();
    let mut servers = Vec::new();
    for service in [
        ServiceName::Product,
        ServiceName::Inventory,
        ServiceName::Pricing,
        ServiceName::Order,
    ] {
        let server = CommandServer::bind("127.0.0.1:0").await.unwrap();
        endpoints.set(
            service,
            ServiceEndpoints {
                command: server.local_addr().to_string(),
                publish: None,
                peer: None,
            },
        );
        servers.push(server.spawn(Arc::new(Echo {
            service: service.as_str(),
        })));
    }
    endpoints.set(
        ServiceName::Customer,
        ServiceEndpoints {
            command: "127.0.0.1:1".to_string(),
            publish: None,
            peer: None,
        },
    );

    let gateway = Arc::new(api::Gateway::new(&endpoints, Duration::from_millis(300)));
    Setup {
        app: api::create_app(gateway, get_metrics_handle()),
        servers,
    }
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health_check() {
    let setup = setup().await;
    let (status, json) = send(&setup.app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["services"]["customer"], "127.0.0.1:1");
    setup.stop().await;
}

#[tokio::test]
async fn test_create_product_is_one_command() {
    let setup = setup().await;
    let (status, json) = send(
        &setup.app,
        "POST",
        "/product",
        Some(json!({"name": "Lamp", "category": "other"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["action"], "create");
    assert_eq!(json["data"], json!({"name": "Lamp", "category": "other"}));
    setup.stop().await;
}

#[tokio::test]
async fn test_rejected_create_is_bad_request() {
    let setup = setup().await;
    let (status, json) = send(&setup.app, "POST", "/product", Some(json!({"name": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Validation error: name must not be blank");
    setup.stop().await;
}

#[tokio::test]
async fn test_missing_resource_is_not_found() {
    let setup = setup().await;

    let (status, json) = send(&setup.app, "GET", "/product/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "product not found: missing");

    let (status, _) = send(&setup.app, "PATCH", "/order/missing", Some(json!({"status": "shipped"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    setup.stop().await;
}

#[tokio::test]
async fn test_path_parameters_become_command_data() {
    let setup = setup().await;

    let (status, json) = send(&setup.app, "PUT", "/product/p1", Some(json!({"id": "other", "name": "Desk"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["action"], "update");
    assert_eq!(json["data"], json!({"id": "p1", "name": "Desk"}));

    let (_, json) = send(&setup.app, "PATCH", "/inventory/w1/p1", Some(json!({"quantity": 5}))).await;
    assert_eq!(json["action"], "update");
    assert_eq!(
        json["data"],
        json!({"warehouse_pk": "w1", "product_pk": "p1", "quantity": 5})
    );

    let (_, json) = send(&setup.app, "GET", "/product/p1/details", None).await;
    assert_eq!(json["action"], "get_details");

    let (_, json) = send(&setup.app, "GET", "/warehouse", None).await;
    assert_eq!(json["action"], "get_all_warehouses");

    let (_, json) = send(&setup.app, "GET", "/pricing/p1", None).await;
    assert_eq!(json["data"], json!({"product_pk": "p1"}));
    setup.stop().await;
}

#[tokio::test]
async fn test_delete_returns_no_content() {
    let setup = setup().await;
    let (status, json) = send(&setup.app, "DELETE", "/product/p1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(json, Value::Null);
    setup.stop().await;
}

#[tokio::test]
async fn test_unreachable_service_is_unavailable() {
    let setup = setup().await;
    let (status, json) = send(&setup.app, "GET", "/customer/c1", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(json["error"].as_str().unwrap().contains("unavailable"));
    setup.stop().await;
}

#[tokio::test]
async fn test_slow_service_is_gateway_timeout() {
    let setup = setup().await;
    let (status, json) = send(&setup.app, "GET", "/order/slow", None).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(json["error"].as_str().unwrap().contains("outcome unknown"));
    setup.stop().await;
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let setup = setup().await;
    send(&setup.app, "GET", "/product", None).await;

    let response = setup
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    setup.stop().await;
}
