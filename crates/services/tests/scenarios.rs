//! Whole-system scenarios: every service on its own ephemeral ports, talking
//! over loopback TCP exactly as separate processes would.

use std::collections::HashMap;
use std::time::Duration;

use common::{RecordId, ServiceName, topics};
use fabric::{CallError, CommandClient, Endpoints, Publisher, ServiceEndpoints};
use serde_json::{Value, json};
use services::{Listeners, RunningNode};

const WAIT: Duration = Duration::from_secs(5);
const CALL_TIMEOUT: Duration = Duration::from_secs(2);

struct System {
    nodes: HashMap<ServiceName, RunningNode>,
    endpoints: Endpoints,
}

impl System {
    /// Binds every service first, then starts each one with the real
    /// addresses of the others, then waits until every subscription is live.
    async fn start() -> Self {
        let mut endpoints = Endpoints::default();
        let mut bound = Vec::new();
        for service in ServiceName::ALL {
            let listeners = Listeners::bind(service, &ServiceEndpoints::ephemeral(service, "127.0.0.1"))
                .await
                .unwrap();
            endpoints.set(service, listeners.endpoints().unwrap());
            bound.push(listeners);
        }

        let mut nodes = HashMap::new();
        for listeners in bound {
            let node = services::start(listeners, &endpoints, CALL_TIMEOUT).await.unwrap();
            nodes.insert(node.service(), node);
        }

        let system = Self { nodes, endpoints };
        // product feeds inventory, pricing and order; customer and order feed one each.
        system.publisher(ServiceName::Product).wait_for_subscribers(3).await;
        system.publisher(ServiceName::Customer).wait_for_subscribers(1).await;
        system.publisher(ServiceName::Order).wait_for_subscribers(1).await;
        system
    }

    fn node(&self, service: ServiceName) -> &RunningNode {
        &self.nodes[&service]
    }

    fn publisher(&self, service: ServiceName) -> &Publisher {
        self.node(service).publisher().unwrap()
    }

    fn client(&self, service: ServiceName) -> CommandClient {
        CommandClient::new(self.endpoints.command(service), CALL_TIMEOUT)
    }

    async fn frames_seen(&self, service: ServiceName, handler: &str, frames: u64) -> replica::ReplicaStats {
        self.node(service)
            .replica_stats()
            .unwrap()
            .wait_for_frames(handler, frames, WAIT)
            .await
            .unwrap_or_else(|| panic!("{handler} did not see {frames} frames"))
    }

    async fn stop(self) {
        for (_, node) in self.nodes {
            node.stop().await;
        }
    }
}

async fn call(client: &mut CommandClient, action: &str, data: Value) -> Result<Value, CallError> {
    let Value::Object(map) = data else {
        panic!("command data must be an object");
    };
    client.request(action, map).await
}

async fn create_product(system: &System, name: &str) -> String {
    let mut product = system.client(ServiceName::Product);
    let created = call(&mut product, "create", json!({"name": name, "category": "electronics"}))
        .await
        .unwrap();
    created["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn new_product_gets_default_price_once() {
    let system = System::start().await;
    let product_id = create_product(&system, "Lamp").await;

    let stats = system.frames_seen(ServiceName::Pricing, "pricing.default_price", 1).await;
    assert_eq!(stats.created, 1);

    let mut pricing = system.client(ServiceName::Pricing);
    let price = call(&mut pricing, "get", json!({"product_pk": product_id})).await.unwrap();
    assert_eq!(price["price"], json!(0.0));

    call(&mut pricing, "update", json!({"product_pk": product_id, "price": 19.99}))
        .await
        .unwrap();

    // A redelivered creation fact leaves the existing price alone.
    let product = call(&mut system.client(ServiceName::Product), "get", json!({"id": product_id}))
        .await
        .unwrap();
    system
        .publisher(ServiceName::Product)
        .publish(topics::PRODUCT_CREATED, &product)
        .unwrap();
    let stats = system.frames_seen(ServiceName::Pricing, "pricing.default_price", 2).await;
    assert_eq!(stats.already_present, 1);

    let price = call(&mut pricing, "get", json!({"product_pk": product_id})).await.unwrap();
    assert_eq!(price["price"], json!(19.99));

    system.stop().await;
}

#[tokio::test]
async fn order_line_decrements_stock_and_details_reflect_it() {
    let system = System::start().await;
    let mut inventory = system.client(ServiceName::Inventory);
    let warehouse = call(&mut inventory, "create_warehouse", json!({"name": "Main", "location": "Lyon"}))
        .await
        .unwrap();
    let warehouse_id = warehouse["id"].as_str().unwrap().to_string();

    let product_id = create_product(&system, "Keyboard").await;
    system.frames_seen(ServiceName::Inventory, "inventory.stock_rows", 1).await;
    system.frames_seen(ServiceName::Pricing, "pricing.default_price", 1).await;

    call(
        &mut inventory,
        "update",
        json!({"warehouse_pk": warehouse_id, "product_pk": product_id, "quantity": 100}),
    )
    .await
    .unwrap();

    let mut order = system.client(ServiceName::Order);
    let created = call(
        &mut order,
        "create",
        json!({
            "customer_pk": RecordId::new(),
            "lines": [{"product_pk": product_id, "quantity": 3, "unit_price": 2.0, "warehouse_pk": warehouse_id}],
        }),
    )
    .await
    .unwrap();
    assert_eq!(created["status"], json!("pending"));

    let stats = system.frames_seen(ServiceName::Inventory, "inventory.decrement", 1).await;
    assert_eq!(stats.adjusted, 1);

    let rows = call(&mut inventory, "get", json!({"product_pk": product_id})).await.unwrap();
    assert_eq!(rows[0]["quantity"], json!(97));

    let details = call(
        &mut system.client(ServiceName::Product),
        "get_details",
        json!({"id": product_id}),
    )
    .await
    .unwrap();
    assert_eq!(details["name"], json!("Keyboard"));
    assert_eq!(details["price"], json!(0.0));
    assert_eq!(details["stock"], json!(97));

    system.stop().await;
}

#[tokio::test]
async fn redelivered_order_line_decrements_twice() {
    let system = System::start().await;
    let mut inventory = system.client(ServiceName::Inventory);
    let warehouse = call(&mut inventory, "create_warehouse", json!({"name": "Spare"}))
        .await
        .unwrap();
    let warehouse_id = warehouse["id"].as_str().unwrap().to_string();
    let product_id = create_product(&system, "Cable").await;
    system.frames_seen(ServiceName::Inventory, "inventory.stock_rows", 1).await;
    call(
        &mut inventory,
        "update",
        json!({"warehouse_pk": warehouse_id, "product_pk": product_id, "quantity": 10}),
    )
    .await
    .unwrap();

    let line = json!({
        "id": RecordId::new(),
        "order_pk": RecordId::new(),
        "product_pk": product_id,
        "quantity": 4,
        "unit_price": 1.0,
        "warehouse_pk": warehouse_id,
    });
    let orders = system.publisher(ServiceName::Order);
    orders.publish(topics::ORDERLINE_CREATED, &line).unwrap();
    orders.publish(topics::ORDERLINE_CREATED, &line).unwrap();
    system.frames_seen(ServiceName::Inventory, "inventory.decrement", 2).await;

    // Decrements carry no dedup key: the same line counts twice.
    let rows = call(&mut inventory, "get", json!({"product_pk": product_id})).await.unwrap();
    assert_eq!(rows[0]["quantity"], json!(2));

    system.stop().await;
}

#[tokio::test]
async fn update_of_missing_record_is_rejected_as_not_found() {
    let system = System::start().await;
    let missing = RecordId::new().to_string();

    let err = call(
        &mut system.client(ServiceName::Product),
        "update",
        json!({"id": missing, "name": "Ghost"}),
    )
    .await
    .unwrap_err();
    match err {
        CallError::Rejected(message) => assert_eq!(message, format!("product not found: {missing}")),
        other => panic!("expected a rejection, got {other:?}"),
    }

    let err = call(&mut system.client(ServiceName::Order), "ship", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::Rejected(m) if m == "unknown action: ship"));

    system.stop().await;
}

#[tokio::test]
async fn facts_published_before_a_subscriber_joins_are_lost() {
    let feed = Publisher::bind("127.0.0.1:0").await.unwrap();
    let early = RecordId::new();
    assert_eq!(feed.publish(topics::PRODUCT_CREATED, &json!({"id": early})).unwrap(), 0);

    let listeners = Listeners::bind(
        ServiceName::Pricing,
        &ServiceEndpoints::ephemeral(ServiceName::Pricing, "127.0.0.1"),
    )
    .await
    .unwrap();
    let own = listeners.endpoints().unwrap();
    let directory = Endpoints::default()
        .with(ServiceName::Pricing, own.clone())
        .with(
            ServiceName::Product,
            ServiceEndpoints {
                command: "127.0.0.1:1".to_string(),
                publish: feed.local_addr().map(|a| a.to_string()),
                peer: None,
            },
        );
    let pricing = services::start(listeners, &directory, CALL_TIMEOUT).await.unwrap();
    feed.wait_for_subscribers(1).await;

    let late = RecordId::new();
    feed.publish(topics::PRODUCT_CREATED, &json!({"id": late})).unwrap();
    pricing
        .replica_stats()
        .unwrap()
        .wait_for_frames("pricing.default_price", 1, WAIT)
        .await
        .unwrap();

    let mut client = CommandClient::new(own.command, CALL_TIMEOUT);
    assert!(call(&mut client, "get", json!({"product_pk": late})).await.is_ok());
    let err = call(&mut client, "get", json!({"product_pk": early})).await.unwrap_err();
    assert!(matches!(err, CallError::Rejected(m) if m.starts_with("price not found")));

    pricing.stop().await;
    feed.shutdown();
}

#[tokio::test]
async fn details_fall_back_to_null_when_peers_are_down() {
    let listeners = Listeners::bind(
        ServiceName::Product,
        &ServiceEndpoints::ephemeral(ServiceName::Product, "127.0.0.1"),
    )
    .await
    .unwrap();
    let own = listeners.endpoints().unwrap();
    // Nothing listens on port 1.
    let unreachable = || ServiceEndpoints {
        command: "127.0.0.1:1".to_string(),
        publish: None,
        peer: Some("127.0.0.1:1".to_string()),
    };
    let directory = Endpoints::default()
        .with(ServiceName::Pricing, unreachable())
        .with(ServiceName::Inventory, unreachable());
    let product = services::start(listeners, &directory, Duration::from_millis(300))
        .await
        .unwrap();

    let mut client = CommandClient::new(own.command, CALL_TIMEOUT);
    let created = call(&mut client, "create", json!({"name": "Mug", "category": "other"}))
        .await
        .unwrap();
    let details = call(&mut client, "get_details", json!({"id": created["id"]}))
        .await
        .unwrap();
    assert_eq!(details["name"], json!("Mug"));
    assert_eq!(details["price"], Value::Null);
    assert_eq!(details["stock"], Value::Null);

    product.stop().await;
}
