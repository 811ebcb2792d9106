use async_trait::async_trait;
use chrono::Utc;
use common::{RecordId, topics};
use fabric::{CommandEnvelope, CommandHandler, Publisher};
use serde_json::Value;
use store::Store;

use super::records::{CreateOrder, NewOrderLine, Order, OrderCreated, OrderLine, OrderState, OrderStatus, UpdateOrder};
use crate::payload::{self, ById};
use crate::{Result, ServiceError};

const KIND: &str = "order";

fn line(order: RecordId, input: &NewOrderLine) -> Result<OrderLine> {
    let product_pk = payload::reference("product_pk", &input.product_pk)?;
    if input.quantity <= 0 {
        return Err(ServiceError::validation(format!(
            "quantity must be positive, got {}",
            input.quantity
        )));
    }
    if !input.unit_price.is_finite() || input.unit_price < 0.0 {
        return Err(ServiceError::validation(format!(
            "unit_price must be a non-negative number, got {}",
            input.unit_price
        )));
    }
    let warehouse_pk = input
        .warehouse_pk
        .as_deref()
        .map(|raw| payload::reference("warehouse_pk", raw))
        .transpose()?;
    Ok(OrderLine {
        id: RecordId::new(),
        order_pk: order,
        product_pk,
        quantity: input.quantity,
        unit_price: input.unit_price,
        warehouse_pk,
    })
}

/// Owns orders and their lines.
pub struct OrderService {
    store: Store<OrderState>,
    publisher: Publisher,
}

impl OrderService {
    pub fn new(store: Store<OrderState>, publisher: Publisher) -> Self {
        Self { store, publisher }
    }

    pub fn store(&self) -> &Store<OrderState> {
        &self.store
    }

    /// Creates an order with its lines, then publishes `order.created`
    /// followed by one `orderline.created` per line.
    #[tracing::instrument(skip(self, input), fields(customer = %input.customer_pk, lines = input.lines.len()))]
    pub async fn create(&self, input: CreateOrder) -> Result<Order> {
        let customer_pk = payload::reference("customer_pk", &input.customer_pk)?;
        if input.lines.is_empty() {
            return Err(ServiceError::validation("an order needs at least one line"));
        }
        let id = RecordId::new();
        let lines = input
            .lines
            .iter()
            .map(|l| line(id, l))
            .collect::<Result<Vec<_>>>()?;
        let order = Order {
            id,
            customer_pk,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            lines,
        };

        let created = self
            .store
            .transact(|state| -> Result<Order> {
                if !state.known_customers.contains(&customer_pk) {
                    tracing::debug!(%customer_pk, "customer not yet observed");
                }
                for l in &order.lines {
                    if !state.known_products.contains(&l.product_pk) {
                        tracing::debug!(product_pk = %l.product_pk, "product not yet observed");
                    }
                }
                Ok(state.orders.insert(order)?.clone())
            })
            .await?;

        self.announce(&created);
        metrics::counter!("orders_created_total").increment(1);
        metrics::counter!("order_lines_created_total").increment(created.lines.len() as u64);
        tracing::info!(id = %created.id, total = created.total(), "order created");
        Ok(created)
    }

    fn announce(&self, order: &Order) {
        let header = OrderCreated {
            id: order.id,
            customer_pk: order.customer_pk,
        };
        if let Err(e) = self.publisher.publish(topics::ORDER_CREATED, &header) {
            tracing::error!(id = %order.id, error = %e, "failed to publish order.created");
        }
        for l in &order.lines {
            if let Err(e) = self.publisher.publish(topics::ORDERLINE_CREATED, l) {
                tracing::error!(id = %l.id, error = %e, "failed to publish orderline.created");
            }
        }
    }

    pub async fn get(&self, id: &str) -> Result<Order> {
        let key = payload::own_id(KIND, id)?;
        self.store
            .read()
            .await
            .orders
            .get(&key)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(KIND, id))
    }

    /// Sets the status of an order.
    #[tracing::instrument(skip(self), fields(id = %input.id, status = %input.status))]
    pub async fn update(&self, input: UpdateOrder) -> Result<Order> {
        let key = payload::own_id(KIND, &input.id)?;
        self.store
            .transact(|state| {
                let order = state
                    .orders
                    .get_mut(&key)
                    .ok_or_else(|| ServiceError::not_found(KIND, &input.id))?;
                order.status = input.status;
                Ok(order.clone())
            })
            .await
    }
}

#[async_trait]
impl CommandHandler for OrderService {
    type Error = ServiceError;

    fn service(&self) -> &'static str {
        KIND
    }

    async fn handle(&self, command: CommandEnvelope) -> Result<Value> {
        match command.action.as_str() {
            "create" => payload::to_value(&self.create(payload::parse(&command)?).await?),
            "get" => {
                let ById { id } = payload::parse(&command)?;
                payload::to_value(&self.get(&id).await?)
            }
            "update" => payload::to_value(&self.update(payload::parse(&command)?).await?),
            other => Err(ServiceError::UnknownAction(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service() -> OrderService {
        OrderService::new(Store::new(OrderState::default()), Publisher::detached())
    }

    fn new_line(product: RecordId, quantity: i64) -> NewOrderLine {
        NewOrderLine {
            product_pk: product.to_string(),
            quantity,
            unit_price: 2.5,
            warehouse_pk: None,
        }
    }

    #[tokio::test]
    async fn create_publishes_header_then_each_line() {
        let service = service();
        let mut tap = service.publisher.tap("order");
        let customer = RecordId::new();
        let (a, b) = (RecordId::new(), RecordId::new());

        let order = service
            .create(CreateOrder {
                customer_pk: customer.to_string(),
                lines: vec![new_line(a, 3), new_line(b, 1)],
            })
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total(), 10.0);

        let frames = tap.drain();
        let topics: Vec<&str> = frames.iter().map(|f| f.topic.as_str()).collect();
        assert_eq!(topics, ["order.created", "orderline.created", "orderline.created"]);
        assert_eq!(frames[0].payload, json!({"id": order.id, "customer_pk": customer}));
        let first: OrderLine = frames[1].parse_payload().unwrap();
        assert_eq!(first, order.lines[0]);
        assert_eq!(first.order_pk, order.id);
        assert_eq!(frames[2].payload["product_pk"], json!(b));
    }

    #[tokio::test]
    async fn create_rejects_bad_lines_without_publishing() {
        let service = service();
        let mut tap = service.publisher.tap("");
        let customer = RecordId::new().to_string();

        for lines in [vec![], vec![new_line(RecordId::new(), 0)], vec![new_line(RecordId::new(), -2)]] {
            let err = service
                .create(CreateOrder {
                    customer_pk: customer.clone(),
                    lines,
                })
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)));
        }
        assert!(tap.try_recv().is_none());
        assert!(service.store().read().await.orders.is_empty());
    }

    #[tokio::test]
    async fn update_sets_status() {
        let service = service();
        let order = service
            .create(CreateOrder {
                customer_pk: RecordId::new().to_string(),
                lines: vec![new_line(RecordId::new(), 1)],
            })
            .await
            .unwrap();

        let updated = service
            .handle(
                CommandEnvelope::with_payload("update", &json!({"id": order.id, "status": "shipped"})).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(updated["status"], json!("shipped"));

        let err = service
            .handle(CommandEnvelope::with_payload("update", &json!({"id": order.id, "status": "lost"})).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidPayload(_)));

        let missing = RecordId::new();
        let err = service
            .update(UpdateOrder {
                id: missing.to_string(),
                status: OrderStatus::Cancelled,
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), format!("order not found: {missing}"));
    }
}
