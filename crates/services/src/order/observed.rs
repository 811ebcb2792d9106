use async_trait::async_trait;
use common::{RecordId, topics};
use fabric::BroadcastFrame;
use replica::{ReplicaError, ReplicaHandler, ReplicaOutcome};
use serde::Deserialize;
use store::Store;

use super::records::OrderState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fact {
    Product,
    Customer,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: Option<RecordId>,
}

/// Records that a product or customer exists, as announced by its owner.
///
/// Orders never wait on these facts; they are kept for logging.
pub struct ObserveCreated {
    fact: Fact,
    store: Store<OrderState>,
}

impl ObserveCreated {
    pub fn products(store: Store<OrderState>) -> Self {
        Self {
            fact: Fact::Product,
            store,
        }
    }

    pub fn customers(store: Store<OrderState>) -> Self {
        Self {
            fact: Fact::Customer,
            store,
        }
    }
}

#[async_trait]
impl ReplicaHandler for ObserveCreated {
    fn name(&self) -> &'static str {
        match self.fact {
            Fact::Product => "order.observed_products",
            Fact::Customer => "order.observed_customers",
        }
    }

    fn topic(&self) -> &'static str {
        match self.fact {
            Fact::Product => topics::PRODUCT_CREATED,
            Fact::Customer => topics::CUSTOMER_CREATED,
        }
    }

    async fn apply(&self, frame: &BroadcastFrame) -> replica::Result<ReplicaOutcome> {
        let created: Created = frame.parse_payload()?;
        let id = created.id.ok_or(ReplicaError::MissingKey("id"))?;
        let fact = self.fact;
        self.store
            .transact(|state| {
                let known = match fact {
                    Fact::Product => &mut state.known_products,
                    Fact::Customer => &mut state.known_customers,
                };
                Ok(if known.insert(id) {
                    tracing::info!(topic = %frame.topic, %id, "observed");
                    ReplicaOutcome::Created
                } else {
                    ReplicaOutcome::AlreadyPresent
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn records_each_fact_once() {
        let store = Store::new(OrderState::default());
        let products = ObserveCreated::products(store.clone());
        let customers = ObserveCreated::customers(store.clone());
        let id = RecordId::new();

        let frame = BroadcastFrame::new(topics::PRODUCT_CREATED, json!({"id": id}));
        assert_eq!(products.apply(&frame).await.unwrap(), ReplicaOutcome::Created);
        assert_eq!(products.apply(&frame).await.unwrap(), ReplicaOutcome::AlreadyPresent);

        let frame = BroadcastFrame::new(topics::CUSTOMER_CREATED, json!({"id": id, "email": "a@b.c"}));
        assert_eq!(customers.apply(&frame).await.unwrap(), ReplicaOutcome::Created);

        let state = store.read().await;
        assert!(state.known_products.contains(&id));
        assert!(state.known_customers.contains(&id));
        assert_eq!(customers.topic(), "customer.created");
    }
}
