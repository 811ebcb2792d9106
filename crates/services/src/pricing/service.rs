use async_trait::async_trait;
use common::{RecordId, topics};
use fabric::{BroadcastFrame, CommandEnvelope, CommandHandler, PeerHandler};
use replica::{ReplicaError, ReplicaHandler, ReplicaOutcome};
use serde::Deserialize;
use serde_json::Value;
use store::Store;

use super::records::{ByProduct, CreatePrice, DEFAULT_PRICE, Price, PricingState, UpdatePrice};
use crate::contracts::{PriceAnswer, PriceQuery, PriceRequest};
use crate::payload;
use crate::{Result, ServiceError};

const KIND: &str = "price";

fn checked(price: f64) -> Result<f64> {
    if !price.is_finite() || price < 0.0 {
        return Err(ServiceError::validation(format!("price must be a non-negative number, got {price}")));
    }
    Ok(price)
}

/// Owns product prices.
pub struct PricingService {
    store: Store<PricingState>,
}

impl PricingService {
    pub fn new(store: Store<PricingState>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store<PricingState> {
        &self.store
    }

    #[tracing::instrument(skip(self))]
    pub async fn create(&self, input: CreatePrice) -> Result<Price> {
        let product = payload::reference("product_pk", &input.product_pk)?;
        let price = checked(input.price)?;
        self.store
            .transact(|state| -> Result<Price> {
                if state.prices.contains(&product) {
                    return Err(ServiceError::Conflict(format!("product {product} already has a price")));
                }
                Ok(state.prices.insert(Price::new(product, price))?.clone())
            })
            .await
    }

    pub async fn get(&self, product_pk: &str) -> Result<Price> {
        let product = payload::own_id(KIND, product_pk)?;
        self.store
            .read()
            .await
            .prices
            .get(&product)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(KIND, product_pk))
    }

    #[tracing::instrument(skip(self))]
    pub async fn update(&self, input: UpdatePrice) -> Result<Price> {
        let product = payload::own_id(KIND, &input.product_pk)?;
        let price = input.price.map(checked).transpose()?;
        self.store
            .transact(|state| {
                let record = state
                    .prices
                    .get_mut(&product)
                    .ok_or_else(|| ServiceError::not_found(KIND, &input.product_pk))?;
                if let Some(price) = price {
                    record.price = price;
                }
                Ok(record.clone())
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, product_pk: &str) -> Result<()> {
        let product = payload::own_id(KIND, product_pk)?;
        self.store
            .transact(|state| match state.prices.remove(&product) {
                Some(_) => Ok(()),
                None => Err(ServiceError::not_found(KIND, product_pk)),
            })
            .await
    }
}

#[async_trait]
impl CommandHandler for PricingService {
    type Error = ServiceError;

    fn service(&self) -> &'static str {
        "pricing"
    }

    async fn handle(&self, command: CommandEnvelope) -> Result<Value> {
        match command.action.as_str() {
            "create" => payload::to_value(&self.create(payload::parse(&command)?).await?),
            "get" => {
                let ByProduct { product_pk } = payload::parse(&command)?;
                payload::to_value(&self.get(&product_pk).await?)
            }
            "update" => payload::to_value(&self.update(payload::parse(&command)?).await?),
            "delete" => {
                let ByProduct { product_pk } = payload::parse(&command)?;
                self.delete(&product_pk).await?;
                Ok(Value::Null)
            }
            other => Err(ServiceError::UnknownAction(other.to_string())),
        }
    }
}

/// Answers the product service's price queries.
pub struct PriceResponder {
    store: Store<PricingState>,
}

impl PriceResponder {
    pub fn new(store: Store<PricingState>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PeerHandler<PriceQuery> for PriceResponder {
    async fn answer(&self, request: PriceRequest) -> PriceAnswer {
        let PriceRequest::GetPrice { product_pk } = request;
        let price = match RecordId::parse(&product_pk) {
            Some(product) => self.store.read().await.prices.get(&product).map(|p| p.price),
            None => None,
        };
        PriceAnswer { price }
    }
}

#[derive(Debug, Deserialize)]
struct ProductFact {
    id: Option<RecordId>,
}

/// Gives every new product the default price, once.
pub struct DefaultPriceOnProductCreated {
    store: Store<PricingState>,
}

impl DefaultPriceOnProductCreated {
    pub fn new(store: Store<PricingState>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ReplicaHandler for DefaultPriceOnProductCreated {
    fn name(&self) -> &'static str {
        "pricing.default_price"
    }

    fn topic(&self) -> &'static str {
        topics::PRODUCT_CREATED
    }

    async fn apply(&self, frame: &BroadcastFrame) -> replica::Result<ReplicaOutcome> {
        let fact: ProductFact = frame.parse_payload()?;
        let product = fact.id.ok_or(ReplicaError::MissingKey("id"))?;
        self.store
            .transact(|state| {
                let (_, created) = state
                    .prices
                    .get_or_insert_with(product, || Price::new(product, DEFAULT_PRICE));
                Ok(if created {
                    ReplicaOutcome::Created
                } else {
                    ReplicaOutcome::AlreadyPresent
                })
            })
            .await
    }
}
