use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{RecordId, topics};
use fabric::{CommandEnvelope, CommandHandler, PeerClient, Publisher};
use serde_json::Value;
use store::Store;
use tokio::sync::Mutex;

use super::records::{CreateProduct, Product, ProductDetails, ProductState, UpdateProduct};
use crate::contracts::{PriceQuery, PriceRequest, StockQuery, StockRequest};
use crate::payload::{self, ById};
use crate::{Result, ServiceError};

const KIND: &str = "product";

/// Connections to the pricing and inventory peers.
pub struct ProductPeers {
    pricing: Mutex<PeerClient<PriceQuery>>,
    inventory: Mutex<PeerClient<StockQuery>>,
}

impl ProductPeers {
    pub fn new(pricing: impl Into<String>, inventory: impl Into<String>, timeout: Duration) -> Self {
        Self {
            pricing: Mutex::new(PeerClient::new(pricing, timeout)),
            inventory: Mutex::new(PeerClient::new(inventory, timeout)),
        }
    }

    async fn price_of(&self, product: RecordId) -> Option<f64> {
        let request = PriceRequest::GetPrice {
            product_pk: product.to_string(),
        };
        match self.pricing.lock().await.request(&request).await {
            Ok(answer) => answer.price,
            Err(e) => {
                tracing::warn!(%product, error = %e, "price unavailable");
                None
            }
        }
    }

    async fn stock_of(&self, product: RecordId) -> Option<i64> {
        let request = StockRequest::GetNbInInventory {
            product_pk: product.to_string(),
        };
        match self.inventory.lock().await.request(&request).await {
            Ok(answer) => Some(answer.quantity),
            Err(e) => {
                tracing::warn!(%product, error = %e, "stock unavailable");
                None
            }
        }
    }
}

/// Owns the product catalogue.
pub struct ProductService {
    store: Store<ProductState>,
    publisher: Publisher,
    peers: Option<ProductPeers>,
}

impl ProductService {
    pub fn new(store: Store<ProductState>, publisher: Publisher) -> Self {
        Self {
            store,
            publisher,
            peers: None,
        }
    }

    pub fn with_peers(mut self, peers: ProductPeers) -> Self {
        self.peers = Some(peers);
        self
    }

    pub fn store(&self) -> &Store<ProductState> {
        &self.store
    }

    /// Creates a product and publishes `product.created`.
    #[tracing::instrument(skip(self))]
    pub async fn create(&self, input: CreateProduct) -> Result<Product> {
        let product = Product {
            id: RecordId::new(),
            name: payload::text("name", &input.name, 1, 100)?,
            description: payload::text("description", &input.description, 0, 1000)?,
            category: input.category,
            available: input.available,
            created_at: Utc::now(),
        };

        let created = self
            .store
            .transact(|state| -> Result<Product> { Ok(state.products.insert(product)?.clone()) })
            .await?;

        if let Err(e) = self.publisher.publish(topics::PRODUCT_CREATED, &created) {
            tracing::error!(id = %created.id, error = %e, "failed to publish product.created");
        }
        tracing::info!(id = %created.id, "product created");
        Ok(created)
    }

    pub async fn get(&self, id: &str) -> Result<Product> {
        let key = payload::own_id(KIND, id)?;
        self.store
            .read()
            .await
            .products
            .get(&key)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(KIND, id))
    }

    pub async fn get_all(&self) -> Vec<Product> {
        self.store.read().await.products.all().into_iter().cloned().collect()
    }

    #[tracing::instrument(skip(self), fields(id = %input.id))]
    pub async fn update(&self, input: UpdateProduct) -> Result<Product> {
        let key = payload::own_id(KIND, &input.id)?;
        let name = payload::optional_text("name", input.name.as_deref(), 1, 100)?;
        let description = payload::optional_text("description", input.description.as_deref(), 0, 1000)?;

        self.store
            .transact(|state| {
                let product = state
                    .products
                    .get_mut(&key)
                    .ok_or_else(|| ServiceError::not_found(KIND, &input.id))?;
                if let Some(name) = name {
                    product.name = name;
                }
                if let Some(description) = description {
                    product.description = description;
                }
                if let Some(category) = input.category {
                    product.category = category;
                }
                if let Some(available) = input.available {
                    product.available = available;
                }
                Ok(product.clone())
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<()> {
        let key = payload::own_id(KIND, id)?;
        self.store
            .transact(|state| match state.products.remove(&key) {
                Some(_) => Ok(()),
                None => Err(ServiceError::not_found(KIND, id)),
            })
            .await
    }

    /// Reads the product, then asks the peers for its price and stock.
    #[tracing::instrument(skip(self))]
    pub async fn get_details(&self, id: &str) -> Result<ProductDetails> {
        let product = self.get(id).await?;
        let (price, stock) = match &self.peers {
            Some(peers) => (peers.price_of(product.id).await, peers.stock_of(product.id).await),
            None => (None, None),
        };
        Ok(ProductDetails { product, price, stock })
    }
}

#[async_trait]
impl CommandHandler for ProductService {
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
            "get_all" => payload::to_value(&self.get_all().await),
            "update" => payload::to_value(&self.update(payload::parse(&command)?).await?),
            "delete" => {
                let ById { id } = payload::parse(&command)?;
                self.delete(&id).await?;
                Ok(Value::Null)
            }
            "get_details" => {
                let ById { id } = payload::parse(&command)?;
                payload::to_value(&self.get_details(&id).await?)
            }
            other => Err(ServiceError::UnknownAction(other.to_string())),
        }
    }
}
