use async_trait::async_trait;
use chrono::Utc;
use common::{RecordId, topics};
use fabric::{CommandEnvelope, CommandHandler, Publisher};
use serde_json::Value;
use store::Store;

use super::records::{CreateCustomer, Customer, CustomerState, UpdateCustomer};
use crate::payload::{self, ById};
use crate::{Result, ServiceError};

const KIND: &str = "customer";

/// Owns customer records.
pub struct CustomerService {
    store: Store<CustomerState>,
    publisher: Publisher,
}

impl CustomerService {
    pub fn new(store: Store<CustomerState>, publisher: Publisher) -> Self {
        Self { store, publisher }
    }

    pub fn store(&self) -> &Store<CustomerState> {
        &self.store
    }

    /// Creates a customer and publishes `customer.created`.
    #[tracing::instrument(skip(self, input))]
    pub async fn create(&self, input: CreateCustomer) -> Result<Customer> {
        let customer = Customer {
            id: RecordId::new(),
            first_name: payload::text("first_name", &input.first_name, 1, 100)?,
            last_name: payload::text("last_name", &input.last_name, 1, 100)?,
            email: payload::text("email", &input.email, 1, 255)?,
            created_at: Utc::now(),
        };

        let created = self
            .store
            .transact(|state| -> Result<Customer> { Ok(state.customers.insert(customer)?.clone()) })
            .await?;

        if let Err(e) = self.publisher.publish(topics::CUSTOMER_CREATED, &created) {
            tracing::error!(id = %created.id, error = %e, "failed to publish customer.created");
        }
        tracing::info!(id = %created.id, "customer created");
        Ok(created)
    }

    pub async fn get(&self, id: &str) -> Result<Customer> {
        let key = payload::own_id(KIND, id)?;
        self.store
            .read()
            .await
            .customers
            .get(&key)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(KIND, id))
    }

    pub async fn get_all(&self) -> Vec<Customer> {
        self.store.read().await.customers.all().into_iter().cloned().collect()
    }

    #[tracing::instrument(skip(self, input), fields(id = %input.id))]
    pub async fn update(&self, input: UpdateCustomer) -> Result<Customer> {
        let key = payload::own_id(KIND, &input.id)?;
        let first_name = payload::optional_text("first_name", input.first_name.as_deref(), 1, 100)?;
        let last_name = payload::optional_text("last_name", input.last_name.as_deref(), 1, 100)?;
        let email = payload::optional_text("email", input.email.as_deref(), 1, 255)?;

        self.store
            .transact(|state| {
                let customer = state
                    .customers
                    .get_mut(&key)
                    .ok_or_else(|| ServiceError::not_found(KIND, &input.id))?;
                if let Some(first_name) = first_name {
                    customer.first_name = first_name;
                }
                if let Some(last_name) = last_name {
                    customer.last_name = last_name;
                }
                if let Some(email) = email {
                    customer.email = email;
                }
                Ok(customer.clone())
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<()> {
        let key = payload::own_id(KIND, id)?;
        self.store
            .transact(|state| match state.customers.remove(&key) {
                Some(_) => Ok(()),
                None => Err(ServiceError::not_found(KIND, id)),
            })
            .await
    }
}

#[async_trait]
impl CommandHandler for CustomerService {
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
            other => Err(ServiceError::UnknownAction(other.to_string())),
        }
    }
}
