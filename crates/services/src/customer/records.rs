use chrono::{DateTime, Utc};
use common::RecordId;
use serde::{Deserialize, Serialize};
use store::{Record, Table};

/// A customer. This is also the payload of `customer.created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: RecordId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Record for Customer {
    type Key = RecordId;
    const TABLE: &'static str = "customers";

    fn key(&self) -> RecordId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, Default)]
pub struct CustomerState {
    pub customers: Table<Customer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCustomer {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}
