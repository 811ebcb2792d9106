//! Warehouse and stock endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::ServiceName;
use serde_json::{Map, Value};

use super::{Reply, command_data};
use crate::error::ApiError;
use crate::gateway::Gateway;

const INVENTORY: ServiceName = ServiceName::Inventory;

/// POST /warehouse
pub async fn create_warehouse(
    State(gateway): State<Arc<Gateway>>,
    Json(body): Json<Map<String, Value>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let created = gateway
        .call(INVENTORY, "create_warehouse", body, StatusCode::BAD_REQUEST)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /warehouse
pub async fn list_warehouses(State(gateway): State<Arc<Gateway>>) -> Reply {
    Ok(Json(
        gateway
            .call(INVENTORY, "get_all_warehouses", Map::new(), StatusCode::BAD_REQUEST)
            .await?,
    ))
}

/// POST /inventory
pub async fn create(
    State(gateway): State<Arc<Gateway>>,
    Json(body): Json<Map<String, Value>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let created = gateway
        .call(INVENTORY, "create_inventory", body, StatusCode::BAD_REQUEST)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /inventory/{product_pk} — every stock row of a product.
pub async fn get(State(gateway): State<Arc<Gateway>>, Path(product_pk): Path<String>) -> Reply {
    let data = command_data(None, [("product_pk", product_pk)]);
    Ok(Json(gateway.call(INVENTORY, "get", data, StatusCode::NOT_FOUND).await?))
}

/// PATCH /inventory/{warehouse_pk}/{product_pk} — sets the quantity.
pub async fn update(
    State(gateway): State<Arc<Gateway>>,
    Path((warehouse_pk, product_pk)): Path<(String, String)>,
    Json(body): Json<Map<String, Value>>,
) -> Reply {
    let data = command_data(Some(body), [("warehouse_pk", warehouse_pk), ("product_pk", product_pk)]);
    Ok(Json(gateway.call(INVENTORY, "update", data, StatusCode::NOT_FOUND).await?))
}
