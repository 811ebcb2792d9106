//! Product catalogue endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::ServiceName;
use serde_json::{Map, Value};

use super::{Reply, command_data};
use crate::error::ApiError;
use crate::gateway::Gateway;

const PRODUCT: ServiceName = ServiceName::Product;

/// POST /product
pub async fn create(
    State(gateway): State<Arc<Gateway>>,
    Json(body): Json<Map<String, Value>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let created = gateway.call(PRODUCT, "create", body, StatusCode::BAD_REQUEST).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /product
pub async fn list(State(gateway): State<Arc<Gateway>>) -> Reply {
    let all = gateway.call(PRODUCT, "get_all", Map::new(), StatusCode::BAD_REQUEST).await?;
    Ok(Json(all))
}

/// GET /product/{pk}
pub async fn get(State(gateway): State<Arc<Gateway>>, Path(pk): Path<String>) -> Reply {
    let data = command_data(None, [("id", pk)]);
    Ok(Json(gateway.call(PRODUCT, "get", data, StatusCode::NOT_FOUND).await?))
}

/// PUT /product/{pk}
pub async fn update(
    State(gateway): State<Arc<Gateway>>,
    Path(pk): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> Reply {
    let data = command_data(Some(body), [("id", pk)]);
    Ok(Json(gateway.call(PRODUCT, "update", data, StatusCode::NOT_FOUND).await?))
}

/// DELETE /product/{pk}
pub async fn delete(State(gateway): State<Arc<Gateway>>, Path(pk): Path<String>) -> Result<StatusCode, ApiError> {
    let data = command_data(None, [("id", pk)]);
    gateway.call(PRODUCT, "delete", data, StatusCode::NOT_FOUND).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /product/{pk}/details — product with its price and stock.
pub async fn details(State(gateway): State<Arc<Gateway>>, Path(pk): Path<String>) -> Reply {
    let data = command_data(None, [("id", pk)]);
    Ok(Json(gateway.call(PRODUCT, "get_details", data, StatusCode::NOT_FOUND).await?))
}
