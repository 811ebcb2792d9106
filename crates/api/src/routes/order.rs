//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::ServiceName;
use serde_json::{Map, Value};

use super::{Reply, command_data};
use crate::error::ApiError;
use crate::gateway::Gateway;

/// POST /order — creates an order with its lines.
#[tracing::instrument(skip_all)]
pub async fn create(
    State(gateway): State<Arc<Gateway>>,
    Json(body): Json<Map<String, Value>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let created = gateway
        .call(ServiceName::Order, "create", body, StatusCode::BAD_REQUEST)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /order/{pk}
pub async fn get(State(gateway): State<Arc<Gateway>>, Path(pk): Path<String>) -> Reply {
    let data = command_data(None, [("id", pk)]);
    Ok(Json(gateway.call(ServiceName::Order, "get", data, StatusCode::NOT_FOUND).await?))
}

/// PATCH /order/{pk} — changes the status.
pub async fn update(
    State(gateway): State<Arc<Gateway>>,
    Path(pk): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> Reply {
    let data = command_data(Some(body), [("id", pk)]);
    Ok(Json(
        gateway
            .call(ServiceName::Order, "update", data, StatusCode::NOT_FOUND)
            .await?,
    ))
}
