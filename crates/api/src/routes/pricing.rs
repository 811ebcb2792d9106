use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::ServiceName;
use serde_json::{Map, Value};

use super::{Reply, command_data};
use crate::error::ApiError;
use crate::gateway::Gateway;

/// POST /pricing
pub async fn create(
    State(gateway): State<Arc<Gateway>>,
    Json(body): Json<Map<String, Value>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let created = gateway
        .call(ServiceName::Pricing, "create", body, StatusCode::BAD_REQUEST)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /pricing/{product_pk}
pub async fn get(State(gateway): State<Arc<Gateway>>, Path(product_pk): Path<String>) -> Reply {
    let data = command_data(None, [("product_pk", product_pk)]);
    Ok(Json(
        gateway
            .call(ServiceName::Pricing, "get", data, StatusCode::NOT_FOUND)
            .await?,
    ))
}

/// PUT /pricing/{product_pk}
pub async fn update(
    State(gateway): State<Arc<Gateway>>,
    Path(product_pk): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> Reply {
    let data = command_data(Some(body), [("product_pk", product_pk)]);
    Ok(Json(
        gateway
            .call(ServiceName::Pricing, "update", data, StatusCode::NOT_FOUND)
            .await?,
    ))
}
