use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::ServiceName;
use serde_json::{Map, Value};

use super::{Reply, command_data};
use crate::error::ApiError;
use crate::gateway::Gateway;

/// POST /customer
pub async fn create(
    State(gateway): State<Arc<Gateway>>,
    Json(body): Json<Map<String, Value>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let created = gateway
        .call(ServiceName::Customer, "create", body, StatusCode::BAD_REQUEST)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /customer/{pk}
pub async fn get(State(gateway): State<Arc<Gateway>>, Path(pk): Path<String>) -> Reply {
    let data = command_data(None, [("id", pk)]);
    Ok(Json(
        gateway
            .call(ServiceName::Customer, "get", data, StatusCode::NOT_FOUND)
            .await?,
    ))
}
