//! Liveness endpoint.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::gateway::Gateway;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Command endpoint the gateway uses for each service.
    pub services: BTreeMap<&'static str, String>,
}

/// GET /health — the gateway is up. Says nothing about the services.
pub async fn check(State(gateway): State<Arc<Gateway>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        services: gateway.command_endpoints(),
    })
}
