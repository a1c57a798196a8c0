/// Health check endpoint
///
/// Reports whether the server is up and whether every declared database
/// answers.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "ok",
///   "service": "user-api",
///   "version": "0.1.0",
///   "timestamp": "2024-01-01T00:00:00Z",
///   "databases": { "users": "connected" }
/// }
/// ```
///
/// `status` is `degraded` when any database is unreachable. The endpoint
/// itself always answers 200 so load balancers can tell "down" from "degraded".

use crate::{app::AppState, bootstrap, error::ApiResult};
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok` or `degraded`
    pub status: String,

    pub service: String,

    pub version: String,

    pub timestamp: DateTime<Utc>,

    /// Connectivity per database
    pub databases: BTreeMap<String, String>,
}

pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let report = state.runtime.health().await;
    let healthy = report.iter().all(|db| db.connected);

    let databases = report
        .into_iter()
        .map(|db| {
            let status = if db.connected { "connected" } else { "disconnected" };
            (db.name, status.to_string())
        })
        .collect();

    Ok(Json(HealthResponse {
        status: (if healthy { "ok" } else { "degraded" }).to_string(),
        service: bootstrap::SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        databases,
    }))
}
