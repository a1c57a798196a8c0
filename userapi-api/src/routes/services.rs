/// Service discovery endpoints
///
/// Exposes the validated registry so operators and tooling can see which
/// services are deployed and which databases each one uses.
///
/// ```text
/// GET /v1/services
/// GET /v1/services/:name
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use userapi_shared::registry::Registry;
use userapi_shared::resource::ServiceDescriptor;

/// A database as seen from a service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseInfo {
    pub name: String,

    /// Resolved migrations directory
    pub migrations: String,
}

/// A registered service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: String,
    pub databases: Vec<DatabaseInfo>,
}

/// List of registered services
#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceList {
    pub services: Vec<ServiceInfo>,
}

impl ServiceInfo {
    fn from_descriptor(registry: &Registry, service: &ServiceDescriptor) -> Self {
        let databases = service
            .databases()
            .iter()
            .filter_map(|name| registry.database(name))
            .map(|db| DatabaseInfo {
                name: db.name().to_string(),
                migrations: db.migrations().display().to_string(),
            })
            .collect();

        Self {
            name: service.name().to_string(),
            databases,
        }
    }
}

pub async fn list_services(State(state): State<AppState>) -> Json<ServiceList> {
    let registry = state.runtime.registry();

    let services = registry
        .services()
        .map(|service| ServiceInfo::from_descriptor(registry, service))
        .collect();

    Json(ServiceList { services })
}

pub async fn get_service(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ServiceInfo>> {
    let service = state.runtime.service(&name)?;

    Ok(Json(ServiceInfo::from_descriptor(
        state.runtime.registry(),
        service.descriptor(),
    )))
}
