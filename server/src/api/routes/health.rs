//! Health check endpoint

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use utoipa::ToSchema;

use crate::data::TransactionalService;
use crate::data::cache::CacheService;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    pub cache: &'static str,
}

#[derive(Clone)]
pub struct HealthState {
    pub database: Arc<TransactionalService>,
    pub cache: Arc<CacheService>,
}

fn component(ok: bool) -> &'static str {
    if ok { "ok" } else { "unavailable" }
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Database or cache unreachable", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<HealthState>) -> impl IntoResponse {
    let (database, cache) = tokio::join!(state.database.health_check(), state.cache.health_check());
    if let Err(e) = &database {
        tracing::warn!(error = %e, "Database health check failed");
    }
    if let Err(e) = &cache {
        tracing::warn!(error = %e, "Cache health check failed");
    }

    let healthy = database.is_ok() && cache.is_ok();
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthResponse {
            status: if healthy { "ok" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            database: component(database.is_ok()),
            cache: component(cache.is_ok()),
        }),
    )
}
