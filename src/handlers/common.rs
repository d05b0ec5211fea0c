//! Common handlers: health, readiness, version, OpenAPI document.

use crate::openapi::ApiDoc;
use crate::response::{json_response, HandlerResult};
use crate::state::AppState;
use axum::http::StatusCode;
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

#[derive(Serialize, ToSchema)]
pub struct HealthBody {
    status: String,
}

#[derive(Serialize, ToSchema)]
pub struct ReadyBody {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct VersionBody {
    name: String,
    version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "common",
    responses((status = 200, description = "Process is up", body = HealthBody))
)]
pub async fn health() -> HandlerResult {
    json_response(
        StatusCode::OK,
        &HealthBody {
            status: "ok".into(),
        },
    )
}

#[utoipa::path(
    get,
    path = "/ready",
    tag = "common",
    responses(
        (status = 200, description = "Store reachable", body = ReadyBody),
        (status = 503, description = "Store unreachable", body = ReadyBody)
    )
)]
pub async fn ready(state: AppState) -> HandlerResult {
    if let Err(e) = state.todos.ping().await {
        tracing::warn!(error = %e, "readiness check failed");
        return json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            &ReadyBody {
                status: "degraded".into(),
                database: Some("unavailable".into()),
            },
        );
    }
    json_response(
        StatusCode::OK,
        &ReadyBody {
            status: "ok".into(),
            database: Some("ok".into()),
        },
    )
}

#[utoipa::path(
    get,
    path = "/version",
    tag = "common",
    responses((status = 200, description = "Crate name and version", body = VersionBody))
)]
pub async fn version() -> HandlerResult {
    json_response(
        StatusCode::OK,
        &VersionBody {
            name: env!("CARGO_PKG_NAME").into(),
            version: env!("CARGO_PKG_VERSION").into(),
        },
    )
}

pub async fn openapi() -> HandlerResult {
    json_response(StatusCode::OK, &ApiDoc::openapi())
}
