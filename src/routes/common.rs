//! Common routes: health, readiness, version, OpenAPI.

use crate::error::ConfigError;
use crate::handlers;
use crate::router::Router;
use crate::state::AppState;

/// GET /health, /ready, /version, /openapi.json.
pub fn common_routes(router: &mut Router, state: &AppState) -> Result<(), ConfigError> {
    let ready_state = state.clone();
    router
        .get("/health", |_req, _params| handlers::health())?
        .get("/ready", move |_req, _params| handlers::ready(ready_state.clone()))?
        .get("/version", |_req, _params| handlers::version())?
        .get("/openapi.json", |_req, _params| handlers::openapi())?;
    Ok(())
}
