//! Route registration onto the service [`Router`](crate::router::Router).

mod common;
mod todo;

pub use common::common_routes;
pub use todo::{todo_routes, TODO_ITEM_PATH, TODO_PATH};

use crate::error::ConfigError;
use crate::router::Router;
use crate::state::AppState;

/// Registers every service route.
pub fn register_routes(router: &mut Router, state: &AppState) -> Result<(), ConfigError> {
    common_routes(router, state)?;
    todo_routes(router, state)
}
