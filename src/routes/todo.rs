//! Todo CRUD routes under /api/v1/todo.

use crate::error::ConfigError;
use crate::handlers;
use crate::router::Router;
use crate::state::AppState;

pub const TODO_PATH: &str = "/api/v1/todo";
pub const TODO_ITEM_PATH: &str = "/api/v1/todo/:id";

pub fn todo_routes(router: &mut Router, state: &AppState) -> Result<(), ConfigError> {
    let (create, get, list, delete, delete_all) = (
        state.clone(),
        state.clone(),
        state.clone(),
        state.clone(),
        state.clone(),
    );
    router
        .post(TODO_PATH, move |req, _params| handlers::create_todo(create.clone(), req))?
        .get(TODO_ITEM_PATH, move |_req, params| handlers::get_todo(get.clone(), params))?
        .get(TODO_PATH, move |_req, _params| handlers::list_todos(list.clone()))?
        .delete(TODO_ITEM_PATH, move |_req, params| handlers::delete_todo(delete.clone(), params))?
        .delete(TODO_PATH, move |_req, _params| handlers::delete_all_todos(delete_all.clone()))?;
    Ok(())
}
