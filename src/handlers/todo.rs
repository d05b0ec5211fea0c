//! Todo CRUD handlers.

use crate::error::{AppError, HttpError};
use crate::response::{empty_response, json_response, read_json, ErrorBody, HandlerResult};
use crate::router::PathParams;
use crate::service::{CreateTodoRequest, CreateTodoResponse, RequestValidator, Todo};
use crate::state::AppState;
use axum::{extract::Request, http::StatusCode};
use uuid::Uuid;

fn parse_id(params: &PathParams) -> Result<Uuid, AppError> {
    let raw = params.get("id").unwrap_or_default();
    Uuid::parse_str(raw).map_err(|e| HttpError::bad_request("invalid id").with_cause(e).into())
}

fn not_found(id: Uuid) -> AppError {
    HttpError::not_found(format!("todo \"{id}\" not found")).into()
}

#[utoipa::path(
    post,
    path = "/api/v1/todo",
    tag = "todo",
    request_body = CreateTodoRequest,
    responses(
        (status = 201, description = "Todo created", body = CreateTodoResponse),
        (status = 400, description = "Malformed body or title too long", body = ErrorBody),
        (status = 415, description = "Body is not JSON", body = ErrorBody)
    )
)]
pub async fn create_todo(state: AppState, req: Request) -> HandlerResult {
    let body: CreateTodoRequest = read_json(req).await?;
    RequestValidator::validate_create(&body)?;
    let todo = Todo {
        id: Uuid::new_v4(),
        title: body.title,
        content: body.content,
    };
    state.todos.create(&todo).await?;
    json_response(StatusCode::CREATED, &CreateTodoResponse { id: todo.id })
}

#[utoipa::path(
    get,
    path = "/api/v1/todo/{id}",
    tag = "todo",
    params(("id" = Uuid, Path, description = "Todo id")),
    responses(
        (status = 200, description = "Todo found", body = Todo),
        (status = 400, description = "Id is not a UUID", body = ErrorBody),
        (status = 404, description = "No todo with this id", body = ErrorBody)
    )
)]
pub async fn get_todo(state: AppState, params: PathParams) -> HandlerResult {
    let id = parse_id(&params)?;
    match state.todos.get(id).await? {
        Some(todo) => json_response(StatusCode::OK, &todo),
        None => Err(not_found(id)),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/todo",
    tag = "todo",
    responses((status = 200, description = "All todos ordered by title", body = [Todo]))
)]
pub async fn list_todos(state: AppState) -> HandlerResult {
    let todos = state.todos.list().await?;
    json_response(StatusCode::OK, &todos)
}

#[utoipa::path(
    delete,
    path = "/api/v1/todo/{id}",
    tag = "todo",
    params(("id" = Uuid, Path, description = "Todo id")),
    responses(
        (status = 204, description = "Todo deleted"),
        (status = 400, description = "Id is not a UUID", body = ErrorBody),
        (status = 404, description = "No todo with this id", body = ErrorBody)
    )
)]
pub async fn delete_todo(state: AppState, params: PathParams) -> HandlerResult {
    let id = parse_id(&params)?;
    if state.todos.delete(id).await? == 0 {
        return Err(not_found(id));
    }
    Ok(empty_response(StatusCode::NO_CONTENT))
}

#[utoipa::path(
    delete,
    path = "/api/v1/todo",
    tag = "todo",
    responses((status = 204, description = "All todos deleted"))
)]
pub async fn delete_all_todos(state: AppState) -> HandlerResult {
    let removed = state.todos.delete_all().await?;
    tracing::debug!(removed, "todos cleared");
    Ok(empty_response(StatusCode::NO_CONTENT))
}
