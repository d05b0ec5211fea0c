//! OpenAPI document served at `/openapi.json`.

use crate::handlers::{common, todo};
use crate::response::ErrorBody;
use crate::service::{CreateTodoRequest, CreateTodoResponse, Todo};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(title = "Todo API", description = "Todo CRUD over PostgreSQL"),
    paths(
        todo::create_todo,
        todo::get_todo,
        todo::list_todos,
        todo::delete_todo,
        todo::delete_all_todos,
        common::health,
        common::ready,
        common::version,
    ),
    components(schemas(
        Todo,
        CreateTodoRequest,
        CreateTodoResponse,
        ErrorBody,
        common::HealthBody,
        common::ReadyBody,
        common::VersionBody,
    )),
    tags(
        (name = "todo", description = "Todo items"),
        (name = "common", description = "Service probes")
    )
)]
pub struct ApiDoc;
