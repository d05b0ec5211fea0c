//! Todo storage and request validation.

mod todo;
mod validation;
pub use todo::{CreateTodoRequest, CreateTodoResponse, PgTodoStore, Todo, TodoStore};
pub use validation::{RequestValidator, MAX_TITLE_LEN};
