//! Todo service: a CRUD HTTP API over PostgreSQL with a small router,
//! CORS negotiation, a JSON error envelope and a resilient store connector.

pub mod backoff;
pub mod config;
pub mod cors;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod migration;
pub mod openapi;
pub mod response;
pub mod router;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;

pub use backoff::BackoffPolicy;
pub use config::ServiceConfig;
pub use cors::{Cors, CorsConfig};
pub use error::{AppError, BoxError, ConfigError, ConnectError, HttpError, ServerError};
pub use lifecycle::{serve, wait_for_signal, Shutdown};
pub use migration::ensure_schema;
pub use response::{json_response, read_json, ErrorResponder, HandlerResult};
pub use router::{OptionsHandler, PathParams, Router, RouterConfig};
pub use routes::register_routes;
pub use service::{PgTodoStore, Todo, TodoStore};
pub use state::AppState;
pub use store::{connect, Connect, ConnectionConfig, PgConnector};
