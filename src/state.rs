//! Shared application state for all routes.

use crate::service::TodoStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub todos: Arc<dyn TodoStore>,
}

impl AppState {
    pub fn new(todos: impl TodoStore + 'static) -> Self {
        Self {
            todos: Arc::new(todos),
        }
    }
}
