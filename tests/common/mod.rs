//! Shared fixtures: in-memory todo store, app builder, request helpers, log capture.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, Request, StatusCode},
};
use http_body_util::BodyExt;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use todo_service::{register_routes, AppError, AppState, Router, RouterConfig, Todo, TodoStore};
use tower::ServiceExt;
use uuid::Uuid;

/// Todo store backed by a map. `fail` makes every call return an internal error.
#[derive(Clone, Default)]
pub struct MemoryStore {
    todos: Arc<Mutex<HashMap<Uuid, Todo>>>,
    fail: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.todos.lock().unwrap().len()
    }

    fn check(&self) -> Result<(), AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::internal(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "store offline",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl TodoStore for MemoryStore {
    async fn create(&self, todo: &Todo) -> Result<(), AppError> {
        self.check()?;
        self.todos.lock().unwrap().insert(todo.id, todo.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Todo>, AppError> {
        self.check()?;
        Ok(self.todos.lock().unwrap().get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Todo>, AppError> {
        self.check()?;
        let mut todos: Vec<Todo> = self.todos.lock().unwrap().values().cloned().collect();
        todos.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(todos)
    }

    async fn delete(&self, id: Uuid) -> Result<u64, AppError> {
        self.check()?;
        Ok(self.todos.lock().unwrap().remove(&id).map_or(0, |_| 1))
    }

    async fn delete_all(&self) -> Result<u64, AppError> {
        self.check()?;
        let mut todos = self.todos.lock().unwrap();
        let n = todos.len() as u64;
        todos.clear();
        Ok(n)
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.check()
    }
}

pub const BODY_LIMIT: usize = 64 * 1024;

pub fn app_with(config: RouterConfig, store: &MemoryStore) -> axum::Router {
    let state = AppState::new(store.clone());
    let mut router = Router::new(config).unwrap();
    register_routes(&mut router, &state).unwrap();
    router.into_service(BODY_LIMIT)
}

pub fn app(store: &MemoryStore) -> axum::Router {
    app_with(RouterConfig::default(), store)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.to_vec()).unwrap()
    }
}

pub async fn send(app: &axum::Router, req: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Creates a todo through the API and returns its id.
pub async fn create(app: &axum::Router, title: &str, content: &str) -> Uuid {
    let body = serde_json::json!({ "title": title, "content": content }).to_string();
    let response = send(app, post_json("/api/v1/todo", &body)).await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
    response.json()["id"].as_str().unwrap().parse().unwrap()
}

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Captures events on the current thread until the guard drops.
/// Use with a current-thread runtime so spawned handler tasks log here too.
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    (buffer, tracing::subscriber::set_default(subscriber))
}
