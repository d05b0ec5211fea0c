//! Method + path router.
//!
//! Every registered handler runs behind an adapter that:
//! - runs the handler as its own task (panics become a 500),
//! - renders a returned error through the [`ErrorResponder`],
//! - applies CORS headers when a negotiator is configured,
//! - emits one access-log event with path, status and elapsed time.
//!
//! Unmatched paths and methods go through the same responder, so every
//! failure carries the JSON error envelope. The route table is frozen by
//! [`Router::into_service`].

pub mod params;
pub mod pattern;

pub use params::PathParams;
pub use pattern::PathPattern;

use crate::cors::{Cors, CorsConfig};
use crate::error::{AppError, ConfigError, HttpError};
use crate::response::{empty_response, ErrorResponder, HandlerResult};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::Response,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type BoxHandler = Arc<dyn Fn(Request, PathParams) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Handles `OPTIONS` requests that match no explicitly registered route.
/// `allow` is the computed `Allow` value for the request path.
pub trait OptionsHandler: Send + Sync + 'static {
    fn handle(&self, req: &Request, allow: &HeaderValue) -> Response;
}

#[derive(Debug, Clone, Default)]
pub struct RouterConfig {
    /// Include error causes in response bodies (`debug` field).
    pub verbose: bool,
    /// Enables the CORS negotiator on every route and as the global OPTIONS handler.
    pub cors: Option<CorsConfig>,
    /// Handler deadline; expiry renders a 503.
    pub request_timeout: Option<Duration>,
}

struct Route {
    method: Method,
    pattern: PathPattern,
    handler: BoxHandler,
}

enum Lookup<'a> {
    Found(&'a Route, PathParams),
    MethodNotAllowed(HeaderValue),
    NotFound,
}

pub struct Router {
    routes: Vec<Route>,
    responder: ErrorResponder,
    cors: Option<Cors>,
    global_options: Option<Arc<dyn OptionsHandler>>,
    request_timeout: Option<Duration>,
    body_limit: usize,
}

impl Router {
    pub fn new(config: RouterConfig) -> Result<Self, ConfigError> {
        let cors = config.cors.map(Cors::new).transpose()?;
        let global_options = cors
            .clone()
            .map(|cors| Arc::new(cors) as Arc<dyn OptionsHandler>);
        Ok(Self {
            routes: Vec::new(),
            responder: ErrorResponder::new(config.verbose),
            cors,
            global_options,
            request_timeout: config.request_timeout,
            body_limit: usize::MAX,
        })
    }

    /// Replace the handler for unmatched `OPTIONS` requests.
    pub fn with_global_options(mut self, handler: impl OptionsHandler) -> Self {
        self.global_options = Some(Arc::new(handler));
        self
    }

    pub fn responder(&self) -> ErrorResponder {
        self.responder
    }

    /// Register `handler` for `method` on `path` (e.g. `/api/v1/todo/:id`).
    pub fn handle<H, Fut>(&mut self, method: Method, path: &str, handler: H) -> Result<&mut Self, ConfigError>
    where
        H: Fn(Request, PathParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let pattern = PathPattern::parse(path)?;
        if self
            .routes
            .iter()
            .any(|r| r.method == method && r.pattern == pattern)
        {
            return Err(ConfigError::DuplicateRoute {
                method: method.to_string(),
                pattern: path.to_string(),
            });
        }
        let handler: BoxHandler =
            Arc::new(move |req: Request, params: PathParams| -> BoxFuture<'static, HandlerResult> {
                Box::pin(handler(req, params))
            });
        self.routes.push(Route {
            method,
            pattern,
            handler,
        });
        Ok(self)
    }

    pub fn get<H, Fut>(&mut self, path: &str, handler: H) -> Result<&mut Self, ConfigError>
    where
        H: Fn(Request, PathParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handle(Method::GET, path, handler)
    }

    pub fn post<H, Fut>(&mut self, path: &str, handler: H) -> Result<&mut Self, ConfigError>
    where
        H: Fn(Request, PathParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handle(Method::POST, path, handler)
    }

    pub fn delete<H, Fut>(&mut self, path: &str, handler: H) -> Result<&mut Self, ConfigError>
    where
        H: Fn(Request, PathParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handle(Method::DELETE, path, handler)
    }

    fn lookup(&self, method: &Method, path: &str) -> Lookup<'_> {
        let mut best: Option<(&Route, PathParams)> = None;
        let mut allowed: Vec<&str> = Vec::new();

        for route in &self.routes {
            let Some(params) = route.pattern.matches(path) else {
                continue;
            };
            allowed.push(route.method.as_str());
            if route.method != *method {
                continue;
            }
            let better = best
                .as_ref()
                .map_or(true, |(b, _)| route.pattern.specificity() > b.pattern.specificity());
            if better {
                best = Some((route, params));
            }
        }

        match best {
            Some((route, params)) => Lookup::Found(route, params),
            None if allowed.is_empty() => Lookup::NotFound,
            None => Lookup::MethodNotAllowed(allow_header(allowed)),
        }
    }

    /// Route `req` to its handler and produce the response.
    pub async fn dispatch(&self, req: Request) -> Response {
        let start = Instant::now();
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let response = match self.lookup(&method, &path) {
            Lookup::Found(route, params) => self.invoke(route, req, params, &path).await,
            Lookup::MethodNotAllowed(allow) if method == Method::OPTIONS => {
                let mut response = match &self.global_options {
                    Some(handler) => handler.handle(&req, &allow),
                    None => empty_response(StatusCode::NO_CONTENT),
                };
                response.headers_mut().entry(header::ALLOW).or_insert(allow);
                response
            }
            Lookup::MethodNotAllowed(allow) => {
                let mut response = self
                    .responder
                    .respond(&path, HttpError::method_not_allowed().into());
                response.headers_mut().insert(header::ALLOW, allow);
                response
            }
            Lookup::NotFound => self
                .responder
                .respond(&path, HttpError::new(StatusCode::NOT_FOUND).operational().into()),
        };

        log_access(&method, &path, &response, start);
        response
    }

    /// Renders the 413 envelope when the declared `Content-Length` exceeds the body limit.
    fn reject_oversized(&self, req: &Request) -> Option<Response> {
        let declared: usize = req
            .headers()
            .get(header::CONTENT_LENGTH)?
            .to_str()
            .ok()?
            .trim()
            .parse()
            .ok()?;
        if declared <= self.body_limit {
            return None;
        }
        let start = Instant::now();
        let path = req.uri().path();
        let response = self.responder.respond(
            path,
            HttpError::new(StatusCode::PAYLOAD_TOO_LARGE).operational().into(),
        );
        log_access(req.method(), path, &response, start);
        Some(response)
    }

    async fn invoke(&self, route: &Route, req: Request, params: PathParams, path: &str) -> Response {
        let mut task = tokio::spawn((route.handler)(req, params));
        let joined = match self.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => Some(joined),
                Err(_) => {
                    task.abort();
                    None
                }
            },
            None => Some(task.await),
        };

        let result = match joined {
            Some(Ok(result)) => result,
            Some(Err(e)) if e.is_panic() => Err(AppError::internal(format!(
                "handler panicked: {}",
                panic_message(e.into_panic())
            ))),
            Some(Err(e)) => Err(AppError::internal(e)),
            None => Err(HttpError::new(StatusCode::SERVICE_UNAVAILABLE)
                .with_message("request timed out")
                .into()),
        };

        let mut response = match result {
            Ok(response) => response,
            Err(err) => self.responder.respond(path, err),
        };
        if let Some(cors) = &self.cors {
            let headers = response.headers_mut();
            for (name, value) in cors.actual_headers().iter() {
                headers.entry(name.clone()).or_insert_with(|| value.clone());
            }
        }
        response
    }

    /// Freeze the route table and expose it as an axum service. Bodies over
    /// `body_limit` bytes are answered with a 413 envelope.
    pub fn into_service(mut self, body_limit: usize) -> axum::Router {
        tracing::debug!(routes = self.routes.len(), "router ready");
        self.body_limit = body_limit;
        let router = Arc::new(self);
        axum::Router::new()
            .fallback(dispatch)
            .with_state(router.clone())
            .layer(
                ServiceBuilder::new()
                    .layer(middleware::from_fn_with_state(router, enforce_body_limit))
                    .layer(RequestBodyLimitLayer::new(body_limit)),
            )
    }
}

async fn dispatch(State(router): State<Arc<Router>>, req: Request) -> Response {
    router.dispatch(req).await
}

/// Declared overruns are rejected here; streamed ones hit the limit in `read_json`.
async fn enforce_body_limit(State(router): State<Arc<Router>>, req: Request, next: Next) -> Response {
    match router.reject_oversized(&req) {
        Some(response) => response,
        None => next.run(req).await,
    }
}

fn log_access(method: &Method, path: &str, response: &Response, start: Instant) {
    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed = ?start.elapsed(),
        "http request"
    );
}

fn allow_header(mut methods: Vec<&str>) -> HeaderValue {
    methods.push(Method::OPTIONS.as_str());
    methods.sort_unstable();
    methods.dedup();
    HeaderValue::from_str(&methods.join(", ")).unwrap_or_else(|_| HeaderValue::from_static("OPTIONS"))
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
