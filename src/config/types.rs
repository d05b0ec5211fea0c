//! Service configuration values and their defaults.

use crate::backoff::BackoffPolicy;
use crate::cors::CorsConfig;
use crate::router::RouterConfig;
use crate::store::ConnectionConfig;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub struct ServiceConfig {
    /// Verbose mode: error bodies carry the underlying cause.
    pub dev: bool,
    pub server: ServerConfig,
    pub db: DbConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Per-request handler deadline.
    pub timeout: Duration,
    pub shutdown_timeout: Duration,
    pub body_limit: usize,
    /// `None` leaves CORS disabled.
    pub cors: Option<CorsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
            timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(10),
            body_limit: 1024 * 1024,
            cors: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DbConfig {
    pub dsn: String,
    pub max_idle_conns: u32,
    pub max_open_conns: u32,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
    pub backoff_max_elapsed: Duration,
}

impl DbConfig {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            max_idle_conns: 5,
            max_open_conns: 20,
            backoff_initial: Duration::from_millis(100),
            backoff_max: Duration::from_secs(5),
            backoff_max_elapsed: Duration::from_secs(60),
        }
    }
}

impl ServiceConfig {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dev: false,
            server: ServerConfig::default(),
            db: DbConfig::new(dsn),
        }
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            verbose: self.dev,
            cors: self.server.cors.clone(),
            request_timeout: Some(self.server.timeout).filter(|t| !t.is_zero()),
        }
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            dsn: self.db.dsn.clone(),
            max_idle_conns: self.db.max_idle_conns,
            max_open_conns: self.db.max_open_conns,
            ..ConnectionConfig::default()
        }
    }

    /// Retry policy for the startup connection, without cancellation.
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial_interval: self.db.backoff_initial,
            max_interval: self.db.backoff_max,
            max_elapsed_time: self.db.backoff_max_elapsed,
            ..BackoffPolicy::default()
        }
    }
}
