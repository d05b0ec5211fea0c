//! Resilient store connection: open + ping under a backoff policy.

use crate::backoff::{retry, BackoffPolicy, RetryError};
use crate::error::{BoxError, ConnectError};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Store connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub dsn: String,
    /// Connections the pool keeps open while idle.
    pub max_idle_conns: u32,
    /// Pool size; 0 means unbounded.
    pub max_open_conns: u32,
    /// How long a checkout may wait for a free connection.
    pub acquire_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            dsn: String::new(),
            max_idle_conns: 2,
            max_open_conns: 0,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

impl ConnectionConfig {
    pub fn max_connections(&self) -> u32 {
        match self.max_open_conns {
            0 => u32::MAX,
            n => n,
        }
    }

    pub fn min_connections(&self) -> u32 {
        self.max_idle_conns.min(self.max_connections())
    }
}

/// Opens a store handle and probes its liveness.
#[async_trait]
pub trait Connect: Send + Sync {
    type Handle: Send + Sync;

    async fn open(&self, config: &ConnectionConfig) -> Result<Self::Handle, BoxError>;

    async fn ping(&self, handle: &Self::Handle) -> Result<(), BoxError>;
}

/// PostgreSQL pool connector.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

#[async_trait]
impl Connect for PgConnector {
    type Handle = PgPool;

    async fn open(&self, config: &ConnectionConfig) -> Result<PgPool, BoxError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections())
            .min_connections(config.min_connections())
            .acquire_timeout(config.acquire_timeout)
            .connect_lazy(&config.dsn)?;
        Ok(pool)
    }

    async fn ping(&self, pool: &PgPool) -> Result<(), BoxError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }
}

/// Open and ping until the store answers. Pool limits from `config` are in
/// force on the returned handle. Failure is meant to abort startup.
pub async fn connect<C: Connect>(
    connector: &C,
    config: &ConnectionConfig,
    policy: &BackoffPolicy,
) -> Result<C::Handle, ConnectError> {
    let open_and_ping = move || async move {
        let handle = connector.open(config).await?;
        connector.ping(&handle).await?;
        Ok::<_, BoxError>(handle)
    };
    let on_failure = |attempt: u32, err: &BoxError, delay: Duration| {
        tracing::warn!(attempt, error = %err, retry_in = ?delay, "store connection attempt failed");
    };

    match retry(policy, open_and_ping, on_failure).await {
        Ok(handle) => {
            tracing::info!(
                max_open_conns = config.max_open_conns,
                max_idle_conns = config.max_idle_conns,
                "store connected"
            );
            Ok(handle)
        }
        Err(RetryError::Exhausted { attempts, elapsed, last }) => {
            tracing::error!(attempts, elapsed = ?elapsed, error = %last, "store unreachable");
            Err(ConnectError::Exhausted {
                attempts,
                elapsed,
                last,
            })
        }
        Err(RetryError::DeadlineExceeded { attempts, elapsed }) => {
            tracing::error!(attempts, elapsed = ?elapsed, "store connection attempt outlasted the retry budget");
            Err(ConnectError::Exhausted {
                attempts,
                elapsed,
                last: "connection attempt did not finish within the retry budget".into(),
            })
        }
        Err(RetryError::Cancelled) => {
            tracing::warn!("store connection cancelled");
            Err(ConnectError::Cancelled)
        }
    }
}
