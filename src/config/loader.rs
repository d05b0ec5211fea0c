//! Load [`ServiceConfig`] from `TODO_*` environment variables.

use crate::config::types::{DbConfig, ServerConfig, ServiceConfig};
use crate::config::validate;
use crate::cors::CorsConfig;
use crate::error::ConfigError;
use std::str::FromStr;
use std::time::Duration;

impl ServiceConfig {
    /// Reads the process environment, after loading `.env` if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from `lookup`, applying defaults for unset keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let defaults = ServerConfig::default();

        let cors = if env.parse_or("TODO_SERVER_CORS_ENABLED", false, parse_bool)? {
            let base = CorsConfig::default();
            Some(CorsConfig {
                origin: env.get("TODO_SERVER_CORS_ORIGIN").unwrap_or(base.origin),
                allowed_headers: env.get("TODO_SERVER_CORS_HEADERS").unwrap_or(base.allowed_headers),
                allow_credentials: env.parse_or("TODO_SERVER_CORS_ALLOW_CREDENTIALS", false, parse_bool)?,
                max_age: Some(env.parse_or("TODO_SERVER_CORS_MAX_AGE", Duration::ZERO, parse_duration)?)
                    .filter(|d| !d.is_zero()),
            })
        } else {
            None
        };

        let server = ServerConfig {
            addr: env.parse_or("TODO_SERVER_ADDR", defaults.addr, from_str)?,
            timeout: env.parse_or("TODO_SERVER_TIMEOUT", defaults.timeout, parse_duration)?,
            shutdown_timeout: env.parse_or(
                "TODO_SERVER_SHUTDOWN_TIMEOUT",
                defaults.shutdown_timeout,
                parse_duration,
            )?,
            body_limit: env.parse_or("TODO_SERVER_BODY_LIMIT", defaults.body_limit, from_str)?,
            cors,
        };

        let dsn = env.get("TODO_DB_DSN").ok_or(ConfigError::Missing("TODO_DB_DSN"))?;
        let base = DbConfig::new(dsn);
        let db = DbConfig {
            max_idle_conns: env.parse_or("TODO_DB_MAX_IDLE_CONNS", base.max_idle_conns, from_str)?,
            max_open_conns: env.parse_or("TODO_DB_MAX_OPEN_CONNS", base.max_open_conns, from_str)?,
            backoff_initial: env.parse_or("TODO_DB_BACKOFF_INITIAL", base.backoff_initial, parse_duration)?,
            backoff_max: env.parse_or("TODO_DB_BACKOFF_MAX", base.backoff_max, parse_duration)?,
            backoff_max_elapsed: env.parse_or(
                "TODO_DB_BACKOFF_MAX_ELAPSED",
                base.backoff_max_elapsed,
                parse_duration,
            )?,
            ..base
        };

        let config = ServiceConfig {
            dev: env.parse_or("TODO_DEV", false, parse_bool)?,
            server,
            db,
        };
        validate(&config)?;
        Ok(config)
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Unset and blank values both count as absent.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse_or<T>(
        &self,
        key: &'static str,
        default: T,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<T, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => parse(value.trim()).ok_or(ConfigError::Invalid { key, value }),
        }
    }
}

fn from_str<T: FromStr>(s: &str) -> Option<T> {
    s.parse().ok()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parses `250ms`, `5s`, `1m`, `2h`; a bare number is seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (digits, unit) = if let Some(n) = s.strip_suffix("ms") {
        (n, Duration::from_millis(1))
    } else if let Some(n) = s.strip_suffix('s') {
        (n, Duration::from_secs(1))
    } else if let Some(n) = s.strip_suffix('m') {
        (n, Duration::from_secs(60))
    } else if let Some(n) = s.strip_suffix('h') {
        (n, Duration::from_secs(3600))
    } else {
        (s, Duration::from_secs(1))
    };
    let n: u32 = digits.trim().parse().ok()?;
    unit.checked_mul(n)
}
