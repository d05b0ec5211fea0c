//! Cross-field validation of a loaded [`ServiceConfig`].

use crate::config::ServiceConfig;
use crate::error::ConfigError;

pub fn validate(config: &ServiceConfig) -> Result<(), ConfigError> {
    if config.server.body_limit == 0 {
        return Err(ConfigError::Validation("server body limit must be positive".into()));
    }
    if config.db.max_open_conns != 0 && config.db.max_idle_conns > config.db.max_open_conns {
        tracing::warn!(
            max_idle_conns = config.db.max_idle_conns,
            max_open_conns = config.db.max_open_conns,
            "max idle connections exceed max open; capping"
        );
    }
    if let Some(cors) = &config.server.cors {
        cors.validate()?;
    }
    config.backoff_policy().validate()
}
