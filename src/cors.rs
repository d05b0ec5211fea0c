//! CORS negotiation for preflight and actual requests.
//!
//! A configured origin of `*` reflects the caller's `Origin` on preflight
//! (adding `Vary: Origin`). `Access-Control-Allow-Methods` on preflight is the
//! router-computed `Allow` value for the path.

use crate::error::ConfigError;
use crate::response::empty_response;
use crate::router::OptionsHandler;
use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use std::time::Duration;

pub const WILDCARD: &str = "*";

/// CORS policy. Defaults: wildcard origin, wildcard headers, no credentials, no max-age.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsConfig {
    /// `*` or an exact origin.
    pub origin: String,
    /// `*` or a comma-separated header list.
    pub allowed_headers: String,
    pub allow_credentials: bool,
    /// Omitted from preflight responses when `None` or zero.
    pub max_age: Option<Duration>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origin: WILDCARD.to_string(),
            allowed_headers: WILDCARD.to_string(),
            allow_credentials: false,
            max_age: None,
        }
    }
}

impl CorsConfig {
    pub fn origin_wildcard(&self) -> bool {
        self.origin == WILDCARD
    }

    pub fn headers_wildcard(&self) -> bool {
        self.allowed_headers == WILDCARD
    }

    /// Browsers reject a literal `*` origin combined with credentials.
    pub fn is_credentialed_wildcard(&self) -> bool {
        self.origin_wildcard() && self.allow_credentials
    }

    /// Checks that configured values can be sent as header values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.origin.trim().is_empty() {
            return Err(ConfigError::Validation("cors origin must not be empty".into()));
        }
        HeaderValue::from_str(&self.origin)
            .map_err(|_| ConfigError::Validation(format!("cors origin '{}' is not a valid header value", self.origin)))?;
        HeaderValue::from_str(&self.allowed_headers).map_err(|_| {
            ConfigError::Validation(format!(
                "cors headers '{}' is not a valid header value",
                self.allowed_headers
            ))
        })?;
        Ok(())
    }
}

/// Computes CORS response headers from a validated [`CorsConfig`].
#[derive(Debug, Clone)]
pub struct Cors {
    config: CorsConfig,
    origin: HeaderValue,
    allowed_headers: HeaderValue,
    max_age: Option<HeaderValue>,
}

const ACCESS_CONTROL_REQUEST_METHOD: &str = "access-control-request-method";
const ACCESS_CONTROL_REQUEST_HEADERS: &str = "access-control-request-headers";

impl Cors {
    pub fn new(config: CorsConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let origin = HeaderValue::from_str(&config.origin)
            .map_err(|_| ConfigError::Validation("cors origin".into()))?;
        let allowed_headers = HeaderValue::from_str(&config.allowed_headers)
            .map_err(|_| ConfigError::Validation("cors headers".into()))?;
        // Whole seconds on the wire; sub-second values round up.
        let max_age = config
            .max_age
            .filter(|d| !d.is_zero())
            .map(|d| HeaderValue::from(d.as_secs() + u64::from(d.subsec_nanos() > 0)));
        if config.is_credentialed_wildcard() {
            tracing::warn!("cors: wildcard origin with allow-credentials will be rejected by browsers");
        }
        Ok(Self {
            config,
            origin,
            allowed_headers,
            max_age,
        })
    }

    pub fn config(&self) -> &CorsConfig {
        &self.config
    }

    /// Answer an `OPTIONS` request. `allow` is the router's `Allow` value for the path.
    pub fn preflight(&self, request_headers: &HeaderMap, allow: &HeaderValue) -> Response {
        let mut response = empty_response(StatusCode::NO_CONTENT);
        if !request_headers.contains_key(ACCESS_CONTROL_REQUEST_METHOD) {
            return response;
        }

        let origin = request_headers.get(header::ORIGIN);
        let headers = response.headers_mut();
        match origin {
            Some(origin) if self.config.origin_wildcard() => {
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
                headers.insert(header::VARY, HeaderValue::from_static("Origin"));
            }
            None if self.config.origin_wildcard() => return response,
            _ => {
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, self.origin.clone());
            }
        }

        let requested = request_headers.get(ACCESS_CONTROL_REQUEST_HEADERS);
        match requested {
            Some(requested) if self.config.headers_wildcard() => {
                headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
            }
            None if self.config.headers_wildcard() => {}
            _ => {
                headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, self.allowed_headers.clone());
            }
        }

        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, allow.clone());

        if self.config.allow_credentials {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        if let Some(max_age) = &self.max_age {
            headers.insert(header::ACCESS_CONTROL_MAX_AGE, max_age.clone());
        }
        response
    }

    /// Headers set on every response of a registered handler, cross-origin or not.
    pub fn actual_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(2);
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, self.origin.clone());
        let allowed = match (self.config.headers_wildcard(), self.config.allow_credentials) {
            (true, true) => HeaderValue::from_static("*, Authorization"),
            (true, false) => HeaderValue::from_static(WILDCARD),
            (false, _) => self.allowed_headers.clone(),
        };
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, allowed);
        headers
    }
}

impl OptionsHandler for Cors {
    fn handle(&self, req: &Request, allow: &HeaderValue) -> Response {
        self.preflight(req.headers(), allow)
    }
}
