//! JSON request/response helpers and the error envelope.

use crate::error::{AppError, HttpError};
use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use serde::{de::DeserializeOwned, Serialize};

pub type HandlerResult = Result<Response, AppError>;

/// Wire-level error envelope. `debug` is omitted entirely unless populated.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<String>,
}

/// Renders failed handler outcomes as the JSON error envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorResponder {
    verbose: bool,
}

impl ErrorResponder {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Classify, log (unexpected failures only) and render `err`.
    pub fn respond(&self, path: &str, err: AppError) -> Response {
        let err = err.into_http();
        let status = err.status();

        if !err.is_operational() {
            match err.cause() {
                Some(cause) => tracing::error!(
                    path = %path,
                    status = status.as_u16(),
                    message = %err.message(),
                    cause = %cause,
                    "http error"
                ),
                None => tracing::error!(
                    path = %path,
                    status = status.as_u16(),
                    message = %err.message(),
                    "http error"
                ),
            }
        }

        let debug = if self.verbose {
            err.cause().map(|c| c.to_string())
        } else {
            None
        };
        let body = ErrorBody {
            message: err.message().to_string(),
            debug,
        };

        let bytes = match serde_json::to_vec(&body) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(path = %path, error = %e, "failed to marshal error response");
                Vec::new()
            }
        };
        with_status(status, Body::from(bytes))
    }
}

fn with_status(status: StatusCode, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

/// Serialize `value` as the JSON response body. 500 if it cannot be marshaled.
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> HandlerResult {
    let bytes = serde_json::to_vec(value).map_err(|e| {
        HttpError::new(StatusCode::INTERNAL_SERVER_ERROR)
            .with_message("Failed to marshal response body")
            .with_cause(e)
    })?;
    Ok(with_status(status, Body::from(bytes)))
}

pub fn empty_response(status: StatusCode) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

fn is_json_content_type(value: Option<&HeaderValue>) -> bool {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mt| mt.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

/// Read an `application/json` request body into `T`.
/// 415 for any other content type, 400 if the body does not parse,
/// 413 if the body exceeds the configured limit.
pub async fn read_json<T: DeserializeOwned>(req: Request) -> Result<T, AppError> {
    if !is_json_content_type(req.headers().get(header::CONTENT_TYPE)) {
        return Err(HttpError::unsupported_media_type().into());
    }

    let bytes = axum::body::to_bytes(req.into_body(), usize::MAX)
        .await
        .map_err(|e| {
            if is_length_limit(&e) {
                AppError::from(HttpError::new(StatusCode::PAYLOAD_TOO_LARGE).operational())
            } else {
                AppError::from(
                    HttpError::new(StatusCode::BAD_REQUEST)
                        .with_message("failed to read request body")
                        .with_cause(e),
                )
            }
        })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        HttpError::bad_request("Failed to unmarshal request body")
            .with_cause(e)
            .into()
    })
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<http_body_util::LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde::Deserialize;

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[derive(Debug, Deserialize)]
    struct Payload {
        title: String,
    }

    fn request(content_type: Option<&str>, body: &str) -> Request {
        let mut builder = Request::builder().method("POST").uri("/items");
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn debug_present_only_when_verbose_with_cause() {
        let err = || AppError::internal(std::io::Error::new(std::io::ErrorKind::Other, "pool closed"));

        let quiet = ErrorResponder::new(false).respond("/x", err());
        assert_eq!(quiet.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(quiet).await, r#"{"message":"Internal Server Error"}"#);

        let verbose = ErrorResponder::new(true).respond("/x", err());
        assert_eq!(
            body_string(verbose).await,
            r#"{"message":"Internal Server Error","debug":"pool closed"}"#
        );

        let no_cause = ErrorResponder::new(true).respond("/x", HttpError::not_found("gone").into());
        assert_eq!(no_cause.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(no_cause).await, r#"{"message":"gone"}"#);
    }

    #[tokio::test]
    async fn error_response_is_json() {
        let response = ErrorResponder::default().respond("/x", HttpError::method_not_allowed().into());
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn read_json_rejects_other_content_types() {
        let err = read_json::<Payload>(request(Some("text/plain"), r#"{"title":"a"}"#))
            .await
            .unwrap_err()
            .into_http();
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let err = read_json::<Payload>(request(None, r#"{"title":"a"}"#))
            .await
            .unwrap_err()
            .into_http();
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn read_json_parses_with_charset() {
        let payload: Payload = read_json(request(Some("application/json; charset=utf-8"), r#"{"title":"milk"}"#))
            .await
            .unwrap();
        assert_eq!(payload.title, "milk");
    }

    #[tokio::test]
    async fn read_json_malformed_is_bad_request() {
        let err = read_json::<Payload>(request(Some("application/json"), "{not json"))
            .await
            .unwrap_err()
            .into_http();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "Failed to unmarshal request body");
        assert!(err.cause().is_some());
    }
}
