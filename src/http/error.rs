//! HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::validation::ValidationError;

/// A request the gate could not read.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("malformed JSON body: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("request body must be a JSON object")]
    BodyNotObject,
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            RequestError::MalformedJson(_) | RequestError::BodyNotObject => StatusCode::BAD_REQUEST,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            RequestError::BodyTooLarge { .. } => "payload_too_large",
            _ => "bad_request",
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let body = json!({"code": self.code(), "message": self.to_string()});
        (self.status(), Json(body)).into_response()
    }
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        (StatusCode::UNPROCESSABLE_ENTITY, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Location;
    use crate::validation::{FieldError, InvalidParams};

    #[tokio::test]
    async fn test_validation_error_is_422_json() {
        let err = ValidationError::at(InvalidParams::new(vec![FieldError::missing("id")]), Location::Path);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "invalid_param");
        assert_eq!(body["errors"][0]["location"], "path");
    }

    #[test]
    fn test_request_error_statuses() {
        assert_eq!(
            RequestError::BodyTooLarge { limit: 1 }.into_response().status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(RequestError::BodyNotObject.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
