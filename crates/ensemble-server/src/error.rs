//! Mapping of gateway errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ensemble_core::Error;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{error, warn};

/// Handler error; renders as `{"error": message}` with a mapped status.
#[derive(Debug)]
pub struct ApiError(pub Error);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidFormat(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::DuplicateKey(_) => StatusCode::CONFLICT,
        Error::NoModelsAvailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Decode a JSON body into a typed request, reporting mismatches as 400.
pub fn parse_body<T: DeserializeOwned>(body: Value) -> ApiResult<T> {
    serde_json::from_value(body)
        .map_err(|e| ApiError(Error::InvalidFormat(format!("invalid request body: {}", e))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&Error::InvalidFormat("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&Error::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&Error::DuplicateKey("x".into())), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&Error::NoModelsAvailable("prediction".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&Error::Upstream("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_parse_body_rejects_wrong_shape() {
        #[derive(serde::Deserialize, Debug)]
        struct Req {
            #[allow(dead_code)]
            enabled: bool,
        }
        let err = parse_body::<Req>(json!({"enabled": "yes"})).unwrap_err();
        assert!(matches!(err.0, Error::InvalidFormat(_)));
    }
}
