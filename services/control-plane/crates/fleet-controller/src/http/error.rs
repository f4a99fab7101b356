//! Maps [`ControllerError`] onto HTTP status codes and [`ErrorBody`].

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fleet_api_types::ErrorBody;

use crate::error::{ControllerError, ErrorKind};

fn status_and_name(kind: ErrorKind) -> (StatusCode, &'static str) {
    match kind {
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, "NotFoundError"),
        ErrorKind::Authentication => (StatusCode::UNAUTHORIZED, "AuthenticationError"),
        ErrorKind::Validation => (StatusCode::BAD_REQUEST, "ValidationError"),
        ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
    }
}

impl IntoResponse for ControllerError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let (status, name) = status_and_name(kind);
        let (message, details) = match &self {
            ControllerError::Validation(err) => (err.to_string(), err.details().to_vec()),
            _ if kind == ErrorKind::Internal => {
                tracing::error!(error = %self, "request failed");
                ("internal error".to_string(), Vec::new())
            }
            _ => (self.to_string(), Vec::new()),
        };
        let body = ErrorBody {
            name: name.to_string(),
            message,
            details,
        };
        (status, Json(body)).into_response()
    }
}
