use crate::server::telemetry::increment_requests_rejected;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hashq::Error;

/// HTTP wrapper around [`hashq::Error`].
///
/// Every variant maps to a status code and a plain-text body explaining what
/// went wrong.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::InvalidInput { .. } | Error::MalformedId { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::ServiceShutdown | Error::Exhausted => StatusCode::SERVICE_UNAVAILABLE,
            Error::Transform(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        increment_requests_rejected(status.as_u16());

        #[cfg(feature = "tracing")]
        if status.is_server_error() {
            tracing::warn!(%status, "{}", self.0);
        } else {
            tracing::debug!(%status, "{}", self.0);
        }

        (status, self.0.to_string()).into_response()
    }
}
