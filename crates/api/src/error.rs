//! HTTP error mapping.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use a2e_error::{A2eError, ErrorCategory};
use a2e_response::shape_error;

/// An API-layer failure: the core error plus its HTTP rendering.
#[derive(Debug)]
pub struct ApiError(pub A2eError);

impl From<A2eError> for ApiError {
    fn from(error: A2eError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = shape_error(None, &self.0);
        let mut response = (status, Json(body)).into_response();

        if self.0.category() == ErrorCategory::RateLimited {
            if let Some(retry_after) = self.0.retry_after {
                if let Ok(value) = HeaderValue::from_str(&retry_after.as_secs().to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
            }
            response
                .headers_mut()
                .insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
        }

        response
    }
}
