//! Request authentication and per-request rate limiting.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use a2e_core::AgentId;
use a2e_error::A2eError;

use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated caller, extracted from `X-API-Key` or
/// `Authorization: Bearer`. Extraction also charges the caller's
/// per-request rate budget, so every authenticated endpoint is limited
/// uniformly.
#[derive(Debug, Clone)]
pub struct AuthenticatedAgent(pub AgentId);

impl FromRequestParts<AppState> for AuthenticatedAgent {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let api_key = parts
            .headers
            .get("x-api-key")
            .and_then(|value| value.to_str().ok());
        let authorization = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        let agent = state
            .directory
            .authenticate_headers(api_key, authorization)
            .ok_or_else(|| ApiError(A2eError::authentication("missing or invalid credentials")))?;

        match state.limiter.check(&agent, false) {
            Ok(Some(pause)) => tokio::time::sleep(pause).await,
            Ok(None) => {}
            Err(refusal) => {
                return Err(ApiError(A2eError::rate_limited(
                    refusal.window,
                    refusal.limit,
                    refusal.retry_after,
                )));
            }
        }

        Ok(Self(agent))
    }
}
