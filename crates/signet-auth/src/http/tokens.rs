//! HTTP handlers for the tokens endpoint.
//!
//! This module provides the Axum handlers for `/v3/tokens`:
//!
//! - `POST` issues a new access token (and optional refresh token)
//! - `PUT` renews a token pair from a presented refresh token
//!
//! # Example
//!
//! ```ignore
//! POST /v3/tokens
//! Content-Type: application/json
//!
//! {
//!   "token_tenant_id": "acme",
//!   "token_username": "bob",
//!   "token_type": "user",
//!   "generate_refresh_token": true
//! }
//! ```

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::IssueError;
use crate::token::service::IssuanceService;
use crate::token::types::{RenewRequest, TokenRequest};

/// State required by the token handlers.
#[derive(Clone)]
pub struct TokenState {
    /// The issuance pipeline.
    service: Arc<IssuanceService>,
}

impl TokenState {
    /// Creates token handler state around an issuance service.
    #[must_use]
    pub fn new(service: Arc<IssuanceService>) -> Self {
        Self { service }
    }
}

/// Error body returned for failed token requests.
#[derive(Debug, Serialize)]
struct ErrorBody {
    /// Stable machine-readable error code.
    error: &'static str,
    /// Human-readable description.
    message: String,
}

/// Token issuance endpoint handler.
///
/// Handles `POST /v3/tokens` with a JSON [`TokenRequest`] body. Field
/// validation happens inside the pipeline, so a request missing required
/// fields still reaches the handler and gets a structured error naming the
/// missing field.
pub async fn issue_tokens_handler(
    State(state): State<TokenState>,
    Json(request): Json<TokenRequest>,
) -> Response {
    debug!(
        tenant_id = ?request.token_tenant_id,
        username = ?request.token_username,
        "Processing token request"
    );

    match state.service.issue(&request).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(e) => {
            warn!(
                tenant_id = ?request.token_tenant_id,
                username = ?request.token_username,
                error = %e,
                "Token request failed"
            );
            error_response(&e)
        }
    }
}

/// Token renewal endpoint handler.
///
/// Handles `PUT /v3/tokens` with a JSON [`RenewRequest`] body carrying a
/// previously issued refresh token.
pub async fn renew_token_handler(
    State(state): State<TokenState>,
    Json(request): Json<RenewRequest>,
) -> Response {
    debug!("Processing token renewal request");

    match state.service.renew(&request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            warn!(error = %e, "Token renewal failed");
            error_response(&e)
        }
    }
}

/// Maps a pipeline error to its HTTP response.
fn error_response(error: &IssueError) -> Response {
    let status = match error {
        IssueError::MissingField { .. }
        | IssueError::InvalidTtl { .. }
        | IssueError::ClaimNotAllowed { .. } => StatusCode::BAD_REQUEST,
        IssueError::InvalidToken { .. } | IssueError::TokenExpired => StatusCode::UNAUTHORIZED,
        IssueError::TenantNotFound { .. } => StatusCode::NOT_FOUND,
        IssueError::Unimplemented { .. } => StatusCode::NOT_IMPLEMENTED,
        IssueError::Configuration { .. }
        | IssueError::Signing { .. }
        | IssueError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = ErrorBody {
        error: error.error_code(),
        message: error.to_string(),
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(error: &IssueError) -> StatusCode {
        error_response(error).status()
    }

    #[test]
    fn test_client_errors_map_to_4xx() {
        assert_eq!(
            status_of(&IssueError::missing_field("token_username")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(&IssueError::invalid_ttl("access_token_ttl must be positive")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(&IssueError::claim_not_allowed("iss")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(&IssueError::tenant_not_found("bogus")),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_token_errors_map_to_401() {
        assert_eq!(
            status_of(&IssueError::invalid_token("bad signature")),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(&IssueError::TokenExpired), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_unimplemented_maps_to_501() {
        assert_eq!(
            status_of(&IssueError::unimplemented("key custody")),
            StatusCode::NOT_IMPLEMENTED
        );
    }

    #[test]
    fn test_server_errors_map_to_500() {
        assert_eq!(
            status_of(&IssueError::signing("key failure")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(&IssueError::internal("oops")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
