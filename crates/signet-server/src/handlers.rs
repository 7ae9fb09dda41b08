//! Service-level HTTP handlers.
//!
//! The token endpoints themselves live in `signet_auth::http`; this module
//! only carries the handlers that belong to the server shell.

use axum::Json;
use serde_json::{Value, json};

/// Liveness endpoint (`GET /healthcheck`).
///
/// Reports that the process is up and serving; it deliberately performs no
/// signing so that a health probe can never consume issuance capacity.
pub async fn healthcheck() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_healthcheck_reports_healthy() {
        let Json(body) = healthcheck().await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "signet-server");
        assert!(body["version"].is_string());
    }
}
