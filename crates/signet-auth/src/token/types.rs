//! Token endpoint types.
//!
//! Request and response envelopes for the issuance pipeline. Every request
//! field is optional at the serde layer; required fields are enforced by the
//! derivation step so a missing field surfaces as a `MissingField` error
//! naming the field, not as a deserialization failure.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::IssueResult;
use crate::error::IssueError;
use crate::token::claims::{TokenClaims, TokenKind};

/// Validated token-issuance request.
///
/// # Example
///
/// ```json
/// {
///   "token_tenant_id": "acme",
///   "token_username": "bob",
///   "token_type": "user",
///   "generate_refresh_token": true
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    /// Tenant to issue the token under. Required.
    #[serde(default)]
    pub token_tenant_id: Option<String>,

    /// Username the token represents. Required.
    #[serde(default)]
    pub token_username: Option<String>,

    /// Account type (e.g. "user", "service"). Required.
    #[serde(default)]
    pub token_type: Option<String>,

    /// Requested access token lifetime in seconds. Defaults to the tenant's
    /// configured lifetime; zero also falls back to the default.
    #[serde(default)]
    pub access_token_ttl: Option<i64>,

    /// Requested refresh token lifetime in seconds. Defaults to the tenant's
    /// configured lifetime.
    #[serde(default)]
    pub refresh_token_ttl: Option<i64>,

    /// Whether to issue a paired refresh token. Defaults to false.
    #[serde(default)]
    pub generate_refresh_token: Option<bool>,

    /// Whether the access token is a delegation token. Defaults to false.
    #[serde(default)]
    pub delegation_token: Option<bool>,

    /// Caller-supplied extra claims, subject to authorization.
    #[serde(default)]
    pub extra_claims: Option<Map<String, Value>>,
}

/// Token renewal request: a previously issued refresh token.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RenewRequest {
    /// The refresh token to renew from. Required.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// A signed token: the derived claims plus the compact JWT string.
///
/// Created and signed exactly once, projected to a [`TokenEnvelope`], then
/// discarded. Never persisted.
#[derive(Debug, Clone)]
pub struct SignedToken {
    /// The claims that were signed.
    pub claims: TokenClaims,

    /// Compact JWT serialization.
    pub jwt: String,
}

impl SignedToken {
    /// Projects this token to its response envelope.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the expiry timestamp cannot be
    /// represented, which indicates a derivation bug rather than bad input.
    pub fn envelope(&self) -> IssueResult<TokenEnvelope> {
        let expires_at = OffsetDateTime::from_unix_timestamp(self.claims.exp)
            .map_err(|e| IssueError::internal(format!("invalid exp timestamp: {e}")))?
            .format(&Rfc3339)
            .map_err(|e| IssueError::internal(format!("cannot format exp timestamp: {e}")))?;

        Ok(TokenEnvelope {
            kind: self.claims.token_type,
            token: self.jwt.clone(),
            expires_in: self.claims.ttl,
            expires_at,
        })
    }
}

/// Response envelope for one signed token.
///
/// Serializes as `{"<kind>_token": "<jwt>", "expires_in": ttl,
/// "expires_at": "<rfc3339>"}` — the token key is named after the token
/// kind, so the two envelope shapes stay distinguishable in one response.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenEnvelope {
    /// Which kind of token this envelope carries.
    pub kind: TokenKind,

    /// Compact JWT serialization.
    pub token: String,

    /// Requested lifetime in seconds.
    pub expires_in: i64,

    /// Absolute expiry, RFC 3339.
    pub expires_at: String,
}

impl Serialize for TokenEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry(&format!("{}_token", self.kind.as_str()), &self.token)?;
        map.serialize_entry("expires_in", &self.expires_in)?;
        map.serialize_entry("expires_at", &self.expires_at)?;
        map.end()
    }
}

/// Successful issuance or renewal response.
#[derive(Debug, Clone, Serialize)]
pub struct IssueResponse {
    /// The signed access token envelope.
    pub access_token: TokenEnvelope,

    /// The signed refresh token envelope, when one was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<TokenEnvelope>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_request_deserialization() {
        let json = r#"{
            "token_tenant_id": "acme",
            "token_username": "bob",
            "token_type": "user",
            "generate_refresh_token": true,
            "extra_claims": {"department": "engineering"}
        }"#;

        let request: TokenRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.token_tenant_id.as_deref(), Some("acme"));
        assert_eq!(request.token_username.as_deref(), Some("bob"));
        assert_eq!(request.token_type.as_deref(), Some("user"));
        assert_eq!(request.generate_refresh_token, Some(true));
        assert!(request.access_token_ttl.is_none());
        assert_eq!(
            request.extra_claims.unwrap()["department"],
            json!("engineering")
        );
    }

    #[test]
    fn test_token_request_missing_fields_deserialize() {
        // Required-field enforcement happens in derivation, not serde.
        let request: TokenRequest = serde_json::from_str("{}").unwrap();
        assert!(request.token_tenant_id.is_none());
        assert!(request.delegation_token.is_none());
    }

    #[test]
    fn test_envelope_key_named_after_kind() {
        let envelope = TokenEnvelope {
            kind: TokenKind::Access,
            token: "header.payload.sig".to_string(),
            expires_in: 3600,
            expires_at: "2026-01-01T00:00:00Z".to_string(),
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["access_token"], json!("header.payload.sig"));
        assert_eq!(json["expires_in"], json!(3600));
        assert_eq!(json["expires_at"], json!("2026-01-01T00:00:00Z"));

        let refresh = TokenEnvelope {
            kind: TokenKind::Refresh,
            ..envelope
        };
        let json = serde_json::to_value(&refresh).unwrap();
        assert!(json.get("access_token").is_none());
        assert_eq!(json["refresh_token"], json!("header.payload.sig"));
    }

    #[test]
    fn test_response_omits_absent_refresh_token() {
        let response = IssueResponse {
            access_token: TokenEnvelope {
                kind: TokenKind::Access,
                token: "jwt".to_string(),
                expires_in: 3600,
                expires_at: "2026-01-01T00:00:00Z".to_string(),
            },
            refresh_token: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("refresh_token"));
    }

    #[test]
    fn test_signed_token_envelope_projection() {
        let claims = TokenClaims {
            iss: "https://acme.example/v3".to_string(),
            sub: "acme@bob".to_string(),
            tenant_id: "acme".to_string(),
            token_type: TokenKind::Access,
            username: "bob".to_string(),
            account_type: "user".to_string(),
            exp: 1_700_003_600,
            ttl: 3600,
            delegation: Some(false),
            extra_claims: None,
            access_token: None,
        };
        let signed = SignedToken {
            claims,
            jwt: "a.b.c".to_string(),
        };

        let envelope = signed.envelope().unwrap();
        assert_eq!(envelope.kind, TokenKind::Access);
        assert_eq!(envelope.expires_in, 3600);
        // 1_700_003_600 is 2023-11-14T23:13:20Z
        assert_eq!(envelope.expires_at, "2023-11-14T23:13:20Z");
    }
}
