//! Token claim model.
//!
//! Access and refresh tokens share one claim structure with a
//! [`TokenKind`] discriminant; kind-specific fields are optional. The
//! canonical JWT payload is produced by [`TokenClaims::claims_map`], which is
//! the single place that decides what ends up inside a signed token.

use std::fmt;

use serde_json::{Map, Value, json};

/// Claim names that callers may never supply through `extra_claims`.
pub const RESERVED_CLAIMS: [&str; 8] = [
    "iss",
    "sub",
    "tenant_id",
    "token_type",
    "username",
    "account_type",
    "exp",
    "delegation",
];

/// Returns `true` if `claim` is one of the reserved claim names.
#[must_use]
pub fn is_reserved_claim(claim: &str) -> bool {
    RESERVED_CLAIMS.contains(&claim)
}

/// The two token kinds this service issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Short-lived token presented to downstream services.
    Access,
    /// Longer-lived token exchanged for a fresh access token.
    Refresh,
}

impl TokenKind {
    /// Returns the `token_type` claim value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fully derived claim set for one token, not yet signed.
///
/// Constructed per request by the derivation functions in
/// [`crate::token::derive`] and owned exclusively by that request. `ttl` is
/// request bookkeeping: it is retained alongside `exp` so a refresh token can
/// reproduce an equal-length access token later, but it is never serialized
/// into the top-level payload.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenClaims {
    /// Issuer URL, always taken from tenant configuration.
    pub iss: String,

    /// Subject, always recomputed as `{tenant_id}@{username}`.
    pub sub: String,

    /// Owning tenant.
    pub tenant_id: String,

    /// Discriminant between access and refresh claims.
    pub token_type: TokenKind,

    /// Authenticated username the token was requested for.
    pub username: String,

    /// Account type (e.g. `user`, `service`).
    pub account_type: String,

    /// Absolute expiry as a Unix timestamp. Fixed at derivation time.
    pub exp: i64,

    /// Requested lifetime in seconds. Bookkeeping only, not a payload claim.
    pub ttl: i64,

    /// Delegation flag. Access tokens only; refresh claims never carry it.
    pub delegation: Option<bool>,

    /// Authorized caller-supplied claims, merged into the payload verbatim.
    /// Access tokens only.
    pub extra_claims: Option<Map<String, Value>>,

    /// Embedded snapshot of the originating access token's claims, with its
    /// `exp` removed and its requested `ttl` copied in. Refresh tokens only.
    pub access_token: Option<Map<String, Value>>,
}

impl TokenClaims {
    /// Computes the `sub` claim from its parts.
    ///
    /// `sub` is never accepted from caller input; this is the only way to
    /// produce it.
    #[must_use]
    pub fn compute_sub(tenant_id: &str, username: &str) -> String {
        format!("{tenant_id}@{username}")
    }

    /// Produces the canonical JWT payload for these claims.
    ///
    /// Access payloads carry `delegation` and the merged extra claims;
    /// refresh payloads carry the `access_token` snapshot instead. The
    /// authorizer guarantees extra claims cannot collide with reserved names,
    /// so the merge never overwrites a standard claim.
    #[must_use]
    pub fn claims_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("iss".to_string(), json!(self.iss));
        map.insert("sub".to_string(), json!(self.sub));
        map.insert("tenant_id".to_string(), json!(self.tenant_id));
        map.insert("token_type".to_string(), json!(self.token_type.as_str()));
        if let Some(delegation) = self.delegation {
            map.insert("delegation".to_string(), json!(delegation));
        }
        map.insert("username".to_string(), json!(self.username));
        map.insert("account_type".to_string(), json!(self.account_type));
        map.insert("exp".to_string(), json!(self.exp));
        if let Some(extra) = &self.extra_claims {
            for (key, value) in extra {
                map.insert(key.clone(), value.clone());
            }
        }
        if let Some(snapshot) = &self.access_token {
            map.insert("access_token".to_string(), Value::Object(snapshot.clone()));
        }
        map
    }

    /// Builds the claims snapshot a refresh token embeds for this access
    /// token: the canonical payload with `exp` removed and the requested
    /// `ttl` inserted, so a later renewal reissues a token of the same
    /// requested length rather than the remaining lifetime.
    #[must_use]
    pub fn snapshot_for_refresh(&self) -> Map<String, Value> {
        let mut snapshot = self.claims_map();
        snapshot.remove("exp");
        snapshot.insert("ttl".to_string(), json!(self.ttl));
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access_claims() -> TokenClaims {
        TokenClaims {
            iss: "https://acme.example/v3".to_string(),
            sub: TokenClaims::compute_sub("acme", "bob"),
            tenant_id: "acme".to_string(),
            token_type: TokenKind::Access,
            username: "bob".to_string(),
            account_type: "user".to_string(),
            exp: 1_700_003_600,
            ttl: 3600,
            delegation: Some(false),
            extra_claims: None,
            access_token: None,
        }
    }

    #[test]
    fn test_compute_sub() {
        assert_eq!(TokenClaims::compute_sub("acme", "bob"), "acme@bob");
    }

    #[test]
    fn test_reserved_claims() {
        for claim in [
            "iss",
            "sub",
            "tenant_id",
            "token_type",
            "username",
            "account_type",
            "exp",
            "delegation",
        ] {
            assert!(is_reserved_claim(claim), "{claim} should be reserved");
        }
        assert!(!is_reserved_claim("department"));
        assert!(!is_reserved_claim("ttl"));
    }

    #[test]
    fn test_access_claims_map() {
        let claims = access_claims();
        let map = claims.claims_map();

        assert_eq!(map["iss"], json!("https://acme.example/v3"));
        assert_eq!(map["sub"], json!("acme@bob"));
        assert_eq!(map["tenant_id"], json!("acme"));
        assert_eq!(map["token_type"], json!("access"));
        assert_eq!(map["delegation"], json!(false));
        assert_eq!(map["username"], json!("bob"));
        assert_eq!(map["account_type"], json!("user"));
        assert_eq!(map["exp"], json!(1_700_003_600));
        // ttl is bookkeeping, never a top-level payload claim
        assert!(!map.contains_key("ttl"));
    }

    #[test]
    fn test_extra_claims_merged() {
        let mut claims = access_claims();
        let mut extra = Map::new();
        extra.insert("department".to_string(), json!("engineering"));
        claims.extra_claims = Some(extra);

        let map = claims.claims_map();
        assert_eq!(map["department"], json!("engineering"));
    }

    #[test]
    fn test_snapshot_strips_exp_and_carries_requested_ttl() {
        let claims = access_claims();
        let snapshot = claims.snapshot_for_refresh();

        assert!(!snapshot.contains_key("exp"));
        assert_eq!(snapshot["ttl"], json!(3600));
        assert_eq!(snapshot["sub"], json!("acme@bob"));
        assert_eq!(snapshot["token_type"], json!("access"));
        assert_eq!(snapshot["delegation"], json!(false));
    }

    #[test]
    fn test_refresh_claims_map() {
        let access = access_claims();
        let refresh = TokenClaims {
            token_type: TokenKind::Refresh,
            exp: 1_700_086_400,
            ttl: 86400,
            delegation: None,
            extra_claims: None,
            access_token: Some(access.snapshot_for_refresh()),
            ..access.clone()
        };

        let map = refresh.claims_map();
        assert_eq!(map["token_type"], json!("refresh"));
        // refresh claims never include delegation
        assert!(!map.contains_key("delegation"));
        let snapshot = map["access_token"].as_object().unwrap();
        assert!(!snapshot.contains_key("exp"));
        assert_eq!(snapshot["ttl"], json!(3600));
    }

    #[test]
    fn test_token_kind_display() {
        assert_eq!(TokenKind::Access.to_string(), "access");
        assert_eq!(TokenKind::Refresh.to_string(), "refresh");
    }
}
