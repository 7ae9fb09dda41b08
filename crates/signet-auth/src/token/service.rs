//! Issuance pipeline.
//!
//! [`IssuanceService`] orchestrates the full pipeline for the two supported
//! operations:
//!
//! - **issue**: authorize extra claims, derive access claims, sign, and
//!   optionally derive and sign a paired refresh token
//! - **renew**: verify a presented refresh token, rebuild access claims from
//!   its embedded snapshot, and sign a fresh token pair
//!
//! All authorization and derivation errors are raised before any signing, so
//! a rejected request never produces a partially signed token, and a request
//! either yields a complete response or an error, never a partial one.

use std::sync::Arc;

use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::IssueResult;
use crate::authorizer::ClaimAuthorizer;
use crate::error::IssueError;
use crate::registry::{TenantConfig, TenantRegistry};
use crate::token::claims::{TokenClaims, TokenKind};
use crate::token::derive::{access_from_snapshot, derive_access, derive_refresh};
use crate::token::jwt::peek_claims;
use crate::token::types::{IssueResponse, RenewRequest, SignedToken, TokenRequest};

/// Stateless token issuance and renewal service.
///
/// Shares only the read-only [`TenantRegistry`] across requests; every
/// issuance owns its claims and signed tokens exclusively.
pub struct IssuanceService {
    registry: Arc<TenantRegistry>,
    authorizer: ClaimAuthorizer,

    /// RSA signing is CPU-bound; cap concurrent signing operations so a
    /// burst of requests cannot monopolize every core.
    signing_permits: Semaphore,
}

impl IssuanceService {
    /// Creates a new issuance service.
    #[must_use]
    pub fn new(registry: Arc<TenantRegistry>, authorizer: ClaimAuthorizer) -> Self {
        Self {
            registry,
            authorizer,
            signing_permits: Semaphore::new(num_cpus::get().max(1)),
        }
    }

    /// Returns the tenant registry this service issues against.
    #[must_use]
    pub fn registry(&self) -> &TenantRegistry {
        &self.registry
    }

    /// Issues a signed access token, and a paired refresh token when
    /// requested.
    ///
    /// # Errors
    ///
    /// Returns authorization, derivation, or signing errors; see
    /// [`crate::error::IssueError`]. No token is signed unless the whole
    /// request is valid.
    pub async fn issue(&self, request: &TokenRequest) -> IssueResult<IssueResponse> {
        if let Some(extra) = &request.extra_claims {
            self.authorizer
                .authorize(request.token_tenant_id.as_deref(), extra)
                .await?;
        }

        // One clock read per request: the access token and its paired
        // refresh token share the same notion of "now".
        let now = OffsetDateTime::now_utc();

        let access = derive_access(request, &self.registry, now)?;
        let tenant = self.registry.resolve(&access.tenant_id)?;

        let refresh = if request.generate_refresh_token.unwrap_or(false) {
            Some(derive_refresh(&access, tenant, request.refresh_token_ttl, now)?)
        } else {
            None
        };

        let response = self.sign_pair(tenant, access, refresh).await?;

        info!(
            tenant_id = %request.token_tenant_id.as_deref().unwrap_or(""),
            username = %request.token_username.as_deref().unwrap_or(""),
            with_refresh = response.refresh_token.is_some(),
            "Token issued"
        );
        Ok(response)
    }

    /// Renews an access token (and a new refresh token) from a presented
    /// refresh token.
    ///
    /// The token's signature and expiry are verified against the owning
    /// tenant's key before anything is signed. The new access token gets a
    /// fresh expiry computed from the snapshot's requested `ttl`; the new
    /// refresh token uses the tenant's default refresh lifetime.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken`/`TokenExpired` for tokens that fail
    /// verification, are malformed, or are not refresh tokens.
    pub async fn renew(&self, request: &RenewRequest) -> IssueResult<IssueResponse> {
        let token = request
            .refresh_token
            .as_deref()
            .ok_or_else(|| IssueError::missing_field("refresh_token"))?;

        // Unverified peek, only to learn which tenant's key to verify with.
        let peeked = peek_claims(token)?;
        let tenant_id = peeked
            .get("tenant_id")
            .and_then(Value::as_str)
            .ok_or_else(|| IssueError::invalid_token("token carries no tenant_id claim"))?;
        let tenant = self.registry.resolve(tenant_id)?;

        let verified = tenant.keys.verify(token, &tenant.issuer)?;

        if verified.get("token_type").and_then(Value::as_str) != Some(TokenKind::Refresh.as_str())
        {
            return Err(IssueError::invalid_token("token is not a refresh token"));
        }
        let snapshot = verified
            .get("access_token")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                IssueError::invalid_token("refresh token carries no access token snapshot")
            })?;

        let now = OffsetDateTime::now_utc();
        let access = access_from_snapshot(snapshot, now)?;
        let refresh = derive_refresh(&access, tenant, None, now)?;

        debug!(tenant_id = %tenant.tenant_id, "Renewing token pair from refresh token");
        self.sign_pair(tenant, access, Some(refresh)).await
    }

    /// Signs the derived claims and assembles the response envelopes.
    ///
    /// Derivation is complete by the time this runs; any failure here aborts
    /// the whole request, so a response is returned atomically or not at all.
    async fn sign_pair(
        &self,
        tenant: &TenantConfig,
        access: TokenClaims,
        refresh: Option<TokenClaims>,
    ) -> IssueResult<IssueResponse> {
        let _permit = self
            .signing_permits
            .acquire()
            .await
            .map_err(|e| IssueError::internal(e.to_string()))?;

        let signed_access = SignedToken {
            jwt: tenant.keys.sign(&access.claims_map())?,
            claims: access,
        };
        let signed_refresh = match refresh {
            Some(claims) => Some(SignedToken {
                jwt: tenant.keys.sign(&claims.claims_map())?,
                claims,
            }),
            None => None,
        };

        Ok(IssueResponse {
            access_token: signed_access.envelope()?,
            refresh_token: signed_refresh
                .as_ref()
                .map(SignedToken::envelope)
                .transpose()?,
        })
    }
}
