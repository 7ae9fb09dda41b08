//! Extra-claim authorization.
//!
//! Callers may ask for arbitrary extra claims in their access tokens. This
//! gate decides whether they are allowed to, and runs before any derivation
//! or signing so a rejected request never produces a partially signed token.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::IssueResult;
use crate::config::TrustMode;
use crate::error::IssueError;
use crate::token::claims::is_reserved_claim;

/// External authorization decision for extra claims, consulted in custody
/// (production) mode.
#[async_trait]
pub trait ExtraClaimPolicy: Send + Sync {
    /// Returns `true` if `tenant_id` may inject `claim` as an extra claim.
    async fn is_extra_claim_allowed(&self, tenant_id: &str, claim: &str) -> IssueResult<bool>;
}

/// Gate deciding whether a request may inject its extra claims.
pub struct ClaimAuthorizer {
    mode: TrustMode,
    policy: Option<Arc<dyn ExtraClaimPolicy>>,
}

impl ClaimAuthorizer {
    /// Creates an authorizer for the given trust mode with no external
    /// policy installed.
    #[must_use]
    pub fn new(mode: TrustMode) -> Self {
        Self { mode, policy: None }
    }

    /// Installs the external policy consulted in custody mode.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn ExtraClaimPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Authorizes a caller-supplied extra-claims map.
    ///
    /// In trusted mode, any key colliding with a reserved claim name is
    /// rejected and everything else passes. In custody mode the decision is
    /// delegated to the installed [`ExtraClaimPolicy`]; with no policy
    /// installed every call fails with an explicit `Unimplemented` error,
    /// never a silent allow.
    ///
    /// # Errors
    ///
    /// Returns `ClaimNotAllowed` naming the offending claim, or
    /// `Unimplemented` when custody-mode policy is unavailable.
    pub async fn authorize(
        &self,
        tenant_id: Option<&str>,
        extra_claims: &Map<String, Value>,
    ) -> IssueResult<()> {
        if extra_claims.is_empty() {
            return Ok(());
        }

        match self.mode {
            TrustMode::Trusted => {
                for claim in extra_claims.keys() {
                    if is_reserved_claim(claim) {
                        debug!(claim = %claim, "Rejecting reserved claim in extra_claims");
                        return Err(IssueError::claim_not_allowed(claim));
                    }
                }
                Ok(())
            }
            TrustMode::Custody => {
                let Some(policy) = &self.policy else {
                    return Err(IssueError::unimplemented(
                        "extra-claim authorization policy",
                    ));
                };
                let tenant_id = tenant_id
                    .ok_or_else(|| IssueError::missing_field("token_tenant_id"))?;
                for claim in extra_claims.keys() {
                    if !policy.is_extra_claim_allowed(tenant_id, claim).await? {
                        return Err(IssueError::claim_not_allowed(claim));
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct AllowList(Vec<String>);

    #[async_trait]
    impl ExtraClaimPolicy for AllowList {
        async fn is_extra_claim_allowed(&self, _tenant_id: &str, claim: &str) -> IssueResult<bool> {
            Ok(self.0.iter().any(|c| c == claim))
        }
    }

    fn extras(keys: &[(&str, Value)]) -> Map<String, Value> {
        keys.iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_trusted_mode_allows_non_reserved_claims() {
        let authorizer = ClaimAuthorizer::new(TrustMode::Trusted);
        let claims = extras(&[("department", json!("engineering")), ("level", json!(3))]);
        assert!(authorizer.authorize(Some("acme"), &claims).await.is_ok());
    }

    #[tokio::test]
    async fn test_trusted_mode_rejects_reserved_claim_by_name() {
        let authorizer = ClaimAuthorizer::new(TrustMode::Trusted);
        let claims = extras(&[("tenant_id", json!("other"))]);

        let err = authorizer.authorize(Some("acme"), &claims).await.unwrap_err();
        assert!(matches!(err, IssueError::ClaimNotAllowed { ref claim } if claim == "tenant_id"));
    }

    #[tokio::test]
    async fn test_trusted_mode_rejects_iss() {
        let authorizer = ClaimAuthorizer::new(TrustMode::Trusted);
        let claims = extras(&[("iss", json!("https://evil.example"))]);
        assert!(authorizer.authorize(Some("acme"), &claims).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_extras_always_pass() {
        let authorizer = ClaimAuthorizer::new(TrustMode::Custody);
        assert!(authorizer.authorize(Some("acme"), &Map::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_custody_mode_without_policy_is_unimplemented() {
        let authorizer = ClaimAuthorizer::new(TrustMode::Custody);
        let claims = extras(&[("department", json!("engineering"))]);

        let err = authorizer.authorize(Some("acme"), &claims).await.unwrap_err();
        assert!(matches!(err, IssueError::Unimplemented { .. }));
    }

    #[tokio::test]
    async fn test_custody_mode_consults_policy() {
        let policy = Arc::new(AllowList(vec!["department".to_string()]));
        let authorizer = ClaimAuthorizer::new(TrustMode::Custody).with_policy(policy);

        let allowed = extras(&[("department", json!("engineering"))]);
        assert!(authorizer.authorize(Some("acme"), &allowed).await.is_ok());

        let denied = extras(&[("clearance", json!("secret"))]);
        let err = authorizer.authorize(Some("acme"), &denied).await.unwrap_err();
        assert!(matches!(err, IssueError::ClaimNotAllowed { ref claim } if claim == "clearance"));
    }
}
