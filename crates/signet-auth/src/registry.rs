//! Tenant resolution.
//!
//! The [`TenantRegistry`] maps a tenant id to its issuance configuration:
//! issuer string, lifetime defaults, and signing key pair. It is built once
//! at process start and read-only afterwards, so concurrent requests share it
//! through an `Arc` without locking.
//!
//! Signing key material comes from a [`KeyProvider`]: static configuration in
//! trusted deployments, or an external key-custody service in production.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::info;

use crate::IssueResult;
use crate::config::{IssuerConfig, TenantEntry};
use crate::error::IssueError;
use crate::token::jwt::SigningKeyPair;

/// Issuance configuration for one tenant, immutable after startup.
#[derive(Debug)]
pub struct TenantConfig {
    /// Unique tenant identifier.
    pub tenant_id: String,

    /// Issuer URL placed in the `iss` claim. Never taken from caller input.
    pub issuer: String,

    /// Default access token lifetime in seconds.
    pub access_token_ttl: i64,

    /// Default refresh token lifetime in seconds.
    pub refresh_token_ttl: i64,

    /// RS256 key pair used to sign this tenant's tokens and verify presented
    /// refresh tokens. Never exposed in serialized output.
    pub keys: SigningKeyPair,
}

/// Source of per-tenant private signing keys.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Returns the PEM-encoded RSA private key for `tenant_id`.
    async fn signing_key_pem(&self, tenant_id: &str) -> IssueResult<String>;
}

/// Key provider backed by static configuration: inline PEM or a key file
/// path per tenant. Used in trusted (non-production) deployments.
pub struct StaticKeyProvider {
    sources: HashMap<String, KeySource>,
}

enum KeySource {
    Inline(String),
    Path(String),
}

impl StaticKeyProvider {
    /// Builds a provider from the configured tenant entries.
    #[must_use]
    pub fn from_entries(entries: &[TenantEntry]) -> Self {
        let sources = entries
            .iter()
            .filter_map(|entry| {
                let source = if let Some(pem) = &entry.private_key_pem {
                    KeySource::Inline(pem.clone())
                } else if let Some(path) = &entry.private_key_path {
                    KeySource::Path(path.clone())
                } else {
                    return None;
                };
                Some((entry.tenant_id.clone(), source))
            })
            .collect();
        Self { sources }
    }
}

#[async_trait]
impl KeyProvider for StaticKeyProvider {
    async fn signing_key_pem(&self, tenant_id: &str) -> IssueResult<String> {
        match self.sources.get(tenant_id) {
            Some(KeySource::Inline(pem)) => Ok(pem.clone()),
            Some(KeySource::Path(path)) => {
                tokio::fs::read_to_string(path).await.map_err(|e| {
                    IssueError::configuration(format!(
                        "tenant '{tenant_id}': cannot read key file '{path}': {e}"
                    ))
                })
            }
            None => Err(IssueError::configuration(format!(
                "tenant '{tenant_id}': no signing key configured"
            ))),
        }
    }
}

/// Key provider for production deployments, where private keys live in an
/// external key-custody service.
///
/// The custody protocol is not wired in yet; every lookup returns an explicit
/// `Unimplemented` error so startup fails loudly instead of issuing
/// unsigned-by-custody tokens.
pub struct CustodyKeyProvider;

#[async_trait]
impl KeyProvider for CustodyKeyProvider {
    async fn signing_key_pem(&self, _tenant_id: &str) -> IssueResult<String> {
        Err(IssueError::unimplemented(
            "key-custody signing key lookup",
        ))
    }
}

/// Read-only map from tenant id to [`TenantConfig`].
#[derive(Debug)]
pub struct TenantRegistry {
    tenants: HashMap<String, TenantConfig>,
}

impl TenantRegistry {
    /// Builds the registry from configuration, obtaining each tenant's
    /// signing key through `provider`.
    ///
    /// # Errors
    ///
    /// Any failure here is a fatal startup error: an unresolvable or
    /// malformed key becomes a `Configuration` error and the process should
    /// refuse to start.
    pub async fn from_config(
        config: &IssuerConfig,
        provider: &dyn KeyProvider,
    ) -> IssueResult<Self> {
        let mut tenants = HashMap::with_capacity(config.tenants.len());

        for entry in &config.tenants {
            let pem = provider.signing_key_pem(&entry.tenant_id).await?;
            let keys = SigningKeyPair::from_pem(&entry.algorithm, &pem).map_err(|e| {
                IssueError::configuration(format!("tenant '{}': {e}", entry.tenant_id))
            })?;

            if tenants
                .insert(
                    entry.tenant_id.clone(),
                    TenantConfig {
                        tenant_id: entry.tenant_id.clone(),
                        issuer: entry.issuer.clone(),
                        access_token_ttl: entry.access_token_ttl,
                        refresh_token_ttl: entry.refresh_token_ttl,
                        keys,
                    },
                )
                .is_some()
            {
                return Err(IssueError::configuration(format!(
                    "duplicate tenant_id: '{}'",
                    entry.tenant_id
                )));
            }

            info!(tenant_id = %entry.tenant_id, issuer = %entry.issuer, "Tenant registered");
        }

        Ok(Self { tenants })
    }

    /// Resolves a tenant id to its issuance configuration.
    ///
    /// # Errors
    ///
    /// Returns `TenantNotFound` for an unconfigured tenant.
    pub fn resolve(&self, tenant_id: &str) -> IssueResult<&TenantConfig> {
        self.tenants
            .get(tenant_id)
            .ok_or_else(|| IssueError::tenant_not_found(tenant_id))
    }

    /// Returns the number of configured tenants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    /// Returns `true` if no tenants are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrustMode;
    use rsa::RsaPrivateKey;
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};

    fn test_pem() -> String {
        let key = RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).unwrap();
        key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string()
    }

    fn entry(id: &str, pem: String) -> TenantEntry {
        TenantEntry {
            tenant_id: id.to_string(),
            issuer: format!("https://{id}.example/v3"),
            access_token_ttl: 3600,
            refresh_token_ttl: 86400,
            algorithm: "RS256".to_string(),
            private_key_pem: Some(pem),
            private_key_path: None,
        }
    }

    #[tokio::test]
    async fn test_registry_resolves_configured_tenant() {
        let config = IssuerConfig {
            mode: TrustMode::Trusted,
            tenants: vec![entry("acme", test_pem())],
        };
        let provider = StaticKeyProvider::from_entries(&config.tenants);
        let registry = TenantRegistry::from_config(&config, &provider).await.unwrap();

        assert_eq!(registry.len(), 1);
        let tenant = registry.resolve("acme").unwrap();
        assert_eq!(tenant.issuer, "https://acme.example/v3");
        assert_eq!(tenant.access_token_ttl, 3600);
        assert_eq!(tenant.refresh_token_ttl, 86400);
    }

    #[tokio::test]
    async fn test_unknown_tenant_fails() {
        let config = IssuerConfig {
            mode: TrustMode::Trusted,
            tenants: vec![entry("acme", test_pem())],
        };
        let provider = StaticKeyProvider::from_entries(&config.tenants);
        let registry = TenantRegistry::from_config(&config, &provider).await.unwrap();

        let err = registry.resolve("bogus").unwrap_err();
        assert!(matches!(err, IssueError::TenantNotFound { ref tenant_id } if tenant_id == "bogus"));
    }

    #[tokio::test]
    async fn test_malformed_key_is_fatal_configuration_error() {
        let config = IssuerConfig {
            mode: TrustMode::Trusted,
            tenants: vec![entry("acme", "not a pem".to_string())],
        };
        let provider = StaticKeyProvider::from_entries(&config.tenants);
        let err = TenantRegistry::from_config(&config, &provider)
            .await
            .unwrap_err();
        assert!(matches!(err, IssueError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_custody_provider_is_unimplemented() {
        let err = CustodyKeyProvider
            .signing_key_pem("acme")
            .await
            .unwrap_err();
        assert!(matches!(err, IssueError::Unimplemented { .. }));
    }

    #[tokio::test]
    async fn test_custody_mode_startup_fails_loudly() {
        let config = IssuerConfig {
            mode: TrustMode::Custody,
            tenants: vec![TenantEntry {
                private_key_pem: None,
                ..entry("acme", String::new())
            }],
        };
        let err = TenantRegistry::from_config(&config, &CustodyKeyProvider)
            .await
            .unwrap_err();
        assert!(matches!(err, IssueError::Unimplemented { .. }));
    }
}
