//! # signet-auth
//!
//! Multi-tenant JWT issuance for the Signet token service.
//!
//! This crate provides:
//! - Per-tenant issuance configuration and signing key resolution
//! - Extra-claim authorization gating
//! - Access and refresh token claim derivation
//! - RS256 JWT signing and verification
//! - The issuance pipeline and its Axum HTTP handlers
//!
//! ## Overview
//!
//! A token request names a tenant, a username, and an account type; the
//! pipeline derives the full claim set server-side (the subject is always
//! recomputed as `{tenant_id}@{username}`, the issuer always comes from
//! tenant configuration) and signs it with the tenant's private key. A
//! refresh token embeds a snapshot of its paired access token's claims, so
//! renewal needs no server-side token state.
//!
//! ## Modules
//!
//! - [`config`] - Issuance configuration: trust mode and tenant entries
//! - [`registry`] - Tenant resolution and signing key providers
//! - [`authorizer`] - Extra-claim authorization
//! - [`token`] - Claim derivation, JWT signing, and the issuance pipeline
//! - [`http`] - Axum HTTP handlers for the tokens endpoint

pub mod authorizer;
pub mod config;
pub mod error;
pub mod http;
pub mod registry;
pub mod token;

pub use authorizer::{ClaimAuthorizer, ExtraClaimPolicy};
pub use config::{ConfigError, IssuerConfig, TenantEntry, TrustMode};
pub use error::{ErrorCategory, IssueError};
pub use http::{TokenState, issue_tokens_handler, renew_token_handler};
pub use registry::{
    CustodyKeyProvider, KeyProvider, StaticKeyProvider, TenantConfig, TenantRegistry,
};
pub use token::{
    IssuanceService, IssueResponse, RenewRequest, SignedToken, SigningKeyPair, TokenClaims,
    TokenEnvelope, TokenKind, TokenRequest,
};

/// Type alias for token issuance results.
pub type IssueResult<T> = Result<T, IssueError>;
