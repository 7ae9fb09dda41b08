//! Token issuance error types.
//!
//! This module defines all error types that can occur while resolving tenant
//! configuration, authorizing claims, deriving token data, and signing.

use std::fmt;

/// Errors that can occur during token issuance and renewal.
#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    /// The issuance configuration is invalid. Fatal at startup.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// A required request field is missing.
    #[error("Missing required field: {field}")]
    MissingField {
        /// Name of the missing field.
        field: String,
    },

    /// The requested token lifetime is not a positive number of seconds.
    #[error("Invalid ttl: {message}")]
    InvalidTtl {
        /// Description of why the ttl is invalid.
        message: String,
    },

    /// An extra claim collides with a reserved claim name or is denied by policy.
    #[error("Extra claim not allowed: {claim}")]
    ClaimNotAllowed {
        /// Name of the rejected claim.
        claim: String,
    },

    /// A provider required in this deployment mode is not wired in yet.
    ///
    /// Returned by the custody-mode key and claim-policy providers. This is an
    /// explicit result, never a silent allow.
    #[error("Not implemented: {feature}")]
    Unimplemented {
        /// The missing provider or feature.
        feature: String,
    },

    /// The request references a tenant with no issuance configuration.
    #[error("Unknown tenant: {tenant_id}")]
    TenantNotFound {
        /// The unresolvable tenant id.
        tenant_id: String,
    },

    /// A presented token is malformed or fails signature verification.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of why the token is invalid. Never contains claim values.
        message: String,
    },

    /// A presented token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// The underlying cryptographic signing operation failed.
    ///
    /// Indicates tenant key misconfiguration, so the same tenant's future
    /// requests will fail too. Should alert, not just fail one request.
    #[error("Signing error: {message}")]
    Signing {
        /// Description of the signing failure.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl IssueError {
    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `MissingField` error.
    #[must_use]
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates a new `InvalidTtl` error.
    #[must_use]
    pub fn invalid_ttl(message: impl Into<String>) -> Self {
        Self::InvalidTtl {
            message: message.into(),
        }
    }

    /// Creates a new `ClaimNotAllowed` error.
    #[must_use]
    pub fn claim_not_allowed(claim: impl Into<String>) -> Self {
        Self::ClaimNotAllowed {
            claim: claim.into(),
        }
    }

    /// Creates a new `Unimplemented` error.
    #[must_use]
    pub fn unimplemented(feature: impl Into<String>) -> Self {
        Self::Unimplemented {
            feature: feature.into(),
        }
    }

    /// Creates a new `TenantNotFound` error.
    #[must_use]
    pub fn tenant_not_found(tenant_id: impl Into<String>) -> Self {
        Self::TenantNotFound {
            tenant_id: tenant_id.into(),
        }
    }

    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `Signing` error.
    #[must_use]
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingField { .. }
                | Self::InvalidTtl { .. }
                | Self::ClaimNotAllowed { .. }
                | Self::TenantNotFound { .. }
                | Self::InvalidToken { .. }
                | Self::TokenExpired
        )
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. }
                | Self::Unimplemented { .. }
                | Self::Signing { .. }
                | Self::Internal { .. }
        )
    }

    /// Returns `true` if this error rejects a presented token (renewal path).
    #[must_use]
    pub fn is_token_error(&self) -> bool {
        matches!(self, Self::InvalidToken { .. } | Self::TokenExpired)
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::MissingField { .. } | Self::InvalidTtl { .. } => ErrorCategory::Validation,
            Self::ClaimNotAllowed { .. } => ErrorCategory::Claims,
            Self::Unimplemented { .. } => ErrorCategory::Configuration,
            Self::TenantNotFound { .. } => ErrorCategory::Tenant,
            Self::InvalidToken { .. } | Self::TokenExpired => ErrorCategory::Token,
            Self::Signing { .. } => ErrorCategory::Signing,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns a stable machine-readable error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::MissingField { .. } => "missing_field",
            Self::InvalidTtl { .. } => "invalid_ttl",
            Self::ClaimNotAllowed { .. } => "claim_not_allowed",
            Self::Unimplemented { .. } => "not_implemented",
            Self::TenantNotFound { .. } => "tenant_not_found",
            Self::InvalidToken { .. } => "invalid_token",
            Self::TokenExpired => "token_expired",
            Self::Signing { .. } => "signing_error",
            Self::Internal { .. } => "internal_error",
        }
    }
}

/// Categories of issuance errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Request validation errors.
    Validation,
    /// Extra-claim authorization errors.
    Claims,
    /// Tenant resolution errors.
    Tenant,
    /// Presented-token validation errors.
    Token,
    /// Cryptographic signing errors.
    Signing,
    /// Configuration errors.
    Configuration,
    /// Internal server errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Claims => write!(f, "claims"),
            Self::Tenant => write!(f, "tenant"),
            Self::Token => write!(f, "token"),
            Self::Signing => write!(f, "signing"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
