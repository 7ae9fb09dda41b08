//! Token derivation, signing, and issuance.
//!
//! This module provides:
//!
//! - Claim derivation for access and refresh tokens
//! - RS256 JWT signing and verification
//! - The issuance pipeline tying authorization, derivation, and signing
//!   together

pub mod claims;
pub mod derive;
pub mod jwt;
pub mod service;
pub mod types;

pub use claims::{RESERVED_CLAIMS, TokenClaims, TokenKind, is_reserved_claim};
pub use derive::{access_from_snapshot, derive_access, derive_refresh};
pub use jwt::{JwtError, SigningAlgorithm, SigningKeyPair, peek_claims};
pub use service::IssuanceService;
pub use types::{IssueResponse, RenewRequest, SignedToken, TokenEnvelope, TokenRequest};
