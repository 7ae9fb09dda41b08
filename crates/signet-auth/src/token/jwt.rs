//! JWT signing and verification.
//!
//! Signing is RS256 only. Asymmetric signing is mandatory so third parties
//! can verify tokens with a published public key, without trusting this
//! service with verification secrets; any other algorithm is rejected when
//! the key pair is constructed.

use std::fmt;
use std::str::FromStr;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use serde_json::{Map, Value};

use crate::error::IssueError;

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    EncodingError {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode a token.
    #[error("Failed to decode token: {message}")]
    DecodingError {
        /// Description of the decoding error.
        message: String,
    },

    /// The token has expired.
    #[error("Token expired")]
    Expired,

    /// The token signature is invalid.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Failed to generate a cryptographic key.
    #[error("Key generation error: {message}")]
    KeyGenerationError {
        /// Description of the key generation error.
        message: String,
    },

    /// Invalid key format or data.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of why the key is invalid.
        message: String,
    },

    /// A signing algorithm other than RS256 was requested.
    #[error("Unsupported signing algorithm: {algorithm}")]
    UnsupportedAlgorithm {
        /// The rejected algorithm name.
        algorithm: String,
    },
}

impl JwtError {
    /// Creates a new `EncodingError`.
    #[must_use]
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }

    /// Creates a new `DecodingError`.
    #[must_use]
    pub fn decoding_error(message: impl Into<String>) -> Self {
        Self::DecodingError {
            message: message.into(),
        }
    }

    /// Creates a new `KeyGenerationError`.
    #[must_use]
    pub fn key_generation_error(message: impl Into<String>) -> Self {
        Self::KeyGenerationError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => {
                Self::invalid_key(err.to_string())
            }
            _ => Self::decoding_error(err.to_string()),
        }
    }
}

impl From<JwtError> for IssueError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => Self::TokenExpired,
            JwtError::InvalidSignature => Self::invalid_token("signature verification failed"),
            JwtError::DecodingError { message } => Self::invalid_token(message),
            JwtError::EncodingError { message } => Self::signing(message),
            JwtError::KeyGenerationError { message } | JwtError::InvalidKey { message } => {
                Self::configuration(message)
            }
            JwtError::UnsupportedAlgorithm { algorithm } => {
                Self::configuration(format!("unsupported signing algorithm: {algorithm}"))
            }
        }
    }
}

/// Supported signing algorithms. RS256 is the only member; parsing anything
/// else fails fast so a misconfigured tenant cannot sign at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SigningAlgorithm {
    /// RSA with SHA-256.
    #[default]
    RS256,
}

impl SigningAlgorithm {
    /// Converts to the `jsonwebtoken` Algorithm type.
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::RS256 => Algorithm::RS256,
        }
    }

    /// Returns the algorithm name as used in JWT headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
        }
    }
}

impl FromStr for SigningAlgorithm {
    type Err = JwtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RS256" => Ok(Self::RS256),
            other => Err(JwtError::UnsupportedAlgorithm {
                algorithm: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An RS256 signing key pair for one tenant.
///
/// The private half signs; the public half verifies presented refresh tokens.
/// Neither is ever serialized.
pub struct SigningKeyPair {
    /// Signing algorithm.
    pub algorithm: SigningAlgorithm,

    /// Encoding key (private key) for signing.
    encoding_key: EncodingKey,

    /// Decoding key (public key) for verification.
    decoding_key: DecodingKey,
}

impl fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl SigningKeyPair {
    /// Loads a key pair from a PEM-encoded RSA private key.
    ///
    /// Accepts PKCS#8 or PKCS#1 PEM. The public key is derived from the
    /// private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the algorithm is not RS256 or the PEM data is
    /// invalid.
    pub fn from_pem(algorithm: &str, private_pem: &str) -> Result<Self, JwtError> {
        let algorithm = SigningAlgorithm::from_str(algorithm)?;

        let private_key = RsaPrivateKey::from_pkcs8_pem(private_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(private_pem))
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        Self::from_private_key(algorithm, &private_key, private_pem)
    }

    /// Generates a fresh 2048-bit RSA key pair. Intended for tests and
    /// ephemeral development tenants.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation fails.
    pub fn generate() -> Result<Self, JwtError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048)
            .map_err(|e| JwtError::key_generation_error(e.to_string()))?;

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| JwtError::key_generation_error(e.to_string()))?;

        Self::from_private_key(SigningAlgorithm::RS256, &private_key, &private_pem)
    }

    fn from_private_key(
        algorithm: SigningAlgorithm,
        private_key: &RsaPrivateKey,
        private_pem: &str,
    ) -> Result<Self, JwtError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        let public_pem = private_key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        Ok(Self {
            algorithm,
            encoding_key,
            decoding_key,
        })
    }

    /// Signs a claims payload, producing a compact JWT string with header
    /// `{"typ": "JWT", "alg": "RS256"}`.
    ///
    /// The payload must already carry its final `exp`; nothing is recomputed
    /// at encode time.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn sign(&self, payload: &Map<String, Value>) -> Result<String, JwtError> {
        let header = Header::new(self.algorithm.to_jwt_algorithm());
        encode(&header, payload, &self.encoding_key)
            .map_err(|e| JwtError::encoding_error(e.to_string()))
    }

    /// Verifies a JWT's signature and expiry against this key pair and the
    /// expected issuer, returning the claims payload.
    ///
    /// # Errors
    ///
    /// Returns `Expired` for an expired token, `InvalidSignature` on key
    /// mismatch, and a decoding error for anything malformed.
    pub fn verify(&self, token: &str, issuer: &str) -> Result<Map<String, Value>, JwtError> {
        let mut validation = Validation::new(self.algorithm.to_jwt_algorithm());
        validation.set_issuer(&[issuer]);
        validation.validate_exp = true;
        validation.leeway = 0;

        let data = decode::<Map<String, Value>>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}

/// Decodes a JWT payload WITHOUT verifying the signature.
///
/// Used only to learn which tenant's key to verify with; the result must
/// never be trusted until [`SigningKeyPair::verify`] has succeeded.
///
/// # Errors
///
/// Returns a decoding error if the token is not a three-part compact
/// serialization with a base64url JSON payload.
pub fn peek_claims(token: &str) -> Result<Map<String, Value>, JwtError> {
    let mut parts = token.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(JwtError::decoding_error(
            "token is not a compact JWT serialization",
        ));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| JwtError::decoding_error(e.to_string()))?;

    serde_json::from_slice(&bytes).map_err(|e| JwtError::decoding_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::OffsetDateTime;

    fn payload(exp_offset: i64) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("iss".to_string(), json!("https://acme.example/v3"));
        map.insert("sub".to_string(), json!("acme@bob"));
        map.insert(
            "exp".to_string(),
            json!(OffsetDateTime::now_utc().unix_timestamp() + exp_offset),
        );
        map
    }

    #[test]
    fn test_sign_and_verify_round_trip() {
        let keys = SigningKeyPair::generate().unwrap();
        let claims = payload(3600);

        let token = keys.sign(&claims).unwrap();
        let verified = keys.verify(&token, "https://acme.example/v3").unwrap();

        assert_eq!(verified, claims);
    }

    #[test]
    fn test_header_is_jwt_rs256() {
        let keys = SigningKeyPair::generate().unwrap();
        let token = keys.sign(&payload(3600)).unwrap();

        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.typ.as_deref(), Some("JWT"));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let keys = SigningKeyPair::generate().unwrap();
        let other = SigningKeyPair::generate().unwrap();
        let token = keys.sign(&payload(3600)).unwrap();

        let err = other.verify(&token, "https://acme.example/v3").unwrap_err();
        assert!(matches!(err, JwtError::InvalidSignature));
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = SigningKeyPair::generate().unwrap();
        let token = keys.sign(&payload(-3600)).unwrap();

        let err = keys.verify(&token, "https://acme.example/v3").unwrap_err();
        assert!(matches!(err, JwtError::Expired));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let keys = SigningKeyPair::generate().unwrap();
        let token = keys.sign(&payload(3600)).unwrap();

        assert!(keys.verify(&token, "https://other.example/v3").is_err());
    }

    #[test]
    fn test_peek_claims_without_verification() {
        let keys = SigningKeyPair::generate().unwrap();
        let claims = payload(3600);
        let token = keys.sign(&claims).unwrap();

        let peeked = peek_claims(&token).unwrap();
        assert_eq!(peeked["sub"], json!("acme@bob"));
    }

    #[test]
    fn test_peek_rejects_malformed_token() {
        assert!(peek_claims("not-a-jwt").is_err());
        assert!(peek_claims("a.b").is_err());
        assert!(peek_claims("a.!!!.c").is_err());
    }

    #[test]
    fn test_only_rs256_supported() {
        assert!(SigningAlgorithm::from_str("RS256").is_ok());
        let err = SigningAlgorithm::from_str("HS256").unwrap_err();
        assert!(matches!(err, JwtError::UnsupportedAlgorithm { .. }));
        assert!(SigningAlgorithm::from_str("ES384").is_err());
    }

    #[test]
    fn test_from_pem_rejects_garbage() {
        let err = SigningKeyPair::from_pem("RS256", "not a pem").unwrap_err();
        assert!(matches!(err, JwtError::InvalidKey { .. }));
    }

    #[test]
    fn test_jwt_error_to_issue_error() {
        assert!(matches!(
            IssueError::from(JwtError::Expired),
            IssueError::TokenExpired
        ));
        assert!(matches!(
            IssueError::from(JwtError::InvalidSignature),
            IssueError::InvalidToken { .. }
        ));
        assert!(matches!(
            IssueError::from(JwtError::invalid_key("bad")),
            IssueError::Configuration { .. }
        ));
        assert!(matches!(
            IssueError::from(JwtError::encoding_error("crypto failure")),
            IssueError::Signing { .. }
        ));
    }
}
