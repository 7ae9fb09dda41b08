//! HTTP handlers for the token service endpoints.
//!
//! # Available Handlers
//!
//! - [`issue_tokens_handler`] - Token issuance endpoint (`POST /v3/tokens`)
//! - [`renew_token_handler`] - Token renewal endpoint (`PUT /v3/tokens`)

pub mod tokens;

pub use tokens::{TokenState, issue_tokens_handler, renew_token_handler};
