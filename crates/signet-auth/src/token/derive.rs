//! Claim derivation.
//!
//! Pure functions that turn a validated request (or a verified refresh
//! snapshot) into a fully populated [`TokenClaims`] value. Nothing here
//! mutates shared state or signs anything; callers pass one `now` so the
//! access token and its paired refresh token always agree on issuance time.

use serde_json::{Map, Value};
use time::{Duration, OffsetDateTime};

use crate::IssueResult;
use crate::error::IssueError;
use crate::registry::{TenantConfig, TenantRegistry};
use crate::token::claims::{TokenClaims, TokenKind};
use crate::token::types::TokenRequest;

/// Derives the canonical access-token claims from a request.
///
/// Field extraction, subject computation, tenant resolution, and lifetime
/// resolution happen in that order, so a missing field is reported before an
/// unknown tenant, and an unknown tenant before a bad lifetime.
///
/// # Errors
///
/// - `MissingField` naming the first absent required field
/// - `TenantNotFound` for an unconfigured tenant
/// - `InvalidTtl` for a non-positive or out-of-range requested lifetime
pub fn derive_access(
    request: &TokenRequest,
    registry: &TenantRegistry,
    now: OffsetDateTime,
) -> IssueResult<TokenClaims> {
    let tenant_id = request
        .token_tenant_id
        .as_deref()
        .ok_or_else(|| IssueError::missing_field("token_tenant_id"))?;
    let username = request
        .token_username
        .as_deref()
        .ok_or_else(|| IssueError::missing_field("token_username"))?;
    let account_type = request
        .token_type
        .as_deref()
        .ok_or_else(|| IssueError::missing_field("token_type"))?;

    // sub is always recomputed from its parts, never accepted from input.
    let sub = TokenClaims::compute_sub(tenant_id, username);

    let tenant = registry.resolve(tenant_id)?;

    let ttl = resolve_ttl(
        request.access_token_ttl,
        tenant.access_token_ttl,
        "access_token_ttl",
    )?;
    let exp = expiry(now, ttl, "access_token_ttl")?;

    Ok(TokenClaims {
        iss: tenant.issuer.clone(),
        sub,
        tenant_id: tenant_id.to_string(),
        token_type: TokenKind::Access,
        username: username.to_string(),
        account_type: account_type.to_string(),
        exp,
        ttl,
        delegation: Some(request.delegation_token.unwrap_or(false)),
        extra_claims: request.extra_claims.clone(),
        access_token: None,
    })
}

/// Derives refresh-token claims from already-derived access claims.
///
/// The refresh token copies `iss`, `sub`, `tenant_id`, `username`, and
/// `account_type` unchanged, drops `delegation`, resolves its own lifetime,
/// and embeds the access claims snapshot (no `exp`, requested `ttl` copied
/// in) so a later renewal can reissue an equal-length access token.
///
/// # Errors
///
/// Returns `InvalidTtl` for a non-positive requested lifetime.
pub fn derive_refresh(
    access: &TokenClaims,
    tenant: &TenantConfig,
    requested_ttl: Option<i64>,
    now: OffsetDateTime,
) -> IssueResult<TokenClaims> {
    let ttl = resolve_ttl(requested_ttl, tenant.refresh_token_ttl, "refresh_token_ttl")?;
    let exp = expiry(now, ttl, "refresh_token_ttl")?;

    Ok(TokenClaims {
        iss: access.iss.clone(),
        sub: access.sub.clone(),
        tenant_id: access.tenant_id.clone(),
        token_type: TokenKind::Refresh,
        username: access.username.clone(),
        account_type: access.account_type.clone(),
        exp,
        ttl,
        delegation: None,
        extra_claims: None,
        access_token: Some(access.snapshot_for_refresh()),
    })
}

/// Rebuilds access-token claims from the snapshot embedded in a verified
/// refresh token, with a fresh expiry computed from the snapshot's requested
/// `ttl`.
///
/// # Errors
///
/// Returns `InvalidToken` if the snapshot is missing standard claims or its
/// `ttl` is not a positive integer. The presented token was signed by us, so
/// a malformed snapshot means the token itself is not trustworthy.
pub fn access_from_snapshot(
    snapshot: &Map<String, Value>,
    now: OffsetDateTime,
) -> IssueResult<TokenClaims> {
    let iss = snapshot_str(snapshot, "iss")?;
    let tenant_id = snapshot_str(snapshot, "tenant_id")?;
    let username = snapshot_str(snapshot, "username")?;
    let account_type = snapshot_str(snapshot, "account_type")?;

    let ttl = snapshot
        .get("ttl")
        .and_then(Value::as_i64)
        .ok_or_else(|| IssueError::invalid_token("access snapshot is missing ttl"))?;
    if ttl <= 0 {
        return Err(IssueError::invalid_token("access snapshot ttl is not positive"));
    }

    let exp = now
        .checked_add(Duration::seconds(ttl))
        .map(|t| t.unix_timestamp())
        .ok_or_else(|| {
            IssueError::invalid_token("access snapshot ttl puts the expiry out of range")
        })?;

    let delegation = snapshot
        .get("delegation")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let mut extra: Map<String, Value> = snapshot.clone();
    for standard in [
        "iss",
        "sub",
        "tenant_id",
        "token_type",
        "delegation",
        "username",
        "account_type",
        "exp",
        "ttl",
    ] {
        extra.remove(standard);
    }

    Ok(TokenClaims {
        iss: iss.to_string(),
        sub: TokenClaims::compute_sub(tenant_id, username),
        tenant_id: tenant_id.to_string(),
        token_type: TokenKind::Access,
        username: username.to_string(),
        account_type: account_type.to_string(),
        exp,
        ttl,
        delegation: Some(delegation),
        extra_claims: (!extra.is_empty()).then_some(extra),
        access_token: None,
    })
}

fn resolve_ttl(requested: Option<i64>, tenant_default: i64, field: &str) -> IssueResult<i64> {
    let ttl = match requested {
        // Zero falls back to the default, matching absent.
        Some(ttl) if ttl != 0 => ttl,
        _ => tenant_default,
    };
    if ttl <= 0 {
        return Err(IssueError::invalid_ttl(format!(
            "{field} must be a positive number of seconds, got {ttl}"
        )));
    }
    Ok(ttl)
}

/// Computes an expiry timestamp, rejecting lifetimes so large that the
/// expiry cannot be represented. `OffsetDateTime` addition panics on
/// overflow, so the checked form is mandatory for caller-supplied ttls.
fn expiry(now: OffsetDateTime, ttl: i64, field: &str) -> IssueResult<i64> {
    now.checked_add(Duration::seconds(ttl))
        .map(|t| t.unix_timestamp())
        .ok_or_else(|| {
            IssueError::invalid_ttl(format!("{field} of {ttl} puts the expiry out of range"))
        })
}

fn snapshot_str<'a>(snapshot: &'a Map<String, Value>, claim: &str) -> IssueResult<&'a str> {
    snapshot
        .get(claim)
        .and_then(Value::as_str)
        .ok_or_else(|| IssueError::invalid_token(format!("access snapshot is missing {claim}")))
}
