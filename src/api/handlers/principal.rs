//! Session token extraction and authorization helpers.
//!
//! Flow Overview: read the session token (bearer header first, then cookie),
//! resolve it through the identity provider, and return the principal.
//! Administrative routes additionally require the `Administrator` role.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{AUTHORIZATION, COOKIE},
};

use super::ServiceError;
use crate::identity::{IdentityProvider, Principal};

pub const SESSION_COOKIE_NAME: &str = "account_api_session";

/// Resolve the caller, or 401 when the token is missing, unknown or expired.
///
/// # Errors
/// Returns `Unauthorized` for anonymous callers and `Internal` on store failures.
pub async fn require_auth(
    headers: &HeaderMap,
    identity: &dyn IdentityProvider,
) -> Result<Principal, ServiceError> {
    let token = extract_session_token(headers).ok_or(ServiceError::Unauthorized)?;
    identity
        .authenticate(&token)
        .await?
        .ok_or(ServiceError::Unauthorized)
}

/// Resolve the caller and require the `Administrator` role (403 otherwise).
///
/// # Errors
/// Returns `Unauthorized`, `Forbidden` or `Internal`.
pub async fn require_admin(
    headers: &HeaderMap,
    identity: &dyn IdentityProvider,
) -> Result<Principal, ServiceError> {
    let principal = require_auth(headers, identity).await?;
    if principal.is_administrator() {
        Ok(principal)
    } else {
        Err(ServiceError::Forbidden)
    }
}

/// Expired cookie sent on logout, even if the session record was missing.
#[must_use]
pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("account_api_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

#[must_use]
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let value = headers.get(COOKIE)?.to_str().ok()?;
    value.split(';').find_map(|pair| {
        let (key, val) = pair.trim().split_once('=')?;
        (key.trim() == SESSION_COOKIE_NAME && !val.trim().is_empty())
            .then(|| val.trim().to_string())
    })
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
