//! Self-service account endpoints.
//!
//! Flow Overview:
//! 1) Authenticate via bearer token or session cookie.
//! 2) Resolve the caller's user record through the identity provider.
//! 3) Answer or mutate only the caller's own account.

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use tracing::{debug, info};

use super::{
    Identity, SETTINGS_MISSING, ServiceError, Settings, USER_NOT_FOUND,
    principal::{clear_session_cookie, extract_session_token, require_auth},
    types::AccountEmail,
};
use crate::identity::{IdentityProvider, User};

#[utoipa::path(
    get,
    path = "/api/v1/account/logout",
    responses(
        (status = 200, description = "Session invalidated and cookie cleared."),
        (status = 401, description = "Missing or invalid session."),
    ),
    tag = "account"
)]
pub async fn logout(
    headers: HeaderMap,
    identity: Extension<Identity>,
) -> Result<impl IntoResponse, ServiceError> {
    let principal = require_auth(&headers, identity.as_ref()).await?;

    if let Some(token) = extract_session_token(&headers) {
        identity.sign_out(&token).await?;
    }
    debug!(user_id = %principal.user_id, "signed out");

    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, clear_session_cookie());
    Ok((StatusCode::OK, response_headers))
}

#[utoipa::path(
    post,
    path = "/api/v1/account/exists",
    request_body = AccountEmail,
    responses(
        (status = 200, description = "Whether an account uses the email.", body = bool),
        (status = 401, description = "Missing or invalid session."),
    ),
    tag = "account"
)]
pub async fn exists(
    headers: HeaderMap,
    identity: Extension<Identity>,
    payload: Result<Json<AccountEmail>, JsonRejection>,
) -> Result<Json<bool>, ServiceError> {
    require_auth(&headers, identity.as_ref()).await?;
    let Json(payload) = payload?;

    let user = identity.find_by_email(&payload.email).await?;
    Ok(Json(user.is_some()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/account",
    responses(
        (status = 200, description = "Own account deleted."),
        (status = 400, description = "User not found.", body = String),
        (status = 401, description = "Missing or invalid session."),
    ),
    tag = "account"
)]
pub async fn delete_account(
    headers: HeaderMap,
    identity: Extension<Identity>,
) -> Result<StatusCode, ServiceError> {
    let principal = require_auth(&headers, identity.as_ref()).await?;
    let user = current_user(identity.as_ref(), &principal.user_id).await?;

    identity.delete(&user).await?;
    info!(user_id = %user.id, "account deleted by owner");

    Ok(StatusCode::OK)
}

#[utoipa::path(
    get,
    path = "/api/v1/account/operations/recovery",
    responses(
        (status = 200, description = "Whether password reset and email change can send email.", body = bool),
        (status = 400, description = "Settings Missing", body = String),
    ),
    tag = "account"
)]
pub async fn recovery_allowed(settings: Extension<Settings>) -> Result<Json<bool>, ServiceError> {
    let settings = settings
        .load()
        .await?
        .ok_or(ServiceError::BadRequest(SETTINGS_MISSING))?;
    Ok(Json(settings.recovery_allowed()))
}

#[utoipa::path(
    get,
    path = "/api/v1/account/roles",
    responses(
        (status = 200, description = "Role names of the caller.", body = [String]),
        (status = 400, description = "User not found.", body = String),
        (status = 401, description = "Missing or invalid session."),
    ),
    tag = "account"
)]
pub async fn roles(
    headers: HeaderMap,
    identity: Extension<Identity>,
) -> Result<Json<Vec<String>>, ServiceError> {
    let principal = require_auth(&headers, identity.as_ref()).await?;
    let user = current_user(identity.as_ref(), &principal.user_id).await?;

    Ok(Json(identity.get_roles(&user).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/account/2fa",
    responses(
        (status = 200, description = "Whether two-factor authentication is enabled.", body = bool),
        (status = 400, description = "User not found.", body = String),
        (status = 401, description = "Missing or invalid session."),
    ),
    tag = "account"
)]
pub async fn two_factor(
    headers: HeaderMap,
    identity: Extension<Identity>,
) -> Result<Json<bool>, ServiceError> {
    let principal = require_auth(&headers, identity.as_ref()).await?;
    let user = current_user(identity.as_ref(), &principal.user_id).await?;

    Ok(Json(identity.get_two_factor_enabled(&user).await?))
}

// The session may outlive its user; that is a 400 here, not a 401.
async fn current_user(identity: &dyn IdentityProvider, user_id: &str) -> Result<User, ServiceError> {
    identity
        .find_by_id(user_id)
        .await?
        .ok_or(ServiceError::BadRequest(USER_NOT_FOUND))
}
