//! System settings endpoints (administrator only).
//!
//! The stored SendGrid key is write-only: reads return the masking
//! placeholder, and sending the placeholder back keeps the stored key.

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
};
use tracing::info;

use super::{
    Identity, SETTINGS_MISSING, ServiceError, Settings,
    principal::require_admin,
    types::{SystemSettingsRequest, SystemSettingsResponse},
};
use crate::settings::SettingsUpdate;

#[utoipa::path(
    get,
    path = "/api/v1/settings",
    responses(
        (status = 200, description = "Current settings with the API key masked.", body = SystemSettingsResponse),
        (status = 400, description = "Settings Missing", body = String),
        (status = 401, description = "Missing or invalid session."),
        (status = 403, description = "Caller is not an administrator."),
    ),
    tag = "settings"
)]
pub async fn get_settings(
    headers: HeaderMap,
    identity: Extension<Identity>,
    settings: Extension<Settings>,
) -> Result<Json<SystemSettingsResponse>, ServiceError> {
    require_admin(&headers, identity.as_ref()).await?;

    let stored = settings
        .load()
        .await?
        .ok_or(ServiceError::BadRequest(SETTINGS_MISSING))?;

    Ok(Json(SystemSettingsResponse::from(&stored)))
}

#[utoipa::path(
    put,
    path = "/api/v1/settings",
    request_body = SystemSettingsRequest,
    responses(
        (status = 200, description = "Settings saved."),
        (status = 400, description = "Settings Missing", body = String),
        (status = 401, description = "Missing or invalid session."),
        (status = 403, description = "Caller is not an administrator."),
    ),
    tag = "settings"
)]
pub async fn update_settings(
    headers: HeaderMap,
    identity: Extension<Identity>,
    settings: Extension<Settings>,
    payload: Result<Json<SystemSettingsRequest>, JsonRejection>,
) -> Result<StatusCode, ServiceError> {
    let principal = require_admin(&headers, identity.as_ref()).await?;
    let Json(request) = payload?;

    let mut stored = settings
        .load()
        .await?
        .ok_or(ServiceError::BadRequest(SETTINGS_MISSING))?;

    stored.apply(SettingsUpdate::from(request));
    settings.save(&stored).await?;

    info!(by = %principal.user_id, "system settings updated");

    Ok(StatusCode::OK)
}
