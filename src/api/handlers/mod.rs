//! API handlers and the error type they share.
//!
//! Every handler resolves the caller itself (see [`principal`]) before any
//! business rule runs, then talks to the identity layer and the settings row
//! through the trait objects installed as router extensions.

pub mod account;
pub mod health;
pub mod principal;
pub mod root;
pub mod settings;
pub mod types;
pub mod users;


use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::error;

use crate::{identity::IdentityProvider, settings::SettingsStore};

/// Identity provider as installed on the router.
pub type Identity = Arc<dyn IdentityProvider>;

/// Settings store as installed on the router.
pub type Settings = Arc<dyn SettingsStore>;

pub const USER_NOT_FOUND: &str = "User not found.";
pub const SETTINGS_MISSING: &str = "Settings Missing";

#[derive(Debug)]
pub enum ServiceError {
    Unauthorized,
    Forbidden,
    BadRequest(&'static str),
    NotFound(&'static str),
    InvalidBody(JsonRejection),
    Internal(anyhow::Error),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::Forbidden => StatusCode::FORBIDDEN.into_response(),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message).into_response(),
            Self::InvalidBody(rejection) => rejection.into_response(),
            Self::Internal(err) => {
                error!("Failed to handle request: {err:#}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidBody(rejection)
    }
}
