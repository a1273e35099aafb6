//! # Account API
//!
//! `account-api` is the account and administration surface of an identity
//! system. Login, registration and password storage belong to the identity
//! layer; this crate exposes what sits next to it:
//!
//! - **Self-service account operations:** logout, email lookup, deleting the
//!   caller's own account, listing the caller's roles and two-factor status.
//! - **User administration:** toggling the `Administrator` role, deleting other
//!   users and a filtered, email-ordered, paginated user search.
//! - **System settings:** a single row holding the SendGrid credentials and
//!   registration switches. The API key is write-only and reads return a
//!   masking placeholder.
//! - **Email dispatch:** confirmation and password reset emails are sent through
//!   SendGrid when settings are configured and silently skipped otherwise.
//!
//! ## Authorization
//!
//! Callers present a session token as `Authorization: Bearer` or as the
//! `account_api_session` cookie. Missing or unknown sessions get `401`, non
//! administrators on admin routes get `403`, both before any business rule runs.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod identity;
pub mod settings;

#[cfg(test)]
mod test_support;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
