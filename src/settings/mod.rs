//! System settings singleton.
//!
//! One row holds the SendGrid credentials, the system "from" address and the
//! registration switches. It is created empty at startup and only changed
//! through the settings update endpoint. The API key never leaves the server:
//! reads return [`MASKED_API_KEY`] instead, and writing the sentinel back is
//! treated as "keep the stored key".

pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

pub use postgres::PgSettingsStore;

/// Placeholder returned instead of the stored API key.
///
/// Clients echo it back unchanged, so its text is part of the wire contract.
pub const MASKED_API_KEY: &str = "--- NOT DISPLAYED FOR SECURITY ---";

#[derive(Clone, Debug, Default)]
pub struct SystemSettings {
    pub sendgrid_key: Option<SecretString>,
    pub sendgrid_system_email_address: Option<String>,
    pub registration_enabled: bool,
    pub email_domain_restriction: String,
}

/// Credentials needed to submit a message, present only when both are non-empty.
#[derive(Clone, Debug)]
pub struct EmailCredentials {
    pub api_key: SecretString,
    pub from_address: String,
}

/// What an update asks for the stored API key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum KeyChange {
    /// Field absent from the payload.
    #[default]
    Unchanged,
    /// Explicit `null`.
    Clear,
    /// A submitted value; the sentinel or a blank string keeps the stored key.
    Submitted(String),
}

/// Incoming settings change. The from-address is always overwritten.
#[derive(Clone, Debug, Default)]
pub struct SettingsUpdate {
    pub sendgrid_key: KeyChange,
    pub sendgrid_system_email_address: Option<String>,
    pub registration_enabled: Option<bool>,
    pub email_domain_restriction: Option<String>,
}

impl SystemSettings {
    /// Return the SendGrid credentials if email sending is configured.
    #[must_use]
    pub fn email_credentials(&self) -> Option<EmailCredentials> {
        let api_key = self
            .sendgrid_key
            .as_ref()
            .filter(|key| !key.expose_secret().is_empty())?;
        let from_address = self
            .sendgrid_system_email_address
            .as_deref()
            .filter(|address| !address.is_empty())?;
        Some(EmailCredentials {
            api_key: api_key.clone(),
            from_address: from_address.to_string(),
        })
    }

    /// Recovery flows (password reset, email change) need working email.
    #[must_use]
    pub fn recovery_allowed(&self) -> bool {
        self.email_credentials().is_some()
    }

    pub fn apply(&mut self, update: SettingsUpdate) {
        match update.sendgrid_key {
            KeyChange::Unchanged => {}
            KeyChange::Clear => self.sendgrid_key = None,
            KeyChange::Submitted(key) => {
                let trimmed = key.trim();
                if trimmed != MASKED_API_KEY && !trimmed.is_empty() {
                    self.sendgrid_key = Some(SecretString::from(key));
                }
            }
        }

        self.sendgrid_system_email_address = update.sendgrid_system_email_address;

        if let Some(enabled) = update.registration_enabled {
            self.registration_enabled = enabled;
        }
        if let Some(restriction) = update.email_domain_restriction {
            self.email_domain_restriction = restriction;
        }
    }
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Load the singleton row, `None` if it was never created.
    async fn load(&self) -> Result<Option<SystemSettings>>;

    async fn save(&self, settings: &SystemSettings) -> Result<()>;

    /// Create the row with empty defaults if it is missing.
    async fn ensure_exists(&self) -> Result<()>;
}
