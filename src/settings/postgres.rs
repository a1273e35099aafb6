//! Postgres-backed settings store (single row pinned to `id = 1`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::{PgPool, Row};
use tracing::{Instrument, info_span};

use super::{SettingsStore, SystemSettings};

#[derive(Clone, Debug)]
pub struct PgSettingsStore {
    pool: PgPool,
}

impl PgSettingsStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for PgSettingsStore {
    async fn load(&self) -> Result<Option<SystemSettings>> {
        let query = r"
            SELECT sendgrid_key,
                   sendgrid_system_email_address,
                   registration_enabled,
                   email_domain_restriction
            FROM system_settings
            WHERE id = 1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to load system settings")?;

        Ok(row.map(|row| SystemSettings {
            sendgrid_key: row
                .get::<Option<String>, _>("sendgrid_key")
                .map(SecretString::from),
            sendgrid_system_email_address: row.get("sendgrid_system_email_address"),
            registration_enabled: row.get("registration_enabled"),
            email_domain_restriction: row.get("email_domain_restriction"),
        }))
    }

    async fn save(&self, settings: &SystemSettings) -> Result<()> {
        let query = r"
            UPDATE system_settings
            SET sendgrid_key = $1,
                sendgrid_system_email_address = $2,
                registration_enabled = $3,
                email_domain_restriction = $4
            WHERE id = 1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(
                settings
                    .sendgrid_key
                    .as_ref()
                    .map(|key| key.expose_secret().to_string()),
            )
            .bind(settings.sendgrid_system_email_address.as_deref())
            .bind(settings.registration_enabled)
            .bind(&settings.email_domain_restriction)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update system settings")?;
        Ok(())
    }

    async fn ensure_exists(&self) -> Result<()> {
        let query = "INSERT INTO system_settings (id) VALUES (1) ON CONFLICT (id) DO NOTHING";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to create system settings row")?;
        Ok(())
    }
}
