//! Startup seeding.
//!
//! Runs once before the listener binds: the `Administrator` role must exist,
//! the system settings row must exist, and an optional bootstrap email is
//! promoted so a fresh deployment has someone who can reach the admin routes.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::identity::{ADMINISTRATOR_ROLE, IdentityProvider};
use crate::settings::SettingsStore;

/// Seed roles, settings and the optional bootstrap administrator.
///
/// An unknown bootstrap email is logged and skipped; it is not an error.
///
/// # Errors
/// Returns an error if any store call fails.
pub async fn run(
    identity: &dyn IdentityProvider,
    settings: &dyn SettingsStore,
    bootstrap_admin_email: Option<&str>,
) -> Result<()> {
    identity
        .ensure_role(ADMINISTRATOR_ROLE)
        .await
        .context("Failed to ensure administrator role")?;

    settings
        .ensure_exists()
        .await
        .context("Failed to ensure system settings row")?;

    let Some(email) = bootstrap_admin_email else {
        return Ok(());
    };

    let Some(user) = identity.find_by_email(email).await? else {
        warn!(email, "bootstrap administrator account not found, skipping");
        return Ok(());
    };

    if identity.is_in_role(&user, ADMINISTRATOR_ROLE).await? {
        return Ok(());
    }

    identity
        .add_to_role(&user, ADMINISTRATOR_ROLE)
        .await
        .context("Failed to promote bootstrap administrator")?;
    info!(user_id = %user.id, "bootstrap administrator promoted");

    Ok(())
}
