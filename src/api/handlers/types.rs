use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::identity::SortDirection;
use crate::settings::{KeyChange, MASKED_API_KEY, SettingsUpdate, SystemSettings};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct AccountEmail {
    pub email: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSearchRequest {
    pub filter_text: Option<String>,
    pub page_number: Option<i64>,
    pub page_size: Option<i64>,
    /// Accepted for compatibility; results are always ordered by email.
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_direction: SortDirection,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub is_administrator: bool,
    pub is_self: bool,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSearchResponse {
    pub total_results: i64,
    pub page_number: Option<i64>,
    pub page_size: Option<i64>,
    pub results: Vec<UserSummary>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemSettingsResponse {
    /// Always the masking placeholder, never the stored key.
    pub send_grid_key: String,
    pub send_grid_system_email_address: String,
    pub registration_enabled: bool,
    pub email_domain_restriction: String,
}

impl From<&SystemSettings> for SystemSettingsResponse {
    fn from(settings: &SystemSettings) -> Self {
        Self {
            send_grid_key: MASKED_API_KEY.to_string(),
            send_grid_system_email_address: settings
                .sendgrid_system_email_address
                .clone()
                .unwrap_or_default(),
            registration_enabled: settings.registration_enabled,
            email_domain_restriction: settings.email_domain_restriction.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemSettingsRequest {
    /// Absent: unchanged. `null`: cleared. Placeholder or blank: unchanged.
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub send_grid_key: Option<Option<String>>,
    pub send_grid_system_email_address: Option<String>,
    pub registration_enabled: Option<bool>,
    pub email_domain_restriction: Option<String>,
}

impl From<SystemSettingsRequest> for SettingsUpdate {
    fn from(request: SystemSettingsRequest) -> Self {
        let sendgrid_key = match request.send_grid_key {
            None => KeyChange::Unchanged,
            Some(None) => KeyChange::Clear,
            Some(Some(key)) => KeyChange::Submitted(key),
        };
        Self {
            sendgrid_key,
            sendgrid_system_email_address: request.send_grid_system_email_address,
            registration_enabled: request.registration_enabled,
            email_domain_restriction: request.email_domain_restriction,
        }
    }
}

// Only called when the field is present, so `null` becomes `Some(None)`.
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}
