//! Identity provider seam.
//!
//! Users, role memberships, two-factor flags and sessions are owned by the
//! identity layer. Handlers only talk to it through [`IdentityProvider`] so the
//! storage backend can be swapped (Postgres in production, in-memory in tests).
//! Password hashing and token issuance are not part of this crate.

pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, de};
use sha2::{Digest, Sha256};
use std::fmt;
use utoipa::ToSchema;

pub use postgres::PgIdentityProvider;

/// Role granting access to the administrative endpoints.
pub const ADMINISTRATOR_ROLE: &str = "Administrator";

/// A user record as seen by this API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub two_factor_enabled: bool,
}

/// Authenticated caller resolved from a session token.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: String,
    pub email: String,
    pub roles: Vec<String>,
}

impl Principal {
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|assigned| assigned == role)
    }

    #[must_use]
    pub fn is_administrator(&self) -> bool {
        self.has_role(ADMINISTRATOR_ROLE)
    }
}

/// Ordering applied to user search results.
///
/// Accepts the numeric wire form (`1` ascending, `-1` descending) as well as
/// the variant names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ToSchema)]
pub enum SortDirection {
    Descending,
    #[default]
    Ascending,
}

impl<'de> Deserialize<'de> for SortDirection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DirectionVisitor;

        impl de::Visitor<'_> for DirectionVisitor {
            type Value = SortDirection;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("1, -1, \"Ascending\" or \"Descending\"")
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<SortDirection, E> {
                match value {
                    1 => Ok(SortDirection::Ascending),
                    -1 => Ok(SortDirection::Descending),
                    other => Err(E::invalid_value(de::Unexpected::Signed(other), &self)),
                }
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<SortDirection, E> {
                match value {
                    1 => Ok(SortDirection::Ascending),
                    other => Err(E::invalid_value(de::Unexpected::Unsigned(other), &self)),
                }
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<SortDirection, E> {
                if value.eq_ignore_ascii_case("ascending") {
                    Ok(SortDirection::Ascending)
                } else if value.eq_ignore_ascii_case("descending") {
                    Ok(SortDirection::Descending)
                } else {
                    Err(E::invalid_value(de::Unexpected::Str(value), &self))
                }
            }
        }

        deserializer.deserialize_any(DirectionVisitor)
    }
}

/// Filtered, email-ordered, paginated user scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserQuery {
    /// Case-insensitive substring matched against the email; `None` matches all.
    pub filter_text: Option<String>,
    pub direction: SortDirection,
    pub skip: i64,
    pub take: i64,
}

/// One page of users plus the unpaged match count.
#[derive(Clone, Debug, Default)]
pub struct UserPage {
    pub total: i64,
    pub users: Vec<User>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a raw session token into a principal, `None` if unknown or expired.
    async fn authenticate(&self, session_token: &str) -> Result<Option<Principal>>;

    /// Invalidate the session behind the token. Unknown tokens are not an error.
    async fn sign_out(&self, session_token: &str) -> Result<()>;

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn is_in_role(&self, user: &User, role: &str) -> Result<bool>;

    async fn add_to_role(&self, user: &User, role: &str) -> Result<()>;

    async fn remove_from_role(&self, user: &User, role: &str) -> Result<()>;

    async fn get_roles(&self, user: &User) -> Result<Vec<String>>;

    async fn get_two_factor_enabled(&self, user: &User) -> Result<bool>;

    async fn delete(&self, user: &User) -> Result<()>;

    async fn search(&self, query: &UserQuery) -> Result<UserPage>;

    /// Create the role if it does not exist yet.
    async fn ensure_role(&self, role: &str) -> Result<()>;
}

/// Lookup key for emails: trimmed and lowercased.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Sessions are stored by hash only; the raw token never reaches the database.
#[must_use]
pub fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn hash_session_token_is_stable_sha256() {
        let first = hash_session_token("token");
        let second = hash_session_token("token");
        assert_eq!(first, second);
        assert_eq!(first.len(), 32);
        assert_ne!(first, hash_session_token("other"));
    }

    #[test]
    fn principal_administrator_check() {
        let principal = Principal {
            user_id: "U1".to_string(),
            email: "u1@example.com".to_string(),
            roles: vec!["Reader".to_string(), ADMINISTRATOR_ROLE.to_string()],
        };
        assert!(principal.is_administrator());

        let plain = Principal {
            roles: Vec::new(),
            ..principal
        };
        assert!(!plain.is_administrator());
    }

    #[test]
    fn sort_direction_accepts_numeric_and_names() -> Result<()> {
        let ascending: SortDirection = serde_json::from_str("1")?;
        let descending: SortDirection = serde_json::from_str("-1")?;
        let named: SortDirection = serde_json::from_str("\"Descending\"")?;
        assert_eq!(ascending, SortDirection::Ascending);
        assert_eq!(descending, SortDirection::Descending);
        assert_eq!(named, SortDirection::Descending);
        assert!(serde_json::from_str::<SortDirection>("0").is_err());
        assert!(serde_json::from_str::<SortDirection>("\"sideways\"").is_err());
        Ok(())
    }
}
