//! Postgres-backed identity provider.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{Instrument, Span, info_span};

use super::{
    IdentityProvider, Principal, SortDirection, User, UserPage, UserQuery, hash_session_token,
    normalize_email,
};

#[derive(Clone, Debug)]
pub struct PgIdentityProvider {
    pool: PgPool,
}

impl PgIdentityProvider {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_span(operation: &'static str, statement: &'static str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        two_factor_enabled: row.get("two_factor_enabled"),
    }
}

#[async_trait]
impl IdentityProvider for PgIdentityProvider {
    async fn authenticate(&self, session_token: &str) -> Result<Option<Principal>> {
        let token_hash = hash_session_token(session_token);
        let query = r"
            SELECT users.id, users.email
            FROM user_sessions
            JOIN users ON users.id = user_sessions.user_id
            WHERE user_sessions.session_hash = $1
              AND user_sessions.expires_at > NOW()
            LIMIT 1
        ";
        let row = sqlx::query(query)
            .bind(&token_hash)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup session")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let user_id: String = row.get("id");
        let email: String = row.get("email");

        let query = "SELECT role FROM user_roles WHERE user_id = $1 ORDER BY role";
        let roles = sqlx::query_scalar::<_, String>(query)
            .bind(&user_id)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to load session roles")?;

        Ok(Some(Principal {
            user_id,
            email,
            roles,
        }))
    }

    async fn sign_out(&self, session_token: &str) -> Result<()> {
        // Logout is idempotent; it's fine if no rows are deleted.
        let query = "DELETE FROM user_sessions WHERE session_hash = $1";
        sqlx::query(query)
            .bind(hash_session_token(session_token))
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .context("failed to delete session")?;
        Ok(())
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>> {
        let query = "SELECT id, email, two_factor_enabled FROM users WHERE id = $1";
        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to find user by id")?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let query =
            "SELECT id, email, two_factor_enabled FROM users WHERE normalized_email = $1";
        let row = sqlx::query(query)
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to find user by email")?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn is_in_role(&self, user: &User, role: &str) -> Result<bool> {
        let query = "SELECT 1 FROM user_roles WHERE user_id = $1 AND role = $2";
        let row = sqlx::query(query)
            .bind(&user.id)
            .bind(role)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to check role membership")?;
        Ok(row.is_some())
    }

    async fn add_to_role(&self, user: &User, role: &str) -> Result<()> {
        let query = r"
            INSERT INTO user_roles (user_id, role)
            VALUES ($1, $2)
            ON CONFLICT (user_id, role) DO NOTHING
        ";
        sqlx::query(query)
            .bind(&user.id)
            .bind(role)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await
            .with_context(|| format!("failed to add user to role {role}"))?;
        Ok(())
    }

    async fn remove_from_role(&self, user: &User, role: &str) -> Result<()> {
        let query = "DELETE FROM user_roles WHERE user_id = $1 AND role = $2";
        sqlx::query(query)
            .bind(&user.id)
            .bind(role)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .with_context(|| format!("failed to remove user from role {role}"))?;
        Ok(())
    }

    async fn get_roles(&self, user: &User) -> Result<Vec<String>> {
        let query = "SELECT role FROM user_roles WHERE user_id = $1 ORDER BY role";
        sqlx::query_scalar::<_, String>(query)
            .bind(&user.id)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to load user roles")
    }

    async fn get_two_factor_enabled(&self, user: &User) -> Result<bool> {
        let query = "SELECT two_factor_enabled FROM users WHERE id = $1";
        let enabled = sqlx::query_scalar::<_, bool>(query)
            .bind(&user.id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to load two-factor status")?;
        Ok(enabled.unwrap_or(false))
    }

    async fn delete(&self, user: &User) -> Result<()> {
        // Roles and sessions go with the user via ON DELETE CASCADE.
        let query = "DELETE FROM users WHERE id = $1";
        sqlx::query(query)
            .bind(&user.id)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .context("failed to delete user")?;
        Ok(())
    }

    async fn search(&self, query: &UserQuery) -> Result<UserPage> {
        let filter = query
            .filter_text
            .as_deref()
            .filter(|text| !text.is_empty());

        let count_query = r"
            SELECT COUNT(*)
            FROM users
            WHERE ($1::TEXT IS NULL OR strpos(lower(email), lower($1)) > 0)
        ";
        let total = sqlx::query_scalar::<_, i64>(count_query)
            .bind(filter)
            .fetch_one(&self.pool)
            .instrument(db_span("SELECT", count_query))
            .await
            .context("failed to count users")?;

        // ORDER BY direction cannot be bound, so pick one of two fixed statements.
        let page_query = match query.direction {
            SortDirection::Ascending => {
                r"
                SELECT id, email, two_factor_enabled
                FROM users
                WHERE ($1::TEXT IS NULL OR strpos(lower(email), lower($1)) > 0)
                ORDER BY email ASC
                OFFSET $2
                LIMIT $3
                "
            }
            SortDirection::Descending => {
                r"
                SELECT id, email, two_factor_enabled
                FROM users
                WHERE ($1::TEXT IS NULL OR strpos(lower(email), lower($1)) > 0)
                ORDER BY email DESC
                OFFSET $2
                LIMIT $3
                "
            }
        };
        let rows = sqlx::query(page_query)
            .bind(filter)
            .bind(query.skip.max(0))
            .bind(query.take.max(0))
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", page_query))
            .await
            .context("failed to load user page")?;

        Ok(UserPage {
            total,
            users: rows.iter().map(user_from_row).collect(),
        })
    }

    async fn ensure_role(&self, role: &str) -> Result<()> {
        let query = "INSERT INTO roles (name) VALUES ($1) ON CONFLICT (name) DO NOTHING";
        sqlx::query(query)
            .bind(role)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await
            .with_context(|| format!("failed to ensure role {role}"))?;
        Ok(())
    }
}
