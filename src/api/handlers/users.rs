//! Administrative user management endpoints.
//!
//! Flow Overview:
//! 1) Authenticate the request and require the `Administrator` role.
//! 2) Reject operations an administrator may not apply to themselves.
//! 3) Mutate or list users through the identity provider.

use axum::{
    Json,
    extract::{Extension, Path, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
};
use tracing::{debug, info};

use super::{
    Identity, ServiceError, USER_NOT_FOUND,
    principal::require_admin,
    types::{UserSearchRequest, UserSearchResponse, UserSummary},
};
use crate::identity::{ADMINISTRATOR_ROLE, UserQuery};

pub const DEFAULT_PAGE_SIZE: i64 = 15;

#[utoipa::path(
    get,
    path = "/api/v1/user/{userId}/role/administrator",
    params(
        ("userId" = String, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "Administrator membership flipped."),
        (status = 400, description = "Caller targeted themselves.", body = String),
        (status = 401, description = "Missing or invalid session."),
        (status = 403, description = "Caller is not an administrator."),
        (status = 404, description = "User not found.", body = String),
    ),
    tag = "users"
)]
pub async fn toggle_administrator(
    Path(user_id): Path<String>,
    headers: HeaderMap,
    identity: Extension<Identity>,
) -> Result<StatusCode, ServiceError> {
    let principal = require_admin(&headers, identity.as_ref()).await?;

    if user_id == principal.user_id {
        return Err(ServiceError::BadRequest(
            "You cannot toggle your own administrative role",
        ));
    }

    let user = identity
        .find_by_id(&user_id)
        .await?
        .ok_or(ServiceError::NotFound(USER_NOT_FOUND))?;

    if identity.is_in_role(&user, ADMINISTRATOR_ROLE).await? {
        identity.remove_from_role(&user, ADMINISTRATOR_ROLE).await?;
        info!(user_id = %user.id, by = %principal.user_id, "administrator role revoked");
    } else {
        identity.add_to_role(&user, ADMINISTRATOR_ROLE).await?;
        info!(user_id = %user.id, by = %principal.user_id, "administrator role granted");
    }

    Ok(StatusCode::OK)
}

#[utoipa::path(
    delete,
    path = "/api/v1/user/{userId}",
    params(
        ("userId" = String, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "User deleted, or already absent."),
        (status = 400, description = "Cannot delete this account.", body = String),
        (status = 401, description = "Missing or invalid session."),
        (status = 403, description = "Caller is not an administrator."),
    ),
    tag = "users"
)]
pub async fn delete_user(
    Path(user_id): Path<String>,
    headers: HeaderMap,
    identity: Extension<Identity>,
) -> Result<StatusCode, ServiceError> {
    let principal = require_admin(&headers, identity.as_ref()).await?;

    if user_id == principal.user_id {
        return Err(ServiceError::BadRequest("Cannot delete this account."));
    }

    if let Some(user) = identity.find_by_id(&user_id).await? {
        identity.delete(&user).await?;
        info!(user_id = %user.id, by = %principal.user_id, "user deleted");
    }

    Ok(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = UserSearchRequest,
    responses(
        (status = 200, description = "One page of users ordered by email.", body = UserSearchResponse),
        (status = 401, description = "Missing or invalid session."),
        (status = 403, description = "Caller is not an administrator."),
    ),
    tag = "users"
)]
pub async fn search_users(
    headers: HeaderMap,
    identity: Extension<Identity>,
    payload: Result<Json<UserSearchRequest>, JsonRejection>,
) -> Result<Json<UserSearchResponse>, ServiceError> {
    let principal = require_admin(&headers, identity.as_ref()).await?;
    let Json(request) = payload?;

    debug!(
        sort_by = request.sort_by.as_deref().unwrap_or("Email"),
        direction = ?request.sort_direction,
        "searching users"
    );

    let query = page_query(&request);
    let page = identity.search(&query).await?;

    let mut results = Vec::with_capacity(page.users.len());
    for user in page.users {
        let is_administrator = identity.is_in_role(&user, ADMINISTRATOR_ROLE).await?;
        results.push(UserSummary {
            is_self: user.id == principal.user_id,
            id: user.id,
            email: user.email,
            is_administrator,
        });
    }

    Ok(Json(UserSearchResponse {
        total_results: page.total,
        page_number: request.page_number,
        page_size: request.page_size,
        results,
    }))
}

/// skip = pageNumber × pageSize, take = pageSize; negatives count as zero.
fn page_query(request: &UserSearchRequest) -> UserQuery {
    let page_number = request.page_number.unwrap_or(0).max(0);
    let page_size = request.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(0);

    UserQuery {
        filter_text: request.filter_text.clone(),
        direction: request.sort_direction,
        skip: page_number.saturating_mul(page_size),
        take: page_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SortDirection;

    #[test]
    fn page_query_defaults() {
        let query = page_query(&UserSearchRequest::default());
        assert_eq!(query.skip, 0);
        assert_eq!(query.take, DEFAULT_PAGE_SIZE);
        assert_eq!(query.direction, SortDirection::Ascending);
        assert!(query.filter_text.is_none());
    }

    #[test]
    fn page_query_multiplies_page_by_size() {
        let query = page_query(&UserSearchRequest {
            page_number: Some(3),
            page_size: Some(10),
            ..UserSearchRequest::default()
        });
        assert_eq!(query.skip, 30);
        assert_eq!(query.take, 10);
    }

    #[test]
    fn page_query_clamps_negative_and_huge_values() {
        let query = page_query(&UserSearchRequest {
            page_number: Some(-2),
            page_size: Some(-5),
            ..UserSearchRequest::default()
        });
        assert_eq!(query.skip, 0);
        assert_eq!(query.take, 0);

        let query = page_query(&UserSearchRequest {
            page_number: Some(i64::MAX),
            page_size: Some(i64::MAX),
            ..UserSearchRequest::default()
        });
        assert_eq!(query.skip, i64::MAX);
    }
}
