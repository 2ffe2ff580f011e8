use axum::extract::{Extension, State};
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::email::Notification;
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::middleware::UserContext;
use crate::models::{User, UserStatus};
use crate::pagination::{Paginated, PaginationQuery};

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    /// Filter by account status
    pub status: Option<UserStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /admin/users
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Paginated<User>>> {
    let pagination = PaginationQuery {
        limit: query.limit,
        offset: query.offset,
    };
    let limit = pagination.limit();
    let offset = pagination.offset();

    let conn = state.db.get()?;
    let (users, total) = queries::list_users_paginated(&conn, query.status, limit, offset)?;
    Ok(Json(Paginated::new(users, total, limit, offset)))
}

/// Set a user's status and return the updated row.
fn change_status(state: &AppState, id: &str, status: UserStatus) -> Result<User> {
    let conn = state.db.get()?;
    if !queries::update_user_status(&conn, id, status)? {
        return Err(AppError::NotFound("User not found".into()));
    }
    queries::get_user_by_id(&conn, id)?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// Notification failures are logged; the status change stands.
async fn notify(state: &AppState, user: &User, notification: Notification) {
    if let Err(e) = state.email.send(&user.email, &notification).await {
        tracing::warn!(user_id = %user.id, error = %e, "Failed to send account notification");
    }
}

/// POST /admin/users/{id}/approve
pub async fn approve_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<Json<User>> {
    let user = change_status(&state, &id, UserStatus::Approved)?;
    tracing::info!(admin_id = %ctx.user.id, user_id = %user.id, "User approved");

    let notification = Notification::AccountApproved {
        name: user.name.clone(),
    };
    notify(&state, &user, notification).await;
    Ok(Json(user))
}

/// POST /admin/users/{id}/suspend
pub async fn suspend_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<Json<User>> {
    if id == ctx.user.id {
        return Err(AppError::BadRequest("You cannot suspend your own account".into()));
    }

    let user = change_status(&state, &id, UserStatus::Suspended)?;
    tracing::info!(admin_id = %ctx.user.id, user_id = %user.id, "User suspended");

    let notification = Notification::AccountSuspended {
        name: user.name.clone(),
    };
    notify(&state, &user, notification).await;
    Ok(Json(user))
}
