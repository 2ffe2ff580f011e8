use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::db::{AppState, queries};
use crate::models::{User, UserStatus};
use crate::util::extract_bearer_token;

/// The authenticated caller, inserted as a request extension.
#[derive(Clone)]
pub struct UserContext {
    pub user: User,
}

/// Resolve the bearer token to a live, non-suspended user.
fn authenticate_user(state: &AppState, headers: &HeaderMap) -> Result<User, StatusCode> {
    let token = extract_bearer_token(headers).ok_or(StatusCode::UNAUTHORIZED)?;
    let claims = state
        .tokens
        .verify(token)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    // Token may outlive the account
    let user = queries::get_user_by_id(&conn, &claims.user_id)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if matches!(user.status, UserStatus::Suspended) {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(user)
}

pub async fn user_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let user = authenticate_user(&state, request.headers())?;
    request.extensions_mut().insert(UserContext { user });
    Ok(next.run(request).await)
}

pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let user = authenticate_user(&state, request.headers())?;
    if !user.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }
    request.extensions_mut().insert(UserContext { user });
    Ok(next.run(request).await)
}
