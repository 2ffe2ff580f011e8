use axum::extract::State;
use serde::Serialize;

use crate::db::AppState;
use crate::email::Notification;
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::models::{LoginUser, RegisterUser, User, UserStatus};

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: User,
}

impl TokenResponse {
    fn bearer(access_token: String, user: User) -> Self {
        Self {
            access_token,
            token_type: "bearer",
            user,
        }
    }
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterUser>,
) -> Result<Json<TokenResponse>> {
    let user = state.credentials.register(&input).await?;
    let token = state.tokens.issue(&user.id)?;

    // A failed welcome email never fails the registration
    let welcome = Notification::Welcome {
        name: user.name.clone(),
    };
    if let Err(e) = state.email.send(&user.email, &welcome).await {
        tracing::warn!(user_id = %user.id, error = %e, "Failed to send welcome email");
    }

    Ok(Json(TokenResponse::bearer(token, user)))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginUser>,
) -> Result<Json<TokenResponse>> {
    let user = state
        .credentials
        .authenticate(&input.email, &input.password)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".into()))?;

    if matches!(user.status, UserStatus::Suspended) {
        return Err(AppError::Forbidden("Account suspended".into()));
    }

    let token = state.tokens.issue(&user.id)?;
    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(TokenResponse::bearer(token, user)))
}
