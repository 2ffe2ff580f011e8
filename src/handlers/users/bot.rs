use axum::extract::{Extension, State};
use rusqlite::Connection;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::middleware::UserContext;
use crate::models::{BotStatus, ToggleBot};

fn require_owned_artifact(conn: &Connection, ea_id: &str, user_id: &str) -> Result<()> {
    queries::get_artifact_for_user(conn, ea_id, user_id)?
        .ok_or_else(|| AppError::NotFound("EA not found".into()))?;
    Ok(())
}

/// POST /bot/toggle
pub async fn toggle_bot(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Json(input): Json<ToggleBot>,
) -> Result<Json<BotStatus>> {
    let conn = state.db.get()?;
    require_owned_artifact(&conn, &input.ea_id, &ctx.user.id)?;

    let status = queries::set_bot_status(&conn, &input.ea_id, input.is_active)?;
    tracing::info!(artifact_id = %input.ea_id, is_active = input.is_active, "Bot toggled");
    Ok(Json(status))
}

/// GET /bot/status/{ea_id}
/// An artifact without a status row gets an inactive one.
pub async fn get_bot_status(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(ea_id): Path<String>,
) -> Result<Json<BotStatus>> {
    let conn = state.db.get()?;
    require_owned_artifact(&conn, &ea_id, &ctx.user.id)?;

    queries::init_bot_status(&conn, &ea_id)?;
    let status = queries::get_bot_status(&conn, &ea_id)?
        .ok_or_else(|| AppError::Internal("Bot status missing after init".into()))?;
    Ok(Json(status))
}
