use axum::extract::{Extension, State};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::generation::GenerationPrompt;
use crate::middleware::UserContext;
use crate::models::{Artifact, GenerateArtifact, NewArtifact};

/// POST /ea/generate
/// Generates MQL5 code, then stores the artifact, its license key and an
/// inactive bot status in one transaction.
pub async fn generate_artifact(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Json(input): Json<GenerateArtifact>,
) -> Result<Json<Artifact>> {
    if !ctx.user.can_generate() {
        return Err(AppError::Forbidden(
            "Your account is awaiting approval".into(),
        ));
    }
    input.validate()?;

    let prompt = GenerationPrompt {
        kind: input.kind,
        description: input.description.clone(),
        strategy_details: input.strategy_details.clone(),
    };
    let code = state.generator.generate(&prompt).await?;

    let name = input.display_name();
    let mut conn = state.db.get()?;
    let tx = conn.transaction()?;

    let artifact_id = queries::create_artifact(
        &tx,
        &NewArtifact {
            user_id: &ctx.user.id,
            kind: input.kind,
            name: &name,
            description: &input.description,
            strategy_details: input.strategy_details.as_deref(),
            code: &code,
        },
    )?;
    state.ledger.issue(&tx, &artifact_id)?;
    queries::init_bot_status(&tx, &artifact_id)?;

    let artifact = queries::get_artifact_by_id(&tx, &artifact_id)?
        .ok_or_else(|| AppError::Internal("Failed to fetch created artifact".into()))?;
    tx.commit()?;

    tracing::info!(
        user_id = %ctx.user.id,
        artifact_id = %artifact.id,
        kind = artifact.kind.as_ref(),
        "Artifact generated"
    );
    Ok(Json(artifact))
}

/// GET /ea/list
pub async fn list_artifacts(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
) -> Result<Json<Vec<Artifact>>> {
    let conn = state.db.get()?;
    let artifacts = queries::list_artifacts_for_user(&conn, &ctx.user.id)?;
    Ok(Json(artifacts))
}

/// GET /ea/{ea_id}
pub async fn get_artifact(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(ea_id): Path<String>,
) -> Result<Json<Artifact>> {
    let conn = state.db.get()?;
    let artifact = queries::get_artifact_for_user(&conn, &ea_id, &ctx.user.id)?
        .ok_or_else(|| AppError::NotFound("EA not found".into()))?;
    Ok(Json(artifact))
}

/// DELETE /ea/{ea_id}
/// Assignments and bot status go with the artifact; usage logs stay.
pub async fn delete_artifact(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(ea_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    if !queries::delete_artifact(&conn, &ea_id, &ctx.user.id)? {
        return Err(AppError::NotFound("EA not found".into()));
    }

    tracing::info!(user_id = %ctx.user.id, artifact_id = %ea_id, "Artifact deleted");
    Ok(Json(serde_json::json!({ "deleted": true })))
}
