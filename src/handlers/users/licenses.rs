use axum::extract::{Extension, State};
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::email::{EmailSendResult, Notification};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::ledger::normalize_key;
use crate::middleware::UserContext;
use crate::models::{AssignLicense, LicenseAnalytics, LicenseAssignment, UsageHistory};

/// POST /ea/{ea_id}/license/assign
pub async fn assign_license(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(ea_id): Path<String>,
    Json(input): Json<AssignLicense>,
) -> Result<Json<LicenseAssignment>> {
    if input.customer_name.trim().is_empty() || !input.customer_email.contains('@') {
        return Err(AppError::BadRequest(
            "Customer name and a valid customer email are required".into(),
        ));
    }
    if input.purchase_amount.is_some_and(|amount| amount < 0.0) {
        return Err(AppError::BadRequest("Purchase amount cannot be negative".into()));
    }

    let conn = state.db.get()?;
    let assignment = state.ledger.assign(&conn, &ctx.user.id, &ea_id, &input)?;
    Ok(Json(assignment))
}

/// GET /ea/{ea_id}/license/analytics
pub async fn license_analytics(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(ea_id): Path<String>,
) -> Result<Json<LicenseAnalytics>> {
    let conn = state.db.get()?;
    let analytics = state.ledger.analytics(&conn, &ctx.user.id, &ea_id)?;
    Ok(Json(analytics))
}

#[derive(Debug, Deserialize)]
pub struct NotifyLicense {
    pub license_key: String,
}

#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    pub recipient: String,
    pub result: EmailSendResult,
}

/// POST /ea/{ea_id}/license/notify
/// Email the license key to the customer it is assigned to.
pub async fn notify_license(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(ea_id): Path<String>,
    Json(input): Json<NotifyLicense>,
) -> Result<Json<NotifyResponse>> {
    let (artifact, assignment) = {
        let conn = state.db.get()?;
        let artifact = queries::get_artifact_for_user(&conn, &ea_id, &ctx.user.id)?
            .ok_or_else(|| AppError::NotFound("EA not found".into()))?;
        let assignment = queries::get_assignment_by_key(&conn, normalize_key(&input.license_key))?
            .filter(|a| a.artifact_id == artifact.id)
            .ok_or_else(|| AppError::NotFound("License assignment not found".into()))?;
        (artifact, assignment)
    };

    let notification = Notification::LicenseAssigned {
        customer_name: assignment.customer_name,
        ea_name: artifact.name,
        license_key: assignment.license_key,
        expiration_date: assignment.expiration_date,
    };
    let result = state
        .email
        .send(&assignment.customer_email, &notification)
        .await?;

    Ok(Json(NotifyResponse {
        recipient: assignment.customer_email,
        result,
    }))
}

/// GET /license/{license_key}/usage
pub async fn license_usage(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(license_key): Path<String>,
) -> Result<Json<UsageHistory>> {
    let conn = state.db.get()?;
    let history = state
        .ledger
        .usage_history(&conn, &license_key, &ctx.user.id)?;
    Ok(Json(history))
}
