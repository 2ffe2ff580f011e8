use axum::extract::State;
use serde::Deserialize;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::models::ValidationResult;

#[derive(Debug, Deserialize)]
pub struct ValidateQuery {
    pub license_key: String,
    pub account_number: Option<String>,
}

/// GET /license/validate
/// Called by deployed Expert Advisors. Unknown and expired keys come back
/// as `valid: false` with a reason, not as errors.
pub async fn validate_license(
    State(state): State<AppState>,
    Query(query): Query<ValidateQuery>,
) -> Result<Json<ValidationResult>> {
    let conn = state.db.get()?;
    let account_number = query
        .account_number
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty());

    let result = state
        .ledger
        .validate(&conn, &query.license_key, account_number)?;

    if !result.valid {
        tracing::debug!(reason = ?result.reason, "License validation rejected");
    }
    Ok(Json(result))
}
