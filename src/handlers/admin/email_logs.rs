use axum::extract::State;

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::models::EmailLog;
use crate::pagination::{Paginated, PaginationQuery};

/// GET /admin/email-logs
pub async fn list_email_logs(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Paginated<EmailLog>>> {
    let limit = query.limit();
    let offset = query.offset();

    let conn = state.db.get()?;
    let (logs, total) = queries::list_email_logs_paginated(&conn, limit, offset)?;
    Ok(Json(Paginated::new(logs, total, limit, offset)))
}
