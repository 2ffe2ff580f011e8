use axum::extract::{Extension, State};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::middleware::UserContext;
use crate::models::{ConnectMt5Account, Mt5Account};

/// POST /mt5/connect
/// The trading password is sealed with the master key before it is stored.
pub async fn connect_mt5_account(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Json(input): Json<ConnectMt5Account>,
) -> Result<Json<Mt5Account>> {
    input.validate()?;
    let account_number = input.account_number.trim();
    let server = input.server.trim();

    let conn = state.db.get()?;
    if queries::get_mt5_account(&conn, &ctx.user.id, account_number)?.is_some() {
        return Err(AppError::BadRequest("MT5 account already connected".into()));
    }

    let context = Mt5Account::encryption_context(&ctx.user.id, account_number);
    let sealed = state
        .master_key
        .encrypt(&context, input.password.as_bytes())?;

    let account = match queries::create_mt5_account(&conn, &ctx.user.id, account_number, server, &sealed) {
        Ok(account) => account,
        Err(e) if queries::is_unique_violation(&e) => {
            return Err(AppError::BadRequest("MT5 account already connected".into()));
        }
        Err(e) => return Err(e),
    };

    tracing::info!(user_id = %ctx.user.id, account_id = %account.id, "MT5 account connected");
    Ok(Json(account))
}

/// GET /mt5/accounts
pub async fn list_mt5_accounts(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
) -> Result<Json<Vec<Mt5Account>>> {
    let conn = state.db.get()?;
    let accounts = queries::list_mt5_accounts_for_user(&conn, &ctx.user.id)?;
    Ok(Json(accounts))
}
