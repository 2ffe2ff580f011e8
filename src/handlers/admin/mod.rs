mod email_logs;
mod users;

pub use email_logs::*;
pub use users::*;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::db::AppState;
use crate::middleware::require_admin;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/{id}/approve", post(approve_user))
        .route("/admin/users/{id}/suspend", post(suspend_user))
        .route("/admin/email-logs", get(list_email_logs))
        .layer(middleware::from_fn_with_state(state, require_admin))
}
