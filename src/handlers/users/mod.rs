mod artifacts;
mod bot;
mod licenses;
mod mt5;

pub use artifacts::*;
pub use bot::*;
pub use licenses::*;
pub use mt5::*;

use axum::{
    Router,
    extract::Extension,
    middleware,
    routing::{get, post},
};

use crate::db::AppState;
use crate::extractors::Json;
use crate::middleware::{UserContext, user_auth};
use crate::models::User;

/// GET /auth/me
pub async fn me(Extension(ctx): Extension<UserContext>) -> Json<User> {
    Json(ctx.user)
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(me))
        // Artifacts
        .route("/ea/generate", post(generate_artifact))
        .route("/ea/list", get(list_artifacts))
        .route("/ea/{ea_id}", get(get_artifact).delete(delete_artifact))
        // Licenses
        .route("/ea/{ea_id}/license/assign", post(assign_license))
        .route("/ea/{ea_id}/license/analytics", get(license_analytics))
        .route("/ea/{ea_id}/license/notify", post(notify_license))
        .route("/license/{license_key}/usage", get(license_usage))
        // Trading accounts and bots
        .route("/mt5/connect", post(connect_mt5_account))
        .route("/mt5/accounts", get(list_mt5_accounts))
        .route("/bot/toggle", post(toggle_bot))
        .route("/bot/status/{ea_id}", get(get_bot_status))
        .layer(middleware::from_fn_with_state(state, user_auth))
}
