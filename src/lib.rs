pub mod clock;
pub mod config;
pub mod credentials;
pub mod crypto;
pub mod db;
pub mod email;
pub mod error;
pub mod extractors;
pub mod generation;
pub mod handlers;
pub mod jwt;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod util;

use axum::{Router, http::HeaderValue, routing::get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use db::AppState;

/// The full HTTP application, everything mounted under `/api`.
pub fn app(state: AppState, cors_origins: &[String]) -> Router {
    let api = Router::new()
        .merge(handlers::public::router())
        .merge(handlers::users::router(state.clone()))
        .merge(handlers::admin::router(state.clone()));

    let cors = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .route("/api", get(handlers::public::root))
        .route("/api/", get(handlers::public::root))
        .nest("/api", api)
        .layer(cors.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
