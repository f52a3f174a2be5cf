//! API routes.

pub mod admin;
pub mod chat;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/text", post(chat::text_handler))
        .route("/v1/image", post(chat::image_handler))
        .route("/v1/actions/check", post(chat::action_check_handler))
        .route("/v1/history/clear", post(chat::clear_history_handler))
        .route("/v1/pages/register", post(chat::register_pages_handler))
        .route("/v1/pages/navigate", post(chat::navigate_handler))
        .route("/v1/pages/drop", post(chat::drop_pages_handler))
        .route("/admin/vip", post(admin::add_vip_handler))
        .route("/admin/vip/remove", post(admin::remove_vip_handler))
        .route("/admin/limits/reset", post(admin::reset_limits_handler))
        .route("/admin/rules/replace", post(admin::replace_rule_handler))
        .route("/admin/flights/release", post(admin::release_flight_handler))
        .route("/admin/jobs/sweep", post(admin::sweep_jobs_handler))
        .route("/admin/stats", get(admin::stats_handler))
        .route("/health", get(health::health_handler))
        .route("/health/ready", get(health::ready_handler))
        .route("/health/live", get(health::live_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
