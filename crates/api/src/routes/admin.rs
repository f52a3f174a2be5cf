//! Administrative endpoints.
//!
//! Consumed by an external command layer; every route requires a caller
//! on the static admin allowlist.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use admission::{ActionKind, ActionRule};
use relay_core::UserId;

use crate::extractors::AdminId;
use crate::response::ApiError;
use crate::service::EngineStats;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VipRequest {
    pub user_id: UserId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VipResponse {
    pub changed: bool,
}

/// POST /admin/vip - exempt a user from rate limiting.
pub async fn add_vip_handler(
    State(state): State<AppState>,
    AdminId(admin): AdminId,
    Json(request): Json<VipRequest>,
) -> Result<Json<VipResponse>, ApiError> {
    let changed = state.service.add_vip(request.user_id);
    info!(admin = admin, user_id = request.user_id, "VIP added");
    Ok(Json(VipResponse { changed }))
}

/// POST /admin/vip/remove - revoke a VIP exemption.
pub async fn remove_vip_handler(
    State(state): State<AppState>,
    AdminId(admin): AdminId,
    Json(request): Json<VipRequest>,
) -> Result<Json<VipResponse>, ApiError> {
    let changed = state.service.remove_vip(request.user_id);
    info!(admin = admin, user_id = request.user_id, "VIP removed");
    Ok(Json(VipResponse { changed }))
}

#[derive(Debug, Deserialize)]
pub struct ResetLimitsRequest {
    pub user_id: UserId,
    /// One kind, or every kind when absent.
    pub kind: Option<ActionKind>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetLimitsResponse {
    pub reset: usize,
}

/// POST /admin/limits/reset - drop a user's rate windows.
pub async fn reset_limits_handler(
    State(state): State<AppState>,
    AdminId(_admin): AdminId,
    Json(request): Json<ResetLimitsRequest>,
) -> Result<Json<ResetLimitsResponse>, ApiError> {
    let reset = state.service.reset_limits(request.user_id, request.kind);
    Ok(Json(ResetLimitsResponse { reset }))
}

#[derive(Debug, Deserialize)]
pub struct ReplaceRuleRequest {
    pub kind: ActionKind,
    pub rule: ActionRule,
}

/// POST /admin/rules/replace - swap in a new rule definition.
pub async fn replace_rule_handler(
    State(state): State<AppState>,
    AdminId(admin): AdminId,
    Json(request): Json<ReplaceRuleRequest>,
) -> Result<axum::http::StatusCode, ApiError> {
    state.service.replace_rule(request.kind, request.rule);
    info!(admin = admin, kind = %request.kind, "Rule replaced");
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ReleaseFlightRequest {
    pub user_id: UserId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReleaseFlightResponse {
    pub released: bool,
}

/// POST /admin/flights/release - clear a stuck flight slot.
pub async fn release_flight_handler(
    State(state): State<AppState>,
    AdminId(admin): AdminId,
    Json(request): Json<ReleaseFlightRequest>,
) -> Result<Json<ReleaseFlightResponse>, ApiError> {
    let released = state.service.release_flight(request.user_id);
    info!(
        admin = admin,
        user_id = request.user_id,
        released = released,
        "Flight release requested"
    );
    Ok(Json(ReleaseFlightResponse { released }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SweepJobsResponse {
    pub evicted: usize,
}

/// POST /admin/jobs/sweep - force the stale-job sweep.
pub async fn sweep_jobs_handler(
    State(state): State<AppState>,
    AdminId(admin): AdminId,
) -> Result<Json<SweepJobsResponse>, ApiError> {
    let evicted = state.service.sweep_stale_jobs();
    info!(admin = admin, evicted = evicted, "Stale-job sweep forced");
    Ok(Json(SweepJobsResponse { evicted }))
}

/// GET /admin/stats - aggregate engine statistics.
pub async fn stats_handler(
    State(state): State<AppState>,
    AdminId(_admin): AdminId,
) -> Result<Json<EngineStats>, ApiError> {
    Ok(Json(state.service.stats()))
}
