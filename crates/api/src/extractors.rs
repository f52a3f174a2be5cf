//! Request extractors.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use relay_core::UserId;

use crate::response::ApiError;
use crate::state::AppState;

/// Authenticated admin identity from the `X-Admin-Id` header.
///
/// Admin routes are gated by the static allowlist; anything else about
/// the caller is the transport layer's problem.
#[derive(Debug, Clone, Copy)]
pub struct AdminId(pub UserId);

#[async_trait]
impl FromRequestParts<AppState> for AdminId {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let admin_id: UserId = parts
            .headers
            .get("X-Admin-Id")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| ApiError::forbidden("Missing or malformed X-Admin-Id header"))?;

        if !state.service.is_admin(admin_id) {
            return Err(ApiError::forbidden("Not an administrator"));
        }

        Ok(AdminId(admin_id))
    }
}
