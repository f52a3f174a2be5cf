//! Submit and pagination endpoints.
//!
//! These handlers are the seam a chat transport calls: they validate the
//! inbound payload, hand it to the relay service, and map typed failures
//! to stable error codes. Delivery itself (sending, editing, deleting
//! messages) stays on the transport side.

use axum::{extract::State, http::StatusCode, Json};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

use admission::ActionKind;
use paginate::{Direction, PageView};
use relay_core::limits::{MAX_CAPTION_LEN, MAX_IMAGE_BYTES, MAX_TEXT_LEN};
use relay_core::{ChatId, ImageJob, ImagePayload, MessageId, UserId};

use crate::response::{ApiError, ReplyResponse};
use crate::state::AppState;

/// POST /v1/text request payload.
#[derive(Debug, Deserialize, Validate)]
pub struct TextRequest {
    pub user_id: UserId,
    pub chat_id: ChatId,
    #[validate(length(min = 1, max = 4096))]
    pub text: String,
    pub model: Option<String>,
}

/// POST /v1/text - run a text completion.
pub async fn text_handler(
    State(state): State<AppState>,
    Json(request): Json<TextRequest>,
) -> Result<Json<ReplyResponse>, ApiError> {
    request
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let reply = state
        .service
        .submit_text(
            request.user_id,
            request.chat_id,
            request.text,
            request.model.as_deref(),
        )
        .await?;

    Ok(Json(reply.into()))
}

/// POST /v1/image request payload.
///
/// The transport has already fetched and validated the file; the payload
/// arrives as base64 plus its media type.
#[derive(Debug, Deserialize, Validate)]
pub struct ImageRequest {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub file_id: String,
    #[validate(length(max = 1024))]
    pub caption: Option<String>,
    pub mime: String,
    pub data_base64: String,
    pub model: Option<String>,
}

/// POST /v1/image - run an image-analysis job.
pub async fn image_handler(
    State(state): State<AppState>,
    Json(request): Json<ImageRequest>,
) -> Result<Json<ReplyResponse>, ApiError> {
    request
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let data = BASE64
        .decode(&request.data_base64)
        .map_err(|e| ApiError::bad_request(format!("Invalid base64 image payload: {}", e)))?;

    if data.len() > MAX_IMAGE_BYTES {
        return Err(ApiError::bad_request(format!(
            "Image payload {}KB exceeds {}KB limit",
            data.len() / 1024,
            MAX_IMAGE_BYTES / 1024
        )));
    }

    debug!(
        user_id = request.user_id,
        file_id = %request.file_id,
        payload_bytes = data.len(),
        "Received image submission"
    );

    let job = ImageJob::new(
        request.user_id,
        request.chat_id,
        request.message_id,
        request.file_id,
        request.caption,
        ImagePayload::new(data, request.mime),
    );

    let reply = state
        .service
        .submit_image(job, request.model.as_deref())
        .await?;

    Ok(Json(reply.into()))
}

/// POST /v1/actions/check request payload.
#[derive(Debug, Deserialize)]
pub struct ActionCheckRequest {
    pub user_id: UserId,
    pub kind: ActionKind,
}

/// POST /v1/actions/check - rate-check a light transport-side action.
pub async fn action_check_handler(
    State(state): State<AppState>,
    Json(request): Json<ActionCheckRequest>,
) -> Result<StatusCode, ApiError> {
    state.service.check_action(request.user_id, request.kind)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/history/clear request payload.
#[derive(Debug, Deserialize)]
pub struct ClearHistoryRequest {
    pub user_id: UserId,
}

/// POST /v1/history/clear - forget a user's conversation history.
pub async fn clear_history_handler(
    State(state): State<AppState>,
    Json(request): Json<ClearHistoryRequest>,
) -> StatusCode {
    state.service.clear_history(request.user_id).await;
    StatusCode::NO_CONTENT
}

/// POST /v1/pages/register request payload.
#[derive(Debug, Deserialize)]
pub struct RegisterPagesRequest {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub pages: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterPagesResponse {
    pub tracked: bool,
}

/// POST /v1/pages/register - track a delivered multi-page reply.
pub async fn register_pages_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterPagesRequest>,
) -> Json<RegisterPagesResponse> {
    let tracked =
        state
            .service
            .register_pages(request.chat_id, request.message_id, request.pages);
    Json(RegisterPagesResponse { tracked })
}

/// POST /v1/pages/navigate request payload.
#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub direction: Direction,
}

/// POST /v1/pages/navigate - move a pagination cursor.
pub async fn navigate_handler(
    State(state): State<AppState>,
    Json(request): Json<NavigateRequest>,
) -> Result<Json<PageView>, ApiError> {
    let view = state
        .service
        .navigate(request.chat_id, request.message_id, request.direction)?;
    Ok(Json(view))
}

/// POST /v1/pages/drop request payload.
#[derive(Debug, Deserialize)]
pub struct DropPagesRequest {
    pub chat_id: ChatId,
    /// Specific message, or the whole chat when absent.
    pub message_id: Option<MessageId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DropPagesResponse {
    pub dropped: usize,
}

/// POST /v1/pages/drop - forget pagination state.
pub async fn drop_pages_handler(
    State(state): State<AppState>,
    Json(request): Json<DropPagesRequest>,
) -> Json<DropPagesResponse> {
    let dropped = match request.message_id {
        Some(message_id) => usize::from(state.service.drop_pages(request.chat_id, message_id)),
        None => state.service.clear_chat_pages(request.chat_id),
    };
    Json(DropPagesResponse { dropped })
}

// Field bounds above mirror the shared constants; the validator derive
// needs literals, keep them in sync.
const _: [(); MAX_TEXT_LEN] = [(); 4096];
const _: [(); MAX_CAPTION_LEN] = [(); 1024];
