//! Image-analysis job model.
//!
//! A job is created once an image message passes admission and destroyed
//! when its processing future settles. The job key is the duplicate guard:
//! two in-flight jobs may never share one.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::{ContentBlock, Conversation, Role, Turn};
use crate::{ChatId, MessageId, UserId};

/// Default instruction when an image arrives without a caption.
pub const DEFAULT_IMAGE_PROMPT: &str = "Describe this image.";

/// Decoded image content plus its media type.
///
/// Fetching and format/size validation are the transport's job; by the time
/// a payload reaches the pipeline it is known-good.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub data: Bytes,
    pub mime: String,
}

impl ImagePayload {
    pub fn new(data: impl Into<Bytes>, mime: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime: mime.into(),
        }
    }

    /// Encodes the payload as a base64 data URL for the upstream wire.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, BASE64.encode(&self.data))
    }
}

/// Synthetic job identity: user + originating message + submission instant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
    pub user_id: UserId,
    pub message_id: MessageId,
    pub submitted_at_ms: i64,
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.user_id, self.message_id, self.submitted_at_ms
        )
    }
}

/// One unit of image-analysis work for the bounded pool.
#[derive(Debug, Clone)]
pub struct ImageJob {
    pub id: Uuid,
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub message_id: MessageId,
    /// Transport-side file reference, kept for log correlation.
    pub file_id: String,
    pub caption: Option<String>,
    pub payload: ImagePayload,
    pub submitted_at: DateTime<Utc>,
}

impl ImageJob {
    pub fn new(
        user_id: UserId,
        chat_id: ChatId,
        message_id: MessageId,
        file_id: impl Into<String>,
        caption: Option<String>,
        payload: ImagePayload,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            chat_id,
            message_id,
            file_id: file_id.into(),
            caption,
            payload,
            submitted_at: Utc::now(),
        }
    }

    pub fn key(&self) -> JobKey {
        JobKey {
            user_id: self.user_id,
            message_id: self.message_id,
            submitted_at_ms: self.submitted_at.timestamp_millis(),
        }
    }

    /// Builds the upstream conversation for this job.
    pub fn to_conversation(&self, system_prompt: Option<&str>) -> Conversation {
        let mut conv = match system_prompt {
            Some(prompt) => Conversation::with_system(prompt),
            None => Conversation::new(),
        };

        let instruction = self
            .caption
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(DEFAULT_IMAGE_PROMPT);

        conv.push(Turn::blocks(
            Role::User,
            vec![
                ContentBlock::Text(instruction.to_string()),
                ContentBlock::ImageUrl(self.payload.to_data_url()),
            ],
        ));

        conv
    }
}
