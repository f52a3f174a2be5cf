//! Wire types for the completion API.
//!
//! Requests carry a conversation as ordered role/content messages; content
//! is a plain string or a typed block sequence. Responses must match the
//! `{choices: [{message: {role, content}}]}` shape exactly; anything else
//! fails extraction with a descriptive error.

use serde::{Deserialize, Serialize};

use relay_core::{Content, ContentBlock, Conversation, Error, Result, Role};

// === Request ===

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireMessage {
    pub role: &'static str,
    pub content: WireContent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum WireContent {
    Text(String),
    Parts(Vec<WirePart>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WirePart {
    Text { text: String },
    ImageUrl { image_url: ImageUrlRef },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrlRef {
    pub url: String,
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

impl ChatRequest {
    pub fn from_conversation(
        conversation: &Conversation,
        model: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        let messages = conversation
            .turns
            .iter()
            .map(|turn| WireMessage {
                role: wire_role(turn.role),
                content: match &turn.content {
                    Content::Text(text) => WireContent::Text(text.clone()),
                    Content::Blocks(blocks) => WireContent::Parts(
                        blocks
                            .iter()
                            .map(|block| match block {
                                ContentBlock::Text(text) => WirePart::Text { text: text.clone() },
                                ContentBlock::ImageUrl(url) => WirePart::ImageUrl {
                                    image_url: ImageUrlRef { url: url.clone() },
                                },
                            })
                            .collect(),
                    ),
                },
            })
            .collect();

        Self {
            model: model.to_string(),
            messages,
            temperature,
            max_tokens,
        }
    }
}

// === Response ===

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<ResponseContent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ResponseContent {
    Text(String),
    Parts(Vec<ResponsePart>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponsePart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// Parses a response body into the expected shape.
pub fn parse_response(body: &str) -> Result<ChatResponse> {
    serde_json::from_str(body)
        .map_err(|e| Error::malformed(format!("unexpected response shape: {}", e)))
}

/// Extracts the assistant text from a validated response.
///
/// Only `text`-typed blocks contribute; they are newline-joined. A
/// response that validates but trims to nothing is itself a failure.
pub fn extract_text(response: &ChatResponse) -> Result<String> {
    let choice = response
        .choices
        .first()
        .ok_or_else(|| Error::malformed("response contained no choices"))?;

    let content = choice
        .message
        .content
        .as_ref()
        .ok_or_else(|| Error::malformed("choice message has no content"))?;

    let text = match content {
        ResponseContent::Text(text) => text.clone(),
        ResponseContent::Parts(parts) => parts
            .iter()
            .filter(|part| part.kind == "text")
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n"),
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::EmptyResponse);
    }
    Ok(trimmed.to_string())
}
