//! Test payload builders.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::{json, Value};

/// Minimal valid JPEG header bytes, good enough for a payload fixture.
pub fn image_bytes() -> Vec<u8> {
    vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46]
}

/// JSON body for POST /v1/text.
pub fn text_request(user_id: i64, chat_id: i64, text: &str) -> Value {
    json!({
        "user_id": user_id,
        "chat_id": chat_id,
        "text": text,
    })
}

/// JSON body for POST /v1/image.
pub fn image_request(user_id: i64, chat_id: i64, message_id: i64, caption: Option<&str>) -> Value {
    json!({
        "user_id": user_id,
        "chat_id": chat_id,
        "message_id": message_id,
        "file_id": "file-test-1",
        "caption": caption,
        "mime": "image/jpeg",
        "data_base64": BASE64.encode(image_bytes()),
    })
}

/// JSON body for POST /v1/pages/navigate.
pub fn navigate_request(chat_id: i64, message_id: i64, direction: &str) -> Value {
    json!({
        "chat_id": chat_id,
        "message_id": message_id,
        "direction": direction,
    })
}

/// A long multi-paragraph answer that needs more than one page at the
/// given limit.
pub fn long_answer(paragraphs: usize, words_per_paragraph: usize) -> String {
    let paragraph = vec!["lorem"; words_per_paragraph].join(" ");
    vec![paragraph; paragraphs].join("\n\n")
}
