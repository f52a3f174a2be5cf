//! Standardized API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use paginate::NavError;
use relay_core::Error;

use crate::service::Reply;

/// Reply payload for both submit endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReplyResponse {
    /// First page, ready for delivery.
    pub text: String,
    pub page_count: usize,
    /// Present only for multi-page replies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<String>>,
}

impl From<Reply> for ReplyResponse {
    fn from(reply: Reply) -> Self {
        let page_count = reply.pages.len();
        Self {
            text: reply.first_page().to_string(),
            page_count,
            pages: (page_count > 1).then_some(reply.pages),
        }
    }
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// API error type with stable error codes.
pub struct ApiError {
    pub status: StatusCode,
    pub response: ErrorResponse,
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn with_code(status: StatusCode, code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            status,
            response: ErrorResponse {
                error: msg.into(),
                code: code.into(),
                retry_after_secs: None,
            },
            retry_after: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::BAD_REQUEST, "REQ_001", msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::FORBIDDEN, "ADMIN_001", msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.response)).into_response();

        // Add Retry-After header for rate limit responses
        if let Some(retry_after) = self.retry_after {
            if let Ok(value) = retry_after.to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
        }

        response
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let retry_after = match &err {
            Error::RateLimited { retry_after, .. } => Some(retry_after.as_secs().max(1)),
            _ => None,
        };

        Self {
            status,
            response: ErrorResponse {
                error: err.user_message(),
                code: err.error_code().to_string(),
                retry_after_secs: retry_after,
            },
            retry_after,
        }
    }
}

impl From<NavError> for ApiError {
    fn from(err: NavError) -> Self {
        match err {
            NavError::NoFurtherPages => {
                Self::with_code(StatusCode::CONFLICT, "PAGE_001", err.to_string())
            }
            NavError::UnknownMessage => {
                Self::with_code(StatusCode::NOT_FOUND, "PAGE_002", err.to_string())
            }
        }
    }
}
