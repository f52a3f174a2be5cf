//! Unified error taxonomy for the relay engine.
//!
//! Stable error codes:
//! - RATE_001: Rate limit / temporary block
//! - BUSY_001: Single-flight rejection
//! - UP_001-004: Upstream failures
//! - TIME_001: Local deadline exceeded
//! - UNK_001: Unclassified

use std::time::Duration;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the relay engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The user exhausted a rate-limit window or is temporarily blocked.
    #[error("rate limited, retry in {}s", retry_after.as_secs())]
    RateLimited {
        /// Time until the window resets (or the block lifts).
        retry_after: Duration,
        /// Remaining block duration when the rejection came from a block.
        blocked_for: Option<Duration>,
    },

    /// A heavy request for this user is already in flight.
    #[error("a previous request for this user is still in flight")]
    AlreadyBusy,

    /// 5xx/429/network failure that survived the whole retry budget.
    #[error("upstream call failed after {attempts} attempts: {message}")]
    UpstreamTransient { message: String, attempts: u32 },

    /// Non-retryable upstream rejection (4xx other than 429).
    #[error("upstream rejected the request ({status})")]
    UpstreamRejected { status: u16, body: String },

    /// The upstream response did not match the expected shape.
    #[error("upstream response failed validation: {0}")]
    UpstreamMalformed(String),

    /// The upstream response validated but contained no usable text.
    #[error("upstream returned no content")]
    EmptyResponse,

    /// A local operation deadline was exceeded.
    #[error("operation timed out after {}s", elapsed.as_secs())]
    Timeout { elapsed: Duration },

    /// Anything unclassified.
    #[error("{0}")]
    Unknown(String),
}

impl Error {
    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::UpstreamMalformed(msg.into())
    }

    /// Whether the retry loops may attempt this failure again.
    ///
    /// Malformed and empty responses are retried deliberately: the upstream
    /// may be transiently inconsistent and a later attempt can return a
    /// well-formed body.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamTransient { .. }
                | Self::UpstreamMalformed(_)
                | Self::EmptyResponse
                | Self::Timeout { .. }
        )
    }

    /// Get the stable error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "RATE_001",
            Self::AlreadyBusy => "BUSY_001",
            Self::UpstreamTransient { .. } => "UP_001",
            Self::UpstreamRejected { .. } => "UP_002",
            Self::UpstreamMalformed(_) => "UP_003",
            Self::EmptyResponse => "UP_004",
            Self::Timeout { .. } => "TIME_001",
            Self::Unknown(_) => "UNK_001",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::RateLimited { .. } => 429,
            Self::AlreadyBusy => 409,
            Self::UpstreamTransient { .. } => 502,
            Self::UpstreamRejected { .. } => 502,
            Self::UpstreamMalformed(_) => 502,
            Self::EmptyResponse => 502,
            Self::Timeout { .. } => 504,
            Self::Unknown(_) => 500,
        }
    }

    /// User-facing guidance for this error.
    ///
    /// Never leaks raw upstream bodies; known upstream statuses map to
    /// friendly explanations, everything unclassified falls back to a
    /// generic template carrying the reason.
    pub fn user_message(&self) -> String {
        match self {
            Self::RateLimited {
                retry_after,
                blocked_for,
            } => match blocked_for {
                Some(block) => format!(
                    "You've been sending requests too quickly and are paused for {}s.",
                    block.as_secs()
                ),
                None => format!(
                    "You're sending requests too quickly. Try again in {}s.",
                    retry_after.as_secs().max(1)
                ),
            },
            Self::AlreadyBusy => {
                "Please wait for your previous request to finish before sending another.".into()
            }
            Self::UpstreamTransient { .. } => {
                "The assistant service is temporarily unavailable. Please try again in a moment."
                    .into()
            }
            Self::UpstreamRejected { status, .. } => match status {
                401 => "The relay is not authorized with the assistant service. \
                        Please contact the operator."
                    .into(),
                403 => "The assistant service is not available from this region right now.".into(),
                _ => "The assistant service could not process this request.".into(),
            },
            Self::UpstreamMalformed(_) | Self::EmptyResponse => {
                "The assistant returned an unusable answer. Please try again.".into()
            }
            Self::Timeout { .. } => {
                "The request took too long and was abandoned. Please try again.".into()
            }
            Self::Unknown(reason) => format!("Something went wrong: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(Error::UpstreamTransient {
            message: "503".into(),
            attempts: 1
        }
        .is_retryable());
        assert!(Error::UpstreamMalformed("missing choices".into()).is_retryable());
        assert!(Error::EmptyResponse.is_retryable());
        assert!(Error::Timeout {
            elapsed: Duration::from_secs(120)
        }
        .is_retryable());

        assert!(!Error::AlreadyBusy.is_retryable());
        assert!(!Error::UpstreamRejected {
            status: 400,
            body: "bad request".into()
        }
        .is_retryable());
        assert!(!Error::RateLimited {
            retry_after: Duration::from_secs(30),
            blocked_for: None,
        }
        .is_retryable());
    }

    #[test]
    fn user_message_never_leaks_upstream_body() {
        let err = Error::UpstreamRejected {
            status: 400,
            body: "secret internal detail".into(),
        };
        assert!(!err.user_message().contains("secret"));
    }

    #[test]
    fn known_statuses_map_to_friendly_guidance() {
        let unauthorized = Error::UpstreamRejected {
            status: 401,
            body: String::new(),
        };
        assert!(unauthorized.user_message().contains("not authorized"));

        let forbidden = Error::UpstreamRejected {
            status: 403,
            body: String::new(),
        };
        assert!(forbidden.user_message().contains("region"));
    }
}
