use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::SuggestionKind;

/// Failures surfaced by the suggestion generation pipeline.
#[derive(Debug, Error)]
pub enum AiError {
    /// The provider rejected our credentials. Not retried and never replaced by a fallback.
    #[error("AI provider authentication failed: {0}")]
    Authentication(String),

    #[error(
        "Rate limit exceeded for {kind} suggestions: {remaining} of {limit} remaining, resets at {reset_time}"
    )]
    RateLimitExceeded {
        kind: SuggestionKind,
        reset_time: DateTime<Utc>,
        remaining: u32,
        limit: u32,
    },

    /// Network or provider failure that persisted through every retry.
    #[error("AI provider unavailable after {attempts} attempt(s): {message}")]
    TransientProvider { attempts: u32, message: String },

    #[error("AI provider returned an unusable {kind} response: {message}")]
    MalformedResponse {
        kind: SuggestionKind,
        message: String,
    },

    #[error("Fallback {kind} generation failed: {message}")]
    FallbackFailed {
        kind: SuggestionKind,
        message: String,
    },

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Hard failures of the application engine. Per-item failures are reported
/// in the [`ApplyResult`](crate::models::ApplyResult) instead.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("Suggestion {0} has already been applied")]
    AlreadyApplied(uuid::Uuid),
}
