//! AI suggestion pipeline.
//!
//! - [`service::SuggestionService`] generates plans, briefings and reschedules,
//!   backed by the [`retry`], [`cache`], [`rate_limit`] and [`fallback`] modules.
//! - [`apply::ApplyEngine`] writes a suggestion's content into the store.

pub mod apply;
pub mod cache;
pub mod error;
pub mod fallback;
pub mod parse;
pub mod prompts;
pub mod provider;
pub mod rate_limit;
pub mod retry;
pub mod service;

pub use apply::ApplyEngine;
pub use cache::{generate_key, ResultCache};
pub use error::{AiError, ApplyError};
pub use fallback::FallbackResult;
pub use provider::{CompletionRequest, ModelProvider, OpenAiCompatibleProvider, ProviderError};
pub use rate_limit::{RateLimitPolicy, RateLimitStatus, RateLimiter, UsageSnapshot};
pub use retry::{ErrorClass, RetryEngine, RetryOptions, RetryOutcome};
pub use service::{
    BriefingRequest, GeneratedSuggestion, GenerationSettings, PlanRequest, RescheduleRequest,
    SuggestionService, SuggestionSource,
};
