//! Suggestion generation: cache, quota, model call, parsing and fallback.
//!
//! Each request runs the same sequence:
//!
//! 1. A warm cache entry for the request fingerprint is returned as-is.
//! 2. Otherwise the user's quota is checked.
//! 3. The model is called through the retry engine.
//! 4. Parsed output is counted against the quota, persisted and cached.
//! 5. If the model fails or returns unusable output, a deterministic fallback
//!    is persisted and returned instead. Authentication failures are the
//!    exception and always surface to the caller.
//!
//! Two identical requests racing past an empty cache both reach the model and
//! both consume quota. There is no in-flight de-duplication.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::Serialize;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::ai::cache::{generate_key, ttl_for, ResultCache, USER_CONTEXT_TTL};
use crate::ai::error::AiError;
use crate::ai::fallback::{
    generate_briefing_fallback, generate_plan_fallback, generate_reschedule_fallback,
    FallbackResult,
};
use crate::ai::parse::parse_content;
use crate::ai::prompts::{self, Prompt};
use crate::ai::provider::{CompletionRequest, ModelProvider};
use crate::ai::rate_limit::RateLimiter;
use crate::ai::retry::{is_authentication_failure, ErrorClass, RetryEngine};
use crate::clock::Clock;
use crate::models::{CalendarEvent, Goal, SuggestionContent, SuggestionKind, Task, TaskFilter};
use crate::store::PlannerStore;

const ANONYMOUS: &str = "anonymous";
const DEADLINE_HORIZON_DAYS: i64 = 7;
const RESCHEDULE_EVENT_HORIZON_DAYS: i64 = 14;

/// Sampling parameters passed to the model provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

/// Where a generated suggestion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    Model,
    Cache,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedSuggestion {
    /// Id of the persisted suggestion. `None` when generated without a user.
    pub suggestion_id: Option<Uuid>,
    pub kind: SuggestionKind,
    pub content: SuggestionContent,
    pub source: SuggestionSource,
    pub fallback_used: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedSuggestion {
    suggestion_id: Option<Uuid>,
    content: SuggestionContent,
}

#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub user_id: Option<Uuid>,
    pub goals_text: String,
    /// Target month as `YYYY-MM`. Defaults to the current month.
    pub month: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BriefingRequest {
    pub user_id: Option<Uuid>,
    /// Defaults to today.
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct RescheduleRequest {
    pub user_id: Option<Uuid>,
    /// Defaults to today.
    pub date: Option<NaiveDate>,
}

/// What one generation attempt needs besides the shared service state.
struct Generation<F> {
    kind: SuggestionKind,
    user_id: Option<Uuid>,
    cache_key: String,
    prompt: Prompt,
    fallback: F,
}

pub struct SuggestionService {
    store: Arc<dyn PlannerStore>,
    provider: Arc<dyn ModelProvider>,
    retry: RetryEngine,
    cache: Arc<ResultCache<CachedSuggestion>>,
    context_cache: Arc<ResultCache<Vec<Goal>>>,
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    settings: GenerationSettings,
}

impl SuggestionService {
    pub fn new(
        store: Arc<dyn PlannerStore>,
        provider: Arc<dyn ModelProvider>,
        limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            provider,
            retry: RetryEngine::default(),
            cache: Arc::new(ResultCache::new(Arc::clone(&clock))),
            context_cache: Arc::new(ResultCache::new(Arc::clone(&clock))),
            limiter,
            clock,
            settings: GenerationSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_retry(mut self, retry: RetryEngine) -> Self {
        self.retry = retry;
        self
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Start periodic sweeps of expired cache entries.
    pub fn spawn_cache_cleanup(&self, period: StdDuration) -> Vec<JoinHandle<()>> {
        vec![
            self.cache.spawn_cleanup(period),
            self.context_cache.spawn_cleanup(period),
        ]
    }

    // ============================================================
    // Plan
    // ============================================================

    pub async fn generate_plan(&self, request: PlanRequest) -> Result<GeneratedSuggestion, AiError> {
        let month = request
            .month
            .clone()
            .unwrap_or_else(|| self.clock.today().format("%Y-%m").to_string());
        let normalized = normalize_text(&request.goals_text);

        let cache_key = generate_key(
            SuggestionKind::Plan.as_str(),
            [
                ("user", user_key(request.user_id)),
                ("goals", normalized),
                ("month", month.clone()),
            ],
        );

        if let Some(hit) = self.cached(&cache_key, SuggestionKind::Plan) {
            return Ok(hit);
        }

        let existing_goals = match request.user_id {
            Some(user_id) => self.user_goals(user_id).await?,
            None => Vec::new(),
        };

        let today = self.clock.today();
        let goals_text = request.goals_text;
        let prompt = prompts::plan_prompt(&goals_text, &month, &existing_goals);

        self.generate(Generation {
            kind: SuggestionKind::Plan,
            user_id: request.user_id,
            cache_key,
            prompt,
            fallback: move || {
                map_fallback(generate_plan_fallback(&goals_text, today), SuggestionContent::Plan)
            },
        })
        .await
    }

    // ============================================================
    // Briefing
    // ============================================================

    pub async fn generate_briefing(
        &self,
        request: BriefingRequest,
    ) -> Result<GeneratedSuggestion, AiError> {
        let date = request.date.unwrap_or_else(|| self.clock.today());
        let cache_key = generate_key(
            SuggestionKind::Briefing.as_str(),
            [("user", user_key(request.user_id)), ("date", date.to_string())],
        );

        if let Some(hit) = self.cached(&cache_key, SuggestionKind::Briefing) {
            return Ok(hit);
        }

        let (tasks, deadlines, habits, events) = match request.user_id {
            Some(user_id) => {
                let tasks = self
                    .store
                    .find_tasks_by_user(
                        user_id,
                        TaskFilter {
                            due_until: Some(date),
                            ..TaskFilter::open()
                        },
                    )
                    .await?;
                let deadlines = self
                    .store
                    .find_tasks_by_user(
                        user_id,
                        TaskFilter {
                            due_from: Some(date + Duration::days(1)),
                            due_until: Some(date + Duration::days(DEADLINE_HORIZON_DAYS)),
                            ..TaskFilter::open()
                        },
                    )
                    .await?;
                let habits = self
                    .store
                    .find_habits_by_user(user_id)
                    .await?
                    .into_iter()
                    .filter(|h| h.active)
                    .collect::<Vec<_>>();
                let events = self.events_between(user_id, date, date + Duration::days(1)).await?;
                (tasks, deadlines, habits, events)
            }
            None => Default::default(),
        };

        let prompt = prompts::briefing_prompt(date, &tasks, &deadlines, &habits, &events);

        self.generate(Generation {
            kind: SuggestionKind::Briefing,
            user_id: request.user_id,
            cache_key,
            prompt,
            fallback: move || {
                map_fallback(generate_briefing_fallback(&tasks, date), SuggestionContent::Briefing)
            },
        })
        .await
    }

    // ============================================================
    // Reschedule
    // ============================================================

    pub async fn generate_reschedule(
        &self,
        request: RescheduleRequest,
    ) -> Result<GeneratedSuggestion, AiError> {
        let date = request.date.unwrap_or_else(|| self.clock.today());

        let (backlog, events): (Vec<Task>, Vec<CalendarEvent>) = match request.user_id {
            Some(user_id) => {
                let backlog = self
                    .store
                    .find_tasks_by_user(
                        user_id,
                        TaskFilter {
                            due_until: Some(date - Duration::days(1)),
                            ..TaskFilter::open()
                        },
                    )
                    .await?;
                let events = self
                    .events_between(
                        user_id,
                        date,
                        date + Duration::days(RESCHEDULE_EVENT_HORIZON_DAYS),
                    )
                    .await?;
                (backlog, events)
            }
            None => Default::default(),
        };

        let backlog_ids = backlog
            .iter()
            .map(|t| t.id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let cache_key = generate_key(
            SuggestionKind::Reschedule.as_str(),
            [
                ("user", user_key(request.user_id)),
                ("date", date.to_string()),
                ("backlog", backlog_ids),
            ],
        );

        if let Some(hit) = self.cached(&cache_key, SuggestionKind::Reschedule) {
            return Ok(hit);
        }

        let prompt = prompts::reschedule_prompt(date, &backlog, &events);

        self.generate(Generation {
            kind: SuggestionKind::Reschedule,
            user_id: request.user_id,
            cache_key,
            prompt,
            fallback: move || {
                map_fallback(
                    generate_reschedule_fallback(&backlog, date),
                    SuggestionContent::Reschedule,
                )
            },
        })
        .await
    }

    // ============================================================
    // Shared pipeline
    // ============================================================

    fn cached(&self, key: &str, kind: SuggestionKind) -> Option<GeneratedSuggestion> {
        let hit = self.cache.get(key)?;
        tracing::debug!(kind = kind.as_str(), key, "Suggestion cache hit");
        Some(GeneratedSuggestion {
            suggestion_id: hit.suggestion_id,
            kind,
            content: hit.content,
            source: SuggestionSource::Cache,
            fallback_used: false,
            message: None,
        })
    }

    async fn generate<F>(&self, generation: Generation<F>) -> Result<GeneratedSuggestion, AiError>
    where
        F: FnOnce() -> FallbackResult<SuggestionContent> + Send,
    {
        let Generation {
            kind,
            user_id,
            cache_key,
            prompt,
            fallback,
        } = generation;

        if let Some(user_id) = user_id {
            let status = self.limiter.check_limit(user_id, kind);
            if !status.allowed {
                tracing::info!(%user_id, kind = kind.as_str(), reset_time = %status.reset_time, "Suggestion quota exhausted");
                return Err(AiError::RateLimitExceeded {
                    kind,
                    reset_time: status.reset_time,
                    remaining: status.remaining,
                    limit: status.limit,
                });
            }
        }

        let request = CompletionRequest {
            system_prompt: prompt.system,
            user_prompt: prompt.user,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let provider = Arc::clone(&self.provider);
        let outcome = self
            .retry
            .execute_with_strategy(
                || {
                    let provider = Arc::clone(&provider);
                    let request = request.clone();
                    async move { provider.complete(request).await }
                },
                ErrorClass::AiService,
            )
            .await;
        let attempts = outcome.attempts;

        let failure = match outcome.into_result() {
            Ok(text) => match parse_content(kind, &text) {
                Ok(content) => return self.accept(kind, user_id, cache_key, content).await,
                Err(e) => AiError::MalformedResponse {
                    kind,
                    message: e.to_string(),
                },
            },
            Err(error) => {
                let message = error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no response from AI provider".to_string());
                if is_authentication_failure(&message) {
                    tracing::error!(kind = kind.as_str(), error = %message, "AI provider rejected credentials");
                    return Err(AiError::Authentication(message));
                }
                AiError::TransientProvider { attempts, message }
            }
        };

        let Some(user_id) = user_id else {
            return Err(failure);
        };

        tracing::warn!(%user_id, kind = kind.as_str(), error = %failure, "AI generation failed, using fallback");
        let result = fallback();
        let content = match result.data {
            Some(content) if result.success => content,
            _ => {
                return Err(AiError::FallbackFailed {
                    kind,
                    message: result.message,
                })
            }
        };

        let suggestion = self.store.create_suggestion(user_id, content.clone()).await?;
        Ok(GeneratedSuggestion {
            suggestion_id: Some(suggestion.id),
            kind,
            content,
            source: SuggestionSource::Fallback,
            fallback_used: true,
            message: Some(result.message),
        })
    }

    /// Record, persist and cache a successfully parsed model response.
    async fn accept(
        &self,
        kind: SuggestionKind,
        user_id: Option<Uuid>,
        cache_key: String,
        content: SuggestionContent,
    ) -> Result<GeneratedSuggestion, AiError> {
        let suggestion_id = match user_id {
            Some(user_id) => {
                self.limiter.record_usage(user_id, kind);
                let suggestion = self.store.create_suggestion(user_id, content.clone()).await?;
                tracing::info!(%user_id, kind = kind.as_str(), suggestion_id = %suggestion.id, "Generated suggestion");
                Some(suggestion.id)
            }
            None => None,
        };

        self.cache.set(
            cache_key,
            CachedSuggestion {
                suggestion_id,
                content: content.clone(),
            },
            ttl_for(kind),
        );

        Ok(GeneratedSuggestion {
            suggestion_id,
            kind,
            content,
            source: SuggestionSource::Model,
            fallback_used: false,
            message: None,
        })
    }

    async fn user_goals(&self, user_id: Uuid) -> Result<Vec<Goal>, AiError> {
        let key = generate_key("user-context", [("user", user_id)]);
        if let Some(goals) = self.context_cache.get(&key) {
            return Ok(goals);
        }
        let goals = self.store.find_goals_by_user(user_id).await?;
        self.context_cache.set(key, goals.clone(), USER_CONTEXT_TTL);
        Ok(goals)
    }

    async fn events_between(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<CalendarEvent>, AiError> {
        let from = from.and_time(NaiveTime::MIN).and_utc();
        let until = until.and_time(NaiveTime::MIN).and_utc();
        Ok(self
            .store
            .find_events_by_user(user_id, Some(from), Some(until))
            .await?)
    }
}

fn map_fallback<T>(
    result: FallbackResult<T>,
    wrap: fn(T) -> SuggestionContent,
) -> FallbackResult<SuggestionContent> {
    FallbackResult {
        success: result.success,
        data: result.data.map(wrap),
        fallback_used: result.fallback_used,
        message: result.message,
    }
}

fn user_key(user_id: Option<Uuid>) -> String {
    user_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| ANONYMOUS.to_string())
}

/// Trim, collapse internal whitespace and lowercase.
fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
