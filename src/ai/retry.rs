//! Bounded exponential-backoff retry around fallible async operations.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use futures::future::join_all;

/// Messages containing any of these are never retried.
const NON_RETRYABLE_MARKERS: &[&str] = &[
    "invalid api key",
    "invalid_api_key",
    "incorrect api key",
    "authentication",
    "unauthorized",
    "insufficient_quota",
    "insufficient quota",
    "invalid_request_error",
    "malformed request",
];

/// Subset of the non-retryable markers that mean our credentials were rejected.
const AUTHENTICATION_MARKERS: &[&str] = &[
    "invalid api key",
    "invalid_api_key",
    "incorrect api key",
    "authentication",
    "unauthorized",
];

const NETWORK_MARKERS: &[&str] = &[
    "network",
    "timeout",
    "timed out",
    "connection",
    "econnreset",
    "econnrefused",
    "dns",
];

const RATE_LIMIT_MARKERS: &[&str] = &["rate limit", "rate_limit", "too many requests", "429"];

const AI_SERVICE_MARKERS: &[&str] = &[
    "openai",
    "anthropic",
    "gpt",
    "claude",
    "model",
    "completion",
    "overloaded",
];

fn contains_any(message: &str, markers: &[&str]) -> bool {
    let lower = message.to_lowercase();
    markers.iter().any(|m| lower.contains(m))
}

pub fn is_non_retryable(message: &str) -> bool {
    contains_any(message, NON_RETRYABLE_MARKERS)
}

pub fn is_authentication_failure(message: &str) -> bool {
    contains_any(message, AUTHENTICATION_MARKERS)
}

/// Broad failure class used to pick a retry strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Network,
    RateLimit,
    AiService,
    Unknown,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::RateLimit => "rate-limit",
            Self::AiService => "ai-service",
            Self::Unknown => "unknown",
        }
    }
}

/// Classify an error by the substrings of its message. Network markers win over
/// rate-limit markers, which win over provider markers.
pub fn classify_error(message: &str) -> ErrorClass {
    if contains_any(message, NETWORK_MARKERS) {
        ErrorClass::Network
    } else if contains_any(message, RATE_LIMIT_MARKERS) {
        ErrorClass::RateLimit
    } else if contains_any(message, AI_SERVICE_MARKERS) {
        ErrorClass::AiService
    } else {
        ErrorClass::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryOptions {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            backoff_factor: 2.0,
        }
    }
}

impl RetryOptions {
    /// Delay slept after failed attempt `attempt` (1-indexed) before the next one.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let millis = self.base_delay.as_millis() as f64 * self.backoff_factor.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped.max(0.0).round() as u64)
    }
}

/// Result of one [`RetryEngine::execute`] call.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub success: bool,
    pub value: Option<T>,
    /// The last error seen, when every attempt failed.
    pub error: Option<E>,
    pub attempts: u32,
    pub total_delay: Duration,
}

impl<T, E> RetryOutcome<T, E> {
    pub fn into_result(self) -> Result<T, Option<E>> {
        match self.value {
            Some(value) => Ok(value),
            None => Err(self.error),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryEngine {
    defaults: RetryOptions,
}

impl RetryEngine {
    /// `defaults` are used directly by [`execute`](Self::execute) callers and by
    /// the [`ErrorClass::Unknown`] strategy.
    pub fn new(defaults: RetryOptions) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> RetryOptions {
        self.defaults
    }

    pub fn options_for(&self, class: ErrorClass) -> RetryOptions {
        match class {
            ErrorClass::Network => RetryOptions {
                max_attempts: 5,
                base_delay: Duration::from_millis(500),
                max_delay: Duration::from_millis(10_000),
                backoff_factor: 1.5,
            },
            ErrorClass::RateLimit => RetryOptions {
                max_attempts: 2,
                base_delay: Duration::from_millis(5_000),
                max_delay: Duration::from_millis(30_000),
                backoff_factor: 2.0,
            },
            ErrorClass::AiService => RetryOptions {
                max_attempts: 3,
                base_delay: Duration::from_millis(1_000),
                max_delay: Duration::from_millis(10_000),
                backoff_factor: 2.0,
            },
            ErrorClass::Unknown => self.defaults,
        }
    }

    pub async fn execute<T, E, F, Fut>(&self, mut op: F, options: RetryOptions) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = options.max_attempts.max(1);
        let mut total_delay = Duration::ZERO;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "Operation succeeded after retries");
                    }
                    return RetryOutcome {
                        success: true,
                        value: Some(value),
                        error: None,
                        attempts: attempt,
                        total_delay,
                    };
                }
                Err(e) => {
                    let message = e.to_string();
                    let give_up = if is_non_retryable(&message) {
                        tracing::warn!(attempt, error = %message, "Non-retryable error, giving up");
                        true
                    } else {
                        attempt >= max_attempts
                    };

                    if give_up {
                        return RetryOutcome {
                            success: false,
                            value: None,
                            error: Some(e),
                            attempts: attempt,
                            total_delay,
                        };
                    }

                    drop(e);
                    let delay = options.delay_after(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "Operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    total_delay += delay;
                }
            }
        }
    }

    pub async fn execute_with_strategy<T, E, F, Fut>(
        &self,
        op: F,
        class: ErrorClass,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.execute(op, self.options_for(class)).await
    }

    /// Run every operation to completion concurrently; outcomes are positional.
    pub async fn execute_parallel<T, E, F, Fut>(
        &self,
        ops: Vec<F>,
        options: RetryOptions,
    ) -> Vec<RetryOutcome<T, E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        join_all(ops.into_iter().map(|op| self.execute(op, options))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::pin::Pin;

    fn fast() -> RetryOptions {
        RetryOptions {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            backoff_factor: 2.0,
        }
    }

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let options = fast();
        assert_eq!(options.delay_after(1), Duration::from_millis(1000));
        assert_eq!(options.delay_after(2), Duration::from_millis(2000));
        assert_eq!(options.delay_after(4), Duration::from_millis(8000));
        assert_eq!(options.delay_after(5), Duration::from_millis(10_000));
    }

    #[tokio::test(start_paused = true)]
    async fn total_delay_is_sum_of_backoffs_when_all_attempts_fail() {
        let engine = RetryEngine::default();
        let calls = Cell::new(0);

        let outcome: RetryOutcome<(), &str> = engine
            .execute(
                || {
                    calls.set(calls.get() + 1);
                    async { Err("upstream timeout") }
                },
                fast(),
            )
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.get(), 3);
        assert_eq!(outcome.total_delay, Duration::from_millis(3000));
        assert_eq!(outcome.error, Some("upstream timeout"));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_a_later_attempt() {
        let engine = RetryEngine::default();
        let calls = Cell::new(0);

        let outcome = engine
            .execute(
                || {
                    calls.set(calls.get() + 1);
                    let n = calls.get();
                    async move {
                        if n < 2 {
                            Err("connection reset")
                        } else {
                            Ok(n)
                        }
                    }
                },
                fast(),
            )
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.value, Some(2));
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.total_delay, Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_api_key_stops_after_first_attempt() {
        let engine = RetryEngine::default();
        let calls = Cell::new(0);
        let options = RetryOptions {
            max_attempts: 10,
            ..fast()
        };

        let outcome: RetryOutcome<(), String> = engine
            .execute(
                || {
                    calls.set(calls.get() + 1);
                    async { Err("401: Invalid API key provided".to_string()) }
                },
                options,
            )
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(calls.get(), 1);
        assert_eq!(outcome.total_delay, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_max_attempts_still_runs_once() {
        let engine = RetryEngine::default();
        let outcome: RetryOutcome<u8, &str> = engine
            .execute(
                || async { Ok(7) },
                RetryOptions {
                    max_attempts: 0,
                    ..fast()
                },
            )
            .await;
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.value, Some(7));
    }

    #[test]
    fn classifies_by_message() {
        assert_eq!(classify_error("Request timed out"), ErrorClass::Network);
        assert_eq!(classify_error("connection refused"), ErrorClass::Network);
        assert_eq!(classify_error("429 Too Many Requests"), ErrorClass::RateLimit);
        assert_eq!(classify_error("Rate limit reached"), ErrorClass::RateLimit);
        assert_eq!(classify_error("OpenAI returned 500"), ErrorClass::AiService);
        assert_eq!(classify_error("model is overloaded"), ErrorClass::AiService);
        assert_eq!(classify_error("something odd"), ErrorClass::Unknown);
    }

    #[test]
    fn strategies_differ_by_class() {
        let engine = RetryEngine::new(RetryOptions {
            max_attempts: 7,
            ..RetryOptions::default()
        });

        let network = engine.options_for(ErrorClass::Network);
        assert_eq!(network.max_attempts, 5);
        assert_eq!(network.backoff_factor, 1.5);

        assert_eq!(engine.options_for(ErrorClass::RateLimit).max_attempts, 2);
        assert_eq!(engine.options_for(ErrorClass::AiService), RetryOptions::default());
        assert_eq!(engine.options_for(ErrorClass::Unknown).max_attempts, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn parallel_runs_all_without_fail_fast() {
        let engine = RetryEngine::default();
        let options = RetryOptions {
            max_attempts: 2,
            ..fast()
        };

        type BoxedOp = Box<dyn FnMut() -> Pin<Box<dyn Future<Output = Result<u8, String>>>>>;
        let ops: Vec<BoxedOp> = vec![
            Box::new(|| Box::pin(async { Err("network down".to_string()) })),
            Box::new(|| Box::pin(async { Ok(2) })),
            Box::new(|| Box::pin(async { Err("invalid api key".to_string()) })),
        ];

        let outcomes = engine.execute_parallel(ops, options).await;

        assert_eq!(outcomes.len(), 3);
        assert!(!outcomes[0].success);
        assert_eq!(outcomes[0].attempts, 2);
        assert_eq!(outcomes[1].value, Some(2));
        assert_eq!(outcomes[2].attempts, 1);
    }
}
