//! Runtime configuration.
//!
//! Everything is read from environment variables:
//! - `PLANWISE_DB_PATH` - SQLite database file (default: platform data dir)
//! - `PLANWISE_PORT` - HTTP port (default: 3000)
//! - `PLANWISE_AI_BASE_URL` - Chat-completions base URL (default: OpenAI)
//! - `PLANWISE_AI_API_KEY` - Provider API key
//! - `PLANWISE_AI_MODEL` - Model name
//! - `PLANWISE_AI_TEMPERATURE`, `PLANWISE_AI_MAX_TOKENS` - Sampling parameters
//! - `PLANWISE_DAILY_LIMIT`, `PLANWISE_MONTHLY_LIMIT` - Default generation quota
//! - `PLANWISE_PLAN_LIMIT`, `PLANWISE_BRIEFING_LIMIT`, `PLANWISE_RESCHEDULE_LIMIT` - Per-kind daily quota
//! - `PLANWISE_CACHE_SWEEP_SECS` - Interval between cache sweeps (default: 300)

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::ai::cache::DEFAULT_CLEANUP_INTERVAL;
use crate::ai::provider::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::ai::rate_limit::RateLimitPolicy;
use crate::ai::service::GenerationSettings;
use crate::models::SuggestionKind;

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// `None` means the platform default location.
    pub db_path: Option<PathBuf>,
    pub port: u16,
    pub provider: ProviderConfig,
    pub generation: GenerationSettings,
    pub rate_limit: RateLimitPolicy,
    pub cache_sweep_interval: Duration,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            port: DEFAULT_PORT,
            provider: ProviderConfig {
                base_url: DEFAULT_BASE_URL.to_string(),
                api_key: None,
                model: DEFAULT_MODEL.to_string(),
            },
            generation: GenerationSettings::default(),
            rate_limit: RateLimitPolicy::default(),
            cache_sweep_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

impl PlannerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset or unparsable values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let lookup = &lookup;

        let mut rate_limit = defaults.rate_limit;
        if let Some(daily) = parsed(lookup, "PLANWISE_DAILY_LIMIT") {
            rate_limit.daily = daily;
        }
        if let Some(monthly) = parsed(lookup, "PLANWISE_MONTHLY_LIMIT") {
            rate_limit.monthly = monthly;
        }
        for (kind, key) in [
            (SuggestionKind::Plan, "PLANWISE_PLAN_LIMIT"),
            (SuggestionKind::Briefing, "PLANWISE_BRIEFING_LIMIT"),
            (SuggestionKind::Reschedule, "PLANWISE_RESCHEDULE_LIMIT"),
        ] {
            if let Some(limit) = parsed(lookup, key) {
                rate_limit.per_kind_daily.insert(kind, limit);
            }
        }

        Self {
            db_path: lookup("PLANWISE_DB_PATH").map(PathBuf::from),
            port: parsed(lookup, "PLANWISE_PORT").unwrap_or(defaults.port),
            provider: ProviderConfig {
                base_url: lookup("PLANWISE_AI_BASE_URL").unwrap_or(defaults.provider.base_url),
                api_key: lookup("PLANWISE_AI_API_KEY").filter(|k| !k.is_empty()),
                model: lookup("PLANWISE_AI_MODEL").unwrap_or(defaults.provider.model),
            },
            generation: GenerationSettings {
                temperature: parsed(lookup, "PLANWISE_AI_TEMPERATURE")
                    .unwrap_or(defaults.generation.temperature),
                max_tokens: parsed(lookup, "PLANWISE_AI_MAX_TOKENS")
                    .unwrap_or(defaults.generation.max_tokens),
            },
            rate_limit,
            cache_sweep_interval: parsed(lookup, "PLANWISE_CACHE_SWEEP_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_sweep_interval),
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let value = lookup(key)?;
    match value.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %value, "Ignoring invalid configuration value");
            None
        }
    }
}
