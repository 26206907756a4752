//! In-process TTL cache for suggestion generation results.
//!
//! Entries expire purely by age; there is no size bound or LRU eviction.
//! Expired entries are evicted lazily on lookup and eagerly by [`ResultCache::cleanup`],
//! which a background task runs on a fixed period.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::task::JoinHandle;

use crate::clock::{Clock, SystemClock};
use crate::models::SuggestionKind;

pub const PLAN_TTL: Duration = Duration::from_secs(2 * 60 * 60);
pub const BRIEFING_TTL: Duration = Duration::from_secs(30 * 60);
pub const RESCHEDULE_TTL: Duration = Duration::from_secs(60 * 60);
pub const USER_CONTEXT_TTL: Duration = Duration::from_secs(15 * 60);

pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub fn ttl_for(kind: SuggestionKind) -> Duration {
    match kind {
        SuggestionKind::Plan => PLAN_TTL,
        SuggestionKind::Briefing => BRIEFING_TTL,
        SuggestionKind::Reschedule => RESCHEDULE_TTL,
    }
}

/// Build a cache key whose value does not depend on parameter order.
///
/// Parameters are rendered as a JSON object with sorted keys, so separators
/// inside values are escaped and cannot make two parameter sets collide.
///
/// `generate_key("plan", [("b", 2), ("a", 1)])` == `r#"plan:{"a":"1","b":"2"}"#`.
pub fn generate_key<K, V, I>(prefix: &str, params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Display,
{
    let sorted: BTreeMap<String, String> = params
        .into_iter()
        .map(|(k, v)| (k.as_ref().to_string(), v.to_string()))
        .collect();

    let object: serde_json::Map<String, serde_json::Value> = sorted
        .into_iter()
        .map(|(k, v)| (k, serde_json::Value::String(v)))
        .collect();

    format!("{prefix}:{}", serde_json::Value::Object(object))
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: DateTime<Utc>,
    ttl: TimeDelta,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.stored_at >= self.ttl
    }
}

pub struct ResultCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> ResultCache<V> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().expect("cache lock poisoned");

        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                tracing::debug!(key, "Cache entry expired");
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// Store `value`, replacing any existing entry and restarting its TTL.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            stored_at: self.clock.now(),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
        };
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .insert(key.into(), entry);
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .remove(key)
            .is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().expect("cache lock poisoned").clear();
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for ResultCache<V> {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl<V: Clone + Send + 'static> ResultCache<V> {
    /// Sweep expired entries every `period` until the handle is aborted.
    pub fn spawn_cleanup(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // Skip the first immediate tick.
            interval.tick().await;

            loop {
                interval.tick().await;
                let removed = cache.cleanup();
                if removed > 0 {
                    tracing::debug!(removed, "Swept expired cache entries");
                }
            }
        })
    }
}
