//! Per-user quota on model-backed suggestion generation.
//!
//! Three ceilings apply together: a daily total, a monthly total and a daily
//! cap per suggestion kind. Counters live in memory only and roll over at
//! UTC day and month boundaries.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::models::SuggestionKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    pub daily: u32,
    pub monthly: u32,
    pub per_kind_daily: BTreeMap<SuggestionKind, u32>,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            daily: 20,
            monthly: 300,
            per_kind_daily: BTreeMap::from([
                (SuggestionKind::Plan, 5),
                (SuggestionKind::Briefing, 10),
                (SuggestionKind::Reschedule, 5),
            ]),
        }
    }
}

impl RateLimitPolicy {
    /// Daily cap for `kind`. A kind with no explicit cap is bounded by the daily total.
    pub fn kind_limit(&self, kind: SuggestionKind) -> u32 {
        self.per_kind_daily.get(&kind).copied().unwrap_or(self.daily)
    }
}

/// Result of a quota check. `limit` and `current_usage` describe the most
/// constrained of the three ceilings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_time: DateTime<Utc>,
    pub limit: u32,
    pub current_usage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindUsage {
    pub kind: SuggestionKind,
    pub used: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub daily_total: u32,
    pub daily_limit: u32,
    pub monthly_total: u32,
    pub monthly_limit: u32,
    pub per_kind: Vec<KindUsage>,
}

#[derive(Debug, Clone)]
struct UsageWindow {
    day: NaiveDate,
    daily_total: u32,
    monthly_total: u32,
    per_kind_daily: HashMap<SuggestionKind, u32>,
}

impl UsageWindow {
    fn new(today: NaiveDate) -> Self {
        Self {
            day: today,
            daily_total: 0,
            monthly_total: 0,
            per_kind_daily: HashMap::new(),
        }
    }

    /// Reset counters whose window has closed.
    fn refresh(&mut self, today: NaiveDate) {
        if today == self.day {
            return;
        }
        if (today.year(), today.month()) != (self.day.year(), self.day.month()) {
            self.monthly_total = 0;
        }
        self.daily_total = 0;
        self.per_kind_daily.clear();
        self.day = today;
    }

    fn kind_usage(&self, kind: SuggestionKind) -> u32 {
        self.per_kind_daily.get(&kind).copied().unwrap_or(0)
    }
}

#[derive(Default)]
struct LimiterState {
    default_policy: RateLimitPolicy,
    overrides: HashMap<Uuid, RateLimitPolicy>,
    windows: HashMap<Uuid, UsageWindow>,
}

impl LimiterState {
    fn policy_for(&self, user_id: Uuid) -> &RateLimitPolicy {
        self.overrides.get(&user_id).unwrap_or(&self.default_policy)
    }

    fn window_for(&mut self, user_id: Uuid, today: NaiveDate) -> &mut UsageWindow {
        let window = self
            .windows
            .entry(user_id)
            .or_insert_with(|| UsageWindow::new(today));
        window.refresh(today);
        window
    }
}

pub struct RateLimiter {
    state: Mutex<LimiterState>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(LimiterState {
                default_policy: policy,
                ..Default::default()
            }),
            clock,
        }
    }

    pub fn check_limit(&self, user_id: Uuid, kind: SuggestionKind) -> RateLimitStatus {
        let now = self.clock.now();
        let today = now.date_naive();
        let mut state = self.state.lock().expect("rate limiter lock poisoned");
        let policy = state.policy_for(user_id).clone();
        let window = state.window_for(user_id, today);

        // Ordered so that ties resolve to the narrowest ceiling.
        let ceilings = [
            (policy.kind_limit(kind), window.kind_usage(kind)),
            (policy.daily, window.daily_total),
            (policy.monthly, window.monthly_total),
        ];

        let (limit, current_usage) = ceilings
            .iter()
            .copied()
            .min_by_key(|(limit, used)| limit.saturating_sub(*used))
            .unwrap_or((policy.daily, window.daily_total));

        let remaining = limit.saturating_sub(current_usage);
        let allowed = ceilings.iter().all(|(limit, used)| used < limit);
        let monthly_exhausted = window.monthly_total >= policy.monthly;

        let reset_time = if monthly_exhausted {
            first_of_next_month(today)
        } else {
            next_midnight(today)
        };

        RateLimitStatus {
            allowed,
            remaining,
            reset_time,
            limit,
            current_usage,
        }
    }

    pub fn record_usage(&self, user_id: Uuid, kind: SuggestionKind) {
        let today = self.clock.today();
        let mut state = self.state.lock().expect("rate limiter lock poisoned");
        let window = state.window_for(user_id, today);

        window.daily_total += 1;
        window.monthly_total += 1;
        *window.per_kind_daily.entry(kind).or_insert(0) += 1;

        tracing::debug!(
            %user_id,
            kind = kind.as_str(),
            daily_total = window.daily_total,
            monthly_total = window.monthly_total,
            "Recorded suggestion usage"
        );
    }

    pub fn usage(&self, user_id: Uuid) -> UsageSnapshot {
        let today = self.clock.today();
        let mut state = self.state.lock().expect("rate limiter lock poisoned");
        let policy = state.policy_for(user_id).clone();
        let window = state.window_for(user_id, today);

        UsageSnapshot {
            daily_total: window.daily_total,
            daily_limit: policy.daily,
            monthly_total: window.monthly_total,
            monthly_limit: policy.monthly,
            per_kind: SuggestionKind::ALL
                .iter()
                .map(|&kind| KindUsage {
                    kind,
                    used: window.kind_usage(kind),
                    limit: policy.kind_limit(kind),
                })
                .collect(),
        }
    }

    /// Customize one user's limits. Other users keep the default policy.
    pub fn set_user_policy(&self, user_id: Uuid, policy: RateLimitPolicy) {
        self.state
            .lock()
            .expect("rate limiter lock poisoned")
            .overrides
            .insert(user_id, policy);
    }

    pub fn clear_user_policy(&self, user_id: Uuid) -> bool {
        self.state
            .lock()
            .expect("rate limiter lock poisoned")
            .overrides
            .remove(&user_id)
            .is_some()
    }

    pub fn default_policy(&self) -> RateLimitPolicy {
        self.state
            .lock()
            .expect("rate limiter lock poisoned")
            .default_policy
            .clone()
    }

    /// Close any day or month window that has ended.
    pub fn rollover(&self) {
        let today = self.clock.today();
        let mut state = self.state.lock().expect("rate limiter lock poisoned");
        for window in state.windows.values_mut() {
            window.refresh(today);
        }
        tracing::debug!(%today, users = state.windows.len(), "Rolled over usage windows");
    }

    /// Run [`rollover`](Self::rollover) at every UTC midnight, re-arming after each run.
    pub fn spawn_rollover(self: &Arc<Self>) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let now = limiter.clock.now();
                let wait = (next_midnight(now.date_naive()) - now)
                    .to_std()
                    .unwrap_or_default();
                tokio::time::sleep(wait).await;
                limiter.rollover();
            }
        })
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitPolicy::default(), Arc::new(SystemClock))
    }
}

fn next_midnight(today: NaiveDate) -> DateTime<Utc> {
    let tomorrow = today + Duration::days(1);
    tomorrow.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn first_of_next_month(today: NaiveDate) -> DateTime<Utc> {
    let (year, month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap_or(today)
        .and_time(chrono::NaiveTime::MIN)
        .and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn limiter_at(y: i32, m: u32, d: u32) -> (RateLimiter, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap());
        let limiter = RateLimiter::new(RateLimitPolicy::default(), Arc::new(clock.clone()));
        (limiter, clock)
    }

    #[test]
    fn fresh_user_is_allowed() {
        let (limiter, _clock) = limiter_at(2026, 5, 12);
        let status = limiter.check_limit(Uuid::new_v4(), SuggestionKind::Briefing);

        assert!(status.allowed);
        assert_eq!(status.remaining, 10);
        assert_eq!(status.limit, 10);
        assert_eq!(status.current_usage, 0);
    }

    #[test]
    fn per_kind_cap_blocks_under_daily_total() {
        let (limiter, _clock) = limiter_at(2026, 5, 12);
        let user = Uuid::new_v4();

        for _ in 0..5 {
            limiter.record_usage(user, SuggestionKind::Plan);
        }

        let plan = limiter.check_limit(user, SuggestionKind::Plan);
        assert!(!plan.allowed);
        assert_eq!(plan.remaining, 0);
        assert_eq!(plan.limit, 5);
        assert_eq!(plan.current_usage, 5);
        assert_eq!(
            plan.reset_time,
            Utc.with_ymd_and_hms(2026, 5, 13, 0, 0, 0).unwrap()
        );

        let briefing = limiter.check_limit(user, SuggestionKind::Briefing);
        assert!(briefing.allowed);
        assert_eq!(briefing.remaining, 10);
    }

    #[test]
    fn remaining_is_smallest_headroom() {
        let (limiter, _clock) = limiter_at(2026, 5, 12);
        let user = Uuid::new_v4();

        for _ in 0..9 {
            limiter.record_usage(user, SuggestionKind::Briefing);
        }
        for _ in 0..5 {
            limiter.record_usage(user, SuggestionKind::Reschedule);
        }
        for _ in 0..4 {
            limiter.record_usage(user, SuggestionKind::Plan);
        }

        // 18 of 20 daily used, plan has 1 of 5 left.
        let status = limiter.check_limit(user, SuggestionKind::Plan);
        assert!(status.allowed);
        assert_eq!(status.remaining, 1);

        limiter.record_usage(user, SuggestionKind::Briefing);
        // 19 of 20 daily, briefing cap now full.
        assert!(!limiter.check_limit(user, SuggestionKind::Briefing).allowed);
        assert_eq!(limiter.check_limit(user, SuggestionKind::Plan).remaining, 1);
    }

    #[test]
    fn daily_counters_reset_at_midnight() {
        let (limiter, clock) = limiter_at(2026, 5, 12);
        let user = Uuid::new_v4();
        for _ in 0..5 {
            limiter.record_usage(user, SuggestionKind::Plan);
        }
        assert!(!limiter.check_limit(user, SuggestionKind::Plan).allowed);

        clock.advance(Duration::hours(14));

        assert!(limiter.check_limit(user, SuggestionKind::Plan).allowed);
        let usage = limiter.usage(user);
        assert_eq!(usage.daily_total, 0);
        assert_eq!(usage.monthly_total, 5);
    }

    #[test]
    fn monthly_ceiling_resets_on_first_of_month() {
        let (limiter, clock) = limiter_at(2026, 12, 31);
        let user = Uuid::new_v4();
        limiter.set_user_policy(
            user,
            RateLimitPolicy {
                daily: 10,
                monthly: 3,
                ..Default::default()
            },
        );
        for _ in 0..3 {
            limiter.record_usage(user, SuggestionKind::Briefing);
        }

        let status = limiter.check_limit(user, SuggestionKind::Briefing);
        assert!(!status.allowed);
        assert_eq!(
            status.reset_time,
            Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap()
        );

        clock.advance(Duration::hours(14));
        limiter.rollover();
        assert_eq!(limiter.usage(user).monthly_total, 0);
        assert!(limiter.check_limit(user, SuggestionKind::Briefing).allowed);
    }

    #[test]
    fn overrides_only_affect_their_user() {
        let (limiter, _clock) = limiter_at(2026, 5, 12);
        let strict = Uuid::new_v4();
        let other = Uuid::new_v4();

        limiter.set_user_policy(
            strict,
            RateLimitPolicy {
                per_kind_daily: BTreeMap::from([(SuggestionKind::Plan, 1)]),
                ..Default::default()
            },
        );
        limiter.record_usage(strict, SuggestionKind::Plan);
        limiter.record_usage(other, SuggestionKind::Plan);

        assert!(!limiter.check_limit(strict, SuggestionKind::Plan).allowed);
        assert!(limiter.check_limit(other, SuggestionKind::Plan).allowed);

        assert!(limiter.clear_user_policy(strict));
        assert!(limiter.check_limit(strict, SuggestionKind::Plan).allowed);
    }

    #[test]
    fn usage_snapshot_lists_every_kind() {
        let (limiter, _clock) = limiter_at(2026, 5, 12);
        let user = Uuid::new_v4();
        limiter.record_usage(user, SuggestionKind::Reschedule);

        let usage = limiter.usage(user);
        assert_eq!(usage.per_kind.len(), 3);
        let reschedule = usage
            .per_kind
            .iter()
            .find(|k| k.kind == SuggestionKind::Reschedule)
            .unwrap();
        assert_eq!(reschedule.used, 1);
        assert_eq!(reschedule.limit, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_rollover_fires_at_midnight() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 12, 23, 59, 0).unwrap());
        let limiter = Arc::new(RateLimiter::new(
            RateLimitPolicy::default(),
            Arc::new(clock.clone()),
        ));
        let user = Uuid::new_v4();
        limiter.record_usage(user, SuggestionKind::Plan);

        let handle = limiter.spawn_rollover();
        tokio::task::yield_now().await;

        clock.advance(Duration::minutes(2));
        tokio::time::sleep(std::time::Duration::from_secs(61)).await;

        // Inspect the raw window; `usage()` would refresh it lazily.
        let state = limiter.state.lock().unwrap();
        assert_eq!(state.windows[&user].daily_total, 0);
        assert_eq!(state.windows[&user].monthly_total, 1);
        drop(state);
        handle.abort();
    }
}
