//! Test doubles shared by the integration specs.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use planwise::ai::{CompletionRequest, ModelProvider, ProviderError};
use planwise::clock::ManualClock;
use planwise::models::*;
use planwise::store::PlannerStore;
use uuid::Uuid;

pub fn start_clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 12, 10, 0, 0).unwrap())
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub const PLAN_JSON: &str = r#"```json
{"goals": [
  {"title": "Run 5k", "description": "Build up to a 5k run", "category": "health",
   "tasks": [{"title": "Run 2k three times", "priority": "high", "due_date": "2026-05-15"},
             {"title": "Run 5k once", "priority": "medium", "due_date": null}]},
  {"title": "Read books", "category": "learning",
   "tasks": [{"title": "Pick two books", "priority": "low"}]}
]}
```"#;

// ============================================================
// Store
// ============================================================

#[derive(Default)]
struct MockData {
    goals: Vec<Goal>,
    tasks: Vec<Task>,
    events: Vec<CalendarEvent>,
    habits: Vec<Habit>,
    suggestions: Vec<Suggestion>,
    goal_inserts: usize,
}

/// In-memory [`PlannerStore`] that counts writes and can fail the Nth goal insert.
#[derive(Default)]
pub struct MockStore {
    data: Mutex<MockData>,
    mutations: AtomicUsize,
    suggestion_inserts: AtomicUsize,
    progress_recomputes: AtomicUsize,
    fail_goal_insert: Option<usize>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`th (1-indexed) `create_goal` call.
    pub fn failing_goal_insert(n: usize) -> Self {
        Self {
            fail_goal_insert: Some(n),
            ..Self::default()
        }
    }

    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    pub fn suggestion_inserts(&self) -> usize {
        self.suggestion_inserts.load(Ordering::SeqCst)
    }

    pub fn progress_recomputes(&self) -> usize {
        self.progress_recomputes.load(Ordering::SeqCst)
    }

    pub fn goals(&self) -> Vec<Goal> {
        self.data.lock().unwrap().goals.clone()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.data.lock().unwrap().tasks.clone()
    }

    pub fn task(&self, id: Uuid) -> Option<Task> {
        self.data.lock().unwrap().tasks.iter().find(|t| t.id == id).cloned()
    }

    pub fn event(&self, id: Uuid) -> Option<CalendarEvent> {
        self.data.lock().unwrap().events.iter().find(|e| e.id == id).cloned()
    }

    /// Seed a task without counting it as a mutation.
    pub fn seed_task(
        &self,
        user_id: Uuid,
        title: &str,
        priority: Priority,
        status: TaskStatus,
        due_date: Option<NaiveDate>,
    ) -> Task {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            user_id,
            goal_id: None,
            title: title.to_string(),
            description: None,
            priority,
            status,
            due_date,
            created_at: now,
            updated_at: now,
        };
        self.data.lock().unwrap().tasks.push(task.clone());
        task
    }

    pub fn seed_event(
        &self,
        user_id: Uuid,
        title: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CalendarEvent {
        let now = Utc::now();
        let event = CalendarEvent {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            description: None,
            start_time: start,
            end_time: end,
            created_at: now,
            updated_at: now,
        };
        self.data.lock().unwrap().events.push(event.clone());
        event
    }

    pub fn seed_habit(&self, user_id: Uuid, title: &str, active: bool) -> Habit {
        let habit = Habit {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            frequency: HabitFrequency::Daily,
            active,
            created_at: Utc::now(),
        };
        self.data.lock().unwrap().habits.push(habit.clone());
        habit
    }

    fn mutated(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PlannerStore for MockStore {
    async fn create_goal(&self, user_id: Uuid, input: CreateGoalInput) -> Result<Goal> {
        let mut data = self.data.lock().unwrap();
        data.goal_inserts += 1;
        if self.fail_goal_insert == Some(data.goal_inserts) {
            bail!("forced goal insert failure");
        }
        self.mutated();

        let now = Utc::now();
        let goal = Goal {
            id: Uuid::new_v4(),
            user_id,
            title: input.title,
            description: input.description,
            category: input.category,
            month: input.month,
            progress: 0,
            status: GoalStatus::Active,
            created_at: now,
            updated_at: now,
        };
        data.goals.push(goal.clone());
        Ok(goal)
    }

    async fn create_task(&self, user_id: Uuid, input: CreateTaskInput) -> Result<Task> {
        self.mutated();
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            user_id,
            goal_id: input.goal_id,
            title: input.title,
            description: input.description,
            priority: input.priority.unwrap_or_default(),
            status: TaskStatus::Todo,
            due_date: input.due_date,
            created_at: now,
            updated_at: now,
        };
        self.data.lock().unwrap().tasks.push(task.clone());
        Ok(task)
    }

    async fn update_task_priority(&self, task_id: Uuid, priority: Priority) -> Result<bool> {
        self.mutated();
        let mut data = self.data.lock().unwrap();
        Ok(match data.tasks.iter_mut().find(|t| t.id == task_id) {
            Some(task) => {
                task.priority = priority;
                true
            }
            None => false,
        })
    }

    async fn update_task_due_date(
        &self,
        task_id: Uuid,
        due_date: Option<NaiveDate>,
    ) -> Result<bool> {
        self.mutated();
        let mut data = self.data.lock().unwrap();
        Ok(match data.tasks.iter_mut().find(|t| t.id == task_id) {
            Some(task) => {
                task.due_date = due_date;
                true
            }
            None => false,
        })
    }

    async fn update_event_times(
        &self,
        event_id: Uuid,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        self.mutated();
        let mut data = self.data.lock().unwrap();
        Ok(match data.events.iter_mut().find(|e| e.id == event_id) {
            Some(event) => {
                let (start, end) = event.moved_times(start, end);
                if end < start {
                    bail!("Event end time must not be before its start time");
                }
                event.start_time = start;
                event.end_time = end;
                true
            }
            None => false,
        })
    }

    async fn find_tasks_by_user(&self, user_id: Uuid, filter: TaskFilter) -> Result<Vec<Task>> {
        let data = self.data.lock().unwrap();
        Ok(data
            .tasks
            .iter()
            .filter(|t| t.user_id == user_id && filter.matches(t))
            .cloned()
            .collect())
    }

    async fn find_goals_by_user(&self, user_id: Uuid) -> Result<Vec<Goal>> {
        let data = self.data.lock().unwrap();
        Ok(data.goals.iter().filter(|g| g.user_id == user_id).cloned().collect())
    }

    async fn find_events_by_user(
        &self,
        user_id: Uuid,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<CalendarEvent>> {
        let data = self.data.lock().unwrap();
        Ok(data
            .events
            .iter()
            .filter(|e| e.user_id == user_id)
            .filter(|e| from.map_or(true, |from| e.start_time >= from))
            .filter(|e| until.map_or(true, |until| e.start_time < until))
            .cloned()
            .collect())
    }

    async fn find_habits_by_user(&self, user_id: Uuid) -> Result<Vec<Habit>> {
        let data = self.data.lock().unwrap();
        Ok(data.habits.iter().filter(|h| h.user_id == user_id).cloned().collect())
    }

    async fn recompute_goal_progress(&self, goal_id: Uuid) -> Result<Option<u8>> {
        self.progress_recomputes.fetch_add(1, Ordering::SeqCst);
        let data = self.data.lock().unwrap();
        if !data.goals.iter().any(|g| g.id == goal_id) {
            return Ok(None);
        }
        Ok(Some(0))
    }

    async fn create_suggestion(
        &self,
        user_id: Uuid,
        content: SuggestionContent,
    ) -> Result<Suggestion> {
        self.mutated();
        self.suggestion_inserts.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let suggestion = Suggestion {
            id: Uuid::new_v4(),
            user_id,
            content,
            applied: false,
            archived: false,
            created_at: now,
            updated_at: now,
        };
        self.data.lock().unwrap().suggestions.push(suggestion.clone());
        Ok(suggestion)
    }

    async fn mark_applied(&self, suggestion_id: Uuid) -> Result<bool> {
        self.mutated();
        let mut data = self.data.lock().unwrap();
        let suggestion = data
            .suggestions
            .iter_mut()
            .find(|s| s.id == suggestion_id)
            .ok_or_else(|| anyhow!("Suggestion not found"))?;
        if suggestion.applied {
            return Ok(false);
        }
        suggestion.applied = true;
        Ok(true)
    }

    async fn get_suggestion(&self, suggestion_id: Uuid) -> Result<Option<Suggestion>> {
        let data = self.data.lock().unwrap();
        Ok(data.suggestions.iter().find(|s| s.id == suggestion_id).cloned())
    }
}

// ============================================================
// Provider
// ============================================================

type Reply = Box<dyn Fn() -> Result<String, ProviderError> + Send + Sync>;

/// Scripted [`ModelProvider`]. Queued replies are used first, then `default`.
pub struct MockProvider {
    queued: Mutex<VecDeque<Result<String, ProviderError>>>,
    default: Reply,
    calls: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockProvider {
    pub fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::with_default(Box::new(move || Ok(text.clone())))
    }

    pub fn failing(make_error: fn() -> ProviderError) -> Self {
        Self::with_default(Box::new(move || Err(make_error())))
    }

    fn with_default(default: Reply) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            default,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, reply: Result<String, ProviderError>) -> Self {
        self.queued.lock().unwrap().push_back(reply);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        let queued = self.queued.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| (self.default)())
    }
}

pub fn server_error() -> ProviderError {
    ProviderError::Api {
        status: 500,
        message: "model overloaded".to_string(),
    }
}

pub fn bad_key() -> ProviderError {
    ProviderError::Unauthorized("Incorrect API key provided".to_string())
}
