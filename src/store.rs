//! The store operations the suggestion pipeline depends on.
//!
//! [`Database`] is the SQLite implementation. Tests substitute in-memory
//! doubles that count calls or fail on demand.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::db::Database;
use crate::models::*;

#[async_trait]
pub trait PlannerStore: Send + Sync {
    async fn create_goal(&self, user_id: Uuid, input: CreateGoalInput) -> Result<Goal>;

    async fn create_task(&self, user_id: Uuid, input: CreateTaskInput) -> Result<Task>;

    /// Returns false if the task does not exist.
    async fn update_task_priority(&self, task_id: Uuid, priority: Priority) -> Result<bool>;

    /// Set or clear (`None`) a due date. Returns false if the task does not exist.
    async fn update_task_due_date(&self, task_id: Uuid, due_date: Option<NaiveDate>)
        -> Result<bool>;

    /// Write whichever of `start`/`end` are present. Returns false if the event does not exist.
    async fn update_event_times(
        &self,
        event_id: Uuid,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<bool>;

    async fn find_tasks_by_user(&self, user_id: Uuid, filter: TaskFilter) -> Result<Vec<Task>>;

    async fn find_goals_by_user(&self, user_id: Uuid) -> Result<Vec<Goal>>;

    async fn find_events_by_user(
        &self,
        user_id: Uuid,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<CalendarEvent>>;

    async fn find_habits_by_user(&self, user_id: Uuid) -> Result<Vec<Habit>>;

    async fn recompute_goal_progress(&self, goal_id: Uuid) -> Result<Option<u8>>;

    async fn create_suggestion(&self, user_id: Uuid, content: SuggestionContent)
        -> Result<Suggestion>;

    async fn mark_applied(&self, suggestion_id: Uuid) -> Result<bool>;

    async fn get_suggestion(&self, suggestion_id: Uuid) -> Result<Option<Suggestion>>;
}

#[async_trait]
impl PlannerStore for Database {
    async fn create_goal(&self, user_id: Uuid, input: CreateGoalInput) -> Result<Goal> {
        Database::create_goal(self, user_id, input)
    }

    async fn create_task(&self, user_id: Uuid, input: CreateTaskInput) -> Result<Task> {
        Database::create_task(self, user_id, input)
    }

    async fn update_task_priority(&self, task_id: Uuid, priority: Priority) -> Result<bool> {
        Database::update_task_priority(self, task_id, priority)
    }

    async fn update_task_due_date(
        &self,
        task_id: Uuid,
        due_date: Option<NaiveDate>,
    ) -> Result<bool> {
        Database::update_task_due_date(self, task_id, due_date)
    }

    async fn update_event_times(
        &self,
        event_id: Uuid,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        Database::update_event_times(self, event_id, start, end)
    }

    async fn find_tasks_by_user(&self, user_id: Uuid, filter: TaskFilter) -> Result<Vec<Task>> {
        self.get_tasks_by_user(user_id, &filter)
    }

    async fn find_goals_by_user(&self, user_id: Uuid) -> Result<Vec<Goal>> {
        self.get_goals_by_user(user_id)
    }

    async fn find_events_by_user(
        &self,
        user_id: Uuid,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<CalendarEvent>> {
        self.get_events_by_user(user_id, from, until)
    }

    async fn find_habits_by_user(&self, user_id: Uuid) -> Result<Vec<Habit>> {
        self.get_habits_by_user(user_id)
    }

    async fn recompute_goal_progress(&self, goal_id: Uuid) -> Result<Option<u8>> {
        Database::recompute_goal_progress(self, goal_id)
    }

    async fn create_suggestion(
        &self,
        user_id: Uuid,
        content: SuggestionContent,
    ) -> Result<Suggestion> {
        Database::create_suggestion(self, user_id, content)
    }

    async fn mark_applied(&self, suggestion_id: Uuid) -> Result<bool> {
        Database::mark_applied(self, suggestion_id)
    }

    async fn get_suggestion(&self, suggestion_id: Uuid) -> Result<Option<Suggestion>> {
        Database::get_suggestion(self, suggestion_id)
    }
}
