use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unit of work on the user's list.
///
/// Tasks created from an applied plan carry the `goal_id` of the goal they were
/// generated under; the goal's progress is derived from the ratio of its tasks
/// that are [`TaskStatus::Done`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub goal_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How urgent a task is.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    /// Sort key where more urgent priorities come first.
    pub fn urgency_rank(&self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }
}

/// The completion status of a task.
///
/// - `Todo`: Not started
/// - `InProgress`: Being worked on
/// - `Done`: Finished; counts toward goal progress
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(Self::Todo),
            "in_progress" => Some(Self::InProgress),
            "done" => Some(Self::Done),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Done)
    }
}

/// Input for creating a new task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTaskInput {
    /// Goal this task contributes to, if any.
    pub goal_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    /// Defaults to `Medium` if not specified.
    pub priority: Option<Priority>,
    pub due_date: Option<NaiveDate>,
}

/// Filters for listing a user's tasks. Unset fields do not constrain the result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    /// Exclude tasks that are `Done`.
    #[serde(default)]
    pub open_only: bool,
    /// Only tasks with a due date on or after this day.
    pub due_from: Option<NaiveDate>,
    /// Only tasks with a due date on or before this day.
    pub due_until: Option<NaiveDate>,
    pub goal_id: Option<Uuid>,
}

impl TaskFilter {
    pub fn open() -> Self {
        Self {
            open_only: true,
            ..Self::default()
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        if self.open_only && !task.status.is_open() {
            return false;
        }
        if let Some(goal_id) = self.goal_id {
            if task.goal_id != Some(goal_id) {
                return false;
            }
        }
        if self.due_from.is_some() || self.due_until.is_some() {
            let Some(due) = task.due_date else {
                return false;
            };
            if self.due_from.is_some_and(|from| due < from) {
                return false;
            }
            if self.due_until.is_some_and(|until| due > until) {
                return false;
            }
        }
        true
    }
}
