use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::Priority;

/// A stored, AI-generated proposal.
///
/// Suggestions are created by the generation service and later **applied**,
/// which turns their content into goals, tasks and calendar changes. Once
/// `applied` is set the suggestion is immutable apart from archival.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: SuggestionContent,
    pub applied: bool,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Suggestion {
    pub fn kind(&self) -> SuggestionKind {
        self.content.kind()
    }
}

/// The kind of proposal a suggestion carries.
///
/// - `Plan`: Goals with task breakdowns generated from free text
/// - `Briefing`: A daily summary with task priority emphasis
/// - `Reschedule`: New due dates / times for backlog tasks and events
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Plan,
    Briefing,
    Reschedule,
}

impl SuggestionKind {
    pub const ALL: [SuggestionKind; 3] = [Self::Plan, Self::Briefing, Self::Reschedule];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Briefing => "briefing",
            Self::Reschedule => "reschedule",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "plan" => Some(Self::Plan),
            "briefing" => Some(Self::Briefing),
            "reschedule" => Some(Self::Reschedule),
            _ => None,
        }
    }
}

impl std::fmt::Display for SuggestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured suggestion content, keyed by kind.
///
/// Serialized as `{"kind": "...", "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum SuggestionContent {
    Plan(PlanContent),
    Briefing(BriefingContent),
    Reschedule(RescheduleContent),
}

impl SuggestionContent {
    pub fn kind(&self) -> SuggestionKind {
        match self {
            Self::Plan(_) => SuggestionKind::Plan,
            Self::Briefing(_) => SuggestionKind::Briefing,
            Self::Reschedule(_) => SuggestionKind::Reschedule,
        }
    }

    /// Serialize only the kind-specific payload (the `data` part).
    pub fn data_json(&self) -> serde_json::Result<String> {
        match self {
            Self::Plan(c) => serde_json::to_string(c),
            Self::Briefing(c) => serde_json::to_string(c),
            Self::Reschedule(c) => serde_json::to_string(c),
        }
    }

    /// Rebuild content from a kind and its serialized payload.
    pub fn from_data_json(kind: SuggestionKind, json: &str) -> serde_json::Result<Self> {
        Ok(match kind {
            SuggestionKind::Plan => Self::Plan(serde_json::from_str(json)?),
            SuggestionKind::Briefing => Self::Briefing(serde_json::from_str(json)?),
            SuggestionKind::Reschedule => Self::Reschedule(serde_json::from_str(json)?),
        })
    }
}

// ============================================================
// Plan
// ============================================================

/// Goals with their task breakdowns. A successful generation always has at
/// least one goal; a goal's task list may be empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanContent {
    pub goals: Vec<PlanGoal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanGoal {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tasks: Vec<PlanTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanTask {
    pub title: String,
    #[serde(default)]
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
}

// ============================================================
// Briefing
// ============================================================

/// A daily briefing. Lists preserve source order and may contain duplicates.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BriefingContent {
    pub summary: String,
    #[serde(default)]
    pub todays_tasks: Vec<BriefingTask>,
    #[serde(default)]
    pub upcoming_deadlines: Vec<DeadlineItem>,
    #[serde(default)]
    pub habit_reminders: Vec<String>,
}

/// A task the briefing wants emphasised at `priority`.
///
/// When `task_id` is missing the task is resolved by title at apply time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BriefingTask {
    pub task_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeadlineItem {
    pub task_id: Option<Uuid>,
    pub title: String,
    pub due_date: NaiveDate,
}

// ============================================================
// Reschedule
// ============================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RescheduleContent {
    pub reason: String,
    #[serde(default)]
    pub affected_tasks: Vec<AffectedTask>,
    #[serde(default)]
    pub affected_events: Vec<AffectedEvent>,
}

/// A task whose due date should move. A missing `suggested_due_date` clears it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AffectedTask {
    pub task_id: Option<Uuid>,
    pub title: Option<String>,
    pub current_due_date: Option<NaiveDate>,
    pub suggested_due_date: Option<NaiveDate>,
}

/// An event whose times should move. A lone suggested start or end moves the
/// whole event and keeps its length.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AffectedEvent {
    pub event_id: Option<Uuid>,
    pub title: Option<String>,
    pub current_start: Option<DateTime<Utc>>,
    pub suggested_start: Option<DateTime<Utc>>,
    pub suggested_end: Option<DateTime<Utc>>,
}
