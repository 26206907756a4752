mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::models::*;

const GOAL_COLUMNS: &str =
    "id, user_id, title, description, category, month, progress, status, created_at, updated_at";
const TASK_COLUMNS: &str =
    "id, user_id, goal_id, title, description, priority, status, due_date, created_at, updated_at";
const EVENT_COLUMNS: &str =
    "id, user_id, title, description, start_time, end_time, created_at, updated_at";
const SUGGESTION_COLUMNS: &str =
    "id, user_id, kind, content, applied, archived, created_at, updated_at";

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        Self::open(default_path()?)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Goal operations
    // ============================================================

    pub fn create_goal(&self, user_id: Uuid, input: CreateGoalInput) -> Result<Goal> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            anyhow::bail!("Goal title must not be empty");
        }

        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO goals (id, user_id, title, description, category, month, progress, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, 0, 'active', ?, ?)",
            (
                id.to_string(),
                user_id.to_string(),
                &title,
                &input.description,
                &input.category,
                &input.month,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ),
        )?;

        Ok(Goal {
            id,
            user_id,
            title,
            description: input.description,
            category: input.category,
            month: input.month,
            progress: 0,
            status: GoalStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get_goal(&self, id: Uuid) -> Result<Option<Goal>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let goal = conn
            .query_row(
                &format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = ?"),
                [id.to_string()],
                goal_from_row,
            )
            .optional()?;
        Ok(goal)
    }

    pub fn get_goals_by_user(&self, user_id: Uuid) -> Result<Vec<Goal>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {GOAL_COLUMNS} FROM goals WHERE user_id = ? ORDER BY created_at, title"
        ))?;

        let goals = stmt
            .query_map([user_id.to_string()], goal_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(goals)
    }

    /// Recompute a goal's progress from the share of its tasks that are done.
    ///
    /// Returns the new percentage, or `None` if the goal does not exist.
    pub fn recompute_goal_progress(&self, goal_id: Uuid) -> Result<Option<u8>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let (total, done): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN status = 'done' THEN 1 ELSE 0 END), 0)
             FROM tasks WHERE goal_id = ?",
            [goal_id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let progress = progress_percent(done, total);
        let rows = conn.execute(
            "UPDATE goals SET progress = ?, updated_at = ? WHERE id = ?",
            (progress, Utc::now().to_rfc3339(), goal_id.to_string()),
        )?;

        Ok((rows > 0).then_some(progress))
    }

    // ============================================================
    // Task operations
    // ============================================================

    pub fn create_task(&self, user_id: Uuid, input: CreateTaskInput) -> Result<Task> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            anyhow::bail!("Task title must not be empty");
        }

        if let Some(goal_id) = input.goal_id {
            self.get_goal(goal_id)?
                .ok_or_else(|| anyhow::anyhow!("Goal not found"))?;
        }

        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();
        let priority = input.priority.unwrap_or_default();

        conn.execute(
            "INSERT INTO tasks (id, user_id, goal_id, title, description, priority, status, due_date, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, 'todo', ?, ?, ?)",
            (
                id.to_string(),
                user_id.to_string(),
                input.goal_id.map(|u| u.to_string()),
                &title,
                &input.description,
                priority.as_str(),
                input.due_date.map(|d| d.to_string()),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ),
        )?;

        Ok(Task {
            id,
            user_id,
            goal_id: input.goal_id,
            title,
            description: input.description,
            priority,
            status: TaskStatus::Todo,
            due_date: input.due_date,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let task = conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"),
                [id.to_string()],
                task_from_row,
            )
            .optional()?;
        Ok(task)
    }

    /// List a user's tasks ordered by due date (undated last), then priority.
    pub fn get_tasks_by_user(&self, user_id: Uuid, filter: &TaskFilter) -> Result<Vec<Task>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?
             ORDER BY due_date IS NULL, due_date,
                      CASE priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END,
                      created_at"
        ))?;

        let tasks = stmt
            .query_map([user_id.to_string()], task_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tasks.into_iter().filter(|t| filter.matches(t)).collect())
    }

    pub fn update_task_status(&self, id: Uuid, status: TaskStatus) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?",
            (status.as_str(), Utc::now().to_rfc3339(), id.to_string()),
        )?;
        Ok(rows > 0)
    }

    pub fn update_task_priority(&self, id: Uuid, priority: Priority) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE tasks SET priority = ?, updated_at = ? WHERE id = ?",
            (priority.as_str(), Utc::now().to_rfc3339(), id.to_string()),
        )?;
        Ok(rows > 0)
    }

    /// Set or clear (`None`) a task's due date.
    pub fn update_task_due_date(&self, id: Uuid, due_date: Option<NaiveDate>) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE tasks SET due_date = ?, updated_at = ? WHERE id = ?",
            (
                due_date.map(|d| d.to_string()),
                Utc::now().to_rfc3339(),
                id.to_string(),
            ),
        )?;
        Ok(rows > 0)
    }

    // ============================================================
    // Calendar event operations
    // ============================================================

    pub fn create_event(&self, user_id: Uuid, input: CreateEventInput) -> Result<CalendarEvent> {
        if input.end_time < input.start_time {
            anyhow::bail!("Event end time must not be before its start time");
        }

        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO calendar_events (id, user_id, title, description, start_time, end_time, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                user_id.to_string(),
                &input.title,
                &input.description,
                input.start_time.to_rfc3339(),
                input.end_time.to_rfc3339(),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ),
        )?;

        Ok(CalendarEvent {
            id,
            user_id,
            title: input.title,
            description: input.description,
            start_time: input.start_time,
            end_time: input.end_time,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get_event(&self, id: Uuid) -> Result<Option<CalendarEvent>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let event = conn
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM calendar_events WHERE id = ?"),
                [id.to_string()],
                event_from_row,
            )
            .optional()?;
        Ok(event)
    }

    /// List a user's events starting within `[from, until)`, ordered by start time.
    pub fn get_events_by_user(
        &self,
        user_id: Uuid,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<CalendarEvent>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM calendar_events WHERE user_id = ? ORDER BY start_time"
        ))?;

        let events = stmt
            .query_map([user_id.to_string()], event_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(events
            .into_iter()
            .filter(|e| from.map_or(true, |f| e.start_time >= f))
            .filter(|e| until.map_or(true, |u| e.start_time < u))
            .collect())
    }

    /// Move an event. A lone start or end shifts the whole event, keeping its length.
    pub fn update_event_times(
        &self,
        id: Uuid,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let Some(existing) = self.get_event(id)? else {
            return Ok(false);
        };

        let (start, end) = existing.moved_times(start_time, end_time);
        if end < start {
            anyhow::bail!("Event end time must not be before its start time");
        }

        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE calendar_events SET start_time = ?, end_time = ?, updated_at = ? WHERE id = ?",
            (
                start.to_rfc3339(),
                end.to_rfc3339(),
                Utc::now().to_rfc3339(),
                id.to_string(),
            ),
        )?;
        Ok(rows > 0)
    }

    // ============================================================
    // Habit operations
    // ============================================================

    pub fn create_habit(&self, user_id: Uuid, input: CreateHabitInput) -> Result<Habit> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO habits (id, user_id, title, frequency, active, created_at)
             VALUES (?, ?, ?, ?, 1, ?)",
            (
                id.to_string(),
                user_id.to_string(),
                &input.title,
                input.frequency.as_str(),
                now.to_rfc3339(),
            ),
        )?;

        Ok(Habit {
            id,
            user_id,
            title: input.title,
            frequency: input.frequency,
            active: true,
            created_at: now,
        })
    }

    pub fn get_habits_by_user(&self, user_id: Uuid) -> Result<Vec<Habit>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, user_id, title, frequency, active, created_at
             FROM habits WHERE user_id = ? ORDER BY created_at, title",
        )?;

        let habits = stmt
            .query_map([user_id.to_string()], |row| {
                Ok(Habit {
                    id: parse_uuid(row.get::<_, String>(0)?),
                    user_id: parse_uuid(row.get::<_, String>(1)?),
                    title: row.get(2)?,
                    frequency: HabitFrequency::from_str(&row.get::<_, String>(3)?)
                        .unwrap_or(HabitFrequency::Daily),
                    active: row.get::<_, i32>(4)? != 0,
                    created_at: parse_datetime(row.get::<_, String>(5)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(habits)
    }

    pub fn set_habit_active(&self, id: Uuid, active: bool) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE habits SET active = ? WHERE id = ?",
            (if active { 1 } else { 0 }, id.to_string()),
        )?;
        Ok(rows > 0)
    }

    // ============================================================
    // Suggestion operations
    // ============================================================

    pub fn create_suggestion(&self, user_id: Uuid, content: SuggestionContent) -> Result<Suggestion> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO suggestions (id, user_id, kind, content, applied, archived, created_at, updated_at)
             VALUES (?, ?, ?, ?, 0, 0, ?, ?)",
            (
                id.to_string(),
                user_id.to_string(),
                content.kind().as_str(),
                content.data_json()?,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ),
        )?;

        Ok(Suggestion {
            id,
            user_id,
            content,
            applied: false,
            archived: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get_suggestion(&self, id: Uuid) -> Result<Option<Suggestion>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let raw = conn
            .query_row(
                &format!("SELECT {SUGGESTION_COLUMNS} FROM suggestions WHERE id = ?"),
                [id.to_string()],
                SuggestionRow::from_row,
            )
            .optional()?;

        raw.map(SuggestionRow::into_suggestion).transpose()
    }

    /// List a user's suggestions, newest first.
    pub fn get_suggestions_by_user(
        &self,
        user_id: Uuid,
        include_archived: bool,
    ) -> Result<Vec<Suggestion>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {SUGGESTION_COLUMNS} FROM suggestions
             WHERE user_id = ? AND (archived = 0 OR ?)
             ORDER BY created_at DESC"
        ))?;

        let rows = stmt
            .query_map((user_id.to_string(), include_archived), SuggestionRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(SuggestionRow::into_suggestion).collect()
    }

    /// Flag a suggestion as applied. Returns false if it does not exist or was already applied.
    pub fn mark_applied(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE suggestions SET applied = 1, updated_at = ? WHERE id = ? AND applied = 0",
            (Utc::now().to_rfc3339(), id.to_string()),
        )?;
        Ok(rows > 0)
    }

    pub fn archive_suggestion(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE suggestions SET archived = 1, updated_at = ? WHERE id = ?",
            (Utc::now().to_rfc3339(), id.to_string()),
        )?;
        Ok(rows > 0)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn default_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "planwise")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(dirs.data_dir().join("planwise.db"))
}

/// Whole-percent share of `done` in `total`; zero for an empty goal.
fn progress_percent(done: i64, total: i64) -> u8 {
    if total <= 0 {
        return 0;
    }
    ((done as f64 / total as f64) * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Raw suggestion row; content is decoded once the statement is released.
struct SuggestionRow {
    id: String,
    user_id: String,
    kind: String,
    content: String,
    applied: bool,
    archived: bool,
    created_at: String,
    updated_at: String,
}

impl SuggestionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            kind: row.get(2)?,
            content: row.get(3)?,
            applied: row.get::<_, i32>(4)? != 0,
            archived: row.get::<_, i32>(5)? != 0,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_suggestion(self) -> Result<Suggestion> {
        let kind = SuggestionKind::from_str(&self.kind)
            .ok_or_else(|| anyhow::anyhow!("Unknown suggestion kind '{}'", self.kind))?;
        let content = SuggestionContent::from_data_json(kind, &self.content)?;

        Ok(Suggestion {
            id: parse_uuid(self.id),
            user_id: parse_uuid(self.user_id),
            content,
            applied: self.applied,
            archived: self.archived,
            created_at: parse_datetime(self.created_at),
            updated_at: parse_datetime(self.updated_at),
        })
    }
}

fn goal_from_row(row: &Row<'_>) -> rusqlite::Result<Goal> {
    Ok(Goal {
        id: parse_uuid(row.get::<_, String>(0)?),
        user_id: parse_uuid(row.get::<_, String>(1)?),
        title: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        month: row.get(5)?,
        progress: row.get::<_, i64>(6)?.clamp(0, 100) as u8,
        status: GoalStatus::from_str(&row.get::<_, String>(7)?).unwrap_or(GoalStatus::Active),
        created_at: parse_datetime(row.get::<_, String>(8)?),
        updated_at: parse_datetime(row.get::<_, String>(9)?),
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: parse_uuid(row.get::<_, String>(0)?),
        user_id: parse_uuid(row.get::<_, String>(1)?),
        goal_id: row.get::<_, Option<String>>(2)?.map(parse_uuid),
        title: row.get(3)?,
        description: row.get(4)?,
        priority: Priority::from_str(&row.get::<_, String>(5)?).unwrap_or_default(),
        status: TaskStatus::from_str(&row.get::<_, String>(6)?).unwrap_or(TaskStatus::Todo),
        due_date: row
            .get::<_, Option<String>>(7)?
            .and_then(|s| s.parse::<NaiveDate>().ok()),
        created_at: parse_datetime(row.get::<_, String>(8)?),
        updated_at: parse_datetime(row.get::<_, String>(9)?),
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<CalendarEvent> {
    Ok(CalendarEvent {
        id: parse_uuid(row.get::<_, String>(0)?),
        user_id: parse_uuid(row.get::<_, String>(1)?),
        title: row.get(2)?,
        description: row.get(3)?,
        start_time: parse_datetime(row.get::<_, String>(4)?),
        end_time: parse_datetime(row.get::<_, String>(5)?),
        created_at: parse_datetime(row.get::<_, String>(6)?),
        updated_at: parse_datetime(row.get::<_, String>(7)?),
    })
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_percent_rounds_to_whole_numbers() {
        assert_eq!(progress_percent(0, 0), 0);
        assert_eq!(progress_percent(0, 3), 0);
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 67);
        assert_eq!(progress_percent(3, 3), 100);
    }
}
