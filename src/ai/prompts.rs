//! Prompt text for each suggestion kind.
//!
//! The wording is free to change. The JSON shapes requested here must match
//! the content types in [`crate::models::suggestion`].

use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{CalendarEvent, Goal, Habit, Task};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

const JSON_ONLY: &str = "Respond with a single JSON object and nothing else. Use lowercase priorities (\"low\", \"medium\", \"high\") and ISO dates (YYYY-MM-DD).";

pub fn plan_prompt(goals_text: &str, month: &str, existing_goals: &[Goal]) -> Prompt {
    let system = format!(
        "You are a planning assistant that turns a person's free-form intentions for a month into concrete goals with small, actionable tasks. {JSON_ONLY}\n\
         Shape: {{\"goals\": [{{\"title\": string, \"description\": string, \"category\": string, \
         \"tasks\": [{{\"title\": string, \"priority\": \"low\"|\"medium\"|\"high\", \"due_date\": \"YYYY-MM-DD\"|null}}]}}]}}\n\
         Produce between 1 and 5 goals with up to 5 tasks each, all due within {month}."
    );

    let mut user = format!("Month: {month}\n\nWhat I want to achieve:\n{}\n", goals_text.trim());
    if !existing_goals.is_empty() {
        user.push_str("\nGoals I already have (avoid duplicating them):\n");
        for goal in existing_goals {
            let _ = writeln!(user, "- {} ({}%)", goal.title, goal.progress);
        }
    }

    Prompt { system, user }
}

pub fn briefing_prompt(
    date: NaiveDate,
    tasks: &[Task],
    deadlines: &[Task],
    habits: &[Habit],
    events: &[CalendarEvent],
) -> Prompt {
    let system = format!(
        "You are a concise daily-briefing assistant. Summarise the day and say which tasks deserve attention. {JSON_ONLY}\n\
         Shape: {{\"summary\": string, \
         \"todays_tasks\": [{{\"task_id\": uuid|null, \"title\": string, \"priority\": \"low\"|\"medium\"|\"high\"}}], \
         \"upcoming_deadlines\": [{{\"task_id\": uuid|null, \"title\": string, \"due_date\": \"YYYY-MM-DD\"}}], \
         \"habit_reminders\": [string]}}\n\
         Reuse the task ids given to you. Only raise a priority when it is warranted."
    );

    let mut user = format!("Today is {}.\n", date.format("%A %Y-%m-%d"));
    write_tasks(&mut user, "Open tasks due today or overdue", tasks);
    write_tasks(&mut user, "Deadlines in the next week", deadlines);

    if !habits.is_empty() {
        user.push_str("\nActive habits:\n");
        for habit in habits {
            let _ = writeln!(user, "- {} ({})", habit.title, habit.frequency.as_str());
        }
    }
    write_events(&mut user, "Today's calendar", events);

    Prompt { system, user }
}

pub fn reschedule_prompt(date: NaiveDate, backlog: &[Task], events: &[CalendarEvent]) -> Prompt {
    let system = format!(
        "You are a scheduling assistant. Propose realistic new due dates for overdue tasks, \
         spreading the load and respecting existing calendar commitments. {JSON_ONLY}\n\
         Shape: {{\"reason\": string, \
         \"affected_tasks\": [{{\"task_id\": uuid, \"title\": string, \"current_due_date\": \"YYYY-MM-DD\"|null, \"suggested_due_date\": \"YYYY-MM-DD\"|null}}], \
         \"affected_events\": [{{\"event_id\": uuid, \"title\": string, \"current_start\": RFC3339|null, \"suggested_start\": RFC3339|null, \"suggested_end\": RFC3339|null}}]}}\n\
         Never suggest a date before tomorrow."
    );

    let mut user = format!("Today is {}.\n", date.format("%Y-%m-%d"));
    write_tasks(&mut user, "Overdue tasks", backlog);
    write_events(&mut user, "Upcoming events", events);

    Prompt { system, user }
}

fn write_tasks(out: &mut String, heading: &str, tasks: &[Task]) {
    if tasks.is_empty() {
        let _ = writeln!(out, "\n{heading}: none");
        return;
    }
    let _ = writeln!(out, "\n{heading}:");
    for task in tasks {
        let due = task
            .due_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "no due date".to_string());
        let _ = writeln!(
            out,
            "- [{}] {} (priority: {}, due: {})",
            task.id,
            task.title,
            task.priority.as_str(),
            due
        );
    }
}

fn write_events(out: &mut String, heading: &str, events: &[CalendarEvent]) {
    if events.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{heading}:");
    for event in events {
        let _ = writeln!(
            out,
            "- [{}] {} ({} to {})",
            event.id,
            event.title,
            event.start_time.to_rfc3339(),
            event.end_time.to_rfc3339()
        );
    }
}
