//! Offline substitutes for model output.
//!
//! Every generator here is pure: it takes the caller's data plus an explicit
//! `today` and returns the same content for the same input. None of them
//! panic. A failure is reported as `success: false` with a message.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::models::{
    AffectedTask, BriefingContent, BriefingTask, PlanContent, PlanGoal, PlanTask, Priority,
    RescheduleContent, Task,
};

pub const MAX_FALLBACK_GOALS: usize = 5;
const MAX_TITLE_LEN: usize = 120;
const GENERIC_GOAL_TITLE: &str = "Make steady progress this month";
const FALLBACK_CATEGORY: &str = "personal";

/// Template tasks created under every fallback goal, with their day offset
/// inside the goal's week.
const TASK_TEMPLATES: [(&str, Priority, i64); 3] = [
    ("Research and plan", Priority::High, 2),
    ("Start working on", Priority::Medium, 4),
    ("Complete first milestone for", Priority::Low, 7),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub fallback_used: bool,
    pub message: String,
}

impl<T> FallbackResult<T> {
    fn from_outcome(outcome: Result<(T, String), String>) -> Self {
        match outcome {
            Ok((data, message)) => Self {
                success: true,
                data: Some(data),
                fallback_used: true,
                message,
            },
            Err(message) => Self {
                success: false,
                data: None,
                fallback_used: true,
                message,
            },
        }
    }
}

// ============================================================
// Plan
// ============================================================

pub fn generate_plan_fallback(goals_text: &str, today: NaiveDate) -> FallbackResult<PlanContent> {
    FallbackResult::from_outcome(build_plan(goals_text, today))
}

fn build_plan(goals_text: &str, today: NaiveDate) -> Result<(PlanContent, String), String> {
    let candidates = goal_candidates(goals_text);

    let goals = candidates
        .iter()
        .enumerate()
        .map(|(week, title)| plan_goal(title, week as i64, today))
        .collect::<Result<Vec<_>, _>>()?;

    let message = format!(
        "AI planning is unavailable; created {} goal(s) from your description using a standard template.",
        goals.len()
    );
    Ok((PlanContent { goals }, message))
}

fn plan_goal(title: &str, week: i64, today: NaiveDate) -> Result<PlanGoal, String> {
    let week_start = today
        .checked_add_signed(Duration::weeks(week))
        .ok_or_else(|| format!("Cannot schedule goal \"{title}\": date out of range"))?;

    let tasks = TASK_TEMPLATES
        .iter()
        .map(|(prefix, priority, offset)| {
            let due_date = week_start
                .checked_add_signed(Duration::days(*offset))
                .ok_or_else(|| format!("Cannot schedule tasks for \"{title}\": date out of range"))?;
            Ok::<_, String>(PlanTask {
                title: format!("{prefix} {title}"),
                priority: *priority,
                due_date: Some(due_date),
            })
        })
        .collect::<Result<Vec<_>, String>>()?;

    Ok(PlanGoal {
        title: title.to_string(),
        description: format!("Work towards: {title}"),
        category: FALLBACK_CATEGORY.to_string(),
        tasks,
    })
}

/// Split free text into goal titles.
///
/// Separate lines (with any bullet markers removed) win. A single line is
/// split into sentences. Anything else becomes one goal.
fn goal_candidates(text: &str) -> Vec<String> {
    let lines: Vec<String> = text
        .lines()
        .map(strip_bullet)
        .filter(|line| !line.is_empty())
        .map(truncate_title)
        .collect();

    if lines.len() > 1 {
        return lines.into_iter().take(MAX_FALLBACK_GOALS).collect();
    }

    let sentences: Vec<String> = split_sentences(text)
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(truncate_title)
        .collect();

    if sentences.len() > 1 {
        return sentences.into_iter().take(MAX_FALLBACK_GOALS).collect();
    }

    match lines.into_iter().next() {
        Some(line) => vec![line],
        None => vec![GENERIC_GOAL_TITLE.to_string()],
    }
}

/// Split on sentence punctuation. `.`, `!` and `?` only end a sentence when
/// followed by whitespace or the end of the text, so "2.5 kg" stays whole.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let ends = match c {
            ';' => true,
            '.' | '!' | '?' => chars.peek().map_or(true, |(_, next)| next.is_whitespace()),
            _ => false,
        };
        if ends {
            sentences.push(&text[start..i]);
            start = i + c.len_utf8();
        }
    }
    sentences.push(&text[start..]);
    sentences
}

fn strip_bullet(line: &str) -> &str {
    let line = line.trim();
    let line = line
        .strip_prefix(['-', '*', '•', '+'])
        .unwrap_or(line)
        .trim_start();

    // Numbered lists: "1. ", "2) ". "3.5 km" is not a marker.
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(['.', ')']) {
            if rest.starts_with(char::is_whitespace) {
                return rest.trim();
            }
        }
    }
    line.trim()
}

fn truncate_title(title: &str) -> String {
    let title = title.trim_end_matches(['.', '!', '?']);
    title.chars().take(MAX_TITLE_LEN).collect()
}

// ============================================================
// Briefing
// ============================================================

pub fn generate_briefing_fallback(
    tasks: &[Task],
    today: NaiveDate,
) -> FallbackResult<BriefingContent> {
    let count_of = |p: Priority| tasks.iter().filter(|t| t.priority == p).count();
    let high = count_of(Priority::High);
    let medium = count_of(Priority::Medium);

    let emphasis = if high > 0 {
        format!("Focus on {high} high-priority task(s) first.")
    } else if medium > 0 {
        format!("No high-priority tasks today; work through {medium} medium-priority task(s).")
    } else {
        "No high-priority tasks today. A good day to clear smaller items.".to_string()
    };

    let summary = format!(
        "You have {} open task(s) for {}. {emphasis}",
        tasks.len(),
        today.format("%A, %B %-d")
    );

    let content = BriefingContent {
        summary,
        todays_tasks: tasks
            .iter()
            .map(|t| BriefingTask {
                task_id: Some(t.id),
                title: t.title.clone(),
                priority: t.priority,
            })
            .collect(),
        upcoming_deadlines: Vec::new(),
        habit_reminders: Vec::new(),
    };

    FallbackResult::from_outcome(Ok((
        content,
        "AI briefing is unavailable; showing a summary of your open tasks.".to_string(),
    )))
}

// ============================================================
// Reschedule
// ============================================================

pub fn generate_reschedule_fallback(
    backlog: &[Task],
    today: NaiveDate,
) -> FallbackResult<RescheduleContent> {
    FallbackResult::from_outcome(build_reschedule(backlog, today))
}

fn build_reschedule(
    backlog: &[Task],
    today: NaiveDate,
) -> Result<(RescheduleContent, String), String> {
    let mut ordered: Vec<&Task> = backlog.iter().collect();
    // Stable: ties keep backlog order. Undated tasks go last.
    ordered.sort_by_key(|t| (t.priority.urgency_rank(), t.due_date.is_none(), t.due_date));

    let affected_tasks = ordered
        .iter()
        .enumerate()
        .map(|(i, task)| {
            let suggested = today
                .checked_add_signed(Duration::days(i as i64 + 1))
                .ok_or_else(|| format!("Cannot reschedule \"{}\": date out of range", task.title))?;
            Ok::<_, String>(AffectedTask {
                task_id: Some(task.id),
                title: Some(task.title.clone()),
                current_due_date: task.due_date,
                suggested_due_date: Some(suggested),
            })
        })
        .collect::<Result<Vec<_>, String>>()?;

    let reason = if affected_tasks.is_empty() {
        "Nothing is overdue; no changes needed.".to_string()
    } else {
        format!(
            "Spread {} overdue task(s) one per day starting tomorrow, most urgent first.",
            affected_tasks.len()
        )
    };

    Ok((
        RescheduleContent {
            reason,
            affected_tasks,
            affected_events: Vec::new(),
        },
        "AI rescheduling is unavailable; proposing an even spread of your backlog.".to_string(),
    ))
}
