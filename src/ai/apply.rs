//! Turning suggestion content into goals, tasks and calendar changes.
//!
//! Application is a sequence of independent store writes. A failing item is
//! recorded in the [`ApplyResult`] and the batch carries on, so a partially
//! applied suggestion is an expected outcome rather than an error.

use std::sync::Arc;

use uuid::Uuid;

use crate::ai::error::ApplyError;
use crate::models::{
    AffectedEvent, AffectedTask, ApplyOptions, ApplyResult, BriefingContent, BriefingTask,
    CreateGoalInput, CreateTaskInput, PlanContent, PlanGoal, RescheduleContent, Suggestion,
    SuggestionContent, Task, TaskFilter,
};
use crate::store::PlannerStore;

const UNKNOWN_TASK: &str = "Unknown task";
const UNKNOWN_EVENT: &str = "Unknown event";

pub struct ApplyEngine {
    store: Arc<dyn PlannerStore>,
}

impl ApplyEngine {
    pub fn new(store: Arc<dyn PlannerStore>) -> Self {
        Self { store }
    }

    /// Apply `suggestion` according to `options`.
    ///
    /// Flipping `Suggestion::applied` is left to the caller, who should only do
    /// so when the result is successful and this was not a dry run.
    pub async fn apply(
        &self,
        suggestion: &Suggestion,
        options: &ApplyOptions,
    ) -> Result<ApplyResult, ApplyError> {
        if suggestion.applied && !options.dry_run {
            return Err(ApplyError::AlreadyApplied(suggestion.id));
        }

        let user_id = suggestion.user_id;
        let mut result = match &suggestion.content {
            SuggestionContent::Plan(plan) => self.apply_plan(user_id, plan, options).await,
            SuggestionContent::Briefing(briefing) => {
                self.apply_briefing(user_id, briefing, options).await
            }
            SuggestionContent::Reschedule(reschedule) => {
                self.apply_reschedule(reschedule, options).await
            }
        };
        result.success = result.errors.is_empty();

        tracing::info!(
            suggestion_id = %suggestion.id,
            kind = suggestion.kind().as_str(),
            dry_run = options.dry_run,
            applied = result.applied_items.len(),
            skipped = result.skipped_items.len(),
            errors = result.errors.len(),
            "Applied suggestion"
        );
        Ok(result)
    }

    // ============================================================
    // Plan
    // ============================================================

    async fn apply_plan(
        &self,
        user_id: Uuid,
        plan: &PlanContent,
        options: &ApplyOptions,
    ) -> ApplyResult {
        let goals: Vec<&PlanGoal> = plan
            .goals
            .iter()
            .filter(|g| options.includes(&[g.title.as_str()]))
            .collect();

        let mut result = ApplyResult::default();

        if options.dry_run {
            result.created_goals = goals.len() as u32;
            result.created_tasks = goals.iter().map(|g| g.tasks.len() as u32).sum();
            result.message = format!(
                "Would create {} goal(s) and {} task(s)",
                result.created_goals, result.created_tasks
            );
            return result;
        }

        let mut created = Vec::new();
        for goal in goals {
            match self.create_plan_goal(user_id, goal, &mut result).await {
                Ok(goal_id) => {
                    created.push(goal_id);
                    result.created_goals += 1;
                    result.applied_items.push(goal.title.clone());
                }
                Err(e) => {
                    tracing::warn!(goal = %goal.title, error = %e, "Failed to create goal");
                    result.errors.push(format!("Goal \"{}\": {}", goal.title, e));
                    result.skipped_items.push(goal.title.clone());
                }
            }
        }

        for goal_id in created {
            if let Err(e) = self.store.recompute_goal_progress(goal_id).await {
                result
                    .errors
                    .push(format!("Progress for goal {}: {}", goal_id, e));
            }
        }

        result.message = format!(
            "Created {} goal(s) and {} task(s)",
            result.created_goals, result.created_tasks
        );
        result
    }

    /// Create one goal and its tasks. Task failures are recorded in `result`;
    /// only a failure to create the goal itself is returned.
    async fn create_plan_goal(
        &self,
        user_id: Uuid,
        goal: &PlanGoal,
        result: &mut ApplyResult,
    ) -> anyhow::Result<Uuid> {
        let created = self
            .store
            .create_goal(
                user_id,
                CreateGoalInput {
                    title: goal.title.clone(),
                    description: non_empty(&goal.description),
                    category: non_empty(&goal.category),
                    month: None,
                },
            )
            .await?;

        for task in &goal.tasks {
            let input = CreateTaskInput {
                goal_id: Some(created.id),
                title: task.title.clone(),
                description: None,
                priority: Some(task.priority),
                due_date: task.due_date,
            };
            match self.store.create_task(user_id, input).await {
                Ok(_) => result.created_tasks += 1,
                Err(e) => {
                    result
                        .errors
                        .push(format!("Task \"{}\" in goal \"{}\": {}", task.title, goal.title, e));
                    result.skipped_items.push(task.title.clone());
                }
            }
        }

        Ok(created.id)
    }

    // ============================================================
    // Briefing
    // ============================================================

    async fn apply_briefing(
        &self,
        user_id: Uuid,
        briefing: &BriefingContent,
        options: &ApplyOptions,
    ) -> ApplyResult {
        let items: Vec<&BriefingTask> = briefing
            .todays_tasks
            .iter()
            .filter(|t| {
                let id = t.task_id.map(|id| id.to_string()).unwrap_or_default();
                options.includes(&[t.title.as_str(), id.as_str()])
            })
            .collect();

        let mut result = ApplyResult::default();

        if options.dry_run {
            result.updated_tasks = items.len() as u32;
            result.message = format!("Would update the priority of {} task(s)", items.len());
            return result;
        }

        // Loaded on first title lookup.
        let mut user_tasks: Option<Vec<Task>> = None;

        for item in items {
            let task_id = match item.task_id {
                Some(id) => Some(id),
                None => match self.resolve_by_title(user_id, &item.title, &mut user_tasks).await {
                    Ok(found) => found,
                    Err(e) => {
                        result.errors.push(format!("Task \"{}\": {}", item.title, e));
                        result.skipped_items.push(item.title.clone());
                        continue;
                    }
                },
            };

            let Some(task_id) = task_id else {
                result.skipped_items.push(item.title.clone());
                continue;
            };

            match self.store.update_task_priority(task_id, item.priority).await {
                Ok(true) => {
                    result.updated_tasks += 1;
                    result.applied_items.push(item.title.clone());
                }
                Ok(false) => result.skipped_items.push(item.title.clone()),
                Err(e) => {
                    result.errors.push(format!("Task \"{}\": {}", item.title, e));
                    result.skipped_items.push(item.title.clone());
                }
            }
        }

        result.message = format!("Updated the priority of {} task(s)", result.updated_tasks);
        result
    }

    async fn resolve_by_title(
        &self,
        user_id: Uuid,
        title: &str,
        cache: &mut Option<Vec<Task>>,
    ) -> anyhow::Result<Option<Uuid>> {
        if cache.is_none() {
            *cache = Some(
                self.store
                    .find_tasks_by_user(user_id, TaskFilter::default())
                    .await?,
            );
        }
        let wanted = title.trim().to_lowercase();
        Ok(cache
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find(|t| t.title.trim().to_lowercase() == wanted)
            .map(|t| t.id))
    }

    // ============================================================
    // Reschedule
    // ============================================================

    async fn apply_reschedule(
        &self,
        reschedule: &RescheduleContent,
        options: &ApplyOptions,
    ) -> ApplyResult {
        let tasks: Vec<&AffectedTask> = reschedule
            .affected_tasks
            .iter()
            .filter(|t| {
                let id = t.task_id.map(|id| id.to_string()).unwrap_or_default();
                options.includes(&[t.title.as_deref().unwrap_or_default(), id.as_str()])
            })
            .collect();
        let events: Vec<&AffectedEvent> = reschedule
            .affected_events
            .iter()
            .filter(|e| {
                let id = e.event_id.map(|id| id.to_string()).unwrap_or_default();
                options.includes(&[e.title.as_deref().unwrap_or_default(), id.as_str()])
            })
            .collect();

        let mut result = ApplyResult::default();

        if options.dry_run {
            result.updated_tasks = tasks.len() as u32;
            result.updated_events = events.len() as u32;
            result.message = format!(
                "Would reschedule {} task(s) and {} event(s)",
                tasks.len(),
                events.len()
            );
            return result;
        }

        for task in tasks {
            let label = task.title.clone().unwrap_or_else(|| UNKNOWN_TASK.to_string());
            let Some(task_id) = task.task_id else {
                result.skipped_items.push(label);
                continue;
            };

            match self
                .store
                .update_task_due_date(task_id, task.suggested_due_date)
                .await
            {
                Ok(true) => {
                    result.updated_tasks += 1;
                    result.applied_items.push(label);
                }
                Ok(false) => result.skipped_items.push(label),
                Err(e) => {
                    result.errors.push(format!("Task \"{}\": {}", label, e));
                    result.skipped_items.push(label);
                }
            }
        }

        for event in events {
            let label = event.title.clone().unwrap_or_else(|| UNKNOWN_EVENT.to_string());
            let Some(event_id) = event.event_id else {
                result.skipped_items.push(label);
                continue;
            };
            if event.suggested_start.is_none() && event.suggested_end.is_none() {
                result.skipped_items.push(label);
                continue;
            }

            match self
                .store
                .update_event_times(event_id, event.suggested_start, event.suggested_end)
                .await
            {
                Ok(true) => {
                    result.updated_events += 1;
                    result.applied_items.push(label);
                }
                Ok(false) => result.skipped_items.push(label),
                Err(e) => {
                    result.errors.push(format!("Event \"{}\": {}", label, e));
                    result.skipped_items.push(label);
                }
            }
        }

        result.message = format!(
            "Rescheduled {} task(s) and {} event(s)",
            result.updated_tasks, result.updated_events
        );
        result
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
