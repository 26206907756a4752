//! Turning raw model text into typed suggestion content.

use thiserror::Error;

use crate::models::{BriefingContent, PlanContent, RescheduleContent, SuggestionContent, SuggestionKind};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no JSON object found in model response")]
    NoJson,

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("plan contains no goals")]
    EmptyPlan,
}

/// Remove a surrounding ```json fence if the model added one.
fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let clean = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    clean.strip_suffix("```").unwrap_or(clean).trim()
}

/// The outermost `{ ... }` span, ignoring any prose around it.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start <= end).then(|| &text[start..=end])
}

fn json_body(response: &str) -> Result<&str, ParseError> {
    extract_json_object(strip_markdown_fences(response)).ok_or(ParseError::NoJson)
}

pub fn parse_plan(response: &str) -> Result<PlanContent, ParseError> {
    let plan: PlanContent = serde_json::from_str(json_body(response)?)?;
    if plan.goals.is_empty() {
        return Err(ParseError::EmptyPlan);
    }
    Ok(plan)
}

pub fn parse_briefing(response: &str) -> Result<BriefingContent, ParseError> {
    Ok(serde_json::from_str(json_body(response)?)?)
}

pub fn parse_reschedule(response: &str) -> Result<RescheduleContent, ParseError> {
    Ok(serde_json::from_str(json_body(response)?)?)
}

pub fn parse_content(kind: SuggestionKind, response: &str) -> Result<SuggestionContent, ParseError> {
    Ok(match kind {
        SuggestionKind::Plan => SuggestionContent::Plan(parse_plan(response)?),
        SuggestionKind::Briefing => SuggestionContent::Briefing(parse_briefing(response)?),
        SuggestionKind::Reschedule => SuggestionContent::Reschedule(parse_reschedule(response)?),
    })
}
