use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::ai::{
    AiError, ApplyError, BriefingRequest, GeneratedSuggestion, PlanRequest, RescheduleRequest,
    UsageSnapshot,
};
use crate::models::*;

// ============================================================
// Error Handling
// ============================================================

/// Log an internal error and return a sanitized response to the client.
/// The full error is logged server-side, clients only see a generic message.
fn internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    tracing::error!("Internal error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

/// Rate-limit and authentication failures are descriptive; everything else is sanitized.
fn ai_error(e: AiError) -> (StatusCode, String) {
    match e {
        AiError::RateLimitExceeded { .. } => {
            tracing::info!("{}", e);
            (StatusCode::TOO_MANY_REQUESTS, e.to_string())
        }
        AiError::Authentication(_) => {
            tracing::error!("{}", e);
            (
                StatusCode::BAD_GATEWAY,
                "AI provider rejected our credentials".to_string(),
            )
        }
        AiError::TransientProvider { .. }
        | AiError::MalformedResponse { .. }
        | AiError::FallbackFailed { .. } => {
            tracing::warn!("{}", e);
            (
                StatusCode::BAD_GATEWAY,
                "AI suggestions are temporarily unavailable".to_string(),
            )
        }
        AiError::Store(e) => internal_error(e),
    }
}

fn apply_error(e: ApplyError) -> (StatusCode, String) {
    match e {
        ApplyError::AlreadyApplied(_) => (StatusCode::CONFLICT, e.to_string()),
    }
}

fn not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Suggestion not found".to_string())
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Generation
// ============================================================

#[derive(Debug, Deserialize)]
pub struct PlanBody {
    pub goals_text: String,
    pub month: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DateBody {
    pub date: Option<NaiveDate>,
}

pub async fn generate_plan(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<PlanBody>,
) -> Result<Json<GeneratedSuggestion>, (StatusCode, String)> {
    if body.goals_text.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "goals_text is required".to_string()));
    }
    state
        .service
        .generate_plan(PlanRequest {
            user_id: Some(user_id),
            goals_text: body.goals_text,
            month: body.month,
        })
        .await
        .map(Json)
        .map_err(ai_error)
}

pub async fn generate_briefing(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<DateBody>,
) -> Result<Json<GeneratedSuggestion>, (StatusCode, String)> {
    state
        .service
        .generate_briefing(BriefingRequest {
            user_id: Some(user_id),
            date: body.date,
        })
        .await
        .map(Json)
        .map_err(ai_error)
}

pub async fn generate_reschedule(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<DateBody>,
) -> Result<Json<GeneratedSuggestion>, (StatusCode, String)> {
    state
        .service
        .generate_reschedule(RescheduleRequest {
            user_id: Some(user_id),
            date: body.date,
        })
        .await
        .map(Json)
        .map_err(ai_error)
}

pub async fn get_usage(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Json<UsageSnapshot> {
    Json(state.service.limiter().usage(user_id))
}

// ============================================================
// Suggestions
// ============================================================

pub async fn list_suggestions(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<Suggestion>>, (StatusCode, String)> {
    state
        .db
        .get_suggestions_by_user(user_id, false)
        .map(Json)
        .map_err(internal_error)
}

pub async fn get_suggestion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Suggestion>, (StatusCode, String)> {
    state
        .db
        .get_suggestion(id)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(not_found)
}

/// Apply a suggestion. It is only marked applied when every item succeeded
/// and this was not a dry run.
pub async fn apply_suggestion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(options): Json<ApplyOptions>,
) -> Result<Json<ApplyResult>, (StatusCode, String)> {
    let suggestion = state
        .db
        .get_suggestion(id)
        .map_err(internal_error)?
        .ok_or_else(not_found)?;

    let result = state
        .engine
        .apply(&suggestion, &options)
        .await
        .map_err(apply_error)?;

    if result.success && !options.dry_run {
        state.db.mark_applied(id).map_err(internal_error)?;
    }

    Ok(Json(result))
}

pub async fn archive_suggestion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state.db.archive_suggestion(id).map_err(internal_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found())
    }
}
