mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::ai::{ApplyEngine, SuggestionService};
use crate::db::Database;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub service: Arc<SuggestionService>,
    pub engine: Arc<ApplyEngine>,
}

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        // Generation
        .route("/users/{user_id}/suggestions/plan", post(handlers::generate_plan))
        .route("/users/{user_id}/suggestions/briefing", post(handlers::generate_briefing))
        .route("/users/{user_id}/suggestions/reschedule", post(handlers::generate_reschedule))
        .route("/users/{user_id}/suggestions", get(handlers::list_suggestions))
        .route("/users/{user_id}/usage", get(handlers::get_usage))
        // Suggestions (by suggestion id)
        .route("/suggestions/{id}", get(handlers::get_suggestion))
        .route("/suggestions/{id}/apply", post(handlers::apply_suggestion))
        .route("/suggestions/{id}/archive", post(handlers::archive_suggestion))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
