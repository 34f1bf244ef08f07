use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/sky", get(handlers::get_sky))
        .route("/api/events", get(handlers::get_events))
        .route("/api/settings", get(handlers::get_settings).post(handlers::update_settings))
        .route("/api/fitness/summary", get(handlers::get_fitness))
        .route("/api/fitness/fetch", post(handlers::fetch_fitness))
        .route("/api/fitness/analyze", post(handlers::analyze))
        .route("/api/activity/start", post(handlers::start_activity))
        .route("/api/activity/stop", post(handlers::stop_activity))
        .with_state(state)
}
