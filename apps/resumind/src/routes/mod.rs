pub mod health;
pub mod session;

use axum::{
    routing::{get, post},
    Router,
};

use crate::resume::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Session
        .route("/api/v1/session", get(session::handle_get_session))
        .route("/api/v1/session/sign-in", post(session::handle_sign_in))
        .route("/api/v1/session/sign-out", post(session::handle_sign_out))
        // Shared error state
        .route(
            "/api/v1/error",
            get(session::handle_get_error).delete(session::handle_clear_error),
        )
        // Resumes
        .route(
            "/api/v1/resumes",
            get(handlers::handle_list_resumes).post(handlers::handle_create_resume),
        )
        .route(
            "/api/v1/resumes/:id",
            get(handlers::handle_get_resume).delete(handlers::handle_delete_resume),
        )
        .route("/api/v1/resumes/:id/preview", get(handlers::handle_get_preview))
        .route("/api/v1/wipe", post(handlers::handle_wipe))
        .with_state(state)
}
