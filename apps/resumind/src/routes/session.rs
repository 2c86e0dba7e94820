use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::errors::AppError;
use crate::platform::Identity;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: Option<Identity>,
    pub authenticated: bool,
    pub is_loading: bool,
    pub platform_ready: bool,
}

#[derive(Serialize)]
pub struct ErrorStateResponse {
    pub error: Option<String>,
}

fn session_response(state: &AppState) -> SessionResponse {
    let snapshot = state.client.state().snapshot();
    SessionResponse {
        user: snapshot.session.user().cloned(),
        authenticated: snapshot.session.is_authenticated(),
        is_loading: snapshot.is_loading,
        platform_ready: snapshot.platform_ready,
    }
}

/// The signed-in identity, or 401. 503 while the platform is not attached.
pub fn require_auth(state: &AppState) -> Result<Identity, AppError> {
    if !state.client.facade().is_available() {
        return Err(AppError::PlatformUnavailable);
    }
    state
        .client
        .state()
        .session()
        .user()
        .cloned()
        .ok_or(AppError::Unauthorized)
}

/// GET /api/v1/session
pub async fn handle_get_session(State(state): State<AppState>) -> Json<SessionResponse> {
    Json(session_response(&state))
}

/// POST /api/v1/session/sign-in
pub async fn handle_sign_in(
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, AppError> {
    let signed_in = state.client.session().sign_in().await;
    if !signed_in && !state.client.facade().is_available() {
        return Err(AppError::PlatformUnavailable);
    }
    Ok(Json(session_response(&state)))
}

/// POST /api/v1/session/sign-out
pub async fn handle_sign_out(State(state): State<AppState>) -> Json<SessionResponse> {
    state.client.session().sign_out().await;
    Json(session_response(&state))
}

/// GET /api/v1/error
pub async fn handle_get_error(State(state): State<AppState>) -> Json<ErrorStateResponse> {
    Json(ErrorStateResponse {
        error: state.client.state().error(),
    })
}

/// DELETE /api/v1/error
pub async fn handle_clear_error(State(state): State<AppState>) -> StatusCode {
    state.client.facade().clear_error();
    StatusCode::NO_CONTENT
}
