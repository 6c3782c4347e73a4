use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use axum_extra::extract::CookieJar;
use tracing::{error, info, warn};
use vigil_core::session::short_id;

use super::types::{LoginRequest, LoginResponse, LogoutResponse, ValidateSessionRequest, ValidateSessionResponse};
use crate::session::{cleared_cookie, session_cookie, session_from_jar};
use crate::{ApiJson, ErrorResponse, ServerState};

/// Exchange the auth key for a session cookie
pub async fn handle_login(
    State(state): State<ServerState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Response, ErrorResponse> {
    if payload.auth_key != *state.auth_key {
        warn!("login failed: invalid auth key");
        let body = LoginResponse {
            success: false,
            message: "authentication failed, check the key".to_string(),
            session_id: None,
        };
        return Ok((StatusCode::UNAUTHORIZED, Json(body)).into_response());
    }

    let session = state.sessions.create().await.map_err(|e| {
        error!(error = %e, "failed to create session");
        ErrorResponse::internal_error()
    })?;

    info!(session = short_id(&session.id), "user logged in");

    let cookie = session_cookie(&session.id)?;
    let body = LoginResponse {
        success: true,
        message: "logged in".to_string(),
        session_id: Some(session.id),
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// Report whether a session is live; a live one is refreshed
pub async fn handle_validate_session(
    State(state): State<ServerState>,
    ApiJson(payload): ApiJson<ValidateSessionRequest>,
) -> Json<ValidateSessionResponse> {
    let valid = state.sessions.validate(&payload.session_id).await;

    if valid {
        if let Err(e) = state.sessions.refresh(&payload.session_id).await {
            warn!(session = short_id(&payload.session_id), error = %e, "failed to refresh session");
        }
    }

    Json(ValidateSessionResponse { valid })
}

/// Drop the caller's session (if any) and clear the cookie
pub async fn handle_logout(State(state): State<ServerState>, jar: CookieJar) -> Response {
    if let Some(session_id) = session_from_jar(&jar) {
        state.sessions.delete(&session_id).await;
        info!(session = short_id(&session_id), "user logged out");
    }

    let body = LogoutResponse {
        success: true,
        message: "logged out".to_string(),
    };
    ([(header::SET_COOKIE, cleared_cookie())], Json(body)).into_response()
}
