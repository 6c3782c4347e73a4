use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use tracing::warn;
use vigil_core::session::{short_id, SESSION_DURATION_SECS};

use crate::{ErrorResponse, ServerState};

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "session_id";

/// Session token of an authenticated request, stored in request extensions
#[derive(Clone, Debug)]
pub struct SessionId(pub String);

/// Session token from the request's cookie, if present and non-empty
pub fn session_from_jar(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value handing out a session for its full lifetime
pub fn session_cookie(session_id: &str) -> Result<HeaderValue, ErrorResponse> {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, session_id, SESSION_DURATION_SECS
    ))
    .map_err(|_| ErrorResponse::internal_error())
}

/// `Set-Cookie` value that makes the browser drop the session cookie
pub fn cleared_cookie() -> HeaderValue {
    HeaderValue::from_static("session_id=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
}

/// Reject requests without a live session; a live session is refreshed
pub async fn require_session(
    State(state): State<ServerState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ErrorResponse> {
    let Some(session_id) = session_from_jar(&jar) else {
        warn!(path = %request.uri().path(), "request without session cookie");
        return Err(ErrorResponse::unauthorized("not logged in"));
    };

    if !state.sessions.validate(&session_id).await {
        warn!(session = short_id(&session_id), "invalid or expired session");
        return Err(ErrorResponse::unauthorized("session expired, please log in again"));
    }

    if let Err(e) = state.sessions.refresh(&session_id).await {
        warn!(session = short_id(&session_id), error = %e, "failed to refresh session");
    }

    request.extensions_mut().insert(SessionId(session_id));
    Ok(next.run(request).await)
}
