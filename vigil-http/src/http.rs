use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::Request,
    middleware,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, Span};
use uuid::Uuid;
use vigil_core::{EventHub, SessionRegistry};

use crate::apis;
use crate::session::require_session;

/// Configuration for the HTTP server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0:8080")
    pub address: String,
}

impl ServerConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

/// Shared state handed to every handler
#[derive(Clone)]
pub struct ServerState {
    pub sessions: Arc<SessionRegistry>,
    pub hub: EventHub,
    /// Key an operator must present to log in
    pub auth_key: Arc<str>,
    /// Process start, Unix seconds
    pub start_time: i64,
}

impl ServerState {
    pub fn new(sessions: Arc<SessionRegistry>, hub: EventHub, auth_key: impl Into<Arc<str>>) -> Self {
        Self {
            sessions,
            hub,
            auth_key: auth_key.into(),
            start_time: Utc::now().timestamp(),
        }
    }
}

/// All API routes; everything past login/validate/logout needs a live session cookie
pub fn router(state: ServerState) -> Router {
    let authenticated = Router::new()
        .route("/dashboard/stats", get(apis::system::handle_stats))
        .route("/logs/stream", get(apis::logs::handle_stream))
        .route("/logs/history", get(apis::logs::handle_history))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    let api = Router::new()
        .route("/login", post(apis::auth::handle_login))
        .route("/validate-session", post(apis::auth::handle_validate_session))
        .route("/logout", post(apis::auth::handle_logout))
        .merge(authenticated);

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Every event logged while serving a request carries `http.*` attributes
fn request_span(request: &Request) -> Span {
    info_span!(
        "http",
        request_id = %Uuid::new_v4(),
        method = %request.method(),
        path = %request.uri().path(),
    )
}

/// Serve the API until `shutdown` resolves
pub async fn start_server<F>(config: ServerConfig, state: ServerState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&config.address).await?;

    println!("Server starting on \x1b[1mhttp://{}\x1b[0m", config.address);
    println!("\nAvailable endpoints:");
    println!("  \x1b[1mPOST /api/login\x1b[0m               - Exchange the auth key for a session cookie");
    println!("  \x1b[1mPOST /api/validate-session\x1b[0m    - Check (and refresh) a session");
    println!("  \x1b[1mPOST /api/logout\x1b[0m              - End the current session");
    println!("  \x1b[1mGET  /api/logs/stream\x1b[0m         - Live log stream (SSE)");
    println!("  \x1b[1mGET  /api/logs/history\x1b[0m        - Recent log events");
    println!("  \x1b[1mGET  /api/dashboard/stats\x1b[0m     - Process stats");
    println!("\nPress Ctrl+C to stop\n");

    info!(address = %config.address, "HTTP server listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    info!("HTTP server stopped");
    Ok(())
}
