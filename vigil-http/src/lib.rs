pub mod apis;
pub mod error;
pub mod http;
pub mod session;
pub mod streaming;

pub use error::{ApiJson, ErrorResponse};
pub use http::{router, start_server, ServerConfig, ServerState};
pub use session::{require_session, SessionId, SESSION_COOKIE};
pub use streaming::{log_event_stream, HEARTBEAT_INTERVAL};
