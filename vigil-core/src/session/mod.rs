mod persist;
mod registry;
mod session;
mod sweeper;
mod token;

pub use persist::SessionStore;
pub use registry::{SessionRegistry, SESSION_DURATION_SECS};
pub use session::{short_id, Session};
pub use sweeper::{spawn_sweeper, SWEEP_INTERVAL};
pub use token::{is_session_id, OsTokenSource, TokenSource, SESSION_ID_BYTES};
