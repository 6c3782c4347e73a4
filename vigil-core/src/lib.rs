pub mod clock;
pub mod error;
pub mod events;
pub mod logging;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{SessionError, SinkError};
pub use events::{EventHub, EventRecord, Severity, Subscription};
pub use logging::{init_logging, Fanout, LoggingConfig, Sink};
pub use session::{spawn_sweeper, Session, SessionRegistry};
