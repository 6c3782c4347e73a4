mod hub;
mod record;

pub use hub::{EventHub, Subscription, HISTORY_CAPACITY, SUBSCRIBER_CAPACITY};
pub use record::{Attributes, EventRecord, Severity, TIME_FORMAT};
