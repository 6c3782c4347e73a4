use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::SinkError;
use crate::events::{Attributes, EventRecord, Severity};

/// A destination for log events with its own minimum severity
pub trait Sink: Send + Sync {
    fn min_level(&self) -> Severity;

    fn emit(&self, event: &EventRecord) -> Result<(), SinkError>;
}

/// One event source feeding several sinks
///
/// `with_attributes` and `with_group` return a new view sharing the same sinks;
/// the view they were derived from is left untouched.
#[derive(Clone)]
pub struct Fanout {
    sinks: Arc<[Arc<dyn Sink>]>,
    defaults: Arc<Attributes>,
    group: Option<Arc<str>>,
}

impl Fanout {
    pub fn new(sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self {
            sinks: sinks.into(),
            defaults: Arc::new(Attributes::new()),
            group: None,
        }
    }

    /// Whether at least one sink would take an event at `level`
    pub fn enabled(&self, level: Severity) -> bool {
        self.sinks.iter().any(|sink| level >= sink.min_level())
    }

    /// View that adds `attrs` to every event dispatched through it
    /// Keys are qualified by the view's current group
    pub fn with_attributes<I, K>(&self, attrs: I) -> Self
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: AsRef<str>,
    {
        let mut defaults = self.defaults.as_ref().clone();
        for (key, value) in attrs {
            defaults.insert(self.qualify(key.as_ref()), value);
        }
        Self {
            sinks: self.sinks.clone(),
            defaults: Arc::new(defaults),
            group: self.group.clone(),
        }
    }

    /// View whose later attributes are nested under `name`
    pub fn with_group(&self, name: &str) -> Self {
        if name.is_empty() {
            return self.clone();
        }
        Self {
            sinks: self.sinks.clone(),
            defaults: self.defaults.clone(),
            group: Some(Arc::from(self.qualify(name))),
        }
    }

    /// Deliver to every sink whose minimum level admits the event
    /// A failing or panicking sink is skipped; the rest still get the event
    pub fn dispatch(&self, event: EventRecord) {
        let event = self.decorate(event);
        for sink in self.sinks.iter() {
            if event.level < sink.min_level() {
                continue;
            }
            // Faults stop at this boundary
            let _ = catch_unwind(AssertUnwindSafe(|| sink.emit(&event)));
        }
    }

    fn decorate(&self, mut event: EventRecord) -> EventRecord {
        if self.defaults.is_empty() && self.group.is_none() {
            return event;
        }
        let mut attributes = self.defaults.as_ref().clone();
        for (key, value) in std::mem::take(&mut event.attributes) {
            attributes.insert(self.qualify(&key), value);
        }
        event.attributes = attributes;
        event
    }

    fn qualify(&self, key: &str) -> String {
        match &self.group {
            Some(group) => format!("{}.{}", group, key),
            None => key.to_string(),
        }
    }
}
