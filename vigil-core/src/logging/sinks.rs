use std::io::{self, Write};
use std::sync::Mutex;

use console::style;

use super::fanout::Sink;
use crate::error::SinkError;
use crate::events::{EventHub, EventRecord, Severity};

/// Human-readable line output, one event per line
pub struct ConsoleSink {
    min_level: Severity,
    writer: Mutex<Box<dyn Write + Send>>,
    colored: bool,
}

impl ConsoleSink {
    /// Console sink on stdout, coloured when the terminal supports it
    pub fn stdout(min_level: Severity) -> Self {
        Self {
            min_level,
            writer: Mutex::new(Box::new(io::stdout())),
            colored: console::colors_enabled(),
        }
    }

    /// Plain (uncoloured) output to any writer
    pub fn new(min_level: Severity, writer: Box<dyn Write + Send>) -> Self {
        Self {
            min_level,
            writer: Mutex::new(writer),
            colored: false,
        }
    }

    fn format(&self, event: &EventRecord) -> String {
        let level = format!("{:<5}", event.level.as_str());
        let level = if self.colored {
            match event.level {
                Severity::Debug => style(level).magenta().to_string(),
                Severity::Info => style(level).green().to_string(),
                Severity::Warn => style(level).yellow().to_string(),
                Severity::Error => style(level).red().bold().to_string(),
            }
        } else {
            level
        };
        let time = if self.colored {
            style(&event.time).dim().to_string()
        } else {
            event.time.clone()
        };

        let mut line = format!("{} {} {}", time, level, event.message);
        for (key, value) in &event.attributes {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let key = if self.colored {
                style(key).dim().to_string()
            } else {
                key.clone()
            };
            line.push_str(&format!(" {}={}", key, value));
        }
        line
    }
}

impl Sink for ConsoleSink {
    fn min_level(&self) -> Severity {
        self.min_level
    }

    fn emit(&self, event: &EventRecord) -> Result<(), SinkError> {
        let line = self.format(event);
        let mut writer = self.writer.lock().map_err(|_| SinkError::Closed)?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

/// Forwards every admitted event to the hub
pub struct HubSink {
    hub: EventHub,
    min_level: Severity,
}

impl HubSink {
    pub fn new(hub: EventHub) -> Self {
        Self {
            hub,
            min_level: Severity::Debug,
        }
    }

    pub fn with_min_level(mut self, min_level: Severity) -> Self {
        self.min_level = min_level;
        self
    }
}

impl Sink for HubSink {
    fn min_level(&self) -> Severity {
        self.min_level
    }

    fn emit(&self, event: &EventRecord) -> Result<(), SinkError> {
        self.hub.publish(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn test_console_line_format() {
        let buf = SharedBuf::default();
        let sink = ConsoleSink::new(Severity::Info, Box::new(buf.clone()));
        let mut event = EventRecord::new(Severity::Warn, "session file unreadable")
            .with_attribute("file", "a.json")
            .with_attribute("attempt", 2);
        event.time = "2024-01-02 03:04:05".to_string();

        sink.emit(&event).unwrap();
        assert_eq!(
            buf.contents(),
            "2024-01-02 03:04:05 WARN  session file unreadable attempt=2 file=a.json\n"
        );
    }

    #[test]
    fn test_hub_sink_publishes() {
        let hub = EventHub::new();
        let sink = HubSink::new(hub.clone());
        assert_eq!(sink.min_level(), Severity::Debug);

        sink.emit(&EventRecord::new(Severity::Debug, "to the hub")).unwrap();
        assert_eq!(hub.history()[0].message, "to the hub");
    }
}
