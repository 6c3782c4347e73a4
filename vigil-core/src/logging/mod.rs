//! Logging setup
//!
//! Every `tracing` event in the process is turned into an `EventRecord`
//! and fanned out to:
//! - a console sink filtered at the configured level
//! - the [`EventHub`], which keeps history and streams to dashboard observers
//!
//! Spans become fanout views: an event inside `info_span!("http", method = "GET")`
//! carries `http.method` plus its own fields under the `http.` prefix.
//!
//! `VIGIL_LOG` overrides the global filter (EnvFilter syntax).

mod fanout;
mod layer;
mod sinks;

pub use fanout::{Fanout, Sink};
pub use layer::FanoutLayer;
pub use sinks::{ConsoleSink, HubSink};

use std::sync::Arc;

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::events::{EventHub, Severity};

/// Environment variable holding an EnvFilter directive
pub const LOG_ENV: &str = "VIGIL_LOG";

const DEFAULT_FILTER: &str = "warn,vigil_core=debug,vigil_http=debug,vigil=debug";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level printed on the console
    pub console_level: Severity,
    /// Minimum level forwarded to the hub
    pub hub_level: Severity,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console_level: Severity::Info,
            hub_level: Severity::Debug,
        }
    }
}

/// Build the console + hub fanout for `config`
pub fn build_fanout(config: &LoggingConfig, hub: &EventHub) -> Fanout {
    let console: Arc<dyn Sink> = Arc::new(ConsoleSink::stdout(config.console_level));
    let hub: Arc<dyn Sink> = Arc::new(HubSink::new(hub.clone()).with_min_level(config.hub_level));
    Fanout::new(vec![console, hub])
}

/// Install the global subscriber
pub fn init_logging(config: &LoggingConfig, hub: &EventHub) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(FanoutLayer::new(build_fanout(config, hub)))
        .try_init()?;

    tracing::debug!(
        console_level = %config.console_level,
        hub_level = %config.hub_level,
        "logging initialized"
    );
    Ok(())
}

