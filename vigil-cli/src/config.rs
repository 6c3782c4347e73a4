use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use vigil_core::Severity;

/// Length of a generated auth key, in hex characters
const GENERATED_KEY_LEN: usize = 12;

/// Process configuration; every flag falls back to an environment variable
#[derive(Parser, Debug, Clone)]
#[command(name = "vigil", version, about = "Operator dashboard backend")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Directory for persisted sessions
    #[arg(long, env = "DATA_DIR", default_value = ".data")]
    pub data_dir: PathBuf,

    /// Console log level: debug, info, warn or error
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Key operators log in with; generated at startup when unset
    #[arg(long, env = "AUTH_KEY", hide_env_values = true)]
    pub auth_key: Option<String>,

    /// Seconds between expired-session sweeps
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 3600)]
    pub sweep_interval_secs: u64,
}

/// The key operators must present, and whether it was made up at startup
#[derive(Debug, Clone)]
pub struct AuthKey {
    pub key: String,
    pub generated: bool,
}

impl Config {
    pub fn console_level(&self) -> Severity {
        Severity::parse(&self.log_level)
    }

    pub fn address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn resolve_auth_key(&self) -> AuthKey {
        match self.auth_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => AuthKey {
                key: key.to_string(),
                generated: false,
            },
            _ => AuthKey {
                key: generate_key(GENERATED_KEY_LEN),
                generated: true,
            },
        }
    }
}

fn generate_key(len: usize) -> String {
    let bytes: Vec<u8> = (0..len.div_ceil(2)).map(|_| rand::random::<u8>()).collect();
    let mut key = hex::encode(bytes);
    key.truncate(len);
    key
}
