use serde::{Deserialize, Serialize};

/// A server-issued, time-bounded login
/// Only `expires_at` changes after creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    /// Unix seconds
    pub created_at: i64,
    /// Unix seconds
    pub expires_at: i64,
}

impl Session {
    pub(crate) fn new(id: String, now: i64, ttl_secs: i64) -> Self {
        Self {
            id,
            created_at: now,
            expires_at: now + ttl_secs,
        }
    }

    /// Expired strictly after `expires_at`, so a session is still good on its last second
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }

    pub(crate) fn extend(&mut self, now: i64, ttl_secs: i64) {
        self.expires_at = now + ttl_secs;
    }
}

/// First eight characters of a session id, safe to put in logs
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
