use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use super::persist::SessionStore;
use super::session::{short_id, Session};
use super::token::{is_session_id, OsTokenSource, TokenSource};
use crate::clock::{Clock, SystemClock};
use crate::error::SessionError;

/// Sessions live for 7 days after creation or the last refresh
pub const SESSION_DURATION_SECS: i64 = 7 * 24 * 60 * 60;

/// Session registry - authoritative map of active sessions
/// Every mutation holds the write lock for the whole memory + disk update,
/// so operations on the same id never interleave
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,
    store: SessionStore,
    clock: Arc<dyn Clock>,
    tokens: Arc<dyn TokenSource>,
    ttl_secs: i64,
}

impl SessionRegistry {
    /// Create an empty registry persisting into `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            store: SessionStore::new(data_dir),
            clock: Arc::new(SystemClock),
            tokens: Arc::new(OsTokenSource),
            ttl_secs: SESSION_DURATION_SECS,
        }
    }

    /// Create the data directory if needed and recover persisted sessions
    pub async fn open(data_dir: impl Into<PathBuf>) -> Result<(Self, usize), SessionError> {
        let registry = Self::new(data_dir);
        registry.store.ensure_dir().await?;
        let count = registry.load().await?;
        Ok((registry, count))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_token_source(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn data_dir(&self) -> &Path {
        self.store.dir()
    }

    /// Mint a new session and persist it
    /// On a persistence error the session stays usable in memory
    pub async fn create(&self) -> Result<Session, SessionError> {
        let id = self.tokens.generate()?;
        let session = Session::new(id, self.clock.now(), self.ttl_secs);

        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session.clone());
        self.store.save(&session).await?;
        drop(sessions);

        info!(
            session = short_id(&session.id),
            expires_at = session.expires_at,
            "session created"
        );
        Ok(session)
    }

    /// Whether `id` names a live session; an expired one is removed on the spot
    pub async fn validate(&self, id: &str) -> bool {
        let now = self.clock.now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(id) {
                None => return false,
                Some(session) if !session.is_expired(now) => return true,
                Some(_) => {}
            }
        }

        let mut sessions = self.sessions.write().await;
        // A refresh may have landed between the read and write locks
        match sessions.get(id) {
            None => return false,
            Some(session) if !session.is_expired(self.clock.now()) => return true,
            Some(_) => {}
        }
        sessions.remove(id);
        self.remove_file(id).await;
        drop(sessions);

        info!(session = short_id(id), "expired session removed");
        false
    }

    /// Push expiry out to now + session duration and persist it
    /// A persistence error does not undo the extension
    pub async fn refresh(&self, id: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(short_id(id).to_string()))?;
        session.extend(self.clock.now(), self.ttl_secs);
        let snapshot = session.clone();
        self.store.save(&snapshot).await
    }

    /// Remove a session from memory and disk; unknown ids are a no-op
    pub async fn delete(&self, id: &str) {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(id).is_none() {
            return;
        }
        self.remove_file(id).await;
        drop(sessions);

        info!(session = short_id(id), "session deleted");
    }

    /// Remove every expired session, returning how many went
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;

        let expired: Vec<String> = sessions
            .values()
            .filter(|s| s.is_expired(now))
            .map(|s| s.id.clone())
            .collect();

        for id in &expired {
            sessions.remove(id);
            self.remove_file(id).await;
            info!(session = short_id(id), "expired session cleaned");
        }
        expired.len()
    }

    /// Scan the data directory once and repopulate the map
    /// Expired files are deleted, unreadable or corrupt files are skipped and left in place
    pub async fn load(&self) -> Result<usize, SessionError> {
        let paths = self.store.list().await?;
        let now = self.clock.now();

        let mut sessions = self.sessions.write().await;
        let mut count = 0;
        for path in paths {
            let session = match self.store.read(&path).await {
                Ok(session) => session,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping unreadable session file");
                    continue;
                }
            };

            let named_for_id = path.file_stem().is_some_and(|stem| stem == session.id.as_str());
            if !is_session_id(&session.id) || !named_for_id {
                warn!(file = %path.display(), "skipping session file with mismatched id");
                continue;
            }

            if session.is_expired(now) {
                self.remove_file(&session.id).await;
                info!(session = short_id(&session.id), "expired session file removed");
                continue;
            }

            sessions.insert(session.id.clone(), session);
            count += 1;
        }

        Ok(count)
    }

    /// A copy of the stored record, if any
    pub async fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Number of sessions currently held in memory
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn remove_file(&self, id: &str) {
        if let Err(e) = self.store.remove(id).await {
            warn!(session = short_id(id), error = %e, "failed to delete session file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    struct BrokenEntropy;

    impl TokenSource for BrokenEntropy {
        fn generate(&self) -> Result<String, SessionError> {
            Err(SessionError::RandomSource("no entropy".to_string()))
        }
    }

    fn registry_at(dir: &Path, clock: &ManualClock) -> SessionRegistry {
        SessionRegistry::new(dir).with_clock(Arc::new(clock.clone()))
    }

    #[tokio::test]
    async fn test_create_then_validate() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(1_000);
        let registry = registry_at(dir.path(), &clock);

        let session = registry.create().await.unwrap();
        assert_eq!(session.created_at, 1_000);
        assert_eq!(session.expires_at, 1_000 + SESSION_DURATION_SECS);
        assert!(registry.validate(&session.id).await);
        assert!(dir.path().join(format!("{}.json", session.id)).exists());
    }

    #[tokio::test]
    async fn test_unknown_id_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SessionRegistry::new(dir.path());
        assert!(!registry.validate("nope").await);
    }

    #[tokio::test]
    async fn test_expired_session_is_removed_by_validate() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(0);
        let registry = registry_at(dir.path(), &clock);
        let session = registry.create().await.unwrap();

        clock.set(session.expires_at);
        assert!(registry.validate(&session.id).await);

        clock.advance(1);
        assert!(!registry.validate(&session.id).await);
        assert!(!registry.validate(&session.id).await);
        assert!(registry.is_empty().await);
        assert!(!dir.path().join(format!("{}.json", session.id)).exists());
    }

    #[tokio::test]
    async fn test_refresh_extends_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(0);
        let registry = registry_at(dir.path(), &clock);
        let session = registry.create().await.unwrap();

        // Refresh every 6 days for a month; the session never lapses
        for _ in 0..5 {
            clock.advance(6 * 24 * 60 * 60);
            assert!(registry.validate(&session.id).await);
            registry.refresh(&session.id).await.unwrap();
            let stored = registry.get(&session.id).await.unwrap();
            assert_eq!(stored.expires_at, clock.now() + SESSION_DURATION_SECS);
            assert_eq!(stored.created_at, 0);
        }
    }

    #[tokio::test]
    async fn test_refresh_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(0);
        let registry = registry_at(dir.path(), &clock);
        let session = registry.create().await.unwrap();

        clock.advance(100);
        registry.refresh(&session.id).await.unwrap();

        let content = std::fs::read_to_string(dir.path().join(format!("{}.json", session.id))).unwrap();
        let on_disk: Session = serde_json::from_str(&content).unwrap();
        assert_eq!(on_disk.expires_at, 100 + SESSION_DURATION_SECS);
    }

    #[tokio::test]
    async fn test_refresh_unknown_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SessionRegistry::new(dir.path());
        let err = registry.refresh("missing").await.unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SessionRegistry::new(dir.path());
        let session = registry.create().await.unwrap();

        assert!(registry.validate(&session.id).await);
        registry.delete(&session.id).await;
        assert!(!registry.validate(&session.id).await);
        registry.delete(&session.id).await;
        assert!(!registry.validate(&session.id).await);
        registry.delete("never-existed").await;
    }

    #[tokio::test]
    async fn test_delete_stays_inside_data_dir() {
        let root = tempfile::tempdir().unwrap();
        let data = root.path().join("data");
        let (registry, _) = SessionRegistry::open(&data).await.unwrap();

        let relative = root.path().join("victim.json");
        let absolute = root.path().join("abs.json");
        std::fs::write(&relative, "{}").unwrap();
        std::fs::write(&absolute, "{}").unwrap();

        registry.delete("../victim").await;
        registry.delete(root.path().join("abs").to_str().unwrap()).await;

        assert!(relative.exists());
        assert!(absolute.exists());
    }

    #[tokio::test]
    async fn test_delete_unknown_well_formed_id_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SessionRegistry::new(dir.path());
        let stray = dir.path().join(format!("{}.json", "e".repeat(64)));
        std::fs::write(&stray, "{}").unwrap();

        registry.delete(&"e".repeat(64)).await;
        assert!(stray.exists());
    }

    #[tokio::test]
    async fn test_load_skips_file_whose_id_does_not_match_its_name() {
        let root = tempfile::tempdir().unwrap();
        let data = root.path().join("data");
        std::fs::create_dir(&data).unwrap();
        let victim = root.path().join("victim.json");
        std::fs::write(&victim, "{}").unwrap();

        // Expired record pointing outside the directory
        let forged = Session::new("../victim".to_string(), 0, 1);
        let forged_path = data.join(format!("{}.json", "f".repeat(64)));
        std::fs::write(&forged_path, serde_json::to_vec(&forged).unwrap()).unwrap();

        let clock = ManualClock::new(1_000);
        let registry = registry_at(&data, &clock);
        assert_eq!(registry.load().await.unwrap(), 0);
        assert!(victim.exists());
        assert!(forged_path.exists());
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(0);
        let registry = registry_at(dir.path(), &clock);

        let old = registry.create().await.unwrap();
        clock.advance(SESSION_DURATION_SECS / 2);
        let fresh = registry.create().await.unwrap();
        clock.advance(SESSION_DURATION_SECS / 2 + 1);

        assert_eq!(registry.sweep().await, 1);
        assert!(registry.get(&old.id).await.is_none());
        assert!(registry.get(&fresh.id).await.is_some());
        assert!(!dir.path().join(format!("{}.json", old.id)).exists());
        assert_eq!(registry.sweep().await, 0);
    }

    #[tokio::test]
    async fn test_random_source_failure() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SessionRegistry::new(dir.path()).with_token_source(Arc::new(BrokenEntropy));

        let err = registry.create().await.unwrap_err();
        assert!(matches!(err, SessionError::RandomSource(_)));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_session() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let registry = SessionRegistry::new(&missing);

        let err = registry.create().await.unwrap_err();
        assert!(matches!(err, SessionError::Persistence { .. }));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_refresh_persistence_failure_keeps_extension() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let clock = ManualClock::new(0);
        let registry = registry_at(&data_dir, &clock);
        registry.store.ensure_dir().await.unwrap();
        let session = registry.create().await.unwrap();

        std::fs::remove_dir_all(&data_dir).unwrap();
        clock.advance(50);
        let err = registry.refresh(&session.id).await.unwrap_err();
        assert!(matches!(err, SessionError::Persistence { .. }));
        assert_eq!(
            registry.get(&session.id).await.unwrap().expires_at,
            50 + SESSION_DURATION_SECS
        );
    }

    #[tokio::test]
    async fn test_refresh_racing_expiry_delete() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(0);
        let registry = Arc::new(registry_at(dir.path(), &clock));
        let session = registry.create().await.unwrap();
        clock.advance(SESSION_DURATION_SECS + 1);

        let validator = {
            let registry = registry.clone();
            let id = session.id.clone();
            tokio::spawn(async move { registry.validate(&id).await })
        };
        let refresher = {
            let registry = registry.clone();
            let id = session.id.clone();
            tokio::spawn(async move { registry.refresh(&id).await })
        };
        let valid = validator.await.unwrap();
        let refreshed = refresher.await.unwrap();

        // Whichever ran first, memory and disk agree
        let file = dir.path().join(format!("{}.json", session.id));
        match (valid, refreshed.is_ok()) {
            (false, false) => {
                assert!(registry.get(&session.id).await.is_none());
                assert!(!file.exists());
            }
            (_, true) => {
                assert!(registry.get(&session.id).await.is_some());
                assert!(file.exists());
            }
            (true, false) => panic!("an expired session was reported valid without a refresh"),
        }
    }
}
