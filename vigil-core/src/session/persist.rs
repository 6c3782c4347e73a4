use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use super::session::{short_id, Session};
use super::token::is_session_id;
use crate::error::SessionError;

const SESSION_FILE_EXT: &str = "json";

/// One JSON file per session inside a data directory
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a session; deterministic in the id
    /// Anything that is not a well-formed session id has no file
    pub fn path_for(&self, session_id: &str) -> Result<PathBuf, SessionError> {
        if !is_session_id(session_id) {
            return Err(SessionError::NotFound(short_id(session_id).to_string()));
        }
        Ok(self.dir.join(format!("{}.{}", session_id, SESSION_FILE_EXT)))
    }

    /// Create the data directory if it is missing
    pub async fn ensure_dir(&self) -> Result<(), SessionError> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o755);
        builder
            .create(&self.dir)
            .await
            .map_err(|e| SessionError::persistence(&self.dir, e))
    }

    /// Save a session (atomic write using temp file, owner read/write only)
    pub async fn save(&self, session: &Session) -> Result<(), SessionError> {
        let file_path = self.path_for(&session.id)?;
        let json = serde_json::to_vec(session)
            .map_err(|e| SessionError::persistence(&file_path, std::io::Error::other(e)))?;

        let temp_path = self.dir.join(format!("{}.tmp", Uuid::new_v4()));
        if let Err(e) = write_private(&temp_path, &json).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(SessionError::persistence(&temp_path, e));
        }
        if let Err(e) = fs::rename(&temp_path, &file_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(SessionError::persistence(&file_path, e));
        }

        debug!(session = short_id(&session.id), "session saved to disk");
        Ok(())
    }

    /// Remove a session file; a file that is already gone counts as removed
    pub async fn remove(&self, session_id: &str) -> Result<(), SessionError> {
        let file_path = self.path_for(session_id)?;
        match fs::remove_file(&file_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::persistence(file_path, e)),
        }
    }

    /// Paths of every `*.json` regular file in the data directory
    pub async fn list(&self) -> Result<Vec<PathBuf>, SessionError> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| SessionError::persistence(&self.dir, e))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SessionError::persistence(&self.dir, e))?
        {
            let path = entry.path();
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if is_file && path.extension().is_some_and(|ext| ext == SESSION_FILE_EXT) {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    /// Read and parse a single session file
    pub async fn read(&self, path: &Path) -> Result<Session, SessionError> {
        let content = fs::read(path)
            .await
            .map_err(|e| SessionError::persistence(path, e))?;
        serde_json::from_slice(&content).map_err(|e| SessionError::Deserialization {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

async fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    Ok(())
}
