//! JSON file persistence of the session.

use std::path::{Path, PathBuf};

use log::debug;

use super::SessionState;
use crate::error_handling::SessionError;

/// Session state stored as pretty-printed JSON in one file.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored session; `Ok(None)` when nothing has been stored yet.
    pub async fn load(&self) -> Result<Option<SessionState>, SessionError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, state: &SessionState) -> Result<(), SessionError> {
        let contents = serde_json::to_string_pretty(state)?;
        tokio::fs::write(&self.path, contents).await?;
        debug!("Session saved to {}", self.path.display());
        Ok(())
    }

    /// Removes the stored session. Clearing an empty store is not an error.
    pub async fn clear(&self) -> Result<(), SessionError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
