//! File-backed session persistence
//!
//! Every session lives in its own pretty-printed JSON file,
//! `chat_<id>.json`, inside a single chats directory.

use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::session::ChatSession;

const RECORD_PREFIX: &str = "chat_";
const RECORD_EXTENSION: &str = "json";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode session {id}: {source}")]
    Encode {
        id: Uuid,
        #[source]
        source: serde_json::Error,
    },

    #[error("session {id} has never been saved")]
    NotPersisted { id: Uuid },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A record `load_all` left out, and why
#[derive(Debug, Clone)]
pub struct SkippedRecord {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of loading the chats directory
#[derive(Debug, Default)]
pub struct LoadReport {
    pub sessions: HashMap<Uuid, ChatSession>,
    pub skipped: Vec<SkippedRecord>,
}

/// Durable mapping between session ids and their record files
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

    /// Record location for a session id
    pub fn path_for(&self, id: &Uuid) -> PathBuf {
        self.dir
            .join(format!("{}{}.{}", RECORD_PREFIX, id, RECORD_EXTENSION))
    }

    async fn ensure_dir(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StorageError::Io {
                action: "failed to create",
                path: self.dir.clone(),
                source,
            })
    }

    /// Load every record in the chats directory.
    ///
    /// Loading is best effort: a record that can't be read or decoded is
    /// listed in [`LoadReport::skipped`] and the rest still load. Only a
    /// failure to list the directory itself is an error.
    pub async fn load_all(&self) -> StorageResult<LoadReport> {
        self.ensure_dir().await?;

        let list_error = |source| StorageError::Io {
            action: "failed to list",
            path: self.dir.clone(),
            source,
        };
        let mut entries = fs::read_dir(&self.dir).await.map_err(list_error)?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(list_error)? {
            let path = entry.path();
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file && path.extension().map_or(false, |ext| ext == RECORD_EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut report = LoadReport::default();
        for path in paths {
            match Self::read_record(&path).await {
                Ok(mut session) => {
                    if report.sessions.contains_key(&session.id) {
                        report.skipped.push(SkippedRecord {
                            reason: format!("duplicate session id {}", session.id),
                            path,
                        });
                        continue;
                    }
                    session.bind(path);
                    report.sessions.insert(session.id, session);
                }
                Err(reason) => {
                    warn!("Skipping session record {}: {}", path.display(), reason);
                    report.skipped.push(SkippedRecord { path, reason });
                }
            }
        }

        info!(
            loaded = report.sessions.len(),
            skipped = report.skipped.len(),
            "Loaded sessions from {}",
            self.dir.display()
        );
        Ok(report)
    }

    async fn read_record(path: &Path) -> Result<ChatSession, String> {
        let data = fs::read(path).await.map_err(|e| format!("unreadable: {}", e))?;
        serde_json::from_slice(&data).map_err(|e| format!("undecodable: {}", e))
    }

    /// Write the full session to its bound location, or to the location
    /// derived from its id on first save.
    ///
    /// The record is written to a temporary sibling and renamed into place,
    /// so an interrupted save never leaves a truncated record behind.
    /// Returns the location the caller should bind.
    pub async fn save(&self, session: &ChatSession) -> StorageResult<PathBuf> {
        self.ensure_dir().await?;

        let path = session
            .binding()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.path_for(&session.id));
        let tmp = path.with_extension(format!("{}.tmp", RECORD_EXTENSION));

        let data = serde_json::to_vec_pretty(session).map_err(|source| StorageError::Encode {
            id: session.id,
            source,
        })?;

        fs::write(&tmp, &data)
            .await
            .map_err(|source| StorageError::Io {
                action: "failed to write",
                path: tmp.clone(),
                source,
            })?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|source| StorageError::Io {
                action: "failed to replace",
                path: path.clone(),
                source,
            })?;

        debug!(session_id = %session.id, "Saved session to {}", path.display());
        Ok(path)
    }

    /// Remove a session's record. The session must have been saved before.
    pub async fn delete(&self, session: &ChatSession) -> StorageResult<()> {
        let path = session
            .binding()
            .ok_or(StorageError::NotPersisted { id: session.id })?;

        match fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(session_id = %session.id, "Record already gone: {}", path.display());
            }
            Err(source) => {
                return Err(StorageError::Io {
                    action: "failed to delete",
                    path: path.to_path_buf(),
                    source,
                })
            }
        }

        info!(session_id = %session.id, "Deleted session record {}", path.display());
        Ok(())
    }
}
