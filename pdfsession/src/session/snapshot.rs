//! Session snapshots and the persistence boundary.
//!
//! A [`SessionSnapshot`] records which files a session uses and how their
//! pages are arranged. It does not carry file contents; whoever restores a
//! session supplies the bytes again and loads them under the recorded ids.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SessionError};
use crate::group::PageId;
use crate::store::FileId;

/// Identity of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A source file as recorded in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    /// File id.
    pub id: FileId,
    /// Original file name.
    pub name: String,
    /// Number of pages.
    pub page_count: usize,
}

/// One page placement as recorded in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// Placement id.
    pub id: PageId,
    /// Source file.
    pub file_id: FileId,
    /// Zero-based page index in the source file.
    pub page_index: usize,
}

/// A page group as recorded in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    /// Group name.
    pub name: String,
    /// Placements, in order.
    pub pages: Vec<PageSnapshot>,
}

/// Serializable state of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session the snapshot was taken from.
    pub session_id: SessionId,
    /// Loaded files, in load order.
    pub files: Vec<FileSnapshot>,
    /// Page groups, in order.
    pub groups: Vec<GroupSnapshot>,
}

/// Storage for session snapshots.
pub trait SessionStore: Send + Sync {
    /// Store `snapshot` under `id`, replacing any previous one.
    fn save(
        &self,
        id: SessionId,
        snapshot: &SessionSnapshot,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Load the snapshot stored under `id`.
    fn load(&self, id: SessionId) -> impl Future<Output = Result<Option<SessionSnapshot>>> + Send;
}

/// Keeps snapshots in memory as JSON documents.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<SessionId, String>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Check if no session is stored.
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    async fn save(&self, id: SessionId, snapshot: &SessionSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)
            .map_err(|e| SessionError::other(format!("Failed to encode session {id}: {e}")))?;
        self.sessions.lock().insert(id, json);
        Ok(())
    }

    async fn load(&self, id: SessionId) -> Result<Option<SessionSnapshot>> {
        let Some(json) = self.sessions.lock().get(&id).cloned() else {
            return Ok(None);
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| SessionError::other(format!("Failed to decode session {id}: {e}")))
    }
}
