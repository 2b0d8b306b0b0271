//! The physical file store.
//!
//! Holds every source document of a session, keyed by [`FileId`], and
//! resolves page indices to [`PageRef`] identities. Files are never modified
//! and are only dropped when explicitly removed; a file that no page group
//! references any more stays loaded.

pub mod file;
pub mod loader;

pub use file::{FileId, PageRef, PhysicalFile};
pub use loader::{FileLoader, LoadResult, LoadStatistics, SourceFile};

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, SessionError};

/// Map from file id to loaded file, iterated in insertion order.
#[derive(Debug, Default, Clone)]
pub struct FileStore {
    files: HashMap<FileId, Arc<PhysicalFile>>,
    order: Vec<FileId>,
}

impl FileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a loaded file and return a shared handle to it.
    pub fn insert(&mut self, file: PhysicalFile) -> Arc<PhysicalFile> {
        let id = file.id();
        let file = Arc::new(file);
        if self.files.insert(id, Arc::clone(&file)).is_none() {
            self.order.push(id);
        }
        file
    }

    /// Look up a file.
    pub fn get(&self, file_id: FileId) -> Option<&Arc<PhysicalFile>> {
        self.files.get(&file_id)
    }

    /// Look up a file, failing with [`SessionError::UnknownFile`].
    pub fn require(&self, file_id: FileId) -> Result<&Arc<PhysicalFile>> {
        self.get(file_id)
            .ok_or(SessionError::UnknownFile { file_id })
    }

    /// Remove a file from the store.
    ///
    /// Pages that still reference the file are left untouched; exports
    /// treat them as missing.
    pub fn remove(&mut self, file_id: FileId) -> Option<Arc<PhysicalFile>> {
        let removed = self.files.remove(&file_id)?;
        self.order.retain(|id| *id != file_id);
        Some(removed)
    }

    /// Check whether a file is loaded.
    pub fn contains(&self, file_id: FileId) -> bool {
        self.files.contains_key(&file_id)
    }

    /// Number of loaded files.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if no files are loaded.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterate files in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<PhysicalFile>> {
        self.order.iter().filter_map(|id| self.files.get(id))
    }

    /// Page count of a loaded file.
    pub fn page_count(&self, file_id: FileId) -> Result<usize> {
        Ok(self.require(file_id)?.page_count())
    }

    /// Resolve a page index of a loaded file to its identity.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownFile`] if the file is not loaded and
    /// [`SessionError::PageOutOfRange`] if the index is invalid.
    pub fn get_page(&self, file_id: FileId, page_index: usize) -> Result<PageRef> {
        self.require(file_id)?.page(page_index)
    }
}
