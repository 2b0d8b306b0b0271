//! Source files and page identities.
//!
//! A [`PhysicalFile`] is parsed once and never mutated. It owns the page
//! table that hands out [`PageRef`] keys, so the same (file, index) pair
//! always yields the same key for as long as the file is loaded.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use lopdf::{Document, ObjectId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SessionError};

/// Identifier of a loaded source file, unique for the session lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(Uuid);

impl FileId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID, e.g. one restored from a snapshot.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of "page N of file F".
///
/// Only [`PhysicalFile::page`] creates these; equal keys always denote the
/// same source page, so they can be used directly as map and set keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PageRef {
    file_id: FileId,
    page_index: usize,
}

impl PageRef {
    pub(crate) fn new(file_id: FileId, page_index: usize) -> Self {
        Self {
            file_id,
            page_index,
        }
    }

    /// File the page belongs to.
    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    /// Zero-based index of the page inside its file.
    pub fn page_index(&self) -> usize {
        self.page_index
    }
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.file_id, self.page_index)
    }
}

/// One uploaded source document.
#[derive(Debug)]
pub struct PhysicalFile {
    id: FileId,
    name: String,
    bytes: Arc<[u8]>,
    document: Arc<Document>,
    page_ids: Vec<ObjectId>,
    page_refs: Box<[OnceLock<PageRef>]>,
    load_time: Duration,
}

impl PhysicalFile {
    pub(crate) fn new(
        id: FileId,
        name: String,
        bytes: Arc<[u8]>,
        document: Document,
        load_time: Duration,
    ) -> Self {
        // get_pages is keyed by 1-based page number, so values come out in page order.
        let page_ids: Vec<ObjectId> = document.get_pages().into_values().collect();
        let page_refs = (0..page_ids.len()).map(|_| OnceLock::new()).collect();

        Self {
            id,
            name,
            bytes,
            document: Arc::new(document),
            page_ids,
            page_refs,
            load_time,
        }
    }

    /// Session-unique id of this file.
    pub fn id(&self) -> FileId {
        self.id
    }

    /// Name the file was uploaded with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The original, unmodified bytes.
    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    /// Size of the source in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// The parsed document.
    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Time it took to parse the document.
    pub fn load_time(&self) -> Duration {
        self.load_time
    }

    /// Get the identity of the page at `page_index`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::PageOutOfRange`] if `page_index >= page_count`.
    pub fn page(&self, page_index: usize) -> Result<PageRef> {
        let slot = self.page_refs.get(page_index).ok_or_else(|| {
            SessionError::page_out_of_range(
                self.id,
                i64::try_from(page_index).unwrap_or(i64::MAX),
                self.page_count(),
            )
        })?;

        Ok(*slot.get_or_init(|| PageRef::new(self.id, page_index)))
    }

    /// Signed variant of [`PhysicalFile::page`] for callers that compute
    /// indices with arithmetic that may go negative.
    pub fn page_signed(&self, page_index: i64) -> Result<PageRef> {
        match usize::try_from(page_index) {
            Ok(index) if index < self.page_count() => self.page(index),
            _ => Err(SessionError::page_out_of_range(
                self.id,
                page_index,
                self.page_count(),
            )),
        }
    }

    /// Identities of all pages, in document order.
    pub fn pages(&self) -> Vec<PageRef> {
        (0..self.page_count())
            .filter_map(|index| self.page(index).ok())
            .collect()
    }

    /// Object id of the page dictionary at `page_index`.
    pub fn page_object_id(&self, page_index: usize) -> Option<ObjectId> {
        self.page_ids.get(page_index).copied()
    }

    /// Check whether `page_ref` points into this file.
    pub fn owns(&self, page_ref: &PageRef) -> bool {
        page_ref.file_id == self.id && page_ref.page_index < self.page_count()
    }
}
