//! Assembly of output documents from page groups.
//!
//! Assembly runs in two passes. The first pass collects, per source file,
//! the set of page indices needed by all groups and copies each set in one
//! batch; a page placed several times is still copied once. The second pass
//! walks the groups again in order and appends the copied pages to the
//! output page tree, restoring order and intentional duplicates that the
//! first pass collapsed.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::try_join_all;
use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use tokio::task;
use tracing::{debug, warn};

use crate::config::MissingFilePolicy;
use crate::error::{Result, SessionError};
use crate::export::copier::{CopiedPages, PageCopier};
use crate::export::metadata::{DocumentInfo, set_document_info};
use crate::group::PageGroup;
use crate::store::{FileId, FileStore, PageRef};

const DEFAULT_PDF_VERSION: &str = "1.5";

/// One batched copy issued against a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyBatch {
    /// Source file the pages were copied from.
    pub file_id: FileId,
    /// Zero-based page indices, each at most once, ascending.
    pub page_indices: Vec<usize>,
}

/// Statistics about one assembly.
#[derive(Debug, Clone, Default)]
pub struct AssemblyStatistics {
    /// Copy batches, one per source file, in first-use order.
    pub batches: Vec<CopyBatch>,

    /// Number of distinct source pages copied.
    pub pages_copied: usize,

    /// Number of pages in the output document.
    pub pages_written: usize,

    /// Number of placements dropped because their file is gone.
    pub pages_skipped: usize,

    /// Time taken by the whole assembly.
    pub assembly_time: Duration,
}

/// An assembled, not yet serialized, output document.
#[derive(Debug, Clone)]
pub struct OutputDocument {
    /// Display name; becomes the file name on export.
    pub name: String,

    /// The assembled document.
    pub document: Document,

    /// Statistics about the assembly.
    pub statistics: AssemblyStatistics,
}

impl OutputDocument {
    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.statistics.pages_written
    }
}

/// Builds output documents out of page groups.
#[derive(Debug, Clone, Default)]
pub struct DocumentAssembler {
    missing_file_policy: MissingFilePolicy,
}

impl DocumentAssembler {
    /// Create an assembler that skips pages of removed files.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an assembler with an explicit missing-file policy.
    pub fn with_policy(missing_file_policy: MissingFilePolicy) -> Self {
        Self {
            missing_file_policy,
        }
    }

    /// Assemble one document containing the pages of `groups`, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A page's file is gone and the policy is [`MissingFilePolicy::Fail`]
    /// - A source page cannot be copied
    /// - The output page tree cannot be built
    pub async fn create_document_from(
        &self,
        groups: &[PageGroup],
        files: &FileStore,
        name: &str,
    ) -> Result<OutputDocument> {
        let start = Instant::now();
        let mut statistics = AssemblyStatistics::default();

        // Pass 1: distinct pages per file, files in first-use order.
        let mut needed: Vec<(FileId, BTreeSet<usize>)> = Vec::new();
        let mut slot_of_file: HashMap<FileId, usize> = HashMap::new();
        for page_ref in groups.iter().flat_map(PageGroup::page_refs) {
            let file_id = page_ref.file_id();
            if !files.contains(file_id) {
                if self.missing_file_policy == MissingFilePolicy::Fail {
                    return Err(SessionError::MissingSourceFile { file_id });
                }
                continue;
            }
            let slot = *slot_of_file.entry(file_id).or_insert_with(|| {
                needed.push((file_id, BTreeSet::new()));
                needed.len() - 1
            });
            needed[slot].1.insert(page_ref.page_index());
        }

        // Reserve disjoint object id ranges so batches can run concurrently.
        let mut next_id = 1u32;
        let mut jobs = Vec::with_capacity(needed.len());
        for (file_id, indices) in needed {
            let file = files.require(file_id)?;
            let document = Arc::clone(file.document());
            let page_indices: Vec<usize> = indices.into_iter().collect();
            let first_id = next_id;
            next_id = next_id.saturating_add(PageCopier::id_budget(&document));

            statistics.batches.push(CopyBatch {
                file_id,
                page_indices: page_indices.clone(),
            });
            jobs.push(copy_batch(file_id, document, page_indices, first_id));
        }
        let batches = try_join_all(jobs).await?;

        let version = groups
            .iter()
            .flat_map(PageGroup::page_refs)
            .filter_map(|page_ref| files.get(page_ref.file_id()))
            .map(|file| file.document().version.clone())
            .max()
            .unwrap_or_else(|| DEFAULT_PDF_VERSION.to_string());

        let mut builder = OutputBuilder::new(&version, next_id);
        let mut copied: HashMap<PageRef, ObjectId> = HashMap::new();
        for (file_id, page_indices, batch) in batches {
            for (&page_index, &object_id) in page_indices.iter().zip(&batch.page_ids) {
                let page_ref = files.get_page(file_id, page_index)?;
                copied.insert(page_ref, object_id);
            }
            statistics.pages_copied += batch.page_ids.len();
            builder.absorb(batch);
        }

        // Pass 2: rebuild order, including repeated pages.
        for page_ref in groups.iter().flat_map(PageGroup::page_refs) {
            match copied.get(&page_ref) {
                Some(&object_id) => builder.append_page(object_id)?,
                None => {
                    statistics.pages_skipped += 1;
                    warn!(page = %page_ref, "source file missing, page left out of export");
                }
            }
        }

        let mut document = builder.finish()?;
        set_document_info(&mut document, &DocumentInfo::titled(name))?;

        statistics.pages_written = document.get_pages().len();
        statistics.assembly_time = start.elapsed();
        debug!(
            name,
            pages = statistics.pages_written,
            copied = statistics.pages_copied,
            skipped = statistics.pages_skipped,
            "assembled document"
        );

        Ok(OutputDocument {
            name: name.to_string(),
            document,
            statistics,
        })
    }
}

async fn copy_batch(
    file_id: FileId,
    document: Arc<Document>,
    page_indices: Vec<usize>,
    first_id: u32,
) -> Result<(FileId, Vec<usize>, CopiedPages)> {
    task::spawn_blocking(move || {
        let batch = PageCopier::copy_pages(&document, &page_indices, first_id)?;
        Ok::<_, SessionError>((file_id, page_indices, batch))
    })
    .await
    .map_err(|e| SessionError::runtime(format!("Copy task failed: {e}")))?
}

/// Accumulates copied objects and builds the output page tree.
pub(crate) struct OutputBuilder {
    document: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
    placed: HashSet<ObjectId>,
}

impl OutputBuilder {
    /// Start an empty document whose own objects are numbered from `first_free_id`.
    pub(crate) fn new(version: &str, first_free_id: u32) -> Self {
        let mut document = Document::with_version(version);
        document.max_id = first_free_id.saturating_sub(1);
        let pages_id = document.new_object_id();

        Self {
            document,
            pages_id,
            kids: Vec::new(),
            placed: HashSet::new(),
        }
    }

    /// Move the objects of a copy batch into the document.
    pub(crate) fn absorb(&mut self, batch: CopiedPages) {
        let max = batch.max_object_number();
        self.document.objects.extend(batch.objects);
        self.document.max_id = self.document.max_id.max(max);
    }

    /// Append a copied page to the page tree.
    ///
    /// The first placement uses the copied page object itself. Later
    /// placements get a shallow clone of its dictionary so every entry of
    /// the page tree is a distinct object; content and resources stay
    /// shared, annotations are cloned so their `/P` names the page that
    /// shows them.
    pub(crate) fn append_page(&mut self, page_id: ObjectId) -> Result<()> {
        let target = if self.placed.insert(page_id) {
            page_id
        } else {
            self.repeat_page(page_id)?
        };

        match self.document.get_object_mut(target) {
            Ok(Object::Dictionary(page)) => page.set("Parent", self.pages_id),
            _ => {
                return Err(SessionError::assembly(format!(
                    "Copied page {target:?} is not a dictionary"
                )));
            }
        }

        self.kids.push(target);
        Ok(())
    }

    fn repeat_page(&mut self, page_id: ObjectId) -> Result<ObjectId> {
        let mut page = match self.document.get_object(page_id) {
            Ok(Object::Dictionary(page)) => page.clone(),
            Ok(_) => {
                return Err(SessionError::assembly(format!(
                    "Copied page {page_id:?} is not a dictionary"
                )));
            }
            Err(e) => return Err(SessionError::assembly(format!("Copied page missing: {e}"))),
        };

        let repeat_id = self.document.new_object_id();
        if let Some(annots) = self.annotations_of(&page) {
            let cloned = annots
                .into_iter()
                .map(|annot| self.clone_annotation(annot, repeat_id))
                .collect::<Vec<Object>>();
            page.set("Annots", cloned);
        }

        self.document.objects.insert(repeat_id, page.into());
        Ok(repeat_id)
    }

    fn annotations_of(&self, page: &Dictionary) -> Option<Vec<Object>> {
        match page.get(b"Annots").ok()? {
            Object::Array(annots) => Some(annots.clone()),
            Object::Reference(id) => self
                .document
                .get_object(*id)
                .and_then(Object::as_array)
                .ok()
                .cloned(),
            _ => None,
        }
    }

    fn clone_annotation(&mut self, annot: Object, page_id: ObjectId) -> Object {
        let mut dict = match &annot {
            Object::Reference(id) => match self.document.get_dictionary(*id) {
                Ok(dict) => dict.clone(),
                Err(_) => return annot,
            },
            Object::Dictionary(dict) => dict.clone(),
            _ => return annot,
        };

        dict.set("P", page_id);
        match annot {
            Object::Reference(_) => Object::Reference(self.document.add_object(dict)),
            _ => Object::Dictionary(dict),
        }
    }

    /// Write the page tree and catalog and return the document.
    pub(crate) fn finish(mut self) -> Result<Document> {
        let count = i64::try_from(self.kids.len())
            .map_err(|_| SessionError::assembly("Too many pages"))?;
        let kids: Vec<Object> = self.kids.iter().map(|&id| Object::Reference(id)).collect();

        self.document.objects.insert(
            self.pages_id,
            dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }
            .into(),
        );

        let catalog_id = self.document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.document.trailer.set("Root", catalog_id);

        Ok(self.document)
    }
}
