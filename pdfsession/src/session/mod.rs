//! The document session.
//!
//! A [`Session`] owns the loaded files, their preview cache and the ordered
//! page groups. Every export reads from it, and every mutation goes through
//! it so the unsaved-changes flag stays accurate.
//!
//! # Examples
//!
//! ```no_run
//! use pdfsession::{Exporter, Session, SessionConfig, SourceFile};
//!
//! # async fn example(a: Vec<u8>, b: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::default();
//! let mut session = Session::new(config.clone());
//! for result in session
//!     .add_files(vec![SourceFile::new("a.pdf", a), SourceFile::new("b.pdf", b)])
//!     .await
//! {
//!     result?;
//! }
//!
//! session.merge_groups(&[0, 1], "combined")?;
//! if let Some(artifact) = Exporter::new(&config).download(&session).await? {
//!     println!("{} ({} bytes)", artifact.file_name, artifact.bytes.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod snapshot;

pub use snapshot::{
    FileSnapshot, GroupSnapshot, MemorySessionStore, PageSnapshot, SessionId, SessionSnapshot,
    SessionStore,
};

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::export::{ExportArtifact, ExportPlan, Exporter};
use crate::group::{Page, PageGroup, PageId, group_name_from_file_name};
use crate::render::{PageRenderer, PdfPageRenderer, RenderCache};
use crate::store::{FileId, FileLoader, FileStore, PageRef, PhysicalFile, SourceFile};

/// A document editing session.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    config: SessionConfig,
    loader: FileLoader,
    files: FileStore,
    render: RenderCache,
    groups: Vec<PageGroup>,
    has_unsaved_changes: bool,
}

impl Session {
    /// Create an empty session that previews pages as single-page PDFs.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_renderer(config, Arc::new(PdfPageRenderer))
    }

    /// Create an empty session with a custom page renderer.
    pub fn with_renderer(config: SessionConfig, renderer: Arc<dyn PageRenderer>) -> Self {
        Self::resume(SessionId::new(), config, renderer)
    }

    /// Create an empty session under a known id, e.g. to restore a snapshot.
    pub fn resume(id: SessionId, config: SessionConfig, renderer: Arc<dyn PageRenderer>) -> Self {
        let render = RenderCache::new(renderer, config.render.clone());
        Self {
            id,
            config,
            loader: FileLoader::new(),
            files: FileStore::new(),
            render,
            groups: Vec::new(),
            has_unsaved_changes: false,
        }
    }

    /// Session id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Session settings.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Loaded files.
    pub fn files(&self) -> &FileStore {
        &self.files
    }

    /// Preview cache of the loaded files.
    pub fn render_cache(&self) -> &RenderCache {
        &self.render
    }

    /// Page groups, in output order.
    pub fn groups(&self) -> &[PageGroup] {
        &self.groups
    }

    /// Look up a group by position.
    pub fn group(&self, index: usize) -> Result<&PageGroup> {
        self.groups.get(index).ok_or(SessionError::UnknownGroup {
            index,
            len: self.groups.len(),
        })
    }

    /// Check whether anything changed since the last [`Session::mark_saved`].
    pub fn has_unsaved_changes(&self) -> bool {
        self.has_unsaved_changes
    }

    /// Clear the unsaved-changes flag.
    pub fn mark_saved(&mut self) {
        self.has_unsaved_changes = false;
    }

    /// Parse and add uploaded files.
    ///
    /// Every file that loads gets a group of its own, named after the file
    /// without its `.pdf` extension and containing all of its pages. Files
    /// fail individually; results are in input order.
    pub async fn add_files(&mut self, sources: Vec<SourceFile>) -> Vec<Result<FileId>> {
        let jobs = self.config.effective_load_jobs();
        let (results, stats) = self.loader.load_all(sources, jobs).await;

        let ids = results
            .into_iter()
            .map(|result| result.map(|file| self.add_file(file)))
            .collect();

        info!(
            loaded = stats.success_count,
            failed = stats.failure_count,
            pages = stats.total_pages,
            "added files to session"
        );
        ids
    }

    /// Add an already loaded file with a default group for its pages.
    pub fn add_file(&mut self, file: PhysicalFile) -> FileId {
        let name = group_name_from_file_name(file.name());
        let file = self.insert_file(file);
        self.groups.push(PageGroup::from_refs(name, file.pages()));
        file.id()
    }

    /// Add an already loaded file without creating a group for it.
    pub fn insert_file(&mut self, file: PhysicalFile) -> Arc<PhysicalFile> {
        let file = self.files.insert(file);
        self.render.register_file(&file);
        self.has_unsaved_changes = true;
        debug!(file_id = %file.id(), name = file.name(), "file registered");
        file
    }

    /// Remove a file from the session.
    ///
    /// Pages of the file stay in their groups; exports treat them according
    /// to the configured missing-file policy until
    /// [`Session::prune_missing_pages`] drops them.
    pub fn remove_file(&mut self, file_id: FileId) -> Result<Arc<PhysicalFile>> {
        let file = self
            .files
            .remove(file_id)
            .ok_or(SessionError::UnknownFile { file_id })?;
        self.render.remove_file(file_id);
        self.has_unsaved_changes = true;
        Ok(file)
    }

    /// Drop every placement whose file is no longer loaded.
    ///
    /// Returns the number of placements removed.
    pub fn prune_missing_pages(&mut self) -> usize {
        let files = &self.files;
        let mut removed = 0;
        for group in &mut self.groups {
            let before = group.len();
            group.retain_files(|file_id| files.contains(file_id));
            removed += before - group.len();
        }
        if removed > 0 {
            self.has_unsaved_changes = true;
        }
        removed
    }

    /// Resolve a page of a loaded file.
    pub fn page_ref(&self, file_id: FileId, page_index: usize) -> Result<PageRef> {
        self.files.get_page(file_id, page_index)
    }

    /// Append a group and return its position.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DuplicatePage`] if a placement of `group` is
    /// already in the session, e.g. when adding a clone of an existing group.
    pub fn add_group(&mut self, group: PageGroup) -> Result<usize> {
        ensure_unique_pages(self.groups.iter().chain(std::iter::once(&group)))?;
        self.groups.push(group);
        self.has_unsaved_changes = true;
        Ok(self.groups.len() - 1)
    }

    /// Replace all groups, returning the previous ones.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DuplicatePage`] if a placement id occurs more
    /// than once in `groups`. The session is left unchanged.
    pub fn replace_groups(&mut self, groups: Vec<PageGroup>) -> Result<Vec<PageGroup>> {
        ensure_unique_pages(&groups)?;
        self.has_unsaved_changes = true;
        Ok(std::mem::replace(&mut self.groups, groups))
    }

    /// Remove the group at `index`.
    pub fn remove_group(&mut self, index: usize) -> Result<PageGroup> {
        self.check_group(index)?;
        self.has_unsaved_changes = true;
        Ok(self.groups.remove(index))
    }

    /// Rename the group at `index`.
    pub fn rename_group(&mut self, index: usize, name: impl Into<String>) -> Result<()> {
        self.edit_group(index, |group| group.rename(name))
    }

    /// Move the group at `from` so that it ends up at `to` (clamped).
    pub fn move_group(&mut self, from: usize, to: usize) -> Result<()> {
        self.check_group(from)?;
        let group = self.groups.remove(from);
        let to = to.min(self.groups.len());
        self.groups.insert(to, group);
        self.has_unsaved_changes = true;
        Ok(())
    }

    /// Apply `edit` to the group at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DuplicatePage`] and undoes the edit if it
    /// brought in a placement that already exists in the session.
    pub fn edit_group<R>(&mut self, index: usize, edit: impl FnOnce(&mut PageGroup) -> R) -> Result<R> {
        self.check_group(index)?;
        let before = self.groups[index].clone();
        let result = edit(&mut self.groups[index]);

        if let Err(err) = ensure_unique_pages(&self.groups) {
            self.groups[index] = before;
            return Err(err);
        }

        self.has_unsaved_changes = true;
        Ok(result)
    }

    /// Move a placement to position `index` of another group, keeping its
    /// identity.
    pub fn move_page_between(
        &mut self,
        from_group: usize,
        page_id: PageId,
        to_group: usize,
        index: usize,
    ) -> Result<()> {
        self.check_group(from_group)?;
        self.check_group(to_group)?;

        let page = self.groups[from_group]
            .remove(page_id)
            .ok_or_else(|| SessionError::UnknownPage {
                page_id: page_id.to_string(),
            })?;
        self.groups[to_group].insert_page(index, page);
        self.has_unsaved_changes = true;
        Ok(())
    }

    /// Replace the groups at `indices` by one group named `name`.
    ///
    /// Pages are concatenated in the order of `indices`. The merged group
    /// takes the position of the first merged group in session order.
    /// Returns that position.
    pub fn merge_groups(&mut self, indices: &[usize], name: impl Into<String>) -> Result<usize> {
        let mut sorted = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() != indices.len() {
            return Err(SessionError::other("A group cannot be merged twice"));
        }
        for &index in &sorted {
            self.check_group(index)?;
        }
        let Some(&position) = sorted.first() else {
            return Err(SessionError::other("No groups to merge"));
        };

        let mut taken: Vec<Option<PageGroup>> =
            std::mem::take(&mut self.groups).into_iter().map(Some).collect();
        let mut merged = PageGroup::new(name);
        for &index in indices {
            if let Some(mut group) = taken[index].take() {
                merged.append(&mut group);
            }
        }

        self.groups = taken.into_iter().flatten().collect();
        self.groups.insert(position, merged);
        self.has_unsaved_changes = true;
        Ok(position)
    }

    /// Split the group at `index` before page position `at`; the tail
    /// becomes a new group named `name` right after it.
    ///
    /// Returns the position of the new group.
    pub fn split_group(&mut self, index: usize, at: usize, name: impl Into<String>) -> Result<usize> {
        self.check_group(index)?;
        let tail = self.groups[index].split_off(at, name);
        self.groups.insert(index + 1, tail);
        self.has_unsaved_changes = true;
        Ok(index + 1)
    }

    /// Name of the whole export: the first group's name, or the configured
    /// placeholder when there are no groups.
    pub fn document_name(&self) -> String {
        self.groups
            .first()
            .map(|group| group.name().to_string())
            .unwrap_or_else(|| self.config.untitled_name.clone())
    }

    /// Take a point-in-time copy of everything an export needs.
    pub fn export_plan(&self) -> ExportPlan {
        ExportPlan {
            groups: self.groups.clone(),
            files: self.files.clone(),
            document_name: self.document_name(),
        }
    }

    /// Export the session with its own settings.
    pub async fn export(&self) -> Result<Option<ExportArtifact>> {
        Exporter::new(&self.config).download(self).await
    }

    /// Record the session's files and groups.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            files: self
                .files
                .iter()
                .map(|file| FileSnapshot {
                    id: file.id(),
                    name: file.name().to_string(),
                    page_count: file.page_count(),
                })
                .collect(),
            groups: self
                .groups
                .iter()
                .map(|group| GroupSnapshot {
                    name: group.name().to_string(),
                    pages: group
                        .pages()
                        .iter()
                        .map(|page| PageSnapshot {
                            id: page.id(),
                            file_id: page.page_ref().file_id(),
                            page_index: page.page_ref().page_index(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    /// Replace the groups with the ones recorded in `snapshot`.
    ///
    /// Every file the snapshot refers to must already be loaded under its
    /// recorded id. Nothing changes if any reference is invalid. Placement
    /// ids are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A referenced file is not loaded
    /// - A page index is out of range for its file
    /// - A placement id is recorded more than once
    pub fn restore_groups(&mut self, snapshot: &SessionSnapshot) -> Result<()> {
        let mut groups = Vec::with_capacity(snapshot.groups.len());
        for recorded in &snapshot.groups {
            let mut group = PageGroup::new(recorded.name.clone());
            for page in &recorded.pages {
                let page_ref = self.files.get_page(page.file_id, page.page_index)?;
                group.insert_page(group.len(), Page::with_id(page.id, page_ref));
            }
            groups.push(group);
        }
        ensure_unique_pages(&groups)?;

        self.groups = groups;
        self.has_unsaved_changes = false;
        debug!(session = %self.id, groups = self.groups.len(), "groups restored");
        Ok(())
    }

    fn check_group(&self, index: usize) -> Result<()> {
        self.group(index).map(|_| ())
    }
}

/// Fail on the first placement id seen twice across `groups`.
fn ensure_unique_pages<'a>(groups: impl IntoIterator<Item = &'a PageGroup>) -> Result<()> {
    let mut seen = HashSet::new();
    for page in groups.into_iter().flat_map(PageGroup::pages) {
        if !seen.insert(page.id()) {
            return Err(SessionError::DuplicatePage {
                page_id: page.id().to_string(),
            });
        }
    }
    Ok(())
}
