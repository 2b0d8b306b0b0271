//! Page groups: ordered, named lists of page placements.
//!
//! A [`Page`] is one slot in a group. It has its own [`PageId`] and points
//! at a [`PageRef`]; the same source page can be placed many times, in one
//! group or across several, and each placement is still addressable on its
//! own. Page ids are random and never handed out twice.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{FileId, PageRef};

/// Identity of one page placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(Uuid);

impl PageId {
    /// Generate a fresh id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One placement of a source page inside a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    id: PageId,
    page_ref: PageRef,
}

impl Page {
    /// Place `page_ref` with a fresh identity.
    pub fn new(page_ref: PageRef) -> Self {
        Self {
            id: PageId::new(),
            page_ref,
        }
    }

    pub(crate) fn with_id(id: PageId, page_ref: PageRef) -> Self {
        Self { id, page_ref }
    }

    /// Identity of this placement.
    pub fn id(&self) -> PageId {
        self.id
    }

    /// Source page this placement shows.
    pub fn page_ref(&self) -> PageRef {
        self.page_ref
    }
}

/// Ordered, named sequence of pages; one group becomes one output document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageGroup {
    name: String,
    pages: Vec<Page>,
}

impl PageGroup {
    /// Create an empty group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pages: Vec::new(),
        }
    }

    /// Create a group placing each reference once, in order.
    pub fn from_refs(name: impl Into<String>, refs: impl IntoIterator<Item = PageRef>) -> Self {
        Self {
            name: name.into(),
            pages: refs.into_iter().map(Page::new).collect(),
        }
    }

    /// Display name of the group.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Change the display name.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// All placements in output order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Source pages in output order.
    pub fn page_refs(&self) -> impl Iterator<Item = PageRef> + '_ {
        self.pages.iter().map(Page::page_ref)
    }

    /// Number of placements.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Check if the group has no pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Look up a placement by id.
    pub fn page(&self, id: PageId) -> Option<&Page> {
        self.pages.iter().find(|page| page.id == id)
    }

    /// Position of a placement.
    pub fn position(&self, id: PageId) -> Option<usize> {
        self.pages.iter().position(|page| page.id == id)
    }

    /// Append a placement of `page_ref`.
    pub fn push(&mut self, page_ref: PageRef) -> PageId {
        let page = Page::new(page_ref);
        let id = page.id;
        self.pages.push(page);
        id
    }

    /// Insert a placement at `index`, clamped to the end of the group.
    pub fn insert(&mut self, index: usize, page_ref: PageRef) -> PageId {
        let page = Page::new(page_ref);
        let id = page.id;
        self.insert_page(index, page);
        id
    }

    /// Insert an existing placement, keeping its identity.
    pub(crate) fn insert_page(&mut self, index: usize, page: Page) {
        let index = index.min(self.pages.len());
        self.pages.insert(index, page);
    }

    /// Remove a placement by id.
    pub fn remove(&mut self, id: PageId) -> Option<Page> {
        let index = self.position(id)?;
        Some(self.pages.remove(index))
    }

    /// Remove the placement at `index`.
    pub fn remove_at(&mut self, index: usize) -> Option<Page> {
        (index < self.pages.len()).then(|| self.pages.remove(index))
    }

    /// Move the placement at `from` so that it ends up at `to`.
    ///
    /// Returns false if `from` is out of bounds; `to` is clamped.
    pub fn move_page(&mut self, from: usize, to: usize) -> bool {
        if from >= self.pages.len() {
            return false;
        }
        let page = self.pages.remove(from);
        self.insert_page(to, page);
        true
    }

    /// Place the same source page again, right after `id`.
    pub fn duplicate(&mut self, id: PageId) -> Option<PageId> {
        let index = self.position(id)?;
        let page = Page::new(self.pages[index].page_ref);
        let new_id = page.id;
        self.pages.insert(index + 1, page);
        Some(new_id)
    }

    /// Remove and return the placements with the given ids, in group order.
    pub fn take_pages(&mut self, ids: &[PageId]) -> Vec<Page> {
        let (taken, kept): (Vec<Page>, Vec<Page>) = std::mem::take(&mut self.pages)
            .into_iter()
            .partition(|page| ids.contains(&page.id));
        self.pages = kept;
        taken
    }

    /// Move every placement of `other` to the end of this group.
    pub fn append(&mut self, other: &mut PageGroup) {
        self.pages.append(&mut other.pages);
    }

    /// Split the group at `index`; the tail becomes a new group.
    pub fn split_off(&mut self, index: usize, name: impl Into<String>) -> PageGroup {
        let index = index.min(self.pages.len());
        PageGroup {
            name: name.into(),
            pages: self.pages.split_off(index),
        }
    }

    /// Keep only placements whose source file satisfies `keep`.
    pub fn retain_files(&mut self, mut keep: impl FnMut(FileId) -> bool) {
        self.pages.retain(|page| keep(page.page_ref.file_id()));
    }

    /// Check whether any placement points into `file_id`.
    pub fn references_file(&self, file_id: FileId) -> bool {
        self.pages
            .iter()
            .any(|page| page.page_ref.file_id() == file_id)
    }
}

/// Strip a trailing `.pdf` extension, ignoring case.
pub fn group_name_from_file_name(file_name: &str) -> String {
    const EXTENSION: &str = ".pdf";

    let split = file_name.len().checked_sub(EXTENSION.len());
    match split {
        Some(split)
            if file_name.is_char_boundary(split)
                && file_name[split..].eq_ignore_ascii_case(EXTENSION) =>
        {
            file_name[..split].to_string()
        }
        _ => file_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn refs(n: usize) -> Vec<PageRef> {
        let file_id = FileId::new();
        (0..n).map(|i| PageRef::new(file_id, i)).collect()
    }

    fn indices(group: &PageGroup) -> Vec<usize> {
        group.page_refs().map(|r| r.page_index()).collect()
    }

    #[test]
    fn test_from_refs_keeps_order() {
        let group = PageGroup::from_refs("doc", refs(3));
        assert_eq!(group.name(), "doc");
        assert_eq!(indices(&group), vec![0, 1, 2]);
    }

    #[test]
    fn test_move_page() {
        let mut group = PageGroup::from_refs("doc", refs(3));
        assert!(group.move_page(2, 0));
        assert_eq!(indices(&group), vec![2, 0, 1]);
        assert!(group.move_page(0, 10));
        assert_eq!(indices(&group), vec![0, 1, 2]);
        assert!(!group.move_page(3, 0));
    }

    #[test]
    fn test_duplicate_creates_new_identity() {
        let r = refs(2);
        let mut group = PageGroup::from_refs("doc", r.clone());
        let original = group.pages()[0].id();

        let copy = group.duplicate(original).unwrap();
        assert_ne!(copy, original);
        assert_eq!(group.position(copy), Some(1));
        assert_eq!(group.page(copy).unwrap().page_ref(), r[0]);
        assert_eq!(indices(&group), vec![0, 0, 1]);
    }

    #[test]
    fn test_ids_not_reused_after_removal() {
        let r = refs(1);
        let mut group = PageGroup::new("doc");
        let first = group.push(r[0]);
        assert!(group.remove(first).is_some());
        let second = group.push(r[0]);
        assert_ne!(first, second);
        assert!(group.page(first).is_none());
    }

    #[test]
    fn test_take_pages_preserves_group_order() {
        let mut group = PageGroup::from_refs("doc", refs(4));
        let ids: Vec<PageId> = vec![group.pages()[3].id(), group.pages()[1].id()];
        let taken = group.take_pages(&ids);
        let taken_indices: Vec<usize> = taken.iter().map(|p| p.page_ref().page_index()).collect();
        assert_eq!(taken_indices, vec![1, 3]);
        assert_eq!(indices(&group), vec![0, 2]);
    }

    #[test]
    fn test_append_and_split() {
        let mut a = PageGroup::from_refs("a", refs(2));
        let mut b = PageGroup::from_refs("b", refs(1));
        a.append(&mut b);
        assert_eq!(a.len(), 3);
        assert!(b.is_empty());

        let tail = a.split_off(1, "tail");
        assert_eq!(a.len(), 1);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail.name(), "tail");
    }

    #[test]
    fn test_retain_files() {
        let a = refs(2);
        let b = refs(1);
        let mut group = PageGroup::from_refs("mixed", a.iter().chain(b.iter()).copied());
        let drop_id = b[0].file_id();
        assert!(group.references_file(drop_id));
        group.retain_files(|id| id != drop_id);
        assert_eq!(group.len(), 2);
        assert!(!group.references_file(drop_id));
    }

    #[rstest]
    #[case("report.pdf", "report")]
    #[case("REPORT.PDF", "REPORT")]
    #[case("archive.pdf.pdf", "archive.pdf")]
    #[case("notes.txt", "notes.txt")]
    #[case(".pdf", "")]
    #[case("pdf", "pdf")]
    #[case("résumé.Pdf", "résumé")]
    fn test_group_name_from_file_name(#[case] file_name: &str, #[case] expected: &str) {
        assert_eq!(group_name_from_file_name(file_name), expected);
    }
}
