//! Group layout files.
//!
//! A layout lists the groups to export and, for each, the pages it holds
//! as (input position, zero-based page) pairs:
//!
//! ```json
//! [{ "name": "summary", "pages": [{ "file": 1, "page": 0 }, { "file": 0, "page": 3 }] }]
//! ```

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;

use pdfsession::{FileId, PageGroup, Session};

/// One page slot of a layout group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutPage {
    /// Position of the input file on the command line.
    pub file: usize,
    /// Zero-based page index within that file.
    pub page: usize,
}

/// One group of a layout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutGroup {
    /// Group name, also the output document name.
    pub name: String,
    /// Page slots, in output order.
    #[serde(default)]
    pub pages: Vec<LayoutPage>,
}

/// A complete group layout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Layout {
    /// Groups, in output order.
    pub groups: Vec<LayoutGroup>,
}

impl Layout {
    /// Parse a layout from JSON text.
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid layout")
    }

    /// Read a layout file.
    pub async fn read(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read layout file: {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("In layout file: {}", path.display()))
    }

    /// Check that every slot names one of `input_count` inputs and every
    /// group has a name.
    pub fn validate(&self, input_count: usize) -> Result<()> {
        for (index, group) in self.groups.iter().enumerate() {
            if group.name.trim().is_empty() {
                bail!("Layout group {index} has no name");
            }
            if let Some(slot) = group.pages.iter().find(|slot| slot.file >= input_count) {
                bail!(
                    "Layout group '{}' refers to input {}, but only {input_count} input(s) were given",
                    group.name,
                    slot.file
                );
            }
        }
        Ok(())
    }

    /// Resolve the layout against the loaded inputs.
    ///
    /// `files[i]` is the id of input `i`, or `None` when it failed to load.
    /// Slots pointing at a failed input are errors, as are page indices past
    /// the end of their file.
    pub fn resolve(&self, session: &Session, files: &[Option<FileId>]) -> Result<Vec<PageGroup>> {
        self.validate(files.len())?;

        let mut groups = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            let mut resolved = PageGroup::new(group.name.clone());
            for slot in &group.pages {
                let Some(file_id) = files[slot.file] else {
                    bail!(
                        "Layout group '{}' uses input {}, which could not be loaded",
                        group.name,
                        slot.file
                    );
                };
                let page_ref = session
                    .page_ref(file_id, slot.page)
                    .with_context(|| format!("In layout group '{}'", group.name))?;
                resolved.push(page_ref);
            }
            groups.push(resolved);
        }
        Ok(groups)
    }
}
