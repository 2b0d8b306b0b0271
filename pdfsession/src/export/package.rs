//! ZIP packaging of several output documents.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use tokio::task;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::config::ArchiveCompression;
use crate::error::{Result, SessionError};

/// A named byte buffer, one entry of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedBuffer {
    /// Entry file name.
    pub name: String,
    /// Entry content.
    pub bytes: Vec<u8>,
}

impl NamedBuffer {
    /// Create a named buffer.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Builds ZIP archives from named buffers.
#[derive(Debug, Clone, Default)]
pub struct Packager {
    compression: ArchiveCompression,
}

impl Packager {
    /// Create a packager that deflates entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a packager with an explicit entry compression.
    pub fn with_compression(compression: ArchiveCompression) -> Self {
        Self { compression }
    }

    /// Package `entries` into one archive, in the given order.
    ///
    /// Entry names are expected to be unique; see [`unique_entry_names`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Packaging`] if `entries` is empty or the
    /// archive cannot be written.
    pub async fn package(&self, entries: Vec<NamedBuffer>) -> Result<Vec<u8>> {
        if entries.is_empty() {
            return Err(SessionError::packaging("Nothing to package"));
        }

        let compression = self.compression;
        task::spawn_blocking(move || write_archive(compression, &entries))
            .await
            .map_err(|e| SessionError::runtime(format!("Packaging task failed: {e}")))?
    }
}

fn write_archive(compression: ArchiveCompression, entries: &[NamedBuffer]) -> Result<Vec<u8>> {
    let method = match compression {
        ArchiveCompression::Stored => CompressionMethod::Stored,
        ArchiveCompression::Deflated => CompressionMethod::Deflated,
    };
    // Fixed timestamp so identical inputs produce identical archives.
    let options = SimpleFileOptions::default()
        .compression_method(method)
        .last_modified_time(DateTime::default());

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for entry in entries {
        zip.start_file(entry.name.as_str(), options)
            .map_err(|e| SessionError::packaging(format!("{}: {e}", entry.name)))?;
        zip.write_all(&entry.bytes)
            .map_err(|e| SessionError::packaging(format!("{}: {e}", entry.name)))?;
    }

    let bytes = zip
        .finish()
        .map_err(|e| SessionError::packaging(e.to_string()))?
        .into_inner();

    debug!(entries = entries.len(), size = bytes.len(), "packaged archive");
    Ok(bytes)
}

/// Turn document names into unique archive entry names ending in `.pdf`.
///
/// Path separators are replaced so every entry lands at the archive root.
/// Repeated names get a counter: `Report.pdf`, `Report (2).pdf`.
pub fn unique_entry_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut used = HashSet::new();
    let mut result = Vec::new();

    for name in names {
        let base = sanitize_entry_name(name);
        let mut candidate = format!("{base}.pdf");
        let mut counter = 2;
        while !used.insert(candidate.to_lowercase()) {
            candidate = format!("{base} ({counter}).pdf");
            counter += 1;
        }
        result.push(candidate);
    }

    result
}

fn sanitize_entry_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim();
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '.') {
        "document".to_string()
    } else {
        trimmed.to_string()
    }
}
