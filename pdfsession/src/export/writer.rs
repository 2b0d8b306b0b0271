//! Serialization of assembled documents.
//!
//! Output documents are serialized to memory; the export layer decides
//! whether the bytes are handed out as a single PDF or packaged into an
//! archive. [`write_atomic`] persists a buffer for callers that want a file.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use lopdf::Document;
use tokio::task;
use tracing::debug;

use crate::config::CompressionLevel;
use crate::error::{Result, SessionError};

/// Statistics about one serialization.
#[derive(Debug, Clone)]
pub struct WriteStatistics {
    /// Time taken to serialize.
    pub write_time: Duration,

    /// Size of the serialized document in bytes.
    pub size: u64,

    /// Compression level that was applied.
    pub compression: CompressionLevel,
}

impl WriteStatistics {
    /// Format the size as human-readable string.
    pub fn format_size(&self) -> String {
        format_file_size(self.size)
    }
}

/// Serializes documents to PDF bytes.
#[derive(Debug, Clone, Default)]
pub struct DocumentWriter {
    compression: CompressionLevel,
}

impl DocumentWriter {
    /// Create a writer with the default compression level.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with an explicit compression level.
    pub fn with_compression(compression: CompressionLevel) -> Self {
        Self { compression }
    }

    /// Serialize `document`, named `name` for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Serialization`] if lopdf fails to write the
    /// document.
    pub async fn to_bytes(&self, document: Document, name: &str) -> Result<Vec<u8>> {
        let (bytes, _stats) = self.to_bytes_with_stats(document, name).await?;
        Ok(bytes)
    }

    /// Serialize `document` and return statistics about the operation.
    pub async fn to_bytes_with_stats(
        &self,
        mut document: Document,
        name: &str,
    ) -> Result<(Vec<u8>, WriteStatistics)> {
        let compression = self.compression;
        let name = name.to_string();

        task::spawn_blocking(move || {
            let start = Instant::now();

            match compression {
                CompressionLevel::None => {}
                CompressionLevel::Standard => document.compress(),
                CompressionLevel::Maximum => {
                    document.prune_objects();
                    document.compress();
                }
            }
            document.renumber_objects();

            let mut bytes = Vec::new();
            document
                .save_to(&mut bytes)
                .map_err(|e| SessionError::Serialization {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;

            let stats = WriteStatistics {
                write_time: start.elapsed(),
                size: bytes.len() as u64,
                compression,
            };
            debug!(name = %name, size = stats.size, ?compression, "serialized document");

            Ok::<_, SessionError>((bytes, stats))
        })
        .await
        .map_err(|e| SessionError::runtime(format!("Write task failed: {e}")))?
    }
}

/// Write `bytes` to `path` through a temporary file in the same directory.
///
/// The target either keeps its previous content or receives the complete
/// new content.
///
/// # Errors
///
/// Returns an error if:
/// - The parent directory doesn't exist or isn't writable
/// - The temporary file cannot be written or renamed
pub async fn write_atomic(path: &Path, bytes: Vec<u8>) -> Result<u64> {
    let path = path.to_path_buf();

    task::spawn_blocking(move || {
        let temp_path = temp_path_for(&path);

        if let Err(e) = write_and_rename(&temp_path, &path, &bytes) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(SessionError::from(e));
        }

        Ok::<_, SessionError>(bytes.len() as u64)
    })
    .await
    .map_err(|e| SessionError::runtime(format!("Write task failed: {e}")))?
}

fn write_and_rename(temp_path: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let file = std::fs::File::create(temp_path)?;
    let mut writer = std::io::BufWriter::new(file);
    writer.write_all(bytes)?;
    writer.flush()?;
    drop(writer);
    std::fs::rename(temp_path, path)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Format file size as human-readable string.
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{size} bytes")
    }
}
