//! Parsing of uploaded byte buffers.
//!
//! Parsing runs on tokio's blocking pool so a large document never stalls
//! other tasks. Batches are loaded with bounded concurrency and every file
//! succeeds or fails on its own.
//!
//! # Examples
//!
//! ```no_run
//! use pdfsession::store::{FileLoader, SourceFile};
//!
//! # async fn example(bytes: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
//! let loader = FileLoader::new();
//! let file = loader.load(SourceFile::new("report.pdf", bytes)).await?;
//! println!("{} has {} pages", file.name(), file.page_count());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use lopdf::Document;
use tokio::task;
use tracing::{debug, warn};

use crate::error::{Result, SessionError};
use crate::store::file::{FileId, PhysicalFile};

/// A named byte buffer as received from an upload.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// File name, including extension.
    pub name: String,
    /// Raw file contents.
    pub bytes: Arc<[u8]>,
}

impl SourceFile {
    /// Create a source file from a name and its contents.
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Result of loading one source file.
pub type LoadResult = Result<PhysicalFile>;

/// Statistics for a batch load operation.
#[derive(Debug, Clone, Default)]
pub struct LoadStatistics {
    /// Number of files successfully loaded.
    pub success_count: usize,

    /// Number of files that failed to load.
    pub failure_count: usize,

    /// Wall-clock time for the whole batch.
    pub total_time: Duration,

    /// Total size of successfully loaded files.
    pub total_size: u64,

    /// Total number of pages loaded.
    pub total_pages: usize,
}

impl LoadStatistics {
    fn from_results(results: &[LoadResult], total_time: Duration) -> Self {
        let mut stats = Self {
            total_time,
            ..Default::default()
        };

        for result in results {
            match result {
                Ok(file) => {
                    stats.success_count += 1;
                    stats.total_size += file.size();
                    stats.total_pages += file.page_count();
                }
                Err(_) => stats.failure_count += 1,
            }
        }

        stats
    }
}

/// Parser turning byte buffers into [`PhysicalFile`]s.
#[derive(Debug, Clone)]
pub struct FileLoader {
    /// Reject documents without pages.
    verify: bool,
}

impl FileLoader {
    /// Create a loader that rejects documents without pages.
    pub fn new() -> Self {
        Self { verify: true }
    }

    /// Create a loader that accepts any parseable document.
    pub fn without_verification() -> Self {
        Self { verify: false }
    }

    /// Parse a single source file.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EncryptedDocument`] for password protected
    /// files and [`SessionError::CorruptDocument`] for anything else that
    /// cannot be parsed.
    pub async fn load(&self, source: SourceFile) -> Result<PhysicalFile> {
        self.load_as(FileId::new(), source).await
    }

    /// Parse a source file under a known id, e.g. when restoring a saved
    /// session.
    pub async fn load_as(&self, file_id: FileId, source: SourceFile) -> Result<PhysicalFile> {
        let verify = self.verify;
        let SourceFile { name, bytes } = source;

        let start = Instant::now();
        let parse_bytes = Arc::clone(&bytes);
        let parsed = task::spawn_blocking(move || Document::load_mem(&parse_bytes))
            .await
            .map_err(|e| SessionError::runtime(format!("Parse task failed: {e}")))?;

        let document = parsed.map_err(|e| classify_parse_error(&name, &e.to_string()))?;

        // lopdf loads a locked file without error; only the empty user
        // password gets decrypted, everything else is left unparsed.
        if document.is_encrypted() && document.encryption_state.is_none() {
            return Err(SessionError::encrypted_document(name));
        }

        if verify && document.get_pages().is_empty() {
            return Err(SessionError::corrupt_document(name, "PDF has no pages"));
        }

        let file = PhysicalFile::new(file_id, name, bytes, document, start.elapsed());
        debug!(
            file_id = %file.id(),
            name = file.name(),
            pages = file.page_count(),
            "loaded source file"
        );

        Ok(file)
    }

    /// Load files one after another, in input order.
    pub async fn load_sequential(&self, sources: Vec<SourceFile>) -> Vec<LoadResult> {
        let mut results = Vec::with_capacity(sources.len());

        for source in sources {
            results.push(self.load(source).await);
        }

        results
    }

    /// Load files concurrently with at most `jobs` parses in flight.
    ///
    /// Results are returned in input order.
    pub async fn load_parallel(&self, sources: Vec<SourceFile>, jobs: usize) -> Vec<LoadResult> {
        let jobs = jobs.max(1);

        let tasks = sources.into_iter().map(|source| {
            let loader = self.clone();
            async move { loader.load(source).await }
        });

        stream::iter(tasks).buffered(jobs).collect::<Vec<_>>().await
    }

    /// Load a batch, choosing sequential loading for small batches.
    pub async fn load_all(
        &self,
        sources: Vec<SourceFile>,
        jobs: usize,
    ) -> (Vec<LoadResult>, LoadStatistics) {
        let start = Instant::now();

        let results = if sources.len() <= 1 || jobs <= 1 {
            self.load_sequential(sources).await
        } else {
            self.load_parallel(sources, jobs).await
        };

        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            warn!(error = %err, "source file rejected");
        }

        let stats = LoadStatistics::from_results(&results, start.elapsed());
        (results, stats)
    }
}

impl Default for FileLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn classify_parse_error(name: &str, message: &str) -> SessionError {
    let lower = message.to_lowercase();
    if lower.contains("encrypt") || lower.contains("password") || lower.contains("decrypt") {
        SessionError::encrypted_document(name)
    } else {
        SessionError::corrupt_document(name, message)
    }
}
