//! Session configuration.
//!
//! A [`SessionConfig`] can be built in code, deserialized from a JSON file,
//! or assembled by the CLI from flags. Missing fields take their defaults,
//! so a config file only needs to name what it changes.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{path::Path, str::FromStr};

use crate::SessionError;

/// Name used for the document when a session has no groups.
pub const UNTITLED_DOCUMENT: &str = "Untitled Document";

/// Compression level for output documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    /// Write streams as they were copied.
    None,
    /// Compress uncompressed streams.
    #[default]
    Standard,
    /// Compress streams and drop unreferenced objects.
    Maximum,
}

impl FromStr for CompressionLevel {
    type Err = SessionError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "standard" => Ok(Self::Standard),
            "maximum" => Ok(Self::Maximum),
            _ => Err(SessionError::invalid_config(format!(
                "Invalid compression level: {s}. Must be one of: none, standard, maximum"
            ))),
        }
    }
}

/// What an export does with pages whose source file has been removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingFilePolicy {
    /// Leave the page out and keep going.
    #[default]
    Skip,
    /// Abort the export with [`SessionError::MissingSourceFile`].
    Fail,
}

impl FromStr for MissingFilePolicy {
    type Err = SessionError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "fail" => Ok(Self::Fail),
            _ => Err(SessionError::invalid_config(format!(
                "Invalid missing file policy: {s}. Must be one of: skip, fail"
            ))),
        }
    }
}

/// Compression method for ZIP archive entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveCompression {
    /// Store entries uncompressed.
    Stored,
    /// Deflate entries.
    #[default]
    Deflated,
}

/// Settings for the preview render cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Upper bound of renders running at the same time.
    pub max_concurrent_renders: usize,

    /// Yield to the scheduler once before each render starts.
    pub yield_before_render: bool,

    /// Capacity of the readiness event channel.
    pub event_capacity: usize,

    /// Compress the streams of preview documents.
    pub compress_previews: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_concurrent_renders: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            yield_before_render: true,
            event_capacity: 256,
            compress_previews: false,
        }
    }
}

/// Settings for the export archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Compression method for entries.
    pub compression: ArchiveCompression,
}

/// Complete configuration of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Compression applied to output documents.
    pub compression: CompressionLevel,

    /// Handling of pages whose source file is gone at export time.
    pub missing_file_policy: MissingFilePolicy,

    /// Document name used when the session has no groups.
    pub untitled_name: String,

    /// Number of files parsed concurrently (None = CPU count).
    pub load_jobs: Option<usize>,

    /// Preview render settings.
    pub render: RenderConfig,

    /// Export archive settings.
    pub archive: ArchiveConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            compression: CompressionLevel::default(),
            missing_file_policy: MissingFilePolicy::default(),
            untitled_name: UNTITLED_DOCUMENT.to_string(),
            load_jobs: None,
            render: RenderConfig::default(),
            archive: ArchiveConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Read a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// fails [`SessionConfig::validate`].
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The render concurrency limit is zero
    /// - The event channel capacity is zero
    /// - The load job count is zero
    /// - The untitled placeholder name is blank
    pub fn validate(&self) -> Result<()> {
        if self.render.max_concurrent_renders == 0 {
            bail!("Render concurrency must be at least 1");
        }

        if self.render.event_capacity == 0 {
            bail!("Render event capacity must be at least 1");
        }

        if let Some(jobs) = self.load_jobs
            && jobs == 0
        {
            bail!("Number of load jobs must be at least 1");
        }

        if self.untitled_name.trim().is_empty() {
            bail!("Untitled document name cannot be empty");
        }

        Ok(())
    }

    /// Get the effective number of concurrent file parses.
    pub fn effective_load_jobs(&self) -> usize {
        self.load_jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}
