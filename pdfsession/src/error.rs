//! Error types for pdfsession.
//!
//! Errors are grouped by how far they reach:
//!
//! - **File errors**: a source file cannot be parsed. Only that file is
//!   affected, other files in the same upload batch load normally.
//! - **Page errors**: a single page failed to render. The failure is cached
//!   until it has been observed once, the next request retries.
//! - **Export errors**: assembling, serializing or packaging the output
//!   failed. The whole export is aborted and nothing partial is returned.
//! - **Usage errors**: invalid handles or out-of-range page indices. These
//!   indicate a bug in the caller and are fatal to the single operation only.

use std::io;

use crate::store::FileId;

/// Result type alias for pdfsession operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// A page failed to render.
///
/// Kept separate from [`SessionError`] because it is cloned to every waiter
/// of an in-flight render and stored in the render cache until observed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to render page {page_index} of file {file_id}: {reason}")]
pub struct RenderFailure {
    /// File the page belongs to.
    pub file_id: FileId,
    /// Zero-based page index.
    pub page_index: usize,
    /// Details reported by the renderer.
    pub reason: String,
}

impl RenderFailure {
    /// Create a render failure for a page.
    pub fn new(file_id: FileId, page_index: usize, reason: impl Into<String>) -> Self {
        Self {
            file_id,
            page_index,
            reason: reason.into(),
        }
    }
}

/// Broad classification used to pick a user-facing remediation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A source file is unreadable; re-upload it.
    File,
    /// A single page could not be rendered; retry the preview.
    Page,
    /// The export or archival step failed; retry the export.
    Export,
    /// The caller passed an invalid handle or index.
    Usage,
}

/// Main error type for pdfsession operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A page index outside `0..page_count` was requested.
    #[error("Page index {page_index} is out of range for file {file_id}: it has {page_count} page(s)")]
    PageOutOfRange {
        /// File that was queried.
        file_id: FileId,
        /// Requested index, as given by the caller.
        page_index: i64,
        /// Number of pages in the file.
        page_count: usize,
    },

    /// The byte buffer could not be parsed as a PDF document.
    #[error("Corrupted or invalid PDF: {name}\n  Details: {details}")]
    CorruptDocument {
        /// Name of the uploaded file.
        name: String,
        /// Parser diagnostics.
        details: String,
    },

    /// The document is encrypted and cannot be opened without a password.
    #[error(
        "PDF is encrypted and cannot be processed: {name}\n  \
         Hint: Decrypt the PDF first using 'qpdf --decrypt' or similar tools"
    )]
    EncryptedDocument {
        /// Name of the uploaded file.
        name: String,
    },

    /// A page failed to render.
    #[error(transparent)]
    Render(#[from] RenderFailure),

    /// A page refers to a file that is no longer part of the session.
    #[error("Source file {file_id} is no longer part of the session")]
    MissingSourceFile {
        /// File that was referenced.
        file_id: FileId,
    },

    /// No file with this id is loaded.
    #[error("Unknown file: {file_id}")]
    UnknownFile {
        /// Id that was looked up.
        file_id: FileId,
    },

    /// No group exists at this position.
    #[error("Unknown page group at position {index} (session has {len} group(s))")]
    UnknownGroup {
        /// Requested group position.
        index: usize,
        /// Number of groups in the session.
        len: usize,
    },

    /// No page placement with this id exists in the group.
    #[error("Unknown page placement: {page_id}")]
    UnknownPage {
        /// Id that was looked up.
        page_id: String,
    },

    /// A placement id would appear twice in the session.
    #[error("Page placement {page_id} is already part of the session")]
    DuplicatePage {
        /// Id that occurs more than once.
        page_id: String,
    },

    /// Copying pages or building the output page tree failed.
    #[error("Failed to assemble document: {reason}")]
    Assembly {
        /// Description of what went wrong.
        reason: String,
    },

    /// Serializing an output document failed.
    #[error("Failed to serialize document '{name}'\n  Reason: {reason}")]
    Serialization {
        /// Name of the document being written.
        name: String,
        /// Underlying writer error.
        reason: String,
    },

    /// Building the ZIP archive failed.
    #[error("Failed to package export archive: {reason}")]
    Packaging {
        /// Underlying compression error.
        reason: String,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of what's wrong with the configuration.
        message: String,
    },

    /// An operation needs a running tokio runtime.
    #[error("Runtime error: {message}")]
    Runtime {
        /// Details about the failure.
        message: String,
    },

    /// Generic I/O error.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },

    /// Generic error with a custom message.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

impl From<anyhow::Error> for SessionError {
    fn from(err: anyhow::Error) -> Self {
        Self::other(format!("{err:#}"))
    }
}

impl SessionError {
    /// Create a PageOutOfRange error.
    pub fn page_out_of_range(file_id: FileId, page_index: i64, page_count: usize) -> Self {
        Self::PageOutOfRange {
            file_id,
            page_index,
            page_count,
        }
    }

    /// Create a CorruptDocument error.
    pub fn corrupt_document(name: impl Into<String>, details: impl Into<String>) -> Self {
        Self::CorruptDocument {
            name: name.into(),
            details: details.into(),
        }
    }

    /// Create an EncryptedDocument error.
    pub fn encrypted_document(name: impl Into<String>) -> Self {
        Self::EncryptedDocument { name: name.into() }
    }

    /// Create an Assembly error.
    pub fn assembly(reason: impl Into<String>) -> Self {
        Self::Assembly {
            reason: reason.into(),
        }
    }

    /// Create a Packaging error.
    pub fn packaging(reason: impl Into<String>) -> Self {
        Self::Packaging {
            reason: reason.into(),
        }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a Runtime error.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Create an Other error with a custom message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Check if this error is isolated to one file or one page.
    ///
    /// Recoverable errors never abort a batch upload or the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CorruptDocument { .. }
                | Self::EncryptedDocument { .. }
                | Self::Render(_)
                | Self::MissingSourceFile { .. }
        )
    }

    /// Classify the error for user-facing reporting.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::CorruptDocument { .. } | Self::EncryptedDocument { .. } => ErrorCategory::File,
            Self::Render(_) => ErrorCategory::Page,
            Self::PageOutOfRange { .. }
            | Self::UnknownFile { .. }
            | Self::UnknownGroup { .. }
            | Self::UnknownPage { .. }
            | Self::DuplicatePage { .. }
            | Self::InvalidConfig { .. } => ErrorCategory::Usage,
            Self::MissingSourceFile { .. }
            | Self::Assembly { .. }
            | Self::Serialization { .. }
            | Self::Packaging { .. }
            | Self::Runtime { .. }
            | Self::Io { .. }
            | Self::Other { .. } => ErrorCategory::Export,
        }
    }

    /// Get the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Usage => 1,
            ErrorCategory::File => 3,
            ErrorCategory::Page => 6,
            ErrorCategory::Export => match self {
                Self::Io { .. } | Self::Serialization { .. } => 5,
                _ => 6,
            },
        }
    }
}
