//! pdfsession - Assemble PDF documents from pages of several source files.
//!
//! A [`Session`] holds uploaded source files, never modifying them, and an
//! ordered list of page groups. Each group becomes one output document. The
//! same source page can be placed any number of times, in one group or
//! across several, and is still copied only once per export. Annotations and
//! links between exported pages survive the copy.
//!
//! - [`store`]: parsed source files and stable page identities
//! - [`group`]: page groups and page placements
//! - [`render`]: lazy, memoized page previews
//! - [`export`]: document assembly, serialization and ZIP packaging
//! - [`session`]: the session tying everything together, and snapshots
//!
//! # Examples
//!
//! ```no_run
//! use pdfsession::{Session, SessionConfig, SourceFile};
//!
//! # async fn example(bytes: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = Session::new(SessionConfig::default());
//! let file_id = session
//!     .add_files(vec![SourceFile::new("report.pdf", bytes)])
//!     .await
//!     .remove(0)?;
//!
//! // Put the last page first.
//! session.edit_group(0, |group| {
//!     let last = group.len() - 1;
//!     group.move_page(last, 0);
//! })?;
//!
//! // Preview a page.
//! let page = session.page_ref(file_id, 0)?;
//! let preview = session.render_cache().page(page).await?;
//! println!("{} x {} pt", preview.width, preview.height);
//!
//! if let Some(artifact) = session.export().await? {
//!     std::fs::write(&artifact.file_name, &artifact.bytes)?;
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod export;
pub mod group;
pub mod render;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use config::{CompressionLevel, MissingFilePolicy, SessionConfig};
pub use error::{RenderFailure, Result, SessionError};
pub use export::{ArtifactKind, DocumentAssembler, ExportArtifact, ExportPlan, Exporter};
pub use group::{Page, PageGroup, PageId};
pub use render::{PageRenderer, PageStatus, RenderCache, RenderEvent, RenderedPage};
pub use session::{MemorySessionStore, Session, SessionId, SessionSnapshot, SessionStore};
pub use store::{FileId, FileLoader, FileStore, PageRef, PhysicalFile, SourceFile};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
