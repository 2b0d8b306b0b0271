//! Merge and export engine.
//!
//! [`assembler`] builds output documents from page groups, copying each
//! needed source page once through [`copier`]. [`writer`] serializes them and
//! [`package`] bundles several documents into one archive. [`exporter`] ties
//! the steps together for a whole session.

pub mod assembler;
pub mod copier;
pub mod exporter;
pub mod metadata;
pub mod package;
pub mod writer;

pub use assembler::{AssemblyStatistics, CopyBatch, DocumentAssembler, OutputDocument};
pub use copier::{CopiedPages, PageCopier};
pub use exporter::{ArtifactKind, ExportArtifact, ExportPlan, Exporter};
pub use package::{NamedBuffer, Packager};
pub use writer::{DocumentWriter, WriteStatistics};
