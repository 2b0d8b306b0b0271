//! Export of a session into a downloadable artifact.

use std::time::{Duration, Instant};

use futures::future::try_join_all;
use tracing::info;

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::export::assembler::DocumentAssembler;
use crate::export::package::{NamedBuffer, Packager, unique_entry_names};
use crate::export::writer::DocumentWriter;
use crate::group::PageGroup;
use crate::session::Session;
use crate::store::FileStore;

/// Kind of an export artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// A single PDF document.
    Pdf,
    /// A ZIP archive with one PDF per group.
    Zip,
}

impl ArtifactKind {
    /// MIME type of the artifact.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Zip => "application/zip",
        }
    }
}

/// The result of an export: a named byte buffer ready for download.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    /// File name, including extension.
    pub file_name: String,
    /// Artifact content.
    pub bytes: Vec<u8>,
    /// Whether this is a PDF or an archive.
    pub kind: ArtifactKind,
    /// Number of pages written across all documents.
    pub page_count: usize,
    /// Time taken by the export.
    pub export_time: Duration,
}

/// Point-in-time view of a session's export inputs.
///
/// Taking a plan clones the groups and the file table (file contents are
/// shared), so a session can keep changing while an export is running.
#[derive(Debug, Clone)]
pub struct ExportPlan {
    /// Groups to export, in order.
    pub groups: Vec<PageGroup>,
    /// Files the groups refer to.
    pub files: FileStore,
    /// Name of the whole export.
    pub document_name: String,
}

/// Turns export plans into artifacts.
#[derive(Debug, Clone, Default)]
pub struct Exporter {
    assembler: DocumentAssembler,
    writer: DocumentWriter,
    packager: Packager,
}

impl Exporter {
    /// Create an exporter from session settings.
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            assembler: DocumentAssembler::with_policy(config.missing_file_policy),
            writer: DocumentWriter::with_compression(config.compression),
            packager: Packager::with_compression(config.archive.compression),
        }
    }

    /// Export the current state of `session`.
    ///
    /// Returns `None` when the session has no groups.
    pub async fn download(&self, session: &Session) -> Result<Option<ExportArtifact>> {
        let plan = session.export_plan();
        self.export(plan).await
    }

    /// Export a plan.
    ///
    /// One group becomes `<group>.pdf`. Two or more groups become
    /// `<document name>.zip` with one PDF per group.
    ///
    /// # Errors
    ///
    /// Returns an error if assembly, serialization or packaging fails. No
    /// partial artifact is returned.
    pub async fn export(&self, plan: ExportPlan) -> Result<Option<ExportArtifact>> {
        let start = Instant::now();
        let ExportPlan {
            groups,
            files,
            document_name,
        } = plan;

        match groups.as_slice() {
            [] => Ok(None),
            [group] => {
                let output = self
                    .assembler
                    .create_document_from(std::slice::from_ref(group), &files, group.name())
                    .await?;
                let page_count = output.page_count();
                let bytes = self.writer.to_bytes(output.document, &output.name).await?;
                let file_name = single_entry_name(group.name());

                info!(file = %file_name, pages = page_count, size = bytes.len(), "exported document");
                Ok(Some(ExportArtifact {
                    file_name,
                    bytes,
                    kind: ArtifactKind::Pdf,
                    page_count,
                    export_time: start.elapsed(),
                }))
            }
            groups => {
                let documents = try_join_all(groups.iter().map(|group| async {
                    let output = self
                        .assembler
                        .create_document_from(std::slice::from_ref(group), &files, group.name())
                        .await?;
                    let page_count = output.page_count();
                    let bytes = self.writer.to_bytes(output.document, &output.name).await?;
                    Ok::<_, SessionError>((bytes, page_count))
                }))
                .await?;

                let names = unique_entry_names(groups.iter().map(PageGroup::name));
                let page_count: usize = documents.iter().map(|(_, pages)| pages).sum();
                let entries = names
                    .into_iter()
                    .zip(documents)
                    .map(|(name, (bytes, _))| NamedBuffer::new(name, bytes))
                    .collect();

                let bytes = self.packager.package(entries).await?;
                let file_name = archive_name(&document_name);

                info!(
                    file = %file_name,
                    documents = groups.len(),
                    pages = page_count,
                    size = bytes.len(),
                    "exported archive"
                );
                Ok(Some(ExportArtifact {
                    file_name,
                    bytes,
                    kind: ArtifactKind::Zip,
                    page_count,
                    export_time: start.elapsed(),
                }))
            }
        }
    }
}

fn single_entry_name(name: &str) -> String {
    unique_entry_names([name]).remove(0)
}

fn archive_name(document_name: &str) -> String {
    let pdf_name = single_entry_name(document_name);
    let stem = pdf_name.strip_suffix(".pdf").unwrap_or(&pdf_name);
    format!("{stem}.zip")
}
