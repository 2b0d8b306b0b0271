//! pdfsession - Assemble PDF documents from pages of several source files.
//!
//! Loads the inputs into a session, arranges their pages into groups and
//! writes the export into the output directory.

mod cli;
mod inputs;
mod layout;

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::process;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;
use crate::layout::Layout;
use pdfsession::export::writer::{format_file_size, write_atomic};
use pdfsession::{ArtifactKind, FileId, Session, SessionError};

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| cli.log_filter().into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Run the application and handle errors
    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        process::exit(exit_code(&err));
    }
}

/// Main application logic.
async fn run(cli: Cli) -> Result<()> {
    cli.validate()?;
    let config = cli.to_config()?;

    let paths = inputs::expand_inputs(&cli.inputs)?;
    let sources = inputs::read_sources(&paths).await?;

    // Read the layout before loading so a broken file fails fast
    let layout = match &cli.layout {
        Some(path) => {
            let layout = Layout::read(path).await?;
            layout.validate(sources.len())?;
            Some(layout)
        }
        None => None,
    };

    let mut session = Session::new(config);
    let results = session.add_files(sources).await;

    let mut file_ids: Vec<Option<FileId>> = Vec::with_capacity(results.len());
    for (path, result) in paths.iter().zip(results) {
        match result {
            Ok(file_id) => file_ids.push(Some(file_id)),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "input skipped");
                if !cli.quiet {
                    eprintln!("Skipping {}: {err}", path.display());
                }
                file_ids.push(None);
            }
        }
    }

    if file_ids.iter().all(Option::is_none) {
        bail!("None of the input files could be loaded");
    }

    if let Some(layout) = &layout {
        let groups = layout.resolve(&session, &file_ids)?;
        session.replace_groups(groups)?;
    } else if cli.merge && !session.groups().is_empty() {
        let all: Vec<usize> = (0..session.groups().len()).collect();
        let name = session.document_name();
        session.merge_groups(&all, name)?;
    }

    if let Some(name) = &cli.name
        && !session.groups().is_empty()
    {
        session.rename_group(0, name.as_str())?;
    }

    if cli.preview {
        preview(&session, cli.quiet).await?;
    }

    let Some(artifact) = session.export().await? else {
        if !cli.quiet {
            println!("Nothing to export: the session has no page groups");
        }
        return Ok(());
    };

    let output = cli.output_dir.join(&artifact.file_name);
    if output.exists() && !cli.force {
        bail!(
            "Output file already exists: {} (use --force to overwrite)",
            output.display()
        );
    }

    tokio::fs::create_dir_all(&cli.output_dir)
        .await
        .with_context(|| format!("Failed to create {}", cli.output_dir.display()))?;

    let size = write_atomic(&output, artifact.bytes).await?;
    info!(
        path = %output.display(),
        pages = artifact.page_count,
        elapsed_ms = artifact.export_time.as_millis() as u64,
        "export written"
    );

    if !cli.quiet {
        let kind = match artifact.kind {
            ArtifactKind::Pdf => "PDF",
            ArtifactKind::Zip => "ZIP archive",
        };
        println!(
            "Created {kind} {} ({} pages, {})",
            output.display(),
            artifact.page_count,
            format_file_size(size)
        );
    }

    Ok(())
}

/// Render every placed page through the preview cache and print its size.
async fn preview(session: &Session, quiet: bool) -> Result<()> {
    for group in session.groups() {
        if !quiet {
            println!("{} ({} pages)", group.name(), group.len());
        }
        for (position, page) in group.pages().iter().enumerate() {
            let page_ref = page.page_ref();
            let rendered = session.render_cache().page(page_ref).await?;
            let file_name = session
                .files()
                .get(page_ref.file_id())
                .map(|file| file.name().to_string())
                .unwrap_or_default();

            if !quiet {
                println!(
                    "  {:>3}. {file_name} p{}: {:.0} x {:.0} pt{}",
                    position + 1,
                    page_ref.page_index() + 1,
                    rendered.width,
                    rendered.height,
                    if rendered.rotation == 0 {
                        String::new()
                    } else {
                        format!(", rotated {}°", rendered.rotation)
                    }
                );
            }
        }
    }
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<SessionError>()
        .map(SessionError::exit_code)
        .unwrap_or(1)
}
