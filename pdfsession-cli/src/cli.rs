//! Command-line interface definition.
//!
//! Parsing is done with `clap`; [`Cli::to_config`] turns the parsed flags
//! into a [`SessionConfig`], layered over an optional JSON config file.

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::str::FromStr;

use pdfsession::{CompressionLevel, MissingFilePolicy, SessionConfig};

/// Assemble PDF documents from pages of several source files.
///
/// Every input file becomes one page group and every group becomes one
/// output document. Several groups are delivered as a ZIP archive. Source
/// files are never modified.
#[derive(Parser, Debug)]
#[command(name = "pdfsession")]
#[command(version)]
#[command(about = "Assemble PDF documents from pages of several source files", long_about = None)]
#[command(author)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Input PDF files or glob patterns
    ///
    /// Files are loaded in the order given; a glob expands to its matches
    /// in path order. Input positions are what --layout refers to.
    ///
    /// Examples:
    ///   pdfsession a.pdf b.pdf --merge
    ///   pdfsession 'scans/*.pdf' -o out/
    #[arg(required = true, value_name = "FILE|GLOB")]
    pub inputs: Vec<String>,

    /// Directory the exported PDF or ZIP archive is written to
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Document name of the first group
    ///
    /// With a single output document this is the PDF file name, with
    /// several it names the archive.
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Put all pages of all files into a single group
    #[arg(long, conflicts_with = "layout")]
    pub merge: bool,

    /// JSON file describing the page groups to export
    ///
    /// Format: [{"name": "part 1", "pages": [{"file": 0, "page": 2}]}]
    /// where `file` is the input position and `page` is zero-based.
    #[arg(long, value_name = "JSON")]
    pub layout: Option<PathBuf>,

    /// Compression level for output documents
    ///
    /// - none: write streams as copied
    /// - standard: compress uncompressed streams
    /// - maximum: compress and drop unreferenced objects
    #[arg(long, value_name = "LEVEL", value_parser = ["none", "standard", "maximum"])]
    pub compression: Option<String>,

    /// What to do with pages whose source file could not be used
    #[arg(long, value_name = "POLICY", value_parser = ["skip", "fail"])]
    pub missing_files: Option<String>,

    /// JSON configuration file; flags override its values
    #[arg(long, value_name = "JSON", env = "PDFSESSION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Render every page through the preview cache and print its size
    #[arg(long)]
    pub preview: bool,

    /// Number of files parsed concurrently (default: CPU count)
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Overwrite an existing output file
    #[arg(short, long)]
    pub force: bool,
}

impl Cli {
    /// Build the session configuration.
    ///
    /// Values come from `--config` when given, then flags override them.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or the resulting
    /// configuration is invalid.
    pub fn to_config(&self) -> Result<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::from_json_file(path)?,
            None => SessionConfig::default(),
        };

        if let Some(level) = &self.compression {
            config.compression = CompressionLevel::from_str(level)?;
        }

        if let Some(policy) = &self.missing_files {
            config.missing_file_policy = MissingFilePolicy::from_str(policy)?;
        }

        if self.jobs.is_some() {
            config.load_jobs = self.jobs;
        }

        config
            .validate()
            .context("Configuration validation failed")?;

        Ok(config)
    }

    /// Validate arguments that need no file access.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty input list, a zero job count or a
    /// blank document name.
    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            bail!("No input files specified");
        }

        if self.jobs == Some(0) {
            bail!("Number of jobs must be at least 1");
        }

        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            bail!("Document name cannot be empty");
        }

        Ok(())
    }

    /// Default log filter for the chosen verbosity.
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "pdfsession=info,warn",
            1 => "pdfsession=debug,info",
            _ => "trace",
        }
    }
}
