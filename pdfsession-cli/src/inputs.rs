//! Input collection: glob expansion and reading files into memory.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

use pdfsession::SourceFile;

/// Expand the input arguments into paths, keeping argument order.
///
/// Arguments without glob metacharacters are taken literally so that a
/// missing file is reported when it is read. A pattern that matches nothing
/// is an error.
pub fn expand_inputs<T>(inputs: T) -> Result<Vec<PathBuf>>
where
    T: IntoIterator,
    T::Item: AsRef<str>,
{
    let mut paths = Vec::new();

    for input in inputs {
        let input = input.as_ref();
        if !is_pattern(input) {
            paths.push(PathBuf::from(input));
            continue;
        }

        let matches = glob::glob(input)
            .with_context(|| format!("Invalid glob pattern: {input}"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to expand glob pattern: {input}"))?;

        if matches.is_empty() {
            bail!("No files match pattern: {input}");
        }
        paths.extend(matches);
    }

    Ok(paths)
}

/// Read every path into a [`SourceFile`] named after its file name.
pub async fn read_sources(paths: &[PathBuf]) -> Result<Vec<SourceFile>> {
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read input file: {}", path.display()))?;
        sources.push(SourceFile::new(display_name(path), bytes));
    }
    Ok(sources)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn is_pattern(input: &str) -> bool {
    input.contains(['*', '?', '['])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"%PDF-1.5").unwrap();
        path
    }

    #[test]
    fn test_literal_paths_are_kept() {
        let paths = expand_inputs(["missing.pdf", "b.pdf"]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("missing.pdf"), PathBuf::from("b.pdf")]);
    }

    #[test]
    fn test_glob_expands_in_path_order() {
        let dir = TempDir::new().unwrap();
        let b = touch(&dir, "b.pdf");
        let a = touch(&dir, "a.pdf");
        touch(&dir, "notes.txt");

        let pattern = format!("{}/*.pdf", dir.path().display());
        let paths = expand_inputs([pattern.as_str(), "z.pdf"]).unwrap();

        assert_eq!(paths, vec![a, b, PathBuf::from("z.pdf")]);
    }

    #[test]
    fn test_glob_without_matches_fails() {
        let dir = TempDir::new().unwrap();
        let pattern = format!("{}/*.pdf", dir.path().display());
        assert!(expand_inputs([pattern]).is_err());
    }

    #[tokio::test]
    async fn test_read_sources_uses_file_names() {
        let dir = TempDir::new().unwrap();
        let path = touch(&dir, "report.pdf");

        let sources = read_sources(&[path]).await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "report.pdf");
    }

    #[tokio::test]
    async fn test_read_sources_missing_file() {
        let result = read_sources(&[PathBuf::from("/nonexistent/file.pdf")]).await;
        assert!(result.is_err());
    }
}
