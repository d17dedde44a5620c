//! Multi-document YAML handling and manifest file discovery

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use walkdir::WalkDir;

use crate::error::{CoreError, Result};

static DOCUMENT_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^---\n").expect("document separator regex is valid"));

/// Split a YAML stream on `---` lines, dropping empty documents
pub fn split_documents(data: &str) -> Vec<&str> {
    DOCUMENT_SEPARATOR
        .split(data)
        .filter(|doc| !doc.is_empty())
        .collect()
}

/// A document holding nothing but whitespace and comments
pub fn is_empty_document(doc: &str) -> bool {
    doc.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#'))
}

/// Expand files and directories into the list of manifests to process
///
/// Files are taken as given. Directories are walked recursively in sorted
/// order and only `.yaml`/`.yml` files are kept. A path that does not exist
/// fails the whole discovery before anything is read.
pub fn discover_manifest_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        let metadata = std::fs::metadata(path).map_err(|error| CoreError::Io {
            path: path.clone(),
            error,
        })?;

        if metadata.is_dir() {
            files.extend(list_yaml_files(path)?);
        } else {
            files.push(path.clone());
        }
    }

    Ok(files)
}

fn list_yaml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|error| CoreError::Walk {
            path: dir.to_path_buf(),
            error,
        })?;

        if entry.file_type().is_dir() {
            continue;
        }

        let is_yaml = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "yaml" || ext == "yml");

        if is_yaml {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}
