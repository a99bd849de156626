//! Input file discovery and filename filtering

use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// One file to process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Location on disk
    pub path: PathBuf,
    /// Identity used in the output and the resume state
    pub key: String,
}

impl WorkItem {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }
}

/// Compile an optional filename filter
pub fn compile_pattern(pattern: Option<&str>) -> Result<Option<Regex>> {
    pattern
        .map(|p| {
            Regex::new(p).map_err(|source| Error::InvalidPattern {
                pattern: p.to_string(),
                source,
            })
        })
        .transpose()
}

/// List the PDF files under `dir`, sorted by key.
///
/// Only the top level is listed unless `recursive` is set. When a filter is
/// given it must match somewhere in the file name.
pub fn discover_files(dir: &Path, recursive: bool, filter: Option<&Regex>) -> Result<Vec<WorkItem>> {
    if !dir.is_dir() {
        return Err(Error::config(format!(
            "input directory does not exist: {}",
            dir.display()
        )));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut items = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(true)
        .into_iter()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable directory entry: {}", e);
                continue;
            }
        };

        let path = entry.path();
        if !entry.file_type().is_file() || !is_pdf(path) {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if let Some(re) = filter {
            if !re.is_match(&name) {
                continue;
            }
        }

        let key = path
            .strip_prefix(dir)
            .map(relative_key)
            .unwrap_or_else(|_| name.into_owned());

        items.push(WorkItem::new(path, key));
    }

    items.sort_by(|a, b| a.key.cmp(&b.key));
    tracing::debug!("Discovered {} PDF files in {}", items.len(), dir.display());
    Ok(items)
}

/// Resolve a single explicitly named file, either a path or a name inside
/// `directory`
pub fn resolve_file(file: &Path, directory: Option<&Path>) -> Result<WorkItem> {
    let path = if file.is_file() {
        file.to_path_buf()
    } else {
        match directory.map(|dir| dir.join(file)) {
            Some(candidate) if candidate.is_file() => candidate,
            _ => {
                return Err(Error::config(format!(
                    "input file does not exist: {}",
                    file.display()
                )))
            }
        }
    };

    let key = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::config(format!("not a file: {}", path.display())))?;

    Ok(WorkItem::new(path, key))
}

/// Drop items whose key was already seen, keeping the first
pub fn dedupe(items: Vec<WorkItem>) -> Vec<WorkItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            let fresh = seen.insert(item.key.clone());
            if !fresh {
                tracing::warn!("Duplicate input '{}' will be processed once", item.key);
            }
            fresh
        })
        .collect()
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Relative path with `/` separators on every platform
fn relative_key(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
