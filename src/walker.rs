use std::{
    path::{Path, PathBuf},
    time::SystemTime,
};

use crate::error::Result;

/// A discovered source document.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Path relative to the corpus root directory.
    pub relative_path: PathBuf,
    /// Fully resolved absolute path.
    pub absolute_path: PathBuf,
    /// Last modification time as seconds since the Unix epoch.
    pub mtime: u64,
    /// File size in bytes.
    pub size: u64,
}

impl SourceDocument {
    /// Stable document identifier derived from the relative path.
    ///
    /// The extension is stripped and path separators are normalized to `/`,
    /// so the identifier is unique within a corpus and readable in results.
    pub fn document_id(&self) -> String {
        let without_ext = self.relative_path.with_extension("");
        without_ext
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Supported file extensions for document discovery.
const SUPPORTED_EXTENSIONS: &[&str] = &["md", "txt"];

/// Recursively walk a directory and discover source documents.
///
/// Skips hidden files/directories (names starting with `.`) and only
/// returns files with supported extensions (.md, .txt). Results are
/// sorted by relative path so document order is deterministic.
pub fn discover_documents(root: &Path) -> Result<Vec<SourceDocument>> {
    let canonical_root = root.canonicalize()?;
    let mut results = Vec::new();
    walk_dir(&canonical_root, &canonical_root, &mut results)?;
    results.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(results)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    results: &mut Vec<SourceDocument>,
) -> Result<()> {
    let entries = std::fs::read_dir(current)?;

    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();

        // Skip hidden files and directories.
        if name.starts_with('.') {
            continue;
        }

        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            walk_dir(root, &entry.path(), results)?;
        } else if file_type.is_symlink() {
            let resolved = match entry.path().canonicalize() {
                Ok(p) => p,
                Err(_) => continue, // Skip broken symlinks
            };
            // Skip if the symlink points back into or above the root
            // (cycle prevention).
            if resolved.starts_with(root) && resolved.is_dir() {
                continue;
            }
            if resolved.is_file() && is_supported(&resolved) {
                results.push(make_document(root, &entry.path(), &resolved)?);
            }
        } else if file_type.is_file() && is_supported(&entry.path()) {
            let abs = entry.path().canonicalize()?;
            results.push(make_document(root, &entry.path(), &abs)?);
        }
    }

    Ok(())
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext))
}

fn make_document(
    root: &Path,
    original_path: &Path,
    absolute_path: &Path,
) -> Result<SourceDocument> {
    let relative_path = original_path
        .strip_prefix(root)
        .unwrap_or(original_path)
        .to_path_buf();

    let metadata = std::fs::metadata(absolute_path)?;
    let mtime = metadata
        .modified()
        .unwrap_or(SystemTime::UNIX_EPOCH)
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    Ok(SourceDocument {
        relative_path,
        absolute_path: absolute_path.to_path_buf(),
        mtime,
        size: metadata.len(),
    })
}
