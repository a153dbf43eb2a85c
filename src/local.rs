use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::{Result, SyncError};

/// A regular file found under the sync root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub path: PathBuf,
    /// Path relative to the sync root
    pub relative: PathBuf,
    pub modified: DateTime<Utc>,
    pub size: u64,
}

// Checked on raw bytes so names that are not valid UTF-8 are covered too
fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().as_encoded_bytes().first() == Some(&b'.')
}

/// List all visible files under a directory recursively
///
/// Hidden directories are pruned before descent, so nothing below them is
/// ever visited. Entries are returned sorted by path.
pub fn list_local_files(root: &Path) -> Result<Vec<LocalFile>> {
    let meta = fs::metadata(root).map_err(|source| SyncError::LocalListing {
        path: root.to_path_buf(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(SyncError::LocalPath {
            path: root.to_path_buf(),
        });
    }

    let mut result = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        let entry = entry.map_err(|e| SyncError::LocalListing {
            path: e.path().unwrap_or(root).to_path_buf(),
            source: e.into(),
        })?;

        let path = entry.path();
        // Symlinks to files count; directories and dangling links do not
        if entry.file_type().is_dir() || !path.is_file() {
            continue;
        }

        let meta = fs::metadata(path).map_err(|source| SyncError::LocalListing {
            path: path.to_path_buf(),
            source,
        })?;
        let modified = meta.modified().map_err(|source| SyncError::LocalListing {
            path: path.to_path_buf(),
            source,
        })?;

        let relative = path
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from(entry.file_name()));

        result.push(LocalFile {
            path: path.to_path_buf(),
            relative,
            modified: DateTime::<Utc>::from(modified),
            size: meta.len(),
        });
    }

    debug!("Walked {} and found {} files", root.display(), result.len());
    Ok(result)
}
