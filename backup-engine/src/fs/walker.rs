//! Directory traversal for backup runs.
//!
//! Collects every regular file under a data directory together with the
//! size and modification time used to key differential objects.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::{DirEntry, WalkDir};

/// Options for directory walking
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Follow symbolic links
    pub follow_links: bool,

    /// Entry names to skip (substring match)
    pub exclude_patterns: Vec<String>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            follow_links: false,
            exclude_patterns: vec![".DS_Store".to_string()],
        }
    }
}

/// A file discovered during walking
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Full path to the file
    pub path: PathBuf,

    /// Path relative to the walk root
    pub relative_path: PathBuf,

    /// File size in bytes
    pub size: u64,

    /// Last modification, seconds since the Unix epoch
    pub mtime: i64,
}

impl FileInfo {
    /// Returns None for symlinks that are broken or point at directories.
    fn from_entry(entry: &DirEntry, root: &Path) -> std::io::Result<Option<Self>> {
        let path = entry.path().to_path_buf();
        let metadata = if entry.path_is_symlink() {
            match std::fs::metadata(&path) {
                Ok(resolved) if resolved.is_file() => resolved,
                _ => return Ok(None),
            }
        } else {
            entry.metadata()?
        };

        let mtime = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let relative_path = path.strip_prefix(root).unwrap_or(&path).to_path_buf();

        Ok(Some(Self {
            path,
            relative_path,
            size: metadata.len(),
            mtime,
        }))
    }
}

/// Walk a directory tree and collect all files, sorted by relative path.
pub fn walk_directory(root: &Path, options: &WalkOptions) -> crate::Result<Vec<FileInfo>> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(options.follow_links)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry?;

        if should_exclude(&entry, &options.exclude_patterns) {
            continue;
        }

        if entry.file_type().is_dir() {
            continue;
        }

        if let Some(file_info) = FileInfo::from_entry(&entry, root)? {
            files.push(file_info);
        }
    }

    Ok(files)
}

fn should_exclude(entry: &DirEntry, patterns: &[String]) -> bool {
    let file_name = entry.file_name().to_string_lossy();
    patterns.iter().any(|p| file_name.contains(p.as_str()))
}
