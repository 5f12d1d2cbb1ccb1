//! Workspace file enumeration.

use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Directory names never descended into, by either engine.
pub(crate) const IGNORED_DIRS: &[&str] = &["node_modules", "dist", "dist-newstyle", "target", "build"];

/// Compiled file-name allow-list.
#[derive(Debug, Clone)]
pub struct GlobFilter {
    patterns: Vec<Pattern>,
}

impl GlobFilter {
    /// Compile `globs`; invalid globs are logged and skipped.
    pub fn new(globs: &[String]) -> Self {
        let patterns = globs
            .iter()
            .filter_map(|g| match Pattern::new(g) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!(glob = %g, error = %e, "Ignoring invalid file glob");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    /// A file is allowed when its name or its root-relative path matches.
    pub fn matches(&self, relative: &Path) -> bool {
        let name = relative
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        self.patterns
            .iter()
            .any(|p| p.matches(&name) || p.matches_path(relative))
    }
}

fn is_ignored(name: &str) -> bool {
    name.starts_with('.') || IGNORED_DIRS.contains(&name)
}

/// List files under `root` allowed by `filter`, in path order.
///
/// Blocking; callers on the async runtime go through `spawn_blocking`.
pub fn list_files(root: &Path, filter: &GlobFilter) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_ignored(&e.file_name().to_string_lossy()));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable workspace entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if filter.matches(relative) {
            files.push(path.to_path_buf());
        }
    }

    files
}

/// Read a file for searching, skipping oversized and non-UTF-8 files.
pub fn read_source(path: &Path, max_file_size: usize) -> Option<String> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() as usize > max_file_size => {
            debug!(path = %path.display(), size = meta.len(), "Skipping oversized file");
            return None;
        }
        Ok(_) => {}
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Skipping unreadable file");
            return None;
        }
    }

    match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Skipping file that is not valid UTF-8");
            None
        }
    }
}

/// Canonical form used to compare a buffer's file with search results.
///
/// Paths that cannot be resolved (deleted, unsaved) compare as given.
pub fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
