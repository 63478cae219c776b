//! Repository discovery: find checkout roots under the configured paths.
//!
//! A directory is a repository root when any of its immediate child
//! directories carries the `.git` metadata marker in its name. The walk
//! stops descending at a found root, so repositories nested below another
//! checkout are deliberately not discovered here; submodules are reached
//! later through `.gitmodules`. Metadata directories themselves are never
//! entered.

use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use walkdir::WalkDir;

use crate::config::Config;

/// The metadata marker looked for in child directory names.
const METADATA_MARKER: &str = ".git";

/// Discover repository roots under every configured root, deduplicated in
/// first-seen order and filtered against the ignore list.
pub fn discover(config: &Config) -> Vec<PathBuf> {
    let mut found = IndexSet::new();
    for root in &config.roots {
        walk_root(root, &mut found);
    }
    reject_ignored(found.into_iter().collect(), &config.ignores)
}

/// Walk one root, collecting repository roots.
///
/// Unreadable directories are logged and skipped; a missing root is
/// reported the same way and does not abort the other roots.
fn walk_root(root: &Path, found: &mut IndexSet<PathBuf>) {
    log::info!("scanning {}", root.display());

    let mut walker = WalkDir::new(root).into_iter();
    loop {
        let entry = match walker.next() {
            None => break,
            Some(Ok(entry)) => entry,
            Some(Err(err)) => {
                log::warn!("skipping unreadable path: {err}");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        if entry
            .file_name()
            .to_string_lossy()
            .contains(METADATA_MARKER)
        {
            // Never descend into metadata directories.
            walker.skip_current_dir();
            continue;
        }
        if is_repo_root(entry.path()) {
            found.insert(entry.path().to_path_buf());
            walker.skip_current_dir();
        }
    }
}

/// A directory is a repository root when an immediate child directory name
/// contains the metadata marker.
fn is_repo_root(dir: &Path) -> bool {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            log::warn!("skipping unreadable directory {}: {err}", dir.display());
            return false;
        }
    };
    entries.flatten().any(|child| {
        child.file_type().is_ok_and(|kind| kind.is_dir())
            && child.file_name().to_string_lossy().contains(METADATA_MARKER)
    })
}

/// Drop every path containing any ignore entry as a substring. Each path is
/// tested independently against each entry.
fn reject_ignored(paths: Vec<PathBuf>, ignores: &[String]) -> Vec<PathBuf> {
    if ignores.is_empty() {
        return paths;
    }
    paths
        .into_iter()
        .filter(|path| {
            let rendered = path.display().to_string();
            let ignored = ignores.iter().any(|entry| rendered.contains(entry));
            if ignored {
                log::info!("ignoring {rendered}");
            }
            !ignored
        })
        .collect()
}
