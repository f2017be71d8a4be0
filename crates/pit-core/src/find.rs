use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// True when `dir` holds any of the marker names that give away a project.
pub fn contains_snitch(dir: &Path, snitches: &[String]) -> bool {
    snitches.iter().any(|name| dir.join(name).exists())
}

/// Lazily walks `root` and yields every directory that a snitch marks as a
/// project. Discovered projects are not descended into, so nested checkouts
/// inside a project do not show up twice. Read-only: the index is not
/// touched.
pub fn find_projects(root: &Path, snitches: &[String]) -> impl Iterator<Item = PathBuf> {
    let prune = snitches.to_vec();
    let markers = snitches.to_vec();
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| {
            if !entry.file_type().is_dir() {
                return false;
            }
            if entry.depth() == 0 {
                return true;
            }
            match entry.path().parent() {
                // Stop below a directory that is itself a project.
                Some(parent) => !contains_snitch(parent, &prune),
                None => true,
            }
        })
        .filter_map(|entry| entry.ok())
        .filter(move |entry| contains_snitch(entry.path(), &markers))
        .map(|entry| entry.into_path())
}
