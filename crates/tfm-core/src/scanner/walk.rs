use glob::Pattern;
use std::fs;
use std::path::Path;
use tracing::{debug, error};
use walkdir::WalkDir;

use super::DirectoryEntry;
use crate::error::Error;

/// Compile glob ignore patterns, dropping (and logging) invalid ones.
pub fn compile_ignore_patterns(globs: &[String]) -> Vec<Pattern> {
    globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect()
}

/// Walk `root` and yield every regular file as a [`DirectoryEntry`] in
/// directory-iteration order. Top level only unless `recursive`.
///
/// Symlinks are not followed and not yielded. Unreadable directories and
/// entries whose metadata cannot be read are skipped. Paths matching an ignore
/// pattern are pruned, including whole directories.
pub fn walk_files<'a>(
    root: &Path,
    recursive: bool,
    ignore_patterns: &'a [Pattern],
) -> Result<impl Iterator<Item = DirectoryEntry> + 'a, Error> {
    let root = fs::canonicalize(root).map_err(|e| Error::from_io(e, root))?;
    if !root.is_dir() {
        return Err(Error::InvalidArgument(format!(
            "Not a directory: {}",
            root.display()
        )));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let walker = WalkDir::new(&root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .into_iter()
        .filter_entry(move |entry| {
            !ignore_patterns
                .iter()
                .any(|pattern| pattern.matches_path(entry.path()))
        });

    Ok(walker.filter_map(|entry_result| {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(err) => {
                debug!("Skipping unreadable entry: {}", err);
                return None;
            }
        };

        if !entry.file_type().is_file() {
            return None;
        }

        match entry.metadata() {
            Ok(metadata) => Some(DirectoryEntry::from_metadata(entry.into_path(), &metadata)),
            Err(err) => {
                debug!("Error getting metadata for {}: {}", entry.path().display(), err);
                None
            }
        }
    }))
}
