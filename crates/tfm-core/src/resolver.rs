use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;
use tracing::{debug, info, warn};

use crate::engine::{DuplicateGroup, DuplicateSet};
use crate::error::Error;
use crate::ops::FileOperationExecutor;
use crate::progress::{ProgressEvent, ProgressReporter};

/// Which member of a duplicate group survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolutionStrategy {
    KeepNewest,
    KeepOldest,
    KeepLargest,
    KeepSmallest,
    /// Ask a caller-supplied selector for the keep set.
    Interactive,
}

impl FromStr for ConflictResolutionStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "newest" | "keep_newest" => Ok(Self::KeepNewest),
            "oldest" | "keep_oldest" => Ok(Self::KeepOldest),
            "largest" | "keep_largest" => Ok(Self::KeepLargest),
            "smallest" | "keep_smallest" => Ok(Self::KeepSmallest),
            "interactive" => Ok(Self::Interactive),
            other => Err(Error::InvalidArgument(format!(
                "Unknown resolution strategy: {}",
                other
            ))),
        }
    }
}

/// Receives a group's members and returns the paths to keep.
pub type KeepSelector<'s> = dyn FnMut(&[PathBuf]) -> Vec<PathBuf> + 's;

/// Turns duplicate groups into deletions through a [`FileOperationExecutor`].
pub struct ConflictResolver<'a> {
    executor: &'a dyn FileOperationExecutor,
    dry_run: bool,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(executor: &'a dyn FileOperationExecutor) -> Self {
        Self {
            executor,
            dry_run: false,
        }
    }

    /// Compute deletions without performing them.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Resolve every group and return the paths deleted (or, in a dry run, the
    /// paths that would be). Failed deletions are logged and left out.
    pub fn resolve(
        &self,
        groups: &DuplicateSet,
        strategy: ConflictResolutionStrategy,
        mut selector: Option<&mut KeepSelector<'_>>,
        reporter: &dyn ProgressReporter,
    ) -> Vec<PathBuf> {
        let mut deleted = Vec::new();

        for group in groups {
            let doomed = match strategy {
                ConflictResolutionStrategy::Interactive => match selector.as_mut() {
                    Some(select) => interactive_delete_set(group, &mut **select),
                    None => {
                        debug!("No selector for group {}, leaving it untouched", group.hash);
                        Vec::new()
                    }
                },
                _ => match keep_index(group, strategy) {
                    Some(keep) => group
                        .paths
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| *i != keep)
                        .map(|(_, p)| p.clone())
                        .collect(),
                    None => Vec::new(),
                },
            };

            for path in doomed {
                if self.dry_run {
                    reporter.on_event(&ProgressEvent::Processed(path.clone()));
                    deleted.push(path);
                    continue;
                }
                match self.executor.delete(&path) {
                    Ok(()) => {
                        reporter.on_event(&ProgressEvent::Processed(path.clone()));
                        deleted.push(path);
                    }
                    Err(e) => warn!("Failed to delete duplicate {}: {}", path.display(), e),
                }
            }
        }

        info!(
            "{} {} duplicate files",
            if self.dry_run { "Would delete" } else { "Deleted" },
            deleted.len()
        );
        deleted
    }
}

/// Index of the member to keep. The first member wins ties. Returns None when
/// any member cannot be stat'ed.
fn keep_index(group: &DuplicateGroup, strategy: ConflictResolutionStrategy) -> Option<usize> {
    let mut stats: Vec<(SystemTime, u64)> = Vec::with_capacity(group.paths.len());
    for path in &group.paths {
        match stat(path) {
            Ok(s) => stats.push(s),
            Err(e) => {
                warn!(
                    "Skipping duplicate group {}: cannot stat {}: {}",
                    group.hash,
                    path.display(),
                    e
                );
                return None;
            }
        }
    }

    let mut best = 0;
    for (i, candidate) in stats.iter().enumerate().skip(1) {
        let current = &stats[best];
        let better = match strategy {
            ConflictResolutionStrategy::KeepNewest => candidate.0 > current.0,
            ConflictResolutionStrategy::KeepOldest => candidate.0 < current.0,
            ConflictResolutionStrategy::KeepLargest => candidate.1 > current.1,
            ConflictResolutionStrategy::KeepSmallest => candidate.1 < current.1,
            ConflictResolutionStrategy::Interactive => false,
        };
        if better {
            best = i;
        }
    }
    Some(best)
}

fn interactive_delete_set(group: &DuplicateGroup, select: &mut KeepSelector<'_>) -> Vec<PathBuf> {
    let keep: Vec<PathBuf> = select(&group.paths)
        .into_iter()
        .filter(|p| group.paths.contains(p))
        .collect();
    if keep.is_empty() {
        debug!("Empty keep set for group {}, leaving it untouched", group.hash);
        return Vec::new();
    }
    group
        .paths
        .iter()
        .filter(|p| !keep.contains(p))
        .cloned()
        .collect()
}

fn stat(path: &Path) -> std::io::Result<(SystemTime, u64)> {
    let metadata = fs::metadata(path)?;
    Ok((metadata.modified()?, metadata.len()))
}
