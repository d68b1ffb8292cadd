use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::config::CategoryTable;
use crate::error::Error;
use crate::naming;
use crate::ops::{self, FileOperationExecutor};
use crate::plugins::PluginRegistry;
use crate::progress::{ProgressEvent, ProgressReporter, SilentReporter};
use crate::safety::{self, Containment};
use crate::scanner::{self, DirectoryEntry};

const SECONDS_PER_DAY: u64 = 86_400;

/// What happened to one source entry during an organize call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Copied or moved (or, in a dry run, would be) to this path.
    Transferred(PathBuf),
    /// The destination resolved outside the target directory.
    SkippedTraversal,
    /// No category or date key applies.
    SkippedUncategorized,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryReport {
    pub source: PathBuf,
    pub outcome: EntryOutcome,
}

/// Destination paths written by an organize call, grouped by key (category name
/// or formatted date), plus a per-entry outcome log.
#[derive(Debug, Clone, Default)]
pub struct OrganizationResult {
    placed: BTreeMap<String, Vec<PathBuf>>,
    entries: Vec<EntryReport>,
}

impl OrganizationResult {
    pub fn get(&self, key: &str) -> Option<&[PathBuf]> {
        self.placed.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.placed.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[PathBuf])> {
        self.placed.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn entries(&self) -> &[EntryReport] {
        &self.entries
    }

    pub fn total_placed(&self) -> usize {
        self.placed.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.placed.is_empty()
    }

    fn record(&mut self, source: PathBuf, outcome: EntryOutcome) {
        self.entries.push(EntryReport { source, outcome });
    }

    fn place(&mut self, key: String, source: PathBuf, destination: PathBuf) {
        self.placed.entry(key).or_default().push(destination.clone());
        self.record(source, EntryOutcome::Transferred(destination));
    }
}

/// Type and date based organization, age-based cleanup and batch rename.
///
/// All side effects go through the executor. Per-entry failures are logged and
/// left out of the result; only a missing source or a bad argument fails the
/// whole call, and always before anything is touched.
pub struct FileOrganizer<'a> {
    executor: &'a dyn FileOperationExecutor,
    plugins: Arc<PluginRegistry>,
    reporter: &'a dyn ProgressReporter,
    dry_run: bool,
}

impl<'a> FileOrganizer<'a> {
    pub fn new(executor: &'a dyn FileOperationExecutor) -> Self {
        Self {
            executor,
            plugins: Arc::new(PluginRegistry::new()),
            reporter: &SilentReporter,
            dry_run: false,
        }
    }

    pub fn with_plugins(mut self, plugins: Arc<PluginRegistry>) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn with_reporter(mut self, reporter: &'a dyn ProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Compute results without touching the filesystem.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// File each immediate regular file of `source` under `target/<category>/`.
    /// Files whose extension is in no category stay where they are.
    pub fn organize_by_type(
        &self,
        source: &Path,
        target: &Path,
        categories: &CategoryTable,
        move_files: bool,
    ) -> Result<OrganizationResult, Error> {
        info!(
            "Organizing {} by type into {}",
            source.display(),
            target.display()
        );
        self.organize_with(source, target, move_files, |entry| {
            categories.category_for(&entry.path).map(str::to_string)
        })
    }

    /// File each immediate regular file of `source` under `target/<date>/`, the
    /// date being its local mtime rendered with the strftime `date_format`.
    pub fn organize_by_date(
        &self,
        source: &Path,
        target: &Path,
        date_format: &str,
        move_files: bool,
    ) -> Result<OrganizationResult, Error> {
        let items = parse_date_format(date_format)?;
        info!(
            "Organizing {} by date ({}) into {}",
            source.display(),
            date_format,
            target.display()
        );
        self.organize_with(source, target, move_files, |entry| {
            let modified: DateTime<Local> = entry.modified.into();
            let mut key = String::new();
            match write!(key, "{}", modified.format_with_items(items.iter())) {
                Ok(()) => Some(key),
                Err(_) => {
                    debug!("Cannot format date for {}", entry.path.display());
                    None
                }
            }
        })
    }

    fn organize_with<F>(
        &self,
        source: &Path,
        target: &Path,
        move_files: bool,
        mut key_for: F,
    ) -> Result<OrganizationResult, Error>
    where
        F: FnMut(&DirectoryEntry) -> Option<String>,
    {
        let files = list_files(source, false)?;
        if !self.dry_run {
            self.executor.create_dir(target)?;
        }

        let mut result = OrganizationResult::default();
        let mut reserved: HashSet<PathBuf> = HashSet::new();

        for entry in files {
            let Some(key) = key_for(&entry).filter(|k| !k.is_empty()) else {
                debug!("No key for {}, leaving it in place", entry.path.display());
                result.record(entry.path, EntryOutcome::SkippedUncategorized);
                continue;
            };
            let Some(file_name) = entry.path.file_name().map(|n| n.to_string_lossy().into_owned())
            else {
                continue;
            };

            let dest_dir = match self.contain(target, Path::new(&key)) {
                Containment::Within(dir) => dir,
                Containment::Rejected => {
                    warn!(
                        "Skipping {}: destination '{}' escapes {}",
                        entry.path.display(),
                        key,
                        target.display()
                    );
                    result.record(entry.path, EntryOutcome::SkippedTraversal);
                    continue;
                }
            };

            let destination = naming::next_available_name_reserved(&dest_dir, &file_name, &reserved);

            if self.dry_run {
                reserved.insert(destination.clone());
            } else if let Err(e) = self.transfer(&entry.path, &dest_dir, &destination, move_files) {
                warn!(
                    "Failed to {} {} -> {}: {}",
                    if move_files { "move" } else { "copy" },
                    entry.path.display(),
                    destination.display(),
                    e
                );
                result.record(entry.path, EntryOutcome::Failed(e.to_string()));
                continue;
            } else {
                self.plugins.on_organize(&entry.path, &destination);
            }

            self.reporter
                .on_event(&ProgressEvent::Processed(destination.clone()));
            result.place(key, entry.path, destination);
        }

        info!(
            "{} {} files into {} groups",
            if self.dry_run { "Would organize" } else { "Organized" },
            result.total_placed(),
            result.placed.len()
        );
        Ok(result)
    }

    fn transfer(
        &self,
        source: &Path,
        dest_dir: &Path,
        destination: &Path,
        move_files: bool,
    ) -> Result<(), Error> {
        self.executor.create_dir(dest_dir)?;
        if move_files {
            self.executor.move_file(source, destination)
        } else {
            self.executor.copy(source, destination)
        }
    }

    fn contain(&self, root: &Path, candidate: &Path) -> Containment {
        if self.dry_run {
            safety::resolve_within_planned(root, candidate)
        } else {
            safety::resolve_within(root, candidate)
        }
    }

    /// Delete files whose mtime is more than `days_old` days in the past.
    /// Returns the deleted paths (in a dry run, the paths that qualify).
    pub fn cleanup_old_files(
        &self,
        directory: &Path,
        days_old: u64,
        recursive: bool,
    ) -> Result<Vec<PathBuf>, Error> {
        let age = Duration::from_secs(days_old.saturating_mul(SECONDS_PER_DAY));
        let cutoff = SystemTime::now().checked_sub(age).unwrap_or(UNIX_EPOCH);
        let files = list_files(directory, recursive)?;

        let mut removed = Vec::new();
        for entry in files.into_iter().filter(|e| e.modified < cutoff) {
            if !self.dry_run {
                if let Err(e) = self.executor.delete(&entry.path) {
                    warn!("Failed to delete {}: {}", entry.path.display(), e);
                    continue;
                }
            }
            self.reporter
                .on_event(&ProgressEvent::Processed(entry.path.clone()));
            removed.push(entry.path);
        }

        info!(
            "{} {} files older than {} days in {}",
            if self.dry_run { "Found" } else { "Removed" },
            removed.len(),
            days_old,
            directory.display()
        );
        Ok(removed)
    }

    /// Replace every occurrence of `pattern` in file names with `replacement`.
    /// Returns the new paths. A file whose new name already exists is skipped.
    pub fn batch_rename(
        &self,
        directory: &Path,
        pattern: &str,
        replacement: &str,
        recursive: bool,
    ) -> Result<Vec<PathBuf>, Error> {
        if pattern.is_empty() {
            return Err(Error::InvalidArgument(
                "Rename pattern cannot be empty".to_string(),
            ));
        }
        let files = list_files(directory, recursive)?;

        let mut renamed = Vec::new();
        let mut reserved: HashSet<PathBuf> = HashSet::new();
        for entry in files {
            let Some(name) = entry.path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.contains(pattern) {
                continue;
            }
            let new_name = name.replace(pattern, replacement);
            if new_name == name {
                continue;
            }
            if !ops::is_plain_file_name(&new_name) {
                warn!(
                    "Skipping {}: '{}' is not a plain file name",
                    entry.path.display(),
                    new_name
                );
                continue;
            }

            let parent = entry.path.parent().unwrap_or(directory);
            let destination = match safety::resolve_within(directory, &parent.join(&new_name)) {
                Containment::Within(p) => p,
                Containment::Rejected => {
                    warn!("Skipping {}: rename escapes {}", entry.path.display(), directory.display());
                    continue;
                }
            };
            if reserved.contains(&destination) || destination.symlink_metadata().is_ok() {
                warn!(
                    "Skipping {}: {} already exists",
                    entry.path.display(),
                    destination.display()
                );
                continue;
            }

            if self.dry_run {
                reserved.insert(destination.clone());
            } else {
                match self.executor.rename(&entry.path, &new_name) {
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Failed to rename {}: {}", entry.path.display(), e);
                        continue;
                    }
                }
            }
            self.reporter
                .on_event(&ProgressEvent::Processed(destination.clone()));
            renamed.push(destination);
        }

        info!(
            "{} {} files in {}",
            if self.dry_run { "Would rename" } else { "Renamed" },
            renamed.len(),
            directory.display()
        );
        Ok(renamed)
    }
}

/// Regular files under `directory`, sorted by path. Collected up front so the
/// listing is not disturbed by the changes made while processing it.
fn list_files(directory: &Path, recursive: bool) -> Result<Vec<DirectoryEntry>, Error> {
    let mut files: Vec<DirectoryEntry> = scanner::walk_files(directory, recursive, &[])?.collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn parse_date_format(date_format: &str) -> Result<Vec<Item<'_>>, Error> {
    let items: Vec<Item<'_>> = StrftimeItems::new(date_format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(Error::InvalidArgument(format!(
            "Invalid date format: {}",
            date_format
        )));
    }
    Ok(items)
}
