use glob::Pattern;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::{AppConfig, DEFAULT_PARTIAL_HASH_BYTES};
use crate::error::Error;
use crate::hasher;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::scanner::{self, DirectoryEntry};

/// Files verified byte-identical: same size, same full SHA-256.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub hash: String,
    pub size: u64,
    pub paths: Vec<PathBuf>,
}

/// Result of a duplicate scan. Every group has at least two members; groups are
/// kept in the order their first member was encountered.
#[derive(Debug, Clone, Default)]
pub struct DuplicateSet {
    groups: Vec<DuplicateGroup>,
    pub files_scanned: usize,
}

impl DuplicateSet {
    pub fn from_groups(groups: Vec<DuplicateGroup>) -> Self {
        Self {
            groups: groups.into_iter().filter(|g| g.paths.len() > 1).collect(),
            files_scanned: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[DuplicateGroup] {
        &self.groups
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DuplicateGroup> {
        self.groups.iter()
    }

    pub fn get(&self, hash: &str) -> Option<&DuplicateGroup> {
        self.groups.iter().find(|g| g.hash == hash)
    }

    pub fn duplicate_files(&self) -> usize {
        self.groups.iter().map(|g| g.paths.len()).sum()
    }

    /// Bytes reclaimable by keeping one copy per group.
    pub fn wasted_bytes(&self) -> u64 {
        self.groups
            .iter()
            .map(|g| g.size * (g.paths.len() as u64 - 1))
            .sum()
    }
}

impl<'a> IntoIterator for &'a DuplicateSet {
    type Item = &'a DuplicateGroup;
    type IntoIter = std::slice::Iter<'a, DuplicateGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

/// Three-pass duplicate finder: size, then partial hash, then full hash.
/// Each pass only looks at files that still share a bucket with another file.
pub struct DuplicateScanner {
    partial_hash_bytes: usize,
    ignore_patterns: Vec<Pattern>,
    cancel: Arc<AtomicBool>,
}

impl Default for DuplicateScanner {
    fn default() -> Self {
        Self {
            partial_hash_bytes: DEFAULT_PARTIAL_HASH_BYTES,
            ignore_patterns: Vec::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl DuplicateScanner {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            partial_hash_bytes: config.partial_hash_bytes,
            ignore_patterns: scanner::compile_ignore_patterns(&config.ignore_patterns),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_partial_hash_bytes(mut self, bytes: usize) -> Self {
        self.partial_hash_bytes = bytes;
        self
    }

    /// Token checked between files. Setting it makes the running (or next) scan
    /// return [`Error::Cancelled`]; clear it before reusing the scanner.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn find_duplicates(
        &self,
        directory: &Path,
        recursive: bool,
        reporter: &dyn ProgressReporter,
    ) -> Result<DuplicateSet, Error> {
        info!("Scanning {} for duplicates...", directory.display());

        // Phase 1: size
        reporter.on_scan_start();
        let scan_start = Instant::now();
        let mut entries: Vec<DirectoryEntry> = Vec::new();
        for entry in scanner::walk_files(directory, recursive, &self.ignore_patterns)? {
            self.check_cancelled()?;
            reporter.on_event(&ProgressEvent::Scanning(entry.path.clone()));
            entries.push(entry);
        }
        let size_buckets = bucket_by(0..entries.len(), |&i| Some(entries[i].size));
        reporter.on_scan_complete(entries.len(), scan_start.elapsed().as_secs_f64());
        debug!(
            "Size pass: {} files, {} sizes shared by more than one file",
            entries.len(),
            size_buckets.len()
        );

        // Phase 2: partial hash
        let candidates: usize = size_buckets.iter().map(Vec::len).sum();
        reporter.on_hash_start(candidates);
        let hash_start = Instant::now();
        let mut partial_buckets: Vec<Vec<usize>> = Vec::new();
        for bucket in &size_buckets {
            let mut hashes: HashMap<usize, String> = HashMap::new();
            for &i in bucket {
                self.check_cancelled()?;
                let entry = &entries[i];
                reporter.on_event(&ProgressEvent::HashingPartial(entry.path.clone()));
                match hasher::partial_hash(&entry.path, self.partial_hash_bytes, entry.size) {
                    Ok(hash) => {
                        hashes.insert(i, hash);
                    }
                    Err(e) => {
                        debug!("Failed partial hash for {}: {}", entry.path.display(), e);
                    }
                }
            }
            partial_buckets.extend(bucket_by(bucket.iter().copied(), |i| hashes.get(i).cloned()));
        }
        debug!(
            "Partial-hash pass: {} candidate buckets remain",
            partial_buckets.len()
        );

        // Phase 3: full hash
        let mut groups: Vec<DuplicateGroup> = Vec::new();
        for bucket in &partial_buckets {
            let mut hashes: HashMap<usize, String> = HashMap::new();
            for &i in bucket {
                self.check_cancelled()?;
                reporter.on_event(&ProgressEvent::HashingFull(entries[i].path.clone()));
                match hasher::full_hash(&entries[i].path) {
                    Ok(hash) => {
                        hashes.insert(i, hash);
                    }
                    Err(e) => {
                        debug!("Failed full hash for {}: {}", entries[i].path.display(), e);
                    }
                }
            }
            for confirmed in bucket_by(bucket.iter().copied(), |i| hashes.get(i).cloned()) {
                let first = &entries[confirmed[0]];
                groups.push(DuplicateGroup {
                    hash: hashes[&confirmed[0]].clone(),
                    size: first.size,
                    paths: confirmed.iter().map(|&i| entries[i].path.clone()).collect(),
                });
            }
        }
        reporter.on_hash_complete(groups.len(), hash_start.elapsed().as_secs_f64());
        info!(
            "Found {} duplicate groups among {} files",
            groups.len(),
            entries.len()
        );

        let mut set = DuplicateSet::from_groups(groups);
        set.files_scanned = entries.len();
        Ok(set)
    }

    fn check_cancelled(&self) -> Result<(), Error> {
        if self.cancel.load(Ordering::Relaxed) {
            info!("Duplicate scan cancelled");
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

/// Group arena indices by key, keeping first-encountered order for both buckets
/// and members. Indices whose key is None are dropped, as are singleton buckets.
fn bucket_by<K, I, F>(indices: I, mut key: F) -> Vec<Vec<usize>>
where
    K: std::hash::Hash + Eq,
    I: IntoIterator<Item = usize>,
    F: FnMut(&usize) -> Option<K>,
{
    let mut slots: HashMap<K, usize> = HashMap::new();
    let mut buckets: Vec<Vec<usize>> = Vec::new();
    for i in indices {
        let Some(k) = key(&i) else { continue };
        let slot = *slots.entry(k).or_insert_with(|| {
            buckets.push(Vec::new());
            buckets.len() - 1
        });
        buckets[slot].push(i);
    }
    buckets.retain(|b| b.len() > 1);
    buckets
}
