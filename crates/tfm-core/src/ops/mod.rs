pub mod history;

use chrono::Local;
use filetime::FileTime;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::Error;
use crate::plugins::PluginRegistry;
pub use history::{FileOperation, OperationHistory, OperationType};

/// Side-effecting file operations. Organizer and resolver go through this
/// instead of raw filesystem calls so every change is recorded and reversible.
pub trait FileOperationExecutor: Send + Sync {
    /// Copy `src` to `dst`. Fails with `OperationConflict` if `dst` exists.
    fn copy(&self, src: &Path, dst: &Path) -> Result<(), Error>;

    /// Move `src` to `dst`. Fails with `OperationConflict` if `dst` exists.
    fn move_file(&self, src: &Path, dst: &Path) -> Result<(), Error>;

    /// Remove `path` (recoverable through undo).
    fn delete(&self, path: &Path) -> Result<(), Error>;

    /// Rename `path` within its parent directory. Returns the new path.
    fn rename(&self, path: &Path, new_name: &str) -> Result<PathBuf, Error>;

    /// Create `path` and any missing parents.
    fn create_dir(&self, path: &Path) -> Result<(), Error>;
}

/// Default executor: deletes move into a trash directory, copies are written to a
/// partial file and renamed into place, and every operation lands in an
/// in-memory undo history.
pub struct FileOperations {
    trash_dir: PathBuf,
    history: Mutex<OperationHistory>,
    plugins: Arc<PluginRegistry>,
    seq: AtomicU64,
}

impl FileOperations {
    pub fn new(trash_dir: impl Into<PathBuf>) -> Self {
        Self {
            trash_dir: trash_dir.into(),
            history: Mutex::new(OperationHistory::new()),
            plugins: Arc::new(PluginRegistry::new()),
            seq: AtomicU64::new(0),
        }
    }

    pub fn with_plugins(mut self, plugins: Arc<PluginRegistry>) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn trash_dir(&self) -> &Path {
        &self.trash_dir
    }

    pub fn undo_len(&self) -> usize {
        self.history().undo_len()
    }

    pub fn redo_len(&self) -> usize {
        self.history().redo_len()
    }

    /// Revert the most recent operation. Returns a short description.
    pub fn undo(&self) -> Result<String, Error> {
        let op = match self.history().undo_last() {
            Some(op) => op,
            None => return Ok("Nothing to undo.".to_string()),
        };

        let result = self.revert(&op);
        if result.is_err() {
            self.history().restore_undo();
        }
        result
    }

    /// Re-apply the most recently undone operation.
    pub fn redo(&self) -> Result<String, Error> {
        let op = match self.history().redo_last() {
            Some(op) => op,
            None => return Ok("Nothing to redo.".to_string()),
        };

        let result = self.reapply(&op);
        if result.is_err() {
            self.history().restore_redo();
        }
        result
    }

    fn revert(&self, op: &FileOperation) -> Result<String, Error> {
        let name = display_name(&op.original_path);
        match op.op_type {
            OperationType::Move | OperationType::Rename => {
                let target = required(&op.target_path)?;
                ensure_absent(&op.original_path)?;
                self.relocate(target, &op.original_path)?;
                Ok(format!("Undid {}: {}", verb(op.op_type), name))
            }
            OperationType::Copy => {
                let target = required(&op.target_path)?;
                remove_any(target).map_err(|e| Error::from_io(e, target))?;
                Ok(format!("Undid copy: {}", display_name(target)))
            }
            OperationType::Delete => {
                let trash = required(&op.trash_path)?;
                ensure_absent(&op.original_path)?;
                self.relocate(trash, &op.original_path)?;
                Ok(format!("Restored from trash: {}", name))
            }
            OperationType::CreateDir => {
                let leaf = op.target_path.as_deref().unwrap_or(&op.original_path);
                for dir in leaf
                    .ancestors()
                    .take_while(|d| d.starts_with(&op.original_path))
                {
                    fs::remove_dir(dir).map_err(|e| Error::from_io(e, dir))?;
                }
                Ok(format!("Undid directory creation: {}", name))
            }
        }
    }

    fn reapply(&self, op: &FileOperation) -> Result<String, Error> {
        let name = display_name(&op.original_path);
        match op.op_type {
            OperationType::Move | OperationType::Rename => {
                let target = required(&op.target_path)?;
                ensure_absent(target)?;
                self.relocate(&op.original_path, target)?;
                Ok(format!("Redid {}: {}", verb(op.op_type), name))
            }
            OperationType::Copy => {
                let target = required(&op.target_path)?;
                ensure_absent(target)?;
                self.copy_atomic(&op.original_path, target)?;
                Ok(format!("Redid copy: {}", name))
            }
            OperationType::Delete => {
                let trash = required(&op.trash_path)?;
                self.relocate(&op.original_path, trash)?;
                Ok(format!("Redid delete: {}", name))
            }
            OperationType::CreateDir => {
                let leaf = op.target_path.as_deref().unwrap_or(&op.original_path);
                fs::create_dir_all(leaf).map_err(|e| Error::from_io(e, leaf))?;
                Ok(format!("Redid directory creation: {}", name))
            }
        }
    }

    fn history(&self) -> MutexGuard<'_, OperationHistory> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Copy through a hidden partial sibling so `dst` either appears complete or
    /// not at all.
    fn copy_atomic(&self, src: &Path, dst: &Path) -> Result<(), Error> {
        let metadata = fs::metadata(src).map_err(|e| Error::from_io(e, src))?;
        let parent = dst.parent().unwrap_or_else(|| Path::new("."));
        let partial = parent.join(format!(
            ".{}.partial-{}-{}",
            display_name(dst),
            std::process::id(),
            self.next_seq()
        ));

        let written = if metadata.is_dir() {
            copy_tree(src, &partial)
        } else {
            copy_file_preserving_mtime(src, &partial)
        };

        let result = written.and_then(|_| {
            if dst.symlink_metadata().is_ok() {
                return Err(io::Error::from(io::ErrorKind::AlreadyExists));
            }
            fs::rename(&partial, dst)
        });

        if let Err(e) = result {
            let _ = remove_any(&partial);
            return Err(Error::from_io(e, dst));
        }
        Ok(())
    }

    /// Rename, falling back to copy-then-remove when `src` and `dst` are on
    /// different filesystems. Either the move completes or `dst` is left absent.
    fn relocate(&self, src: &Path, dst: &Path) -> Result<(), Error> {
        match fs::rename(src, dst) {
            Ok(()) => Ok(()),
            Err(e) if is_cross_device(&e) => {
                debug!(
                    "{} and {} are on different devices, copying instead",
                    src.display(),
                    dst.display()
                );
                self.copy_atomic(src, dst)?;
                if let Err(e) = remove_any(src) {
                    if let Err(cleanup) = remove_any(dst) {
                        warn!("Could not remove copy {}: {}", dst.display(), cleanup);
                    }
                    return Err(Error::from_io(e, src));
                }
                Ok(())
            }
            Err(e) => Err(Error::from_io(e, src)),
        }
    }

    fn trash_path_for(&self, path: &Path) -> PathBuf {
        self.trash_dir.join(format!(
            "{}_{}_{}",
            Local::now().format("%Y%m%d%H%M%S%f"),
            self.next_seq(),
            display_name(path)
        ))
    }
}

impl FileOperationExecutor for FileOperations {
    fn copy(&self, src: &Path, dst: &Path) -> Result<(), Error> {
        ensure_present(src)?;
        ensure_absent(dst)?;
        self.copy_atomic(src, dst)?;
        self.history().log_operation(
            FileOperation::new(OperationType::Copy, src.to_path_buf()).with_target(dst.into()),
        );
        self.plugins.on_file_added(dst);
        debug!("Copied {} -> {}", src.display(), dst.display());
        Ok(())
    }

    fn move_file(&self, src: &Path, dst: &Path) -> Result<(), Error> {
        ensure_present(src)?;
        ensure_absent(dst)?;
        self.relocate(src, dst)?;
        self.history().log_operation(
            FileOperation::new(OperationType::Move, src.to_path_buf()).with_target(dst.into()),
        );
        self.plugins.on_file_added(dst);
        debug!("Moved {} -> {}", src.display(), dst.display());
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<(), Error> {
        ensure_present(path)?;
        fs::create_dir_all(&self.trash_dir).map_err(|e| Error::from_io(e, &self.trash_dir))?;
        let trash_path = self.trash_path_for(path);
        self.relocate(path, &trash_path)?;
        self.history().log_operation(
            FileOperation::new(OperationType::Delete, path.to_path_buf()).with_trash(trash_path),
        );
        self.plugins.on_file_deleted(path);
        info!("Trashed {}", path.display());
        Ok(())
    }

    fn rename(&self, path: &Path, new_name: &str) -> Result<PathBuf, Error> {
        let parent = path.parent().unwrap_or_else(|| Path::new(""));
        if new_name.is_empty() {
            return Err(Error::InvalidArgument("New name cannot be empty".to_string()));
        }
        if !is_plain_file_name(new_name) {
            return Err(Error::PathTraversal(parent.join(new_name)));
        }

        ensure_present(path)?;
        let target = parent.join(new_name);
        ensure_absent(&target)?;
        fs::rename(path, &target).map_err(|e| Error::from_io(e, path))?;
        self.history().log_operation(
            FileOperation::new(OperationType::Rename, path.to_path_buf())
                .with_target(target.clone()),
        );
        debug!("Renamed {} -> {}", path.display(), target.display());
        Ok(target)
    }

    fn create_dir(&self, path: &Path) -> Result<(), Error> {
        if path.is_dir() {
            return Ok(());
        }
        let topmost = path
            .ancestors()
            .take_while(|d| !d.as_os_str().is_empty() && d.symlink_metadata().is_err())
            .last()
            .unwrap_or(path)
            .to_path_buf();
        fs::create_dir_all(path).map_err(|e| Error::from_io(e, path))?;
        self.history().log_operation(
            FileOperation::new(OperationType::CreateDir, topmost).with_target(path.into()),
        );
        self.plugins.on_file_added(path);
        Ok(())
    }
}

/// True when `name` is a single normal path component.
pub(crate) fn is_plain_file_name(name: &str) -> bool {
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn required(path: &Option<PathBuf>) -> Result<&Path, Error> {
    path.as_deref()
        .ok_or_else(|| Error::Other("Operation record is missing a path".to_string()))
}

fn ensure_present(path: &Path) -> Result<(), Error> {
    path.symlink_metadata()
        .map(|_| ())
        .map_err(|e| Error::from_io(e, path))
}

fn ensure_absent(path: &Path) -> Result<(), Error> {
    if path.symlink_metadata().is_ok() {
        warn!("Refusing to overwrite {}", path.display());
        return Err(Error::OperationConflict(path.to_path_buf()));
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn verb(op_type: OperationType) -> &'static str {
    match op_type {
        OperationType::Move => "move",
        OperationType::Copy => "copy",
        OperationType::Rename => "rename",
        OperationType::Delete => "delete",
        OperationType::CreateDir => "directory creation",
    }
}

fn remove_any(path: &Path) -> io::Result<()> {
    let metadata = path.symlink_metadata()?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// The copy inherits the source permissions, so the mtime is set by path
/// rather than through a writable handle.
fn copy_file_preserving_mtime(src: &Path, dst: &Path) -> io::Result<()> {
    fs::copy(src, dst)?;
    let metadata = fs::metadata(src)?;
    filetime::set_file_mtime(dst, FileTime::from_last_modification_time(&metadata))
}

#[cfg(unix)]
const EXDEV: i32 = 18;
#[cfg(windows)]
const EXDEV: i32 = 17; // ERROR_NOT_SAME_DEVICE

fn is_cross_device(e: &io::Error) -> bool {
    #[cfg(any(unix, windows))]
    {
        e.raw_os_error() == Some(EXDEV)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = e;
        false
    }
}

fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_file() {
            copy_file_preserving_mtime(entry.path(), &target)?;
        } else {
            debug!("Skipping special entry {} during copy", entry.path().display());
        }
    }
    Ok(())
}
