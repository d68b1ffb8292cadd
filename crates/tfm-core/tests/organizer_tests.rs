use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

use tfm_core::{
    Category, CategoryTable, EntryOutcome, Error, FileOperationExecutor, FileOperations,
    FileOrganizer, Plugin, PluginRegistry,
};

const DAY: u64 = 86_400;

/// Source and target directories next to a private trash dir.
struct Fixture {
    _tmp: tempfile::TempDir,
    source: PathBuf,
    target: PathBuf,
    ops: FileOperations,
}

fn fixture() -> Fixture {
    let tmp = tempdir().unwrap();
    let base = fs::canonicalize(tmp.path()).unwrap();
    let source = base.join("source");
    let target = base.join("target");
    fs::create_dir_all(&source).unwrap();
    let ops = FileOperations::new(base.join("trash"));
    Fixture {
        _tmp: tmp,
        source,
        target,
        ops,
    }
}

fn set_age(path: &Path, days: u64) {
    let when = SystemTime::now() - Duration::from_secs(days * DAY);
    set_file_mtime(path, FileTime::from_system_time(when)).unwrap();
}

#[test]
fn test_organize_by_type_places_files_by_category() {
    let fx = fixture();
    fs::write(fx.source.join("a.jpg"), vec![1u8; 1024]).unwrap();
    fs::write(fx.source.join("b.txt"), vec![2u8; 1024]).unwrap();

    let result = FileOrganizer::new(&fx.ops)
        .organize_by_type(&fx.source, &fx.target, &CategoryTable::default(), false)
        .unwrap();

    assert_eq!(result.keys().collect::<Vec<_>>(), vec!["documents", "images"]);
    assert_eq!(
        result.get("images").unwrap(),
        &[fx.target.join("images").join("a.jpg")]
    );
    assert_eq!(
        result.get("documents").unwrap(),
        &[fx.target.join("documents").join("b.txt")]
    );
    // Copy leaves the originals alone
    assert!(fx.source.join("a.jpg").exists());
    assert!(fx.target.join("images").join("a.jpg").exists());
}

#[test]
fn test_organize_never_overwrites_existing_destination() {
    let fx = fixture();
    let documents = fx.target.join("documents");
    fs::create_dir_all(&documents).unwrap();
    fs::write(documents.join("file.txt"), "OLD").unwrap();
    fs::write(fx.source.join("file.txt"), "NEW").unwrap();

    let result = FileOrganizer::new(&fx.ops)
        .organize_by_type(&fx.source, &fx.target, &CategoryTable::default(), false)
        .unwrap();

    assert_eq!(fs::read_to_string(documents.join("file.txt")).unwrap(), "OLD");
    assert_eq!(fs::read_to_string(documents.join("file_1.txt")).unwrap(), "NEW");
    assert_eq!(result.get("documents").unwrap(), &[documents.join("file_1.txt")]);
}

#[test]
fn test_organize_by_type_move_and_leave_uncategorized() {
    let fx = fixture();
    fs::write(fx.source.join("song.MP3"), "la").unwrap();
    fs::write(fx.source.join("mystery.xyz"), "?").unwrap();
    fs::create_dir(fx.source.join("nested")).unwrap();
    fs::write(fx.source.join("nested").join("deep.jpg"), "img").unwrap();

    let result = FileOrganizer::new(&fx.ops)
        .organize_by_type(&fx.source, &fx.target, &CategoryTable::default(), true)
        .unwrap();

    assert_eq!(result.total_placed(), 1);
    assert!(!fx.source.join("song.MP3").exists());
    assert!(fx.target.join("audio").join("song.MP3").exists());
    assert!(fx.source.join("mystery.xyz").exists());
    assert!(fx.source.join("nested").join("deep.jpg").exists());
    assert!(result.entries().iter().any(|e| e.source == fx.source.join("mystery.xyz")
        && e.outcome == EntryOutcome::SkippedUncategorized));
}

#[test]
fn test_custom_category_table() {
    let fx = fixture();
    fs::write(fx.source.join("notes.md"), "# hi").unwrap();
    fs::write(fx.source.join("photo.jpg"), "img").unwrap();

    let table = CategoryTable::new(vec![Category::new("markdown", &["md"])]);
    let result = FileOrganizer::new(&fx.ops)
        .organize_by_type(&fx.source, &fx.target, &table, false)
        .unwrap();

    assert_eq!(result.keys().collect::<Vec<_>>(), vec!["markdown"]);
    assert!(!fx.target.join("images").exists());
}

#[test]
fn test_organize_missing_source() {
    let fx = fixture();
    let err = FileOrganizer::new(&fx.ops)
        .organize_by_type(
            &fx.source.join("missing"),
            &fx.target,
            &CategoryTable::default(),
            false,
        )
        .unwrap_err();
    assert!(matches!(err, Error::PathNotFound(_)));
    assert!(!fx.target.exists());
}

#[test]
fn test_organize_by_date_uses_mtime() {
    let fx = fixture();
    let file = fx.source.join("report.pdf");
    fs::write(&file, "pdf").unwrap();
    // 2021-06-15 12:00:00 UTC, far from any month boundary in every timezone
    set_file_mtime(&file, FileTime::from_unix_time(1_623_758_400, 0)).unwrap();

    let result = FileOrganizer::new(&fx.ops)
        .organize_by_date(&fx.source, &fx.target, "%Y/%m", true)
        .unwrap();

    let expected = fx.target.join("2021").join("06").join("report.pdf");
    assert_eq!(result.get("2021/06").unwrap(), &[expected.clone()]);
    assert!(expected.exists());
    assert!(!file.exists());
}

#[test]
fn test_organize_by_date_rejects_traversal() {
    let fx = fixture();
    let file = fx.source.join("a.txt");
    fs::write(&file, "a").unwrap();

    let result = FileOrganizer::new(&fx.ops)
        .organize_by_date(&fx.source, &fx.target, "../../escaped/%Y", true)
        .unwrap();

    assert!(result.is_empty());
    assert!(file.exists());
    assert_eq!(result.entries()[0].outcome, EntryOutcome::SkippedTraversal);
    assert!(!fx.target.parent().unwrap().parent().unwrap().join("escaped").exists());
}

#[test]
fn test_organize_by_date_invalid_format() {
    let fx = fixture();
    fs::write(fx.source.join("a.txt"), "a").unwrap();

    let err = FileOrganizer::new(&fx.ops)
        .organize_by_date(&fx.source, &fx.target, "%Y/%", false)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(!fx.target.exists());
}

#[test]
fn test_organize_by_date_empty_key_leaves_files() {
    let fx = fixture();
    let file = fx.source.join("a.txt");
    fs::write(&file, "a").unwrap();

    let result = FileOrganizer::new(&fx.ops)
        .organize_by_date(&fx.source, &fx.target, "", false)
        .unwrap();

    assert!(result.is_empty());
    assert_eq!(result.total_placed(), 0);
    assert_eq!(result.entries()[0].outcome, EntryOutcome::SkippedUncategorized);
    assert!(file.exists());
    assert!(!fx.target.join("a.txt").exists());
}

#[cfg(unix)]
#[test]
fn test_organize_copies_read_only_files() {
    use std::os::unix::fs::PermissionsExt;

    let fx = fixture();
    let file = fx.source.join("ro.txt");
    fs::write(&file, "read only").unwrap();
    fs::set_permissions(&file, fs::Permissions::from_mode(0o444)).unwrap();

    let result = FileOrganizer::new(&fx.ops)
        .organize_by_type(&fx.source, &fx.target, &CategoryTable::default(), false)
        .unwrap();

    let expected = fx.target.join("documents").join("ro.txt");
    assert_eq!(result.get("documents").unwrap(), &[expected.clone()]);
    assert_eq!(fs::read_to_string(&expected).unwrap(), "read only");
    assert!(file.exists());
}

#[cfg(unix)]
#[test]
fn test_failed_move_leaves_nothing_at_destination() {
    use std::os::unix::fs::PermissionsExt;

    let fx = fixture();
    let file = fx.source.join("a.txt");
    fs::write(&file, "a").unwrap();
    fs::set_permissions(&fx.source, fs::Permissions::from_mode(0o555)).unwrap();
    if fs::write(fx.source.join("check"), "").is_ok() {
        // Privileged user, permissions are not enforced.
        fs::set_permissions(&fx.source, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let result = FileOrganizer::new(&fx.ops)
        .organize_by_type(&fx.source, &fx.target, &CategoryTable::default(), true);
    fs::set_permissions(&fx.source, fs::Permissions::from_mode(0o755)).unwrap();

    let result = result.unwrap();
    assert_eq!(result.total_placed(), 0);
    assert!(matches!(result.entries()[0].outcome, EntryOutcome::Failed(_)));
    assert!(file.exists());
    assert!(!fx.target.join("documents").join("a.txt").exists());
    assert_eq!(fx.ops.undo_len(), 2);
}

#[test]
fn test_organize_dry_run_touches_nothing() {
    let fx = fixture();
    fs::write(fx.source.join("a.txt"), "1").unwrap();
    fs::write(fx.source.join("b.txt"), "2").unwrap();
    let documents = fx.target.join("documents");

    let result = FileOrganizer::new(&fx.ops)
        .with_dry_run(true)
        .organize_by_type(&fx.source, &fx.target, &CategoryTable::default(), true)
        .unwrap();

    assert_eq!(
        result.get("documents").unwrap(),
        &[documents.join("a.txt"), documents.join("b.txt")]
    );
    assert!(!fx.target.exists());
    assert!(fx.source.join("a.txt").exists());
    assert_eq!(fx.ops.undo_len(), 0);
}

#[test]
fn test_dry_run_reserves_names() {
    let fx = fixture();
    let documents = fx.target.join("documents");
    fs::create_dir_all(&documents).unwrap();
    fs::write(documents.join("a.txt"), "existing").unwrap();
    fs::write(fx.source.join("a.txt"), "new").unwrap();

    let result = FileOrganizer::new(&fx.ops)
        .with_dry_run(true)
        .organize_by_type(&fx.source, &fx.target, &CategoryTable::default(), false)
        .unwrap();
    assert_eq!(result.get("documents").unwrap(), &[documents.join("a_1.txt")]);
    assert!(!documents.join("a_1.txt").exists());
}

#[derive(Default)]
struct OrganizeLog(Mutex<Vec<(PathBuf, PathBuf)>>);

struct OrganizeRecorder(Arc<OrganizeLog>);

impl Plugin for OrganizeRecorder {
    fn name(&self) -> &str {
        "organize-recorder"
    }

    fn on_organize(&self, source: &Path, destination: &Path) -> Result<(), Error> {
        self.0
            .0
            .lock()
            .unwrap()
            .push((source.to_path_buf(), destination.to_path_buf()));
        Ok(())
    }
}

#[test]
fn test_organize_fires_plugin_hook() {
    let fx = fixture();
    fs::write(fx.source.join("a.png"), "png").unwrap();

    let log = Arc::new(OrganizeLog::default());
    let mut registry = PluginRegistry::new();
    registry.register(Box::new(OrganizeRecorder(Arc::clone(&log))));

    FileOrganizer::new(&fx.ops)
        .with_plugins(Arc::new(registry))
        .organize_by_type(&fx.source, &fx.target, &CategoryTable::default(), false)
        .unwrap();

    let entries = log.0.lock().unwrap();
    assert_eq!(
        *entries,
        vec![(fx.source.join("a.png"), fx.target.join("images").join("a.png"))]
    );
}

#[test]
fn test_cleanup_removes_only_old_files() {
    let fx = fixture();
    let old = fx.source.join("old.log");
    let recent = fx.source.join("recent.log");
    fs::write(&old, "old").unwrap();
    fs::write(&recent, "recent").unwrap();
    set_age(&old, 31);
    set_age(&recent, 29);

    let removed = FileOrganizer::new(&fx.ops)
        .cleanup_old_files(&fx.source, 30, false)
        .unwrap();

    assert_eq!(removed, vec![old.clone()]);
    assert!(!old.exists());
    assert!(recent.exists());
}

#[test]
fn test_cleanup_dry_run_matches_real_run() {
    let fx = fixture();
    let nested = fx.source.join("nested");
    fs::create_dir(&nested).unwrap();
    let files = [fx.source.join("a.tmp"), nested.join("b.tmp"), fx.source.join("new.tmp")];
    for f in &files {
        fs::write(f, "x").unwrap();
    }
    set_age(&files[0], 40);
    set_age(&files[1], 40);

    let preview = FileOrganizer::new(&fx.ops)
        .with_dry_run(true)
        .cleanup_old_files(&fx.source, 30, true)
        .unwrap();
    assert!(files.iter().all(|f| f.exists()));

    let removed = FileOrganizer::new(&fx.ops)
        .cleanup_old_files(&fx.source, 30, true)
        .unwrap();
    assert_eq!(preview, removed);
    assert_eq!(removed.len(), 2);
    assert!(files[2].exists());
}

#[test]
fn test_cleanup_non_recursive_skips_nested() {
    let fx = fixture();
    let nested = fx.source.join("nested");
    fs::create_dir(&nested).unwrap();
    let deep = nested.join("deep.tmp");
    fs::write(&deep, "x").unwrap();
    set_age(&deep, 100);

    let removed = FileOrganizer::new(&fx.ops)
        .cleanup_old_files(&fx.source, 30, false)
        .unwrap();
    assert!(removed.is_empty());
    assert!(deep.exists());
}

#[test]
fn test_batch_rename_replaces_substring() {
    let fx = fixture();
    fs::write(fx.source.join("draft_one.txt"), "1").unwrap();
    fs::write(fx.source.join("draft_two.txt"), "2").unwrap();
    fs::write(fx.source.join("final.txt"), "3").unwrap();

    let renamed = FileOrganizer::new(&fx.ops)
        .batch_rename(&fx.source, "draft", "final", false)
        .unwrap();

    assert_eq!(
        renamed,
        vec![fx.source.join("final_one.txt"), fx.source.join("final_two.txt")]
    );
    assert!(!fx.source.join("draft_one.txt").exists());
    assert_eq!(fs::read_to_string(fx.source.join("final.txt")).unwrap(), "3");
}

#[test]
fn test_batch_rename_rejects_traversal() {
    let fx = fixture();
    let file = fx.source.join("old_1.txt");
    fs::write(&file, "a").unwrap();

    let renamed = FileOrganizer::new(&fx.ops)
        .batch_rename(&fx.source, "old", "../escape", false)
        .unwrap();

    assert!(renamed.is_empty());
    assert!(file.exists());
    assert!(!fx.source.parent().unwrap().join("escape_1.txt").exists());
}

#[test]
fn test_batch_rename_skips_existing_destination() {
    let fx = fixture();
    fs::write(fx.source.join("a_old.txt"), "old").unwrap();
    fs::write(fx.source.join("a_new.txt"), "already here").unwrap();

    let renamed = FileOrganizer::new(&fx.ops)
        .batch_rename(&fx.source, "old", "new", false)
        .unwrap();

    assert!(renamed.is_empty());
    assert_eq!(fs::read_to_string(fx.source.join("a_new.txt")).unwrap(), "already here");
    assert!(fx.source.join("a_old.txt").exists());
}

#[test]
fn test_batch_rename_empty_pattern() {
    let fx = fixture();
    let err = FileOrganizer::new(&fx.ops)
        .batch_rename(&fx.source, "", "x", false)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn test_batch_rename_can_be_undone() {
    let fx = fixture();
    fs::write(fx.source.join("IMG_001.jpg"), "1").unwrap();

    FileOrganizer::new(&fx.ops)
        .batch_rename(&fx.source, "IMG_", "holiday_", true)
        .unwrap();
    assert!(fx.source.join("holiday_001.jpg").exists());

    fx.ops.undo().unwrap();
    assert!(fx.source.join("IMG_001.jpg").exists());
    assert!(!fx.source.join("holiday_001.jpg").exists());
}

#[test]
fn test_organizer_accepts_any_executor() {
    // Fails every call; the organizer must report the failures and carry on.
    struct Refusing;

    impl FileOperationExecutor for Refusing {
        fn copy(&self, _: &Path, dst: &Path) -> Result<(), Error> {
            Err(Error::PermissionDenied(dst.to_path_buf()))
        }
        fn move_file(&self, _: &Path, dst: &Path) -> Result<(), Error> {
            Err(Error::PermissionDenied(dst.to_path_buf()))
        }
        fn delete(&self, path: &Path) -> Result<(), Error> {
            Err(Error::PermissionDenied(path.to_path_buf()))
        }
        fn rename(&self, path: &Path, _: &str) -> Result<PathBuf, Error> {
            Err(Error::PermissionDenied(path.to_path_buf()))
        }
        fn create_dir(&self, path: &Path) -> Result<(), Error> {
            fs::create_dir_all(path).map_err(|e| Error::from_io(e, path))
        }
    }

    let fx = fixture();
    fs::write(fx.source.join("a.txt"), "a").unwrap();
    fs::write(fx.source.join("b.txt"), "b").unwrap();
    let old = fx.source.join("a.txt");
    set_age(&old, 90);

    let organizer = FileOrganizer::new(&Refusing);
    let result = organizer
        .organize_by_type(&fx.source, &fx.target, &CategoryTable::default(), true)
        .unwrap();
    assert!(result.is_empty());
    assert_eq!(result.entries().len(), 2);
    assert!(result
        .entries()
        .iter()
        .all(|e| matches!(e.outcome, EntryOutcome::Failed(_))));

    assert!(organizer.cleanup_old_files(&fx.source, 30, false).unwrap().is_empty());
    assert!(old.exists());
}
