use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// First free path for `desired_name` in `destination_dir`: the name itself, or
/// `stem_1.ext`, `stem_2.ext`, ... Never returns a path that exists on disk.
pub fn next_available_name(destination_dir: &Path, desired_name: &str) -> PathBuf {
    next_available_name_reserved(destination_dir, desired_name, &HashSet::new())
}

/// Like [`next_available_name`], also treating every path in `reserved` as taken.
/// Dry runs use this to avoid assigning one name to two simulated transfers.
pub fn next_available_name_reserved(
    destination_dir: &Path,
    desired_name: &str,
    reserved: &HashSet<PathBuf>,
) -> PathBuf {
    let taken = |p: &Path| reserved.contains(p) || p.symlink_metadata().is_ok();

    let candidate = destination_dir.join(desired_name);
    if !taken(&candidate) {
        return candidate;
    }

    let (stem, ext) = split_name(desired_name);
    let mut counter: u64 = 1;
    loop {
        let name = match ext {
            Some(ext) => format!("{}_{}.{}", stem, counter, ext),
            None => format!("{}_{}", stem, counter),
        };
        let candidate = destination_dir.join(name);
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Split at the last dot. A leading dot belongs to the stem (`.bashrc` has no
/// extension).
fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}
