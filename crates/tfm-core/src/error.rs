use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by single-target operations and by batch calls that fail
/// before touching any entry. Batch calls never return per-entry failures;
/// those are logged and the entry is left out of the result.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("Permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("Target already exists: {}", .0.display())]
    OperationConflict(PathBuf),

    #[error("Path escapes its root: {}", .0.display())]
    PathTraversal(PathBuf),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map an io error for `path` onto the typed variants where one exists.
    pub fn from_io(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::PathNotFound(path.into()),
            std::io::ErrorKind::PermissionDenied => Error::PermissionDenied(path.into()),
            std::io::ErrorKind::AlreadyExists => Error::OperationConflict(path.into()),
            _ => Error::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_from_io_maps_known_kinds() {
        let err = Error::from_io(io::Error::from(io::ErrorKind::NotFound), "/a");
        assert!(matches!(err, Error::PathNotFound(p) if p == PathBuf::from("/a")));

        let err = Error::from_io(io::Error::from(io::ErrorKind::PermissionDenied), "/b");
        assert!(matches!(err, Error::PermissionDenied(_)));

        let err = Error::from_io(io::Error::from(io::ErrorKind::AlreadyExists), "/c");
        assert!(matches!(err, Error::OperationConflict(_)));

        let err = Error::from_io(io::Error::from(io::ErrorKind::Interrupted), "/d");
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_display_includes_path() {
        let err = Error::OperationConflict(PathBuf::from("/tmp/x.txt"));
        assert_eq!(err.to_string(), "Target already exists: /tmp/x.txt");
    }
}
