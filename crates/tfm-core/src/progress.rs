use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

/// A single unit of progress, emitted once per file at each stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// File visited by the size pass of a duplicate scan.
    Scanning(PathBuf),
    /// File entering the partial-hash pass.
    HashingPartial(PathBuf),
    /// File entering the full-hash pass.
    HashingFull(PathBuf),
    /// File handled by an organize, cleanup, rename or resolve call.
    Processed(PathBuf),
}

impl ProgressEvent {
    pub fn path(&self) -> &Path {
        match self {
            ProgressEvent::Scanning(p)
            | ProgressEvent::HashingPartial(p)
            | ProgressEvent::HashingFull(p)
            | ProgressEvent::Processed(p) => p,
        }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = |p: &Path| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string())
        };
        match self {
            ProgressEvent::Scanning(p) => write!(f, "Scanning: {}", name(p)),
            ProgressEvent::HashingPartial(p) => write!(f, "Hashing (partial): {}", name(p)),
            ProgressEvent::HashingFull(p) => write!(f, "Hashing (full): {}", name(p)),
            ProgressEvent::Processed(p) => write!(f, "{}", p.display()),
        }
    }
}

/// Trait for reporting progress out of long-running calls.
///
/// CLI implements with indicatif, a UI can use [`ChannelReporter`] and drain
/// events from its own thread. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self) {}
    fn on_scan_complete(&self, _total_files: usize, _duration_secs: f64) {}
    fn on_hash_start(&self, _candidates: usize) {}
    fn on_hash_complete(&self, _total_groups: usize, _duration_secs: f64) {}
    fn on_event(&self, _event: &ProgressEvent) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

/// Forwards every [`ProgressEvent`] into an mpsc channel. Sending never blocks;
/// a dropped receiver just discards events.
pub struct ChannelReporter {
    tx: Mutex<Sender<ProgressEvent>>,
}

impl ChannelReporter {
    pub fn new() -> (Self, Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx: Mutex::new(tx) }, rx)
    }
}

impl ProgressReporter for ChannelReporter {
    fn on_event(&self, event: &ProgressEvent) {
        if let Ok(tx) = self.tx.lock() {
            let _ = tx.send(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_event_display() {
        let p = PathBuf::from("/data/photos/cat.jpg");
        assert_eq!(ProgressEvent::Scanning(p.clone()).to_string(), "Scanning: cat.jpg");
        assert_eq!(
            ProgressEvent::HashingPartial(p.clone()).to_string(),
            "Hashing (partial): cat.jpg"
        );
        assert_eq!(ProgressEvent::HashingFull(p.clone()).to_string(), "Hashing (full): cat.jpg");
        assert_eq!(ProgressEvent::Processed(p).to_string(), "/data/photos/cat.jpg");
    }

    #[test]
    fn test_channel_reporter_crosses_threads() {
        let (reporter, rx) = ChannelReporter::new();
        let handle = thread::spawn(move || {
            reporter.on_event(&ProgressEvent::Processed(PathBuf::from("a")));
            reporter.on_event(&ProgressEvent::Processed(PathBuf::from("b")));
        });
        handle.join().unwrap();

        let events: Vec<ProgressEvent> = rx.iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].path(), Path::new("b"));
    }
}
