use chrono::{DateTime, Local};
use std::path::PathBuf;

const MAX_HISTORY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Move,
    Copy,
    Rename,
    Delete,
    CreateDir,
}

/// One recorded, reversible operation.
#[derive(Debug, Clone, PartialEq)]
pub struct FileOperation {
    pub op_type: OperationType,
    pub original_path: PathBuf,
    pub target_path: Option<PathBuf>,
    pub trash_path: Option<PathBuf>,
    pub timestamp: DateTime<Local>,
}

impl FileOperation {
    pub fn new(op_type: OperationType, original_path: PathBuf) -> Self {
        Self {
            op_type,
            original_path,
            target_path: None,
            trash_path: None,
            timestamp: Local::now(),
        }
    }

    pub fn with_target(mut self, target: PathBuf) -> Self {
        self.target_path = Some(target);
        self
    }

    pub fn with_trash(mut self, trash: PathBuf) -> Self {
        self.trash_path = Some(trash);
        self
    }
}

/// Bounded undo/redo stacks. Logging a new operation clears the redo stack.
#[derive(Debug, Default)]
pub struct OperationHistory {
    undo_stack: Vec<FileOperation>,
    redo_stack: Vec<FileOperation>,
}

impl OperationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_operation(&mut self, op: FileOperation) {
        self.undo_stack.push(op);
        self.redo_stack.clear();
        if self.undo_stack.len() > MAX_HISTORY {
            self.undo_stack.remove(0);
        }
    }

    pub fn undo_last(&mut self) -> Option<FileOperation> {
        let op = self.undo_stack.pop()?;
        self.redo_stack.push(op.clone());
        Some(op)
    }

    pub fn redo_last(&mut self) -> Option<FileOperation> {
        let op = self.redo_stack.pop()?;
        self.undo_stack.push(op.clone());
        Some(op)
    }

    /// Put back an operation whose undo failed.
    pub(crate) fn restore_undo(&mut self) {
        if let Some(op) = self.redo_stack.pop() {
            self.undo_stack.push(op);
        }
    }

    /// Put back an operation whose redo failed.
    pub(crate) fn restore_redo(&mut self) {
        if let Some(op) = self.undo_stack.pop() {
            self.redo_stack.push(op);
        }
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }
}
