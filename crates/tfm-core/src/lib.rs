pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod naming;
pub mod ops;
pub mod organizer;
pub mod plugins;
pub mod progress;
pub mod resolver;
pub mod safety;
pub mod scanner;

pub use config::{AppConfig, Category, CategoryTable};
pub use engine::{DuplicateGroup, DuplicateScanner, DuplicateSet};
pub use error::Error;
pub use ops::{FileOperationExecutor, FileOperations};
pub use organizer::{EntryOutcome, FileOrganizer, OrganizationResult};
pub use plugins::{ActivityLogPlugin, Plugin, PluginRegistry};
pub use progress::{ChannelReporter, ProgressEvent, ProgressReporter, SilentReporter};
pub use resolver::{ConflictResolutionStrategy, ConflictResolver};
pub use safety::Containment;
