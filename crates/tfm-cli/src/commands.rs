use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tfm_core::ConflictResolutionStrategy;

#[derive(Debug, Parser)]
#[command(name = "tfm")]
#[command(about = "Organize, deduplicate and rename files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sort the files of a directory into category or date folders
    #[command(group(ArgGroup::new("mode").required(true).args(["by_type", "by_date"])))]
    Organize {
        #[arg(long)]
        source: PathBuf,
        #[arg(long)]
        target: PathBuf,
        /// Group by file category (images, documents, ...)
        #[arg(long)]
        by_type: bool,
        /// Group by modification date
        #[arg(long)]
        by_date: bool,
        /// strftime pattern for --by-date (defaults to the configured one)
        #[arg(long, requires = "by_date")]
        date_format: Option<String>,
        /// Move instead of copy
        #[arg(long = "move")]
        move_files: bool,
        #[arg(long)]
        dry_run: bool,
    },
    /// Find files with identical content, optionally removing the extras
    Duplicates {
        #[arg(long)]
        dir: PathBuf,
        /// Only look at the top level of the directory
        #[arg(long)]
        no_recursive: bool,
        /// Strategy used to pick the copy to keep
        #[arg(long, value_enum)]
        resolve: Option<ResolveStrategy>,
        #[arg(long)]
        dry_run: bool,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Remove files older than a number of days
    Cleanup {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        days: u64,
        #[arg(long)]
        recursive: bool,
        #[arg(long)]
        dry_run: bool,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Replace a substring in file names
    Rename {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        pattern: String,
        #[arg(long)]
        replacement: String,
        #[arg(long)]
        recursive: bool,
        #[arg(long)]
        dry_run: bool,
    },
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResolveStrategy {
    Newest,
    Oldest,
    Largest,
    Smallest,
    Interactive,
}

impl From<ResolveStrategy> for ConflictResolutionStrategy {
    fn from(value: ResolveStrategy) -> Self {
        match value {
            ResolveStrategy::Newest => ConflictResolutionStrategy::KeepNewest,
            ResolveStrategy::Oldest => ConflictResolutionStrategy::KeepOldest,
            ResolveStrategy::Largest => ConflictResolutionStrategy::KeepLargest,
            ResolveStrategy::Smallest => ConflictResolutionStrategy::KeepSmallest,
            ResolveStrategy::Interactive => ConflictResolutionStrategy::Interactive,
        }
    }
}
