use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::error::Error;

/// Lifecycle hooks a plugin can observe. All hooks default to no-ops.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// A file was copied, moved or created.
    fn on_file_added(&self, _path: &Path) -> Result<(), Error> {
        Ok(())
    }

    fn on_file_deleted(&self, _path: &Path) -> Result<(), Error> {
        Ok(())
    }

    fn on_organize(&self, _source: &Path, _destination: &Path) -> Result<(), Error> {
        Ok(())
    }

    fn on_search_complete(&self, _query: &str, _results: &[PathBuf]) -> Result<(), Error> {
        Ok(())
    }
}

/// Explicitly constructed set of plugins. Components that emit hooks are handed
/// a registry; a failing plugin is logged and the broadcast carries on.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        info!("Registered plugin: {}", plugin.name());
        self.plugins.push(plugin);
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn on_file_added(&self, path: &Path) {
        self.broadcast("on_file_added", |p| p.on_file_added(path));
    }

    pub fn on_file_deleted(&self, path: &Path) {
        self.broadcast("on_file_deleted", |p| p.on_file_deleted(path));
    }

    pub fn on_organize(&self, source: &Path, destination: &Path) {
        self.broadcast("on_organize", |p| p.on_organize(source, destination));
    }

    pub fn on_search_complete(&self, query: &str, results: &[PathBuf]) {
        self.broadcast("on_search_complete", |p| p.on_search_complete(query, results));
    }

    fn broadcast<F>(&self, hook: &str, f: F)
    where
        F: Fn(&dyn Plugin) -> Result<(), Error>,
    {
        for plugin in &self.plugins {
            if let Err(e) = f(plugin.as_ref()) {
                error!("Error in plugin {}.{}: {}", plugin.name(), hook, e);
            }
        }
    }
}

/// Writes every hook to the tracing log under the `activity` target.
pub struct ActivityLogPlugin;

impl Plugin for ActivityLogPlugin {
    fn name(&self) -> &str {
        "activity-log"
    }

    fn on_file_added(&self, path: &Path) -> Result<(), Error> {
        info!(target: "activity", "File added: {}", path.display());
        Ok(())
    }

    fn on_file_deleted(&self, path: &Path) -> Result<(), Error> {
        info!(target: "activity", "File deleted: {}", path.display());
        Ok(())
    }

    fn on_organize(&self, source: &Path, destination: &Path) -> Result<(), Error> {
        info!(
            target: "activity",
            "File organized: {} -> {}",
            source.display(),
            destination.display()
        );
        Ok(())
    }

    fn on_search_complete(&self, query: &str, results: &[PathBuf]) -> Result<(), Error> {
        info!(target: "activity", "Search '{}' found {} results", query, results.len());
        Ok(())
    }
}
