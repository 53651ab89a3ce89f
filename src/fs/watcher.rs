use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::error::Result;

/// Path components whose changes never affect a viewable tree.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[".git", ".thumbnails", "@eaDir", "Thumbs.db", ".DS_Store"];

/// Watches one directory recursively and reports the directory itself
/// whenever something below it changes.
///
/// Dropping the watcher stops it.
pub struct DirectoryWatcher {
    root: PathBuf,
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
}

impl DirectoryWatcher {
    /// Start watching `root`. Bursts of changes within `debounce` collapse
    /// into one notification carrying `root`.
    pub fn new(
        root: &Path,
        debounce: Duration,
        ignore_patterns: Vec<String>,
        notify_tx: mpsc::UnboundedSender<PathBuf>,
    ) -> Result<Self> {
        let root_path = root.to_path_buf();

        let mut debouncer = new_debouncer(
            debounce,
            move |result: std::result::Result<Vec<notify_debouncer_mini::DebouncedEvent>, notify::Error>| {
                match result {
                    Ok(events) => {
                        let relevant = events
                            .iter()
                            .filter(|e| e.kind == DebouncedEventKind::Any)
                            .any(|e| !should_ignore(&e.path, &ignore_patterns));
                        if !relevant {
                            return;
                        }
                        trace!(root = %root_path.display(), count = events.len(), "directory changed");
                        let _ = notify_tx.send(root_path.clone());
                    }
                    Err(e) => {
                        warn!(root = %root_path.display(), error = %e, "watcher error");
                    }
                }
            },
        )?;

        debouncer
            .watcher()
            .watch(root, notify::RecursiveMode::Recursive)?;

        Ok(Self {
            root: root.to_path_buf(),
            _debouncer: debouncer,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

pub fn default_ignore_patterns() -> Vec<String> {
    DEFAULT_IGNORE_PATTERNS.iter().map(|s| s.to_string()).collect()
}

/// Whether any component of `path` equals one of `patterns`.
pub fn should_ignore(path: &Path, patterns: &[String]) -> bool {
    path.components().any(|component| match component {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            patterns.iter().any(|p| name == p.as_str())
        }
        _ => false,
    })
}
