//! Boundary to the host runtime: filesystem listings, archive access,
//! media resolution and directory watches.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::fs::classifier::{EntryClassifier, FileKind};
use crate::fs::tree::RawEntry;
use crate::fs::watcher::{default_ignore_patterns, DirectoryWatcher};
use crate::session::types::TabItem;

/// Calls a window or the session owner can make on the host.
///
/// All calls block; async callers run them on the blocking pool.
pub trait HostRuntime: Send + Sync {
    /// Children of `path`, read recursively.
    fn list_directory(&self, path: &Path) -> Result<Vec<RawEntry>>;

    /// Member names of an archive, in archive order.
    fn list_archive_members(&self, path: &Path) -> Result<Vec<String>>;

    fn read_archive_member(&self, path: &Path, name: &str) -> Result<Vec<u8>>;

    /// A URI the display layer can load directly.
    fn resolve_media_path(&self, path: &Path) -> Result<String>;

    /// Direct sub-directories of `path` with timestamps. Thumbnails are
    /// left empty; see [`HostRuntime::first_image`].
    fn list_folders(&self, path: &Path) -> Result<Vec<TabItem>>;

    /// First image file directly inside `folder`.
    fn first_image(&self, folder: &Path) -> Option<PathBuf>;

    /// Top-level locations shown by an explorer tab without a path.
    fn list_roots(&self) -> Vec<TabItem>;

    /// Start (or join) a watch on `path` on behalf of `key`.
    fn watch_directory(&self, path: &Path, key: &str) -> Result<()>;

    /// Leave the watch on `path` for `key`. The watch stops with its last key.
    fn unwatch_directory(&self, path: &Path, key: &str);
}

/// Holds a directory watch for as long as it lives.
pub struct WatchGuard {
    host: Arc<dyn HostRuntime>,
    path: PathBuf,
    key: String,
}

impl WatchGuard {
    pub fn new(host: Arc<dyn HostRuntime>, path: &Path, key: &str) -> Result<Self> {
        host.watch_directory(path, key)?;
        Ok(Self {
            host,
            path: path.to_path_buf(),
            key: key.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.host.unwatch_directory(&self.path, &self.key);
    }
}

struct WatchEntry {
    _watcher: DirectoryWatcher,
    keys: HashSet<String>,
}

/// Host backed by the local filesystem.
///
/// Archives are not decompressed here; archive calls return
/// [`AppError::Unsupported`].
pub struct LocalHost {
    classifier: EntryClassifier,
    watch_tx: Option<mpsc::UnboundedSender<PathBuf>>,
    watch_debounce: Duration,
    watches: Mutex<HashMap<PathBuf, WatchEntry>>,
}

fn epoch_secs(time: std::io::Result<std::time::SystemTime>) -> Option<u64> {
    time.ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
}

fn folder_item(path: PathBuf) -> TabItem {
    let metadata = fs::metadata(&path).ok();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());
    TabItem {
        name,
        thumbnail: None,
        modified_at: metadata.as_ref().and_then(|m| epoch_secs(m.modified())),
        created_at: metadata.as_ref().and_then(|m| epoch_secs(m.created())),
        path,
    }
}

impl LocalHost {
    /// `watch_tx` receives the watched directory on every change. Without it
    /// watch calls succeed but do nothing.
    pub fn new(
        classifier: EntryClassifier,
        watch_tx: Option<mpsc::UnboundedSender<PathBuf>>,
        watch_debounce: Duration,
    ) -> Self {
        Self {
            classifier,
            watch_tx,
            watch_debounce,
            watches: Mutex::new(HashMap::new()),
        }
    }

    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.watches.lock().keys().cloned().collect()
    }

    pub fn watcher_count(&self, path: &Path) -> usize {
        self.watches.lock().get(path).map_or(0, |w| w.keys.len())
    }
}

impl HostRuntime for LocalHost {
    fn list_directory(&self, path: &Path) -> Result<Vec<RawEntry>> {
        let root = RawEntry::read(path)?;
        match root.children {
            Some(children) => Ok(children),
            None => Err(AppError::InvalidPath(format!(
                "{} is not a directory",
                path.display()
            ))),
        }
    }

    fn list_archive_members(&self, path: &Path) -> Result<Vec<String>> {
        Err(AppError::Unsupported(format!(
            "archive listing of {}",
            path.display()
        )))
    }

    fn read_archive_member(&self, path: &Path, name: &str) -> Result<Vec<u8>> {
        Err(AppError::Unsupported(format!(
            "archive read of {} in {}",
            name,
            path.display()
        )))
    }

    fn resolve_media_path(&self, path: &Path) -> Result<String> {
        let canonical = path
            .canonicalize()
            .map_err(|_| AppError::InvalidPath(format!("{} does not exist", path.display())))?;
        Ok(format!("file://{}", canonical.display()))
    }

    fn list_folders(&self, path: &Path) -> Result<Vec<TabItem>> {
        let mut items = Vec::new();
        for entry in fs::read_dir(path)?.flatten() {
            let child = entry.path();
            if child.is_dir() {
                items.push(folder_item(child));
            }
        }
        Ok(items)
    }

    fn first_image(&self, folder: &Path) -> Option<PathBuf> {
        let mut images: Vec<PathBuf> = fs::read_dir(folder)
            .ok()?
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| self.classifier.classify(&p.to_string_lossy()) == FileKind::Image)
            .collect();
        images.sort();
        images.into_iter().next()
    }

    fn list_roots(&self) -> Vec<TabItem> {
        let mut roots = Vec::new();
        if let Some(home) = dirs::home_dir() {
            roots.push(folder_item(home));
        }
        let fs_root = PathBuf::from("/");
        if !roots.iter().any(|r| r.path == fs_root) {
            roots.push(folder_item(fs_root));
        }
        roots
    }

    fn watch_directory(&self, path: &Path, key: &str) -> Result<()> {
        let Some(tx) = &self.watch_tx else {
            return Ok(());
        };
        let mut watches = self.watches.lock();
        if let Some(entry) = watches.get_mut(path) {
            entry.keys.insert(key.to_string());
            debug!(path = %path.display(), key, subscribers = entry.keys.len(), "joined watch");
            return Ok(());
        }
        let watcher = DirectoryWatcher::new(
            path,
            self.watch_debounce,
            default_ignore_patterns(),
            tx.clone(),
        )?;
        info!(path = %path.display(), key, "watching directory");
        watches.insert(
            path.to_path_buf(),
            WatchEntry {
                _watcher: watcher,
                keys: HashSet::from([key.to_string()]),
            },
        );
        Ok(())
    }

    fn unwatch_directory(&self, path: &Path, key: &str) {
        let mut watches = self.watches.lock();
        let Some(entry) = watches.get_mut(path) else {
            return;
        };
        if !entry.keys.remove(key) {
            warn!(path = %path.display(), key, "unwatch for a key that was not watching");
        }
        if entry.keys.is_empty() {
            watches.remove(path);
            info!(path = %path.display(), "stopped watching directory");
        }
    }
}
