//! In-process authoritative session owner.
//!
//! Windows never mutate each other's state: they send intents, the owner
//! applies them here and answers with snapshots addressed to the window.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::fs::classifier::{EntryClassifier, FileKind};
use crate::fs::tree::compare_names;
use crate::host::HostRuntime;
use crate::session::types::{
    SessionSnapshot, SortConfig, SortField, SortOrder, TabItem, TabKey, TabKind, TabSnapshot,
    WindowLabel,
};
use crate::sync::channel::SyncHub;
use crate::sync::message::{Command, InboundEvent, Intent};

#[derive(Debug, Default)]
struct WindowSession {
    next_tab: usize,
    active: Option<TabKey>,
    tabs: Vec<TabSnapshot>,
}

impl WindowSession {
    fn allocate_key(&mut self) -> TabKey {
        self.next_tab += 1;
        format!("tab-{}", self.next_tab)
    }

    fn position(&self, key: &str) -> Result<usize> {
        self.tabs
            .iter()
            .position(|t| t.key == key)
            .ok_or_else(|| AppError::UnknownTab(key.to_string()))
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            active: self.active.clone(),
            tabs: self.tabs.clone(),
        }
    }
}

/// What a state change needs to tell the window.
enum Reply {
    Tab(TabSnapshot),
    Session,
}

pub struct SessionOwner {
    host: Arc<dyn HostRuntime>,
    hub: SyncHub,
    classifier: EntryClassifier,
    page_size: usize,
    windows: HashMap<WindowLabel, WindowSession>,
    /// Open requests that arrived before any window registered.
    pending_opens: Vec<PathBuf>,
}

impl SessionOwner {
    pub fn new(
        host: Arc<dyn HostRuntime>,
        hub: SyncHub,
        classifier: EntryClassifier,
        page_size: usize,
    ) -> Self {
        Self {
            host,
            hub,
            classifier,
            page_size: page_size.max(1),
            windows: HashMap::new(),
            pending_opens: Vec::new(),
        }
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Serve intents and watch notifications until the intent queue closes.
    pub async fn run(
        mut self,
        mut intents: mpsc::UnboundedReceiver<Intent>,
        mut changes: mpsc::UnboundedReceiver<PathBuf>,
    ) {
        info!("session owner started");
        loop {
            tokio::select! {
                intent = intents.recv() => match intent {
                    // Listings hit the disk.
                    Some(intent) => tokio::task::block_in_place(|| self.handle(intent)),
                    None => break,
                },
                Some(path) = changes.recv() => self.directory_changed(&path),
            }
        }
        info!("session owner stopped");
    }

    /// Apply one intent. Failures are answered with `intent-rejected`.
    pub fn handle(&mut self, intent: Intent) {
        let Intent { window, command } = intent;
        let name = command.name();
        let key = command.key().map(str::to_string);
        debug!(window = %window, intent = name, key = ?key, "handling intent");

        match self.apply(&window, command) {
            Ok(Some(Reply::Tab(snapshot))) => self.emit(&window, InboundEvent::TabStateChanged(snapshot)),
            Ok(Some(Reply::Session)) => self.emit_session(&window),
            Ok(None) => {}
            Err(e) => {
                warn!(window = %window, intent = name, key = ?key, error = %e, "intent rejected");
                self.emit(
                    &window,
                    InboundEvent::IntentRejected {
                        key,
                        reason: e.to_string(),
                    },
                );
            }
        }
    }

    /// Forward an external open request to the windows; the primary acts on it.
    pub fn file_opened(&mut self, path: PathBuf) {
        if self.windows.is_empty() {
            debug!(path = %path.display(), "no window yet, holding open request");
            self.pending_opens.push(path);
            return;
        }
        self.hub.deliver(None, &InboundEvent::FileOpened { path });
    }

    /// A watched directory changed; every window decides what to rebuild.
    pub fn directory_changed(&mut self, path: &Path) {
        debug!(path = %path.display(), "directory changed");
        self.hub.deliver(
            None,
            &InboundEvent::DirectoryTreeChanged {
                path: path.to_path_buf(),
            },
        );
    }

    fn emit(&self, window: &str, event: InboundEvent) {
        self.hub.deliver(Some(window), &event);
    }

    fn emit_session(&self, window: &str) {
        if let Some(session) = self.windows.get(window) {
            self.emit(window, InboundEvent::SessionStateChanged(session.snapshot()));
        }
    }

    fn window_mut(&mut self, window: &str) -> Result<&mut WindowSession> {
        self.windows
            .get_mut(window)
            .ok_or_else(|| AppError::UnknownWindow(window.to_string()))
    }

    fn tab(&self, window: &str, key: &str) -> Result<&TabSnapshot> {
        let session = self
            .windows
            .get(window)
            .ok_or_else(|| AppError::UnknownWindow(window.to_string()))?;
        Ok(&session.tabs[session.position(key)?])
    }

    /// Replace a tab's snapshot and hand it back for emission.
    fn commit(&mut self, window: &str, snapshot: TabSnapshot) -> Result<Option<Reply>> {
        let session = self.window_mut(window)?;
        let index = session.position(&snapshot.key)?;
        session.tabs[index] = snapshot.clone();
        Ok(Some(Reply::Tab(snapshot)))
    }

    /// Recompute an explorer tab on a copy; the stored tab only changes if
    /// the listing succeeds.
    fn update_explorer(
        &mut self,
        window: &str,
        key: &str,
        change: impl FnOnce(&mut TabSnapshot),
    ) -> Result<Option<Reply>> {
        let mut snapshot = self.tab(window, key)?.clone();
        if snapshot.kind != TabKind::Explorer {
            return Err(AppError::InvalidArgument(format!("{key} is not an explorer tab")));
        }
        change(&mut snapshot);
        self.refresh_explorer(&mut snapshot)?;
        self.commit(window, snapshot)
    }

    fn apply(&mut self, window: &str, command: Command) -> Result<Option<Reply>> {
        match command {
            Command::RestoreSession => {
                if !self.windows.contains_key(window) {
                    info!(window, "window registered");
                    self.windows.insert(window.to_string(), WindowSession::default());
                    self.emit_session(window);
                    for path in std::mem::take(&mut self.pending_opens) {
                        self.hub.deliver(None, &InboundEvent::FileOpened { path });
                    }
                    return Ok(None);
                }
                Ok(Some(Reply::Session))
            }
            Command::ChangeTabPage { key, page } => {
                let page_count = self.tab(window, &key)?.page_count;
                if page == 0 || page > page_count {
                    return Err(AppError::InvalidArgument(format!(
                        "page {page} out of range 1..={page_count}"
                    )));
                }
                self.update_explorer(window, &key, |s| s.page = page)
            }
            Command::MoveTabForward { key } => {
                let tab = self.tab(window, &key)?;
                if tab.page >= tab.page_count {
                    return Ok(Some(Reply::Tab(tab.clone())));
                }
                self.update_explorer(window, &key, |s| s.page += 1)
            }
            Command::MoveTabBackward { key } => {
                let tab = self.tab(window, &key)?;
                if tab.page <= 1 {
                    return Ok(Some(Reply::Tab(tab.clone())));
                }
                self.update_explorer(window, &key, |s| s.page -= 1)
            }
            Command::MoveTabToStart { key } => self.update_explorer(window, &key, |s| s.page = 1),
            Command::MoveTabToEnd { key } => {
                self.update_explorer(window, &key, |s| s.page = usize::MAX)
            }
            Command::ChangeTabSort { key, sort } => self.update_explorer(window, &key, |s| {
                s.sort = sort;
                s.page = 1;
            }),
            Command::ChangeTabSearch { key, query } => {
                let query = query.filter(|q| !q.is_empty());
                self.update_explorer(window, &key, |s| {
                    s.search_query = query;
                    s.page = 1;
                })
            }
            Command::ChangeTabPath { key, path } => {
                if !path.is_dir() {
                    return Err(AppError::InvalidPath(format!(
                        "{} is not a directory",
                        path.display()
                    )));
                }
                self.update_explorer(window, &key, |s| {
                    s.title = title_of(Some(&path));
                    s.path = Some(path);
                    s.search_query = None;
                    s.page = 1;
                })
            }
            Command::ChangeTabTransferTarget { key, path } => {
                let mut snapshot = self.tab(window, &key)?.clone();
                snapshot.transfer_target = path;
                self.commit(window, snapshot)
            }
            Command::ResetTab { key } => {
                let kind = self.tab(window, &key)?.kind;
                match kind {
                    TabKind::Explorer => self.update_explorer(window, &key, |s| {
                        s.path = None;
                        s.title = title_of(None);
                        s.page = 1;
                        s.sort = SortConfig::default();
                        s.search_query = None;
                    }),
                    TabKind::Viewer => Ok(Some(Reply::Tab(self.tab(window, &key)?.clone()))),
                }
            }
            Command::OpenNewTab { path } => {
                let mut snapshot = self.viewer_snapshot(&path)?;
                let session = self.window_mut(window)?;
                snapshot.key = session.allocate_key();
                info!(window, key = %snapshot.key, path = %path.display(), "viewer tab opened");
                session.active = Some(snapshot.key.clone());
                session.tabs.push(snapshot);
                Ok(Some(Reply::Session))
            }
            Command::OpenExplorerTab => {
                let mut snapshot = TabSnapshot::placeholder("", TabKind::Explorer);
                snapshot.title = title_of(None);
                self.refresh_explorer(&mut snapshot)?;
                let session = self.window_mut(window)?;
                snapshot.key = session.allocate_key();
                info!(window, key = %snapshot.key, "explorer tab opened");
                session.active = Some(snapshot.key.clone());
                session.tabs.push(snapshot);
                Ok(Some(Reply::Session))
            }
            Command::CloseTab { key } => {
                let session = self.window_mut(window)?;
                let index = session.position(&key)?;
                session.tabs.remove(index);
                if session.tabs.is_empty() {
                    session.active = None;
                } else if session.active.as_deref() == Some(key.as_str()) {
                    let next = index.min(session.tabs.len() - 1);
                    session.active = Some(session.tabs[next].key.clone());
                }
                info!(window, key = %key, "tab closed");
                Ok(Some(Reply::Session))
            }
            Command::ActivateTab { key } => {
                let session = self.window_mut(window)?;
                session.position(&key)?;
                session.active = Some(key);
                Ok(Some(Reply::Session))
            }
        }
    }

    /// Describe a viewer tab for `path`.
    ///
    /// Media files open their parent directory with the file selected;
    /// archives and directories open as themselves.
    fn viewer_snapshot(&self, path: &Path) -> Result<TabSnapshot> {
        if !path.exists() {
            return Err(AppError::InvalidPath(format!(
                "{} does not exist",
                path.display()
            )));
        }
        let mut snapshot = TabSnapshot::placeholder("", TabKind::Viewer);
        let kind = if path.is_dir() {
            FileKind::Unknown
        } else {
            self.classifier.classify(&path.to_string_lossy())
        };
        match kind {
            FileKind::Image | FileKind::Video => {
                let parent = path
                    .parent()
                    .ok_or_else(|| AppError::InvalidPath(format!("{} has no parent", path.display())))?;
                snapshot.title = title_of(Some(parent));
                snapshot.path = Some(parent.to_path_buf());
                snapshot.selected = Some(path.to_string_lossy().to_string());
            }
            FileKind::Archive => {
                snapshot.title = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                snapshot.path = Some(path.to_path_buf());
            }
            FileKind::Unknown if path.is_dir() => {
                snapshot.title = title_of(Some(path));
                snapshot.path = Some(path.to_path_buf());
            }
            FileKind::Unknown => {
                return Err(AppError::InvalidPath(format!(
                    "{} is not viewable",
                    path.display()
                )));
            }
        }
        Ok(snapshot)
    }

    /// Fill `items`, `page` and `page_count` from the tab's path, search and sort.
    fn refresh_explorer(&self, snapshot: &mut TabSnapshot) -> Result<()> {
        let mut items = match &snapshot.path {
            Some(path) => self.host.list_folders(path)?,
            None => self.host.list_roots(),
        };

        if let Some(query) = snapshot.search_query.as_deref().filter(|q| !q.is_empty()) {
            let query = query.to_lowercase();
            items.retain(|item| item.name.to_lowercase().contains(&query));
        }

        sort_items(&mut items, snapshot.sort);

        let total = items.len();
        snapshot.page_count = total.div_ceil(self.page_size).max(1);
        snapshot.page = snapshot.page.clamp(1, snapshot.page_count);

        let start = (snapshot.page - 1) * self.page_size;
        let end = (start + self.page_size).min(total);
        let mut page: Vec<TabItem> = items.drain(start.min(total)..end).collect();
        for item in page.iter_mut() {
            item.thumbnail = self.host.first_image(&item.path);
        }
        debug!(
            path = ?snapshot.path,
            total,
            page = snapshot.page,
            page_count = snapshot.page_count,
            "explorer page built"
        );
        snapshot.items = page;
        Ok(())
    }
}

fn title_of(path: Option<&Path>) -> String {
    match path {
        Some(path) => path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string()),
        None => "Explorer".to_string(),
    }
}

fn sort_items(items: &mut [TabItem], sort: SortConfig) {
    items.sort_by(|a, b| {
        let ordering = match sort.field {
            SortField::Name => compare_names(&a.name, &b.name),
            SortField::DateModified => a.modified_at.cmp(&b.modified_at),
            SortField::DateCreated => a.created_at.cmp(&b.created_at),
        };
        match sort.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}
