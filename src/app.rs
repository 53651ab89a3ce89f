use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::Result;
use crate::event::Event;
use crate::fs::classifier::EntryClassifier;
use crate::host::{HostRuntime, WatchGuard};
use crate::session::store::TabSessionStore;
use crate::session::types::{TabKind, TabSnapshot};
use crate::sync::channel::{Subscription, SyncHub, WindowScope};
use crate::sync::message::{EventName, InboundEvent};
use crate::viewer::{fetch_listing, fetch_media, ListingRequest, MediaRequest, ViewerSource, ViewerTab};

/// Events every window listens to.
const WINDOW_EVENTS: &[EventName] = &[
    EventName::DirectoryTreeChanged,
    EventName::TabStateChanged,
    EventName::SessionStateChanged,
    EventName::FileOpened,
    EventName::IntentRejected,
];

/// One window: its tab replica, its viewer tabs and its subscriptions.
pub struct App {
    label: String,
    primary: bool,
    store: TabSessionStore,
    viewers: HashMap<String, ViewerTab>,
    host: Arc<dyn HostRuntime>,
    classifier: EntryClassifier,
    cursor_delay: Duration,
    watch_enabled: bool,
    events: mpsc::UnboundedSender<Event>,
    subscriptions: Vec<Subscription>,
    pub should_quit: bool,
}

impl App {
    /// Attach the window to the hub and ask the owner for its session.
    ///
    /// Handlers are attached before the restore intent goes out so the
    /// first snapshot cannot be missed.
    pub fn start(
        label: &str,
        primary: bool,
        hub: &SyncHub,
        host: Arc<dyn HostRuntime>,
        config: &AppConfig,
        events: mpsc::UnboundedSender<Event>,
    ) -> Result<Self> {
        let store = TabSessionStore::new(label, hub.channel(), config.search_debounce());

        let subscriptions: Vec<Subscription> = WINDOW_EVENTS
            .iter()
            .map(|&name| {
                let tx = events.clone();
                store.channel().subscribe(
                    name,
                    WindowScope::Window(label.to_string()),
                    Box::new(move |event: &InboundEvent| {
                        let _ = tx.send(Event::Sync(event.clone()));
                    }),
                )
            })
            .collect();

        let app = Self {
            label: label.to_string(),
            primary,
            store,
            viewers: HashMap::new(),
            host,
            classifier: EntryClassifier::from_config(config),
            cursor_delay: config.cursor_debounce(),
            watch_enabled: config.watcher_enabled(),
            events,
            subscriptions,
            should_quit: false,
        };
        app.store.restore()?;
        info!(window = label, primary, "window started");
        Ok(app)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn store(&self) -> &TabSessionStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut TabSessionStore {
        &mut self.store
    }

    pub fn viewer(&self, key: &str) -> Option<&ViewerTab> {
        self.viewers.get(key)
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    /// The viewer behind the active tab, if the active tab is a viewer.
    pub fn active_viewer_mut(&mut self) -> Option<&mut ViewerTab> {
        let key = self.store.active()?.to_string();
        self.viewers.get_mut(&key)
    }

    pub fn active_viewer(&self) -> Option<&ViewerTab> {
        self.store.active().and_then(|key| self.viewers.get(key))
    }

    /// Explorer tab key of the active tab.
    pub fn active_explorer_key(&self) -> Option<String> {
        self.store
            .active_tab()
            .filter(|t| t.snapshot.kind == TabKind::Explorer)
            .map(|t| t.key().to_string())
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    // ── Event dispatch ───────────────────────────────────────────────────

    /// Handle every non-command event.
    pub fn handle_event(&mut self, event: Event, now: Instant) {
        match event {
            Event::Tick => self.tick(now),
            Event::Sync(event) => self.handle_sync(event),
            Event::Listing {
                key,
                generation,
                result,
            } => {
                let Some(viewer) = self.viewers.get_mut(&key) else {
                    debug!(key = %key, "listing for a closed tab");
                    return;
                };
                viewer.apply_listing_at(generation, result, &self.classifier, now);
            }
            Event::Media {
                key,
                generation,
                result,
            } => {
                if let Some(viewer) = self.viewers.get_mut(&key) {
                    viewer.apply_media(generation, result);
                }
            }
            Event::InputClosed => self.quit(),
            Event::Command(line) => warn!(line = %line, "command reached the event dispatcher"),
        }
    }

    fn handle_sync(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::TabStateChanged(snapshot) => {
                if self.store.apply_tab_snapshot(snapshot.clone()) {
                    self.sync_viewer(&snapshot);
                }
            }
            InboundEvent::SessionStateChanged(session) => {
                let tabs = session.tabs.clone();
                for key in self.store.apply_session_snapshot(session) {
                    if let Some(mut viewer) = self.viewers.remove(&key) {
                        viewer.teardown();
                        debug!(key = %key, "viewer removed");
                    }
                }
                let open: Vec<TabSnapshot> = tabs
                    .into_iter()
                    .filter(|t| !self.store.is_closing(&t.key) && !self.store.is_closed(&t.key))
                    .collect();
                for snapshot in &open {
                    self.sync_viewer(snapshot);
                }
            }
            InboundEvent::DirectoryTreeChanged { path } => self.directory_changed(&path),
            InboundEvent::FileOpened { path } => {
                if !self.primary {
                    return;
                }
                info!(window = %self.label, path = %path.display(), "opening file from outside");
                let _ = self.store.open_tab(path);
            }
            InboundEvent::IntentRejected { key, reason } => {
                self.store.mark_rejected(key.as_deref(), &reason);
            }
        }
    }

    /// Create the viewer for a viewer-tab snapshot, or rebuild it if its
    /// path changed.
    fn sync_viewer(&mut self, snapshot: &TabSnapshot) {
        if snapshot.kind != TabKind::Viewer {
            return;
        }
        let unchanged = self
            .viewers
            .get(&snapshot.key)
            .is_some_and(|v| Some(v.source().path()) == snapshot.path.as_deref());
        if unchanged {
            return;
        }
        let Some(mut viewer) =
            ViewerTab::from_snapshot(snapshot, &self.classifier, self.cursor_delay)
        else {
            warn!(key = %snapshot.key, "viewer tab without a path");
            return;
        };

        if self.watch_enabled {
            if let ViewerSource::Directory(path) = viewer.source() {
                match WatchGuard::new(self.host.clone(), path, &snapshot.key) {
                    Ok(guard) => viewer.attach_watch(guard),
                    Err(e) => warn!(key = %snapshot.key, error = %e, "directory watch unavailable"),
                }
            }
        }

        let request = viewer.begin_reload();
        info!(key = %snapshot.key, path = %viewer.source().path().display(), "viewer opened");
        if let Some(mut old) = self.viewers.insert(snapshot.key.clone(), viewer) {
            old.teardown();
        }
        self.spawn_listing(request);
    }

    fn directory_changed(&mut self, path: &Path) {
        let requests: Vec<ListingRequest> = self
            .viewers
            .values_mut()
            .filter(|v| v.watches_path(path))
            .map(ViewerTab::begin_reload)
            .collect();
        for request in requests {
            debug!(key = %request.key, path = %path.display(), "rebuilding after change");
            self.spawn_listing(request);
        }
    }

    /// Flush debounced intents and viewer emissions that are due.
    pub fn tick(&mut self, now: Instant) {
        self.store.flush_due(now);
        let requests: Vec<MediaRequest> = self
            .viewers
            .values_mut()
            .filter_map(|v| v.poll_at(now))
            .collect();
        for request in requests {
            self.spawn_media(request);
        }
    }

    /// Earliest pending timer across the store and all viewers.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.viewers
            .values()
            .filter_map(ViewerTab::next_deadline)
            .chain(self.store.next_deadline())
            .min()
    }

    // ── Host calls ───────────────────────────────────────────────────────

    fn spawn_listing(&self, request: ListingRequest) {
        let host = self.host.clone();
        let tx = self.events.clone();
        tokio::task::spawn_blocking(move || {
            let result = fetch_listing(host.as_ref(), &request.source);
            let _ = tx.send(Event::Listing {
                key: request.key,
                generation: request.generation,
                result,
            });
        });
    }

    fn spawn_media(&self, request: MediaRequest) {
        let host = self.host.clone();
        let tx = self.events.clone();
        tokio::task::spawn_blocking(move || {
            let result = fetch_media(host.as_ref(), &request.entry);
            let _ = tx.send(Event::Media {
                key: request.key,
                generation: request.generation,
                result,
            });
        });
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    /// Detach handlers, cancel timers and release watches.
    pub fn teardown(&mut self) {
        self.subscriptions.clear();
        self.store.teardown();
        for (_, mut viewer) in self.viewers.drain() {
            viewer.teardown();
        }
        info!(window = %self.label, "window torn down");
    }

    /// One line per tab, active tab marked with `*`.
    pub fn status_lines(&self) -> Vec<String> {
        let active = self.store.active();
        let mut lines = Vec::new();
        for tab in self.store.tabs() {
            let snap = &tab.snapshot;
            let marker = if Some(tab.key()) == active { "*" } else { " " };
            let loading = if tab.loading { " (loading)" } else { "" };
            let line = match snap.kind {
                TabKind::Explorer => format!(
                    "{marker} {} [explorer] {} page {}/{} sort {:?}/{:?}{}{loading}",
                    snap.key,
                    snap.path
                        .as_ref()
                        .map_or_else(|| "<roots>".to_string(), |p| p.display().to_string()),
                    snap.page,
                    snap.page_count,
                    snap.sort.field,
                    snap.sort.order,
                    snap.search_query
                        .as_ref()
                        .map(|q| format!(" search \"{q}\""))
                        .unwrap_or_default(),
                ),
                TabKind::Viewer => {
                    let detail = self.viewers.get(tab.key()).map_or_else(String::new, |v| {
                        let position = match v.cursor().current() {
                            Some(item) => format!(
                                "{} ({}/{})",
                                item.name(),
                                v.cursor().index() + 1,
                                v.cursor().group().len()
                            ),
                            None => "empty".to_string(),
                        };
                        format!(
                            "{position} zoom {:.1} offset {:.0},{:.0}",
                            v.viewport().scale(),
                            v.viewport().offset().x,
                            v.viewport().offset().y
                        )
                    });
                    format!("{marker} {} [viewer] {} {detail}{loading}", snap.key, snap.title)
                }
            };
            lines.push(line);
        }
        if let Some(tab) = self.store.active_tab() {
            if tab.snapshot.kind == TabKind::Explorer {
                for item in &tab.snapshot.items {
                    lines.push(format!("    {}", item.path.display()));
                }
            }
        }
        if lines.is_empty() {
            lines.push("no tabs".to_string());
        }
        lines
    }
}
