//! One viewer tab: its tree, cursor and viewport, plus the fencing that
//! keeps late host responses from overwriting newer state.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::error::{AppError, Result};
use crate::fs::classifier::{EntryClassifier, FileKind};
use crate::fs::query::flatten;
use crate::fs::tree::{Entry, RawEntry, TreeBuilder};
use crate::host::{HostRuntime, WatchGuard};
use crate::nav::cursor::NavigationCursor;
use crate::nav::viewport::{PointerButton, ViewportController};
use crate::session::types::{TabKey, TabSnapshot};

/// What a viewer tab browses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerSource {
    Directory(PathBuf),
    Archive(PathBuf),
}

impl ViewerSource {
    pub fn path(&self) -> &Path {
        match self {
            ViewerSource::Directory(p) | ViewerSource::Archive(p) => p,
        }
    }
}

/// Raw host answer to a listing request.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    Directory(Vec<RawEntry>),
    Archive(Vec<String>),
}

/// Displayable payload of the current leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Media {
    Uri(String),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct ListingRequest {
    pub key: TabKey,
    pub generation: u64,
    pub source: ViewerSource,
}

#[derive(Debug, Clone)]
pub struct MediaRequest {
    pub key: TabKey,
    pub generation: u64,
    pub entry: Entry,
}

/// Perform a listing request against the host.
pub fn fetch_listing(host: &dyn HostRuntime, source: &ViewerSource) -> Result<Listing> {
    match source {
        ViewerSource::Directory(path) => host.list_directory(path).map(Listing::Directory),
        ViewerSource::Archive(path) => host.list_archive_members(path).map(Listing::Archive),
    }
}

/// Resolve the payload of a leaf against the host.
pub fn fetch_media(host: &dyn HostRuntime, entry: &Entry) -> Result<Media> {
    match entry {
        Entry::Image { path, .. } | Entry::Video { path, .. } => {
            host.resolve_media_path(path).map(Media::Uri)
        }
        Entry::ArchiveMember { name, container } => {
            host.read_archive_member(container, name).map(Media::Bytes)
        }
        Entry::Directory { path, .. } => Err(AppError::InvalidArgument(format!(
            "{} is a directory",
            path.display()
        ))),
    }
}

pub struct ViewerTab {
    key: TabKey,
    title: String,
    source: ViewerSource,
    tree: Vec<Entry>,
    cursor: NavigationCursor,
    viewport: ViewportController,
    listing_generation: u64,
    media_generation: u64,
    displayed: Option<Entry>,
    media: Option<Media>,
    loading: bool,
    watch: Option<WatchGuard>,
}

impl ViewerTab {
    /// Build a tab from its owner snapshot. `None` if the snapshot has no path.
    pub fn from_snapshot(
        snapshot: &TabSnapshot,
        classifier: &EntryClassifier,
        cursor_delay: Duration,
    ) -> Option<Self> {
        let path = snapshot.path.clone()?;
        let source = match classifier.classify(&path.to_string_lossy()) {
            FileKind::Archive if !path.is_dir() => ViewerSource::Archive(path),
            FileKind::Archive | FileKind::Image | FileKind::Video | FileKind::Unknown => {
                ViewerSource::Directory(path)
            }
        };
        let mut cursor = NavigationCursor::new(cursor_delay);
        if let Some(selected) = &snapshot.selected {
            cursor.set_pending_jump(selected.clone());
        }
        Some(Self {
            key: snapshot.key.clone(),
            title: snapshot.title.clone(),
            source,
            tree: Vec::new(),
            cursor,
            viewport: ViewportController::new(),
            listing_generation: 0,
            media_generation: 0,
            displayed: None,
            media: None,
            loading: false,
            watch: None,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn source(&self) -> &ViewerSource {
        &self.source
    }

    pub fn tree(&self) -> &[Entry] {
        &self.tree
    }

    pub fn cursor(&self) -> &NavigationCursor {
        &self.cursor
    }

    pub fn viewport(&self) -> &ViewportController {
        &self.viewport
    }

    pub fn displayed(&self) -> Option<&Entry> {
        self.displayed.as_ref()
    }

    pub fn media(&self) -> Option<&Media> {
        self.media.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn leaf_count(&self) -> usize {
        flatten(&self.tree).len()
    }

    /// Keep a directory watch alive for the lifetime of this tab.
    pub fn attach_watch(&mut self, guard: WatchGuard) {
        self.watch = Some(guard);
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }

    /// Whether a change notification for `path` concerns this tab.
    pub fn watches_path(&self, path: &Path) -> bool {
        self.source.path() == path
    }

    // ── Listing ──────────────────────────────────────────────────────────

    /// Start a new listing. Any older listing still in flight becomes stale.
    pub fn begin_reload(&mut self) -> ListingRequest {
        self.listing_generation += 1;
        self.loading = true;
        debug!(key = %self.key, generation = self.listing_generation, "listing requested");
        ListingRequest {
            key: self.key.clone(),
            generation: self.listing_generation,
            source: self.source.clone(),
        }
    }

    pub fn apply_listing(
        &mut self,
        generation: u64,
        result: Result<Listing>,
        classifier: &EntryClassifier,
    ) -> bool {
        self.apply_listing_at(generation, result, classifier, Instant::now())
    }

    /// Rebuild the tree from a listing. Stale or failed listings keep the
    /// current tree. Returns whether the tree changed.
    pub fn apply_listing_at(
        &mut self,
        generation: u64,
        result: Result<Listing>,
        classifier: &EntryClassifier,
        now: Instant,
    ) -> bool {
        if generation != self.listing_generation {
            debug!(
                key = %self.key,
                generation,
                current = self.listing_generation,
                "dropping stale listing"
            );
            return false;
        }
        self.loading = false;
        let listing = match result {
            Ok(listing) => listing,
            Err(e) => {
                warn!(key = %self.key, path = %self.source.path().display(), error = %e, "listing failed");
                return false;
            }
        };

        let builder = TreeBuilder::new(classifier);
        self.tree = match listing {
            Listing::Directory(raw) => builder.build(&raw),
            Listing::Archive(members) => builder.build_archive(self.source.path(), &members),
        };
        self.cursor.on_tree_rebuilt_at(&self.tree, now);
        info!(
            key = %self.key,
            leaves = self.leaf_count(),
            group = self.cursor.group().len(),
            "tree rebuilt"
        );
        true
    }

    // ── Navigation ───────────────────────────────────────────────────────

    pub fn forward_at(&mut self, now: Instant) {
        self.cursor.forward_at(now);
    }

    pub fn backward_at(&mut self, now: Instant) {
        self.cursor.backward_at(now);
    }

    /// Jump to a leaf. Before the first tree arrives the jump is remembered.
    pub fn jump_at(&mut self, identity: &str, now: Instant) -> bool {
        if self.loading && self.tree.is_empty() {
            self.cursor.set_pending_jump(identity);
            return true;
        }
        self.cursor.jump_at(&self.tree, identity, now)
    }

    pub fn press_at(&mut self, button: PointerButton, x: f64, y: f64, now: Instant) {
        match button {
            PointerButton::Back => self.backward_at(now),
            PointerButton::Forward => self.forward_at(now),
            PointerButton::Primary | PointerButton::Secondary | PointerButton::Middle => {
                self.viewport.begin_drag(button, x, y)
            }
        }
    }

    pub fn pointer_moved(&mut self, x: f64, y: f64) {
        self.viewport.drag_to(x, y);
    }

    pub fn release(&mut self) {
        self.viewport.end_drag();
    }

    pub fn wheel(&mut self, direction: f64) {
        self.viewport.zoom_at(direction);
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
    }

    // ── Media ────────────────────────────────────────────────────────────

    pub fn next_deadline(&self) -> Option<Instant> {
        self.cursor.emission_deadline()
    }

    /// Take the debounced current leaf, if due. A new leaf resets the viewport.
    ///
    /// Returns a media request when there is a leaf to display. Re-emitting
    /// the displayed leaf keeps the viewport and only refetches missing media.
    pub fn poll_at(&mut self, now: Instant) -> Option<MediaRequest> {
        let emitted = self.cursor.poll_emission_at(now)?;
        if emitted.is_some() && emitted == self.displayed {
            if self.media.is_some() {
                trace!(key = %self.key, "displayed item unchanged");
                return None;
            }
        } else {
            self.viewport.reset_on_item_change();
        }
        self.media_generation += 1;
        self.media = None;
        self.displayed = emitted.clone();
        let entry = emitted?;
        debug!(key = %self.key, item = entry.name(), generation = self.media_generation, "media requested");
        Some(MediaRequest {
            key: self.key.clone(),
            generation: self.media_generation,
            entry,
        })
    }

    /// Store a media payload unless a newer item has been requested since.
    pub fn apply_media(&mut self, generation: u64, result: Result<Media>) -> bool {
        if generation != self.media_generation {
            debug!(key = %self.key, generation, current = self.media_generation, "dropping stale media");
            return false;
        }
        match result {
            Ok(media) => {
                self.media = Some(media);
                true
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "media fetch failed");
                false
            }
        }
    }

    /// Stop timers. The watch is released when the tab is dropped.
    pub fn teardown(&mut self) {
        self.cursor.cancel_pending();
        self.watch = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::TabKind;

    const DELAY: Duration = Duration::from_millis(100);

    fn raw(path: &str) -> RawEntry {
        RawEntry {
            name: None,
            path: PathBuf::from(path),
            children: None,
            is_file: None,
        }
    }

    fn snapshot(path: &str, selected: Option<&str>) -> TabSnapshot {
        let mut s = TabSnapshot::placeholder("tab-1", TabKind::Viewer);
        s.path = Some(PathBuf::from(path));
        s.selected = selected.map(str::to_string);
        s
    }

    fn setup_viewer(selected: Option<&str>) -> ViewerTab {
        ViewerTab::from_snapshot(&snapshot("/pics", selected), &EntryClassifier::default(), DELAY)
            .unwrap()
    }

    fn listing() -> Listing {
        Listing::Directory(vec![raw("/pics/1.png"), raw("/pics/2.png"), raw("/pics/3.png")])
    }

    #[test]
    fn snapshot_without_path_has_no_viewer() {
        let snap = TabSnapshot::placeholder("tab-1", TabKind::Viewer);
        assert!(ViewerTab::from_snapshot(&snap, &EntryClassifier::default(), DELAY).is_none());
    }

    #[test]
    fn archive_paths_become_archive_sources() {
        let v = ViewerTab::from_snapshot(
            &snapshot("/pics/book.zip", None),
            &EntryClassifier::default(),
            DELAY,
        )
        .unwrap();
        assert_eq!(v.source(), &ViewerSource::Archive(PathBuf::from("/pics/book.zip")));
    }

    #[test]
    fn listing_selects_preselected_file() {
        let classifier = EntryClassifier::default();
        let mut v = setup_viewer(Some("/pics/2.png"));
        let req = v.begin_reload();
        assert!(v.apply_listing_at(req.generation, Ok(listing()), &classifier, Instant::now()));
        assert_eq!(v.cursor().index(), 1);
        assert!(!v.is_loading());
    }

    #[test]
    fn stale_listing_is_dropped() {
        let classifier = EntryClassifier::default();
        let mut v = setup_viewer(None);
        let old = v.begin_reload();
        let new = v.begin_reload();

        assert!(!v.apply_listing_at(old.generation, Ok(listing()), &classifier, Instant::now()));
        assert!(v.tree().is_empty());
        assert!(v.is_loading());

        assert!(v.apply_listing_at(
            new.generation,
            Ok(Listing::Directory(vec![raw("/pics/9.png")])),
            &classifier,
            Instant::now()
        ));
        assert_eq!(v.leaf_count(), 1);
    }

    #[test]
    fn failed_listing_keeps_prior_tree() {
        let classifier = EntryClassifier::default();
        let mut v = setup_viewer(None);
        let req = v.begin_reload();
        v.apply_listing_at(req.generation, Ok(listing()), &classifier, Instant::now());

        let req = v.begin_reload();
        let failed = Err(AppError::InvalidPath("/pics".into()));
        assert!(!v.apply_listing_at(req.generation, failed, &classifier, Instant::now()));
        assert_eq!(v.leaf_count(), 3);
        assert!(!v.is_loading());
    }

    #[test]
    fn archive_listing_builds_flat_group() {
        let classifier = EntryClassifier::default();
        let mut v = ViewerTab::from_snapshot(
            &snapshot("/pics/book.zip", None),
            &classifier,
            DELAY,
        )
        .unwrap();
        let req = v.begin_reload();
        let members = Listing::Archive(vec!["02.png".into(), "01.png".into(), "readme.txt".into()]);
        v.apply_listing_at(req.generation, Ok(members), &classifier, Instant::now());
        assert_eq!(v.cursor().group().len(), 2);
        assert_eq!(v.cursor().current().unwrap().name(), "01.png");
    }

    #[test]
    fn emission_resets_viewport_and_requests_media() {
        let classifier = EntryClassifier::default();
        let start = Instant::now();
        let mut v = setup_viewer(None);
        let req = v.begin_reload();
        v.apply_listing_at(req.generation, Ok(listing()), &classifier, start);
        let first = v.poll_at(start + DELAY).expect("media request");
        assert_eq!(first.entry.name(), "1.png");

        v.zoom_in();
        v.press_at(PointerButton::Primary, 0.0, 0.0, start);
        v.pointer_moved(5.0, 5.0);
        assert_ne!(v.viewport().scale(), 1.0);

        v.forward_at(start + DELAY);
        assert!(v.poll_at(start + DELAY).is_none());
        let second = v.poll_at(start + DELAY * 2).expect("media request");
        assert_eq!(second.entry.name(), "2.png");
        assert_eq!(v.viewport(), &ViewportController::default());
        assert_eq!(v.displayed().unwrap().name(), "2.png");
    }

    #[test]
    fn rebuild_onto_same_item_keeps_viewport() {
        let classifier = EntryClassifier::default();
        let start = Instant::now();
        let mut v = setup_viewer(None);
        let req = v.begin_reload();
        v.apply_listing_at(req.generation, Ok(listing()), &classifier, start);
        let first = v.poll_at(start + DELAY).unwrap();
        assert!(v.apply_media(first.generation, Ok(Media::Uri("file:///pics/1.png".into()))));

        v.zoom_in();
        let zoomed = v.viewport().clone();

        let later = start + DELAY * 2;
        let req = v.begin_reload();
        v.apply_listing_at(req.generation, Ok(listing()), &classifier, later);
        assert!(v.poll_at(later + DELAY).is_none());
        assert_eq!(v.viewport(), &zoomed);
        assert_eq!(v.displayed().unwrap().name(), "1.png");
        assert!(v.media().is_some());
    }

    #[test]
    fn stale_media_is_dropped() {
        let classifier = EntryClassifier::default();
        let start = Instant::now();
        let mut v = setup_viewer(None);
        let req = v.begin_reload();
        v.apply_listing_at(req.generation, Ok(listing()), &classifier, start);
        let first = v.poll_at(start + DELAY).unwrap();
        v.forward_at(start + DELAY);
        let second = v.poll_at(start + DELAY * 2).unwrap();

        assert!(!v.apply_media(first.generation, Ok(Media::Uri("file:///pics/1.png".into()))));
        assert!(v.media().is_none());
        assert!(v.apply_media(second.generation, Ok(Media::Uri("file:///pics/2.png".into()))));
        assert_eq!(v.media(), Some(&Media::Uri("file:///pics/2.png".into())));
    }

    #[test]
    fn back_and_forward_buttons_navigate() {
        let classifier = EntryClassifier::default();
        let now = Instant::now();
        let mut v = setup_viewer(None);
        let req = v.begin_reload();
        v.apply_listing_at(req.generation, Ok(listing()), &classifier, now);
        v.press_at(PointerButton::Back, 0.0, 0.0, now);
        assert_eq!(v.cursor().index(), 2);
        v.press_at(PointerButton::Forward, 0.0, 0.0, now);
        assert_eq!(v.cursor().index(), 0);
        assert!(!v.viewport().is_dragging());
    }

    #[test]
    fn jump_before_first_listing_is_deferred() {
        let classifier = EntryClassifier::default();
        let now = Instant::now();
        let mut v = setup_viewer(None);
        let req = v.begin_reload();
        assert!(v.jump_at("/pics/3.png", now));
        v.apply_listing_at(req.generation, Ok(listing()), &classifier, now);
        assert_eq!(v.cursor().index(), 2);
    }

    #[test]
    fn empty_tree_emits_nothing_to_fetch() {
        let classifier = EntryClassifier::default();
        let start = Instant::now();
        let mut v = setup_viewer(None);
        let req = v.begin_reload();
        v.apply_listing_at(req.generation, Ok(Listing::Directory(vec![raw("/pics/a.txt")])), &classifier, start);
        assert!(v.poll_at(start + DELAY).is_none());
        assert!(v.displayed().is_none());
        assert!(v.next_deadline().is_none());
    }

    #[test]
    fn fetch_media_for_directory_is_invalid() {
        let host = crate::host::LocalHost::new(EntryClassifier::default(), None, Duration::ZERO);
        let dir = Entry::Directory {
            name: "p".into(),
            path: PathBuf::from("/p"),
            children: vec![],
        };
        assert!(matches!(
            fetch_media(&host, &dir),
            Err(AppError::InvalidArgument(_))
        ));
    }
}
