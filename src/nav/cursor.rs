use std::time::{Duration, Instant};

use tracing::debug;

use crate::fs::query::{first_viewable_group, resolve};
use crate::fs::tree::Entry;
use crate::util::debounce::Debouncer;

/// Whether the cursor has anything to point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Empty,
    Positioned,
}

/// Current item within one sibling group.
///
/// `index < group.len()` holds whenever the group is non-empty; an empty
/// group keeps `index == 0`. Every transition queues the new current leaf
/// on a debounced emitter so rapid key-repeat collapses into one fetch.
#[derive(Debug)]
pub struct NavigationCursor {
    group: Vec<Entry>,
    index: usize,
    pending_jump: Option<String>,
    emitter: Debouncer<Option<Entry>>,
}

impl NavigationCursor {
    pub fn new(emit_delay: Duration) -> Self {
        Self {
            group: Vec::new(),
            index: 0,
            pending_jump: None,
            emitter: Debouncer::new(emit_delay),
        }
    }

    pub fn state(&self) -> CursorState {
        if self.group.is_empty() {
            CursorState::Empty
        } else {
            CursorState::Positioned
        }
    }

    pub fn group(&self) -> &[Entry] {
        &self.group
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&Entry> {
        self.group.get(self.index)
    }

    pub fn forward(&mut self) {
        self.forward_at(Instant::now());
    }

    /// Next item, wrapping from last to first.
    pub fn forward_at(&mut self, now: Instant) {
        if self.group.is_empty() {
            return;
        }
        self.index = (self.index + 1) % self.group.len();
        self.emit(now);
    }

    pub fn backward(&mut self) {
        self.backward_at(Instant::now());
    }

    /// Previous item, wrapping from first to last.
    pub fn backward_at(&mut self, now: Instant) {
        if self.group.is_empty() {
            return;
        }
        let len = self.group.len();
        self.index = (self.index + len - 1) % len;
        self.emit(now);
    }

    pub fn jump(&mut self, tree: &[Entry], identity: &str) -> bool {
        self.jump_at(tree, identity, Instant::now())
    }

    /// Move to the leaf with this identity. Unknown identities are ignored.
    pub fn jump_at(&mut self, tree: &[Entry], identity: &str, now: Instant) -> bool {
        match resolve(tree, identity) {
            Some(found) => {
                self.group = found.group;
                self.index = found.index;
                self.emit(now);
                true
            }
            None => {
                debug!(identity, "jump target not in tree, ignoring");
                false
            }
        }
    }

    /// Remember a path to select once the next tree arrives.
    pub fn set_pending_jump(&mut self, identity: impl Into<String>) {
        self.pending_jump = Some(identity.into());
    }

    pub fn pending_jump(&self) -> Option<&str> {
        self.pending_jump.as_deref()
    }

    pub fn on_tree_rebuilt(&mut self, tree: &[Entry]) {
        self.on_tree_rebuilt_at(tree, Instant::now());
    }

    /// Re-derive the group after a rebuild.
    ///
    /// A pending jump is consumed: if it resolves the cursor lands there,
    /// otherwise it falls back to the first viewable group at index 0.
    pub fn on_tree_rebuilt_at(&mut self, tree: &[Entry], now: Instant) {
        if let Some(identity) = self.pending_jump.take() {
            if let Some(found) = resolve(tree, &identity) {
                self.group = found.group;
                self.index = found.index;
                self.emit(now);
                return;
            }
            debug!(identity = %identity, "pending selection vanished after rebuild");
        }
        self.group = first_viewable_group(tree);
        self.index = 0;
        self.emit(now);
    }

    fn emit(&mut self, now: Instant) {
        self.emitter.push_at(self.current().cloned(), now);
    }

    /// When the queued emission becomes due.
    pub fn emission_deadline(&self) -> Option<Instant> {
        self.emitter.deadline()
    }

    /// Take the debounced current leaf. The outer `None` means nothing is due.
    pub fn poll_emission(&mut self) -> Option<Option<Entry>> {
        self.emitter.poll()
    }

    pub fn poll_emission_at(&mut self, now: Instant) -> Option<Option<Entry>> {
        self.emitter.poll_at(now)
    }

    /// Drop a queued emission, used on teardown.
    pub fn cancel_pending(&mut self) {
        self.emitter.cancel();
        self.pending_jump = None;
    }
}
