use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::error::{AppError, Result};
use crate::session::types::{
    SessionSnapshot, SortConfig, TabKey, TabSession, TabSnapshot, WindowLabel,
};
use crate::sync::channel::SyncChannel;
use crate::sync::message::{Command, Intent};

/// One window's replica of the owner's tab state.
///
/// Pagination, sort, search and tab membership only change when a snapshot
/// arrives. Local actions publish an intent and flag the tab as loading.
pub struct TabSessionStore {
    window: WindowLabel,
    channel: SyncChannel,
    tabs: Vec<TabSession>,
    active: Option<TabKey>,
    /// Keys with a close in flight; their snapshots are ignored.
    closing: HashSet<TabKey>,
    /// Keys the owner has removed. Keys are never reused, so these stay
    /// ignored for the life of the window.
    closed: HashSet<TabKey>,
    search_delay: Duration,
}

impl TabSessionStore {
    pub fn new(window: impl Into<WindowLabel>, channel: SyncChannel, search_delay: Duration) -> Self {
        Self {
            window: window.into(),
            channel,
            tabs: Vec::new(),
            active: None,
            closing: HashSet::new(),
            closed: HashSet::new(),
            search_delay,
        }
    }

    pub fn window(&self) -> &str {
        &self.window
    }

    pub fn channel(&self) -> &SyncChannel {
        &self.channel
    }

    pub fn tabs(&self) -> &[TabSession] {
        &self.tabs
    }

    pub fn tab(&self, key: &str) -> Option<&TabSession> {
        self.tabs.iter().find(|t| t.key() == key)
    }

    fn tab_mut(&mut self, key: &str) -> Option<&mut TabSession> {
        self.tabs.iter_mut().find(|t| t.key() == key)
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active_tab(&self) -> Option<&TabSession> {
        self.active.as_deref().and_then(|key| self.tab(key))
    }

    pub fn is_closing(&self, key: &str) -> bool {
        self.closing.contains(key)
    }

    /// Whether the owner already removed this tab.
    pub fn is_closed(&self, key: &str) -> bool {
        self.closed.contains(key)
    }

    // ── Inbound ──────────────────────────────────────────────────────────

    /// Apply an owner snapshot for one tab. Returns whether it was applied.
    pub fn apply_tab_snapshot(&mut self, snapshot: TabSnapshot) -> bool {
        if self.closing.contains(&snapshot.key) || self.closed.contains(&snapshot.key) {
            trace!(key = %snapshot.key, "ignoring snapshot for closed tab");
            return false;
        }
        let search_pending = self.channel.has_pending(&snapshot.key);
        match self.tab_mut(&snapshot.key) {
            Some(tab) => {
                if !search_pending {
                    tab.search_draft = snapshot.search_query.clone();
                }
                tab.snapshot = snapshot;
                tab.loading = search_pending;
            }
            None => {
                debug!(key = %snapshot.key, "tab created from snapshot");
                self.tabs.push(TabSession::new(snapshot));
            }
        }
        true
    }

    /// Apply a window-level snapshot. Tabs it omits are removed.
    ///
    /// Returns the keys that were removed.
    pub fn apply_session_snapshot(&mut self, snapshot: SessionSnapshot) -> Vec<TabKey> {
        let listed: HashSet<&str> = snapshot.tabs.iter().map(|t| t.key.as_str()).collect();
        let removed: Vec<TabKey> = self
            .tabs
            .iter()
            .map(|t| t.key().to_string())
            .filter(|k| !listed.contains(k.as_str()))
            .collect();
        self.closing.retain(|k| listed.contains(k.as_str()));
        self.closed.extend(removed.iter().cloned());

        self.tabs.retain(|t| listed.contains(t.key()));
        for key in &removed {
            self.channel.cancel_pending(key);
        }

        let order: Vec<TabKey> = snapshot.tabs.iter().map(|t| t.key.clone()).collect();
        for tab in snapshot.tabs {
            self.apply_tab_snapshot(tab);
        }
        self.tabs.sort_by_key(|t| order.iter().position(|k| k == t.key()));

        self.active = snapshot.active;
        debug!(
            window = %self.window,
            tabs = self.tabs.len(),
            active = ?self.active,
            removed = removed.len(),
            "session snapshot applied"
        );
        removed
    }

    /// The owner refused an intent: clear loading and keep prior state.
    pub fn mark_rejected(&mut self, key: Option<&str>, reason: &str) {
        warn!(window = %self.window, ?key, reason, "intent rejected");
        if let Some(key) = key {
            self.closing.remove(key);
            self.channel.cancel_pending(key);
            if let Some(tab) = self.tab_mut(key) {
                tab.loading = false;
                tab.search_draft = tab.snapshot.search_query.clone();
            }
        }
    }

    // ── Outbound ─────────────────────────────────────────────────────────

    fn intent(&self, command: Command) -> Intent {
        Intent::new(self.window.clone(), command)
    }

    /// Publish a tab-scoped command and flag the tab as loading.
    fn send(&mut self, key: &str, command: Command) -> Result<()> {
        if self.closing.contains(key) || self.tab(key).is_none() {
            warn!(window = %self.window, key, intent = command.name(), "no such tab");
            return Err(AppError::UnknownTab(key.to_string()));
        }
        let intent = self.intent(command);
        if let Some(tab) = self.tab_mut(key) {
            tab.loading = true;
        }
        if let Err(e) = self.channel.publish(intent) {
            warn!(window = %self.window, key, error = %e, "publish failed");
            if let Some(tab) = self.tab_mut(key) {
                tab.loading = false;
            }
            return Err(e);
        }
        Ok(())
    }

    fn send_untargeted(&self, command: Command) -> Result<()> {
        let intent = self.intent(command);
        self.channel.publish(intent).inspect_err(|e| {
            warn!(window = %self.window, error = %e, "publish failed");
        })
    }

    /// Ask for the full session. Subscriptions must be attached first.
    pub fn restore(&self) -> Result<()> {
        self.send_untargeted(Command::RestoreSession)
    }

    pub fn change_page(&mut self, key: &str, page: usize) -> Result<()> {
        self.send(
            key,
            Command::ChangeTabPage {
                key: key.to_string(),
                page,
            },
        )
    }

    pub fn move_forward(&mut self, key: &str) -> Result<()> {
        self.send(key, Command::MoveTabForward { key: key.to_string() })
    }

    pub fn move_backward(&mut self, key: &str) -> Result<()> {
        self.send(key, Command::MoveTabBackward { key: key.to_string() })
    }

    pub fn move_to_start(&mut self, key: &str) -> Result<()> {
        self.send(key, Command::MoveTabToStart { key: key.to_string() })
    }

    pub fn move_to_end(&mut self, key: &str) -> Result<()> {
        self.send(key, Command::MoveTabToEnd { key: key.to_string() })
    }

    pub fn change_sort(&mut self, key: &str, sort: SortConfig) -> Result<()> {
        self.send(
            key,
            Command::ChangeTabSort {
                key: key.to_string(),
                sort,
            },
        )
    }

    pub fn change_path(&mut self, key: &str, path: PathBuf) -> Result<()> {
        self.send(
            key,
            Command::ChangeTabPath {
                key: key.to_string(),
                path,
            },
        )
    }

    pub fn change_transfer_target(&mut self, key: &str, path: Option<PathBuf>) -> Result<()> {
        self.send(
            key,
            Command::ChangeTabTransferTarget {
                key: key.to_string(),
                path,
            },
        )
    }

    pub fn reset(&mut self, key: &str) -> Result<()> {
        self.send(key, Command::ResetTab { key: key.to_string() })
    }

    pub fn activate(&mut self, key: &str) -> Result<()> {
        self.send(key, Command::ActivateTab { key: key.to_string() })
    }

    pub fn input_search(&mut self, key: &str, text: &str) -> Result<()> {
        self.input_search_at(key, text, Instant::now())
    }

    /// Record a keystroke. Only the last query after the quiet period is sent.
    pub fn input_search_at(&mut self, key: &str, text: &str, now: Instant) -> Result<()> {
        if self.closing.contains(key) {
            return Err(AppError::UnknownTab(key.to_string()));
        }
        let query = (!text.is_empty()).then(|| text.to_string());
        let Some(tab) = self.tab_mut(key) else {
            warn!(key, "search on unknown tab");
            return Err(AppError::UnknownTab(key.to_string()));
        };
        tab.search_draft = query.clone();
        tab.loading = true;

        let intent = self.intent(Command::ChangeTabSearch {
            key: key.to_string(),
            query,
        });
        self.channel
            .publish_debounced_at(key, intent, self.search_delay, now);
        Ok(())
    }

    /// Request a close. Snapshots for the key are ignored from now on.
    pub fn close(&mut self, key: &str) -> Result<()> {
        self.send(key, Command::CloseTab { key: key.to_string() })?;
        self.channel.cancel_pending(key);
        self.closing.insert(key.to_string());
        Ok(())
    }

    pub fn open_tab(&self, path: PathBuf) -> Result<()> {
        self.send_untargeted(Command::OpenNewTab { path })
    }

    pub fn open_explorer(&self) -> Result<()> {
        self.send_untargeted(Command::OpenExplorerTab)
    }

    /// Send due debounced intents. A failed send clears the tab's loading flag.
    pub fn flush_due(&mut self, now: Instant) -> usize {
        let results = self.channel.flush_due(now);
        let sent = results.len();
        for (key, result) in results {
            if let Err(e) = result {
                warn!(window = %self.window, key = %key, error = %e, "debounced publish failed");
                if let Some(tab) = self.tab_mut(&key) {
                    tab.loading = false;
                    tab.search_draft = tab.snapshot.search_query.clone();
                }
            }
        }
        sent
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.channel.next_deadline()
    }

    /// Cancel everything queued for this window.
    pub fn teardown(&mut self) {
        let dropped = self.channel.cancel_all_pending();
        debug!(window = %self.window, dropped, "store torn down");
    }
}
