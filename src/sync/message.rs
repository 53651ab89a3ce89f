//! Wire shapes exchanged between windows and the session owner.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::session::types::{SessionSnapshot, SortConfig, TabKey, TabSnapshot, WindowLabel};

/// Owner → window event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum InboundEvent {
    /// Contents under a watched directory changed.
    DirectoryTreeChanged { path: PathBuf },
    TabStateChanged(TabSnapshot),
    SessionStateChanged(SessionSnapshot),
    /// Open request from outside the app. Only the primary window acts on it.
    FileOpened { path: PathBuf },
    IntentRejected {
        key: Option<TabKey>,
        reason: String,
    },
}

/// Names that handlers subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    DirectoryTreeChanged,
    TabStateChanged,
    SessionStateChanged,
    FileOpened,
    IntentRejected,
}

impl EventName {
    pub fn as_str(self) -> &'static str {
        match self {
            EventName::DirectoryTreeChanged => "directory-tree-changed",
            EventName::TabStateChanged => "tab-state-changed",
            EventName::SessionStateChanged => "session-state-changed",
            EventName::FileOpened => "file-opened",
            EventName::IntentRejected => "intent-rejected",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl InboundEvent {
    pub fn name(&self) -> EventName {
        match self {
            InboundEvent::DirectoryTreeChanged { .. } => EventName::DirectoryTreeChanged,
            InboundEvent::TabStateChanged(_) => EventName::TabStateChanged,
            InboundEvent::SessionStateChanged(_) => EventName::SessionStateChanged,
            InboundEvent::FileOpened { .. } => EventName::FileOpened,
            InboundEvent::IntentRejected { .. } => EventName::IntentRejected,
        }
    }
}

/// Window → owner command, carrying the issuing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub window: WindowLabel,
    #[serde(flatten)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", content = "payload", rename_all = "kebab-case")]
pub enum Command {
    /// Ask for a full session snapshot. Sent once per window after its
    /// handlers are attached.
    RestoreSession,
    ChangeTabPage { key: TabKey, page: usize },
    MoveTabForward { key: TabKey },
    MoveTabBackward { key: TabKey },
    MoveTabToStart { key: TabKey },
    MoveTabToEnd { key: TabKey },
    ChangeTabSort { key: TabKey, sort: SortConfig },
    ChangeTabSearch { key: TabKey, query: Option<String> },
    ChangeTabPath { key: TabKey, path: PathBuf },
    ChangeTabTransferTarget { key: TabKey, path: Option<PathBuf> },
    OpenNewTab { path: PathBuf },
    OpenExplorerTab,
    CloseTab { key: TabKey },
    ResetTab { key: TabKey },
    ActivateTab { key: TabKey },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::RestoreSession => "restore-session",
            Command::ChangeTabPage { .. } => "change-tab-page",
            Command::MoveTabForward { .. } => "move-tab-forward",
            Command::MoveTabBackward { .. } => "move-tab-backward",
            Command::MoveTabToStart { .. } => "move-tab-to-start",
            Command::MoveTabToEnd { .. } => "move-tab-to-end",
            Command::ChangeTabSort { .. } => "change-tab-sort",
            Command::ChangeTabSearch { .. } => "change-tab-search",
            Command::ChangeTabPath { .. } => "change-tab-path",
            Command::ChangeTabTransferTarget { .. } => "change-tab-transfer-target",
            Command::OpenNewTab { .. } => "open-new-tab",
            Command::OpenExplorerTab => "open-explorer-tab",
            Command::CloseTab { .. } => "close-tab",
            Command::ResetTab { .. } => "reset-tab",
            Command::ActivateTab { .. } => "activate-tab",
        }
    }

    /// Tab the command is about, if it targets one.
    pub fn key(&self) -> Option<&str> {
        match self {
            Command::ChangeTabPage { key, .. }
            | Command::MoveTabForward { key }
            | Command::MoveTabBackward { key }
            | Command::MoveTabToStart { key }
            | Command::MoveTabToEnd { key }
            | Command::ChangeTabSort { key, .. }
            | Command::ChangeTabSearch { key, .. }
            | Command::ChangeTabPath { key, .. }
            | Command::ChangeTabTransferTarget { key, .. }
            | Command::CloseTab { key }
            | Command::ResetTab { key }
            | Command::ActivateTab { key } => Some(key),
            Command::RestoreSession | Command::OpenNewTab { .. } | Command::OpenExplorerTab => {
                None
            }
        }
    }
}

impl Intent {
    pub fn new(window: impl Into<WindowLabel>, command: Command) -> Self {
        Self {
            window: window.into(),
            command,
        }
    }

    pub fn name(&self) -> &'static str {
        self.command.name()
    }

    pub fn key(&self) -> Option<&str> {
        self.command.key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::TabKind;

    #[test]
    fn event_wire_shape() {
        let ev = InboundEvent::DirectoryTreeChanged {
            path: PathBuf::from("/pics"),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "directory-tree-changed");
        assert_eq!(json["payload"]["path"], "/pics");

        let back: InboundEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, ev);
    }

    #[test]
    fn snapshot_event_carries_tab() {
        let ev = InboundEvent::TabStateChanged(TabSnapshot::placeholder("tab-2", TabKind::Viewer));
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "tab-state-changed");
        assert_eq!(json["payload"]["key"], "tab-2");
    }

    #[test]
    fn event_names_match_wire_tags() {
        let ev = InboundEvent::IntentRejected {
            key: None,
            reason: "nope".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], ev.name().as_str());
    }

    #[test]
    fn intent_wire_shape_is_flat() {
        let intent = Intent::new(
            "main",
            Command::ChangeTabPage {
                key: "tab-1".into(),
                page: 3,
            },
        );
        let json = serde_json::to_value(&intent).unwrap();
        assert_eq!(json["window"], "main");
        assert_eq!(json["intent"], "change-tab-page");
        assert_eq!(json["payload"]["page"], 3);
        assert_eq!(intent.name(), "change-tab-page");
    }

    #[test]
    fn command_key() {
        assert_eq!(
            Command::CloseTab {
                key: "tab-4".into()
            }
            .key(),
            Some("tab-4")
        );
        assert_eq!(Command::RestoreSession.key(), None);
    }
}
