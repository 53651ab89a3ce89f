use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Tab identifier, unique within a window (`tab-<n>`).
pub type TabKey = String;

/// Window identifier.
pub type WindowLabel = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortField {
    Name,
    #[default]
    DateModified,
    DateCreated,
}

impl SortField {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Some(SortField::Name),
            "modified" | "datemodified" | "date-modified" => Some(SortField::DateModified),
            "created" | "datecreated" | "date-created" => Some(SortField::DateCreated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortConfig {
    pub field: SortField,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabKind {
    /// Browsing grid of folders.
    Explorer,
    /// Single-item viewer over a directory or archive.
    Viewer,
}

/// One folder card in an explorer page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabItem {
    pub path: PathBuf,
    pub name: String,
    /// First image found inside the folder, if any.
    pub thumbnail: Option<PathBuf>,
    /// Seconds since the Unix epoch.
    pub modified_at: Option<u64>,
    pub created_at: Option<u64>,
}

/// Owner-authoritative state of one tab as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSnapshot {
    pub key: TabKey,
    pub kind: TabKind,
    pub title: String,
    pub path: Option<PathBuf>,
    pub transfer_target: Option<PathBuf>,
    pub page: usize,
    pub page_count: usize,
    pub sort: SortConfig,
    pub search_query: Option<String>,
    pub items: Vec<TabItem>,
    /// Viewer tabs: the leaf to select once the tree is built.
    pub selected: Option<String>,
}

impl TabSnapshot {
    /// Placeholder for a tab whose first snapshot has not arrived yet.
    pub fn placeholder(key: impl Into<TabKey>, kind: TabKind) -> Self {
        Self {
            key: key.into(),
            kind,
            title: String::new(),
            path: None,
            transfer_target: None,
            page: 1,
            page_count: 1,
            sort: SortConfig::default(),
            search_query: None,
            items: Vec::new(),
            selected: None,
        }
    }
}

/// Window-level tab list and active tab.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub active: Option<TabKey>,
    pub tabs: Vec<TabSnapshot>,
}

/// A window's local replica of one tab.
#[derive(Debug, Clone, PartialEq)]
pub struct TabSession {
    pub snapshot: TabSnapshot,
    /// An intent is in flight and no snapshot has answered it yet.
    pub loading: bool,
    /// What the user has typed; the owner's query lives in the snapshot.
    pub search_draft: Option<String>,
}

impl TabSession {
    pub fn new(snapshot: TabSnapshot) -> Self {
        Self {
            search_draft: snapshot.search_query.clone(),
            snapshot,
            loading: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.snapshot.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sort_is_newest_first() {
        let sort = SortConfig::default();
        assert_eq!(sort.field, SortField::DateModified);
        assert_eq!(sort.order, SortOrder::Desc);
    }

    #[test]
    fn parses_sort_words() {
        assert_eq!(SortField::parse("Name"), Some(SortField::Name));
        assert_eq!(SortField::parse("created"), Some(SortField::DateCreated));
        assert_eq!(SortField::parse("size"), None);
        assert_eq!(SortOrder::parse("ASC"), Some(SortOrder::Asc));
        assert_eq!(SortOrder::parse("up"), None);
    }

    #[test]
    fn snapshot_wire_shape_is_camel_case() {
        let snap = TabSnapshot::placeholder("tab-1", TabKind::Explorer);
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["key"], "tab-1");
        assert_eq!(json["pageCount"], 1);
        assert_eq!(json["kind"], "explorer");
        assert!(json["transferTarget"].is_null());
        assert_eq!(json["sort"]["field"], "DateModified");
    }

    #[test]
    fn new_session_copies_search_into_draft() {
        let mut snap = TabSnapshot::placeholder("tab-1", TabKind::Explorer);
        snap.search_query = Some("cats".into());
        let session = TabSession::new(snap);
        assert_eq!(session.search_draft.as_deref(), Some("cats"));
        assert!(!session.loading);
        assert_eq!(session.key(), "tab-1");
    }
}
