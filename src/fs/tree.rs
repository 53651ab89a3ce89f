use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::Result;
use crate::fs::classifier::{EntryClassifier, FileKind};

/// One node of a raw hierarchical listing as delivered by the host.
///
/// A node without `children` is a leaf. `is_file` is an optional leaf marker;
/// it only decides the interpretation when `children` is present but empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawEntry {
    #[serde(default)]
    pub name: Option<String>,
    pub path: PathBuf,
    #[serde(default)]
    pub children: Option<Vec<RawEntry>>,
    #[serde(default)]
    pub is_file: Option<bool>,
}

impl RawEntry {
    /// Read a path from disk. Directories are read recursively.
    ///
    /// `path` itself may be a symlink. Below it, symlinked directories are
    /// skipped so a link back to an ancestor cannot repeat the tree.
    /// Unreadable children and broken symlinks are silently skipped.
    pub fn read(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path)?;
        Self::read_with(path, metadata.is_dir())
    }

    fn read_child(path: &Path) -> Option<Self> {
        let metadata = fs::symlink_metadata(path).ok()?;
        if metadata.is_symlink() {
            // Linked files stay viewable, linked directories are not descended.
            let target = fs::metadata(path).ok()?;
            if target.is_dir() {
                trace!(path = %path.display(), "skipping symlinked directory");
                return None;
            }
            return Self::read_with(path, false).ok();
        }
        Self::read_with(path, metadata.is_dir()).ok()
    }

    fn read_with(path: &Path, is_dir: bool) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        if !is_dir {
            return Ok(Self {
                name: Some(name),
                path: path.to_path_buf(),
                children: None,
                is_file: Some(true),
            });
        }

        let children = fs::read_dir(path)?
            .flatten()
            .filter_map(|entry| RawEntry::read_child(&entry.path()))
            .collect();

        Ok(Self {
            name: Some(name),
            path: path.to_path_buf(),
            children: Some(children),
            is_file: None,
        })
    }

    /// Display name, falling back to the last path component.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        }
    }

    /// Whether this node is interpreted as a leaf.
    fn is_leaf(&self) -> bool {
        match &self.children {
            None => true,
            Some(children) if children.is_empty() => self.is_file.unwrap_or(false),
            Some(_) => false,
        }
    }
}

/// A node of a built, filtered and sorted tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Entry {
    Directory {
        name: String,
        path: PathBuf,
        children: Vec<Entry>,
    },
    Image {
        name: String,
        path: PathBuf,
    },
    Video {
        name: String,
        path: PathBuf,
    },
    /// A member of an archive. Members of one archive share `container`, so
    /// identity always includes `name`.
    ArchiveMember {
        name: String,
        container: PathBuf,
    },
}

impl Entry {
    pub fn name(&self) -> &str {
        match self {
            Entry::Directory { name, .. }
            | Entry::Image { name, .. }
            | Entry::Video { name, .. }
            | Entry::ArchiveMember { name, .. } => name,
        }
    }

    pub fn is_leaf(&self) -> bool {
        match self {
            Entry::Directory { .. } => false,
            Entry::Image { .. } | Entry::Video { .. } | Entry::ArchiveMember { .. } => true,
        }
    }

    /// Selection key of a leaf: its path, or container path followed by the
    /// member name for archive members. Directories have none.
    pub fn identity(&self) -> Option<String> {
        match self {
            Entry::Directory { .. } => None,
            Entry::Image { path, .. } | Entry::Video { path, .. } => {
                Some(path.to_string_lossy().to_string())
            }
            Entry::ArchiveMember { name, container } => {
                Some(format!("{}{}", container.to_string_lossy(), name))
            }
        }
    }
}

/// Sort key: lower-cased, with punctuation and whitespace removed.
///
/// Punctuation between two digits becomes a single space so that separate
/// numbers never fuse into one ("1/10" must not read as "110").
fn collation_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    let mut prev_digit = false;
    let mut skipped = false;
    for c in name.chars() {
        if !c.is_alphanumeric() {
            skipped = true;
            continue;
        }
        if skipped && prev_digit && c.is_ascii_digit() {
            key.push(' ');
        }
        key.extend(c.to_lowercase());
        prev_digit = c.is_ascii_digit();
        skipped = false;
    }
    key
}

/// Numeric-aware, case- and punctuation-insensitive name comparison.
///
/// Falls back to the raw names when the collation keys are equal so the
/// order is total.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    alphanumeric_sort::compare_str(collation_key(a), collation_key(b)).then_with(|| a.cmp(b))
}

fn sort_siblings(entries: &mut [Entry]) {
    entries.sort_by(|a, b| compare_names(a.name(), b.name()));
}

/// Converts raw listings into typed trees.
pub struct TreeBuilder<'a> {
    classifier: &'a EntryClassifier,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(classifier: &'a EntryClassifier) -> Self {
        Self { classifier }
    }

    /// Build a tree from a directory listing.
    ///
    /// Leaves that are not images or videos are dropped. A directory whose
    /// children were all dropped goes too; one that was empty to begin with
    /// stays. Siblings are sorted per level.
    pub fn build(&self, listing: &[RawEntry]) -> Vec<Entry> {
        let mut entries: Vec<Entry> = listing.iter().filter_map(|raw| self.build_node(raw)).collect();
        sort_siblings(&mut entries);
        entries
    }

    fn build_node(&self, raw: &RawEntry) -> Option<Entry> {
        let name = raw.display_name();

        if raw.is_leaf() {
            return match self.classifier.classify(&name) {
                FileKind::Image => Some(Entry::Image {
                    name,
                    path: raw.path.clone(),
                }),
                FileKind::Video => Some(Entry::Video {
                    name,
                    path: raw.path.clone(),
                }),
                // Archives open as their own tab, not inside a directory group.
                FileKind::Archive | FileKind::Unknown => {
                    trace!(path = %raw.path.display(), "dropping non-viewable leaf");
                    None
                }
            };
        }

        let listed = raw.children.as_deref().unwrap_or_default();
        let children = self.build(listed);
        if children.is_empty() && !listed.is_empty() {
            trace!(path = %raw.path.display(), "dropping directory without viewable entries");
            return None;
        }
        Some(Entry::Directory {
            name,
            path: raw.path.clone(),
            children,
        })
    }

    /// Build the single flat sibling group of an archive.
    ///
    /// Members are kept when they classify as image or video.
    pub fn build_archive<S: AsRef<str>>(&self, container: &Path, members: &[S]) -> Vec<Entry> {
        let mut entries: Vec<Entry> = members
            .iter()
            .map(|m| m.as_ref())
            .filter(|m| self.classifier.classify(m).is_viewable())
            .map(|m| Entry::ArchiveMember {
                name: m.to_string(),
                container: container.to_path_buf(),
            })
            .collect();
        sort_siblings(&mut entries);
        entries
    }
}
