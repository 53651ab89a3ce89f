use serde::{Deserialize, Serialize};

use crate::config::{
    AppConfig, DEFAULT_ARCHIVE_EXTENSIONS, DEFAULT_IMAGE_EXTENSIONS, DEFAULT_VIDEO_EXTENSIONS,
};

/// Kind of a filesystem or archive entry, decided from its name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    Image,
    Video,
    Archive,
    Unknown,
}

impl FileKind {
    /// Whether entries of this kind can be shown by a viewer tab.
    pub fn is_viewable(self) -> bool {
        matches!(self, FileKind::Image | FileKind::Video)
    }
}

/// Classifies names by case-insensitive extension suffix.
///
/// Lookup order is image, video, archive; the first set containing the
/// suffix wins if the sets overlap.
#[derive(Debug, Clone)]
pub struct EntryClassifier {
    image: Vec<String>,
    video: Vec<String>,
    archive: Vec<String>,
}

/// Normalise an extension list into lower-case `.ext` suffixes.
fn suffixes<S: AsRef<str>>(exts: &[S]) -> Vec<String> {
    exts.iter()
        .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{e}"))
        .collect()
}

impl EntryClassifier {
    pub fn new<S: AsRef<str>>(image: &[S], video: &[S], archive: &[S]) -> Self {
        Self {
            image: suffixes(image),
            video: suffixes(video),
            archive: suffixes(archive),
        }
    }

    /// Build a classifier from the configured extension sets.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.image_extensions().as_slice(),
            config.video_extensions().as_slice(),
            config.archive_extensions().as_slice(),
        )
    }

    /// Classify an entry name (or full path) by its suffix.
    pub fn classify(&self, name: &str) -> FileKind {
        let lower = name.to_lowercase();
        let matches = |set: &[String]| set.iter().any(|s| lower.ends_with(s.as_str()));

        if matches(&self.image) {
            FileKind::Image
        } else if matches(&self.video) {
            FileKind::Video
        } else if matches(&self.archive) {
            FileKind::Archive
        } else {
            FileKind::Unknown
        }
    }
}

impl Default for EntryClassifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_IMAGE_EXTENSIONS,
            DEFAULT_VIDEO_EXTENSIONS,
            DEFAULT_ARCHIVE_EXTENSIONS,
        )
    }
}
