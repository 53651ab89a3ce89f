//! Application configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. CLI flags (`--config`, `--no-watcher`)
//! 2. `$FOLIO_CONFIG` environment variable (path to config file)
//! 3. Project-local `.folio.toml` in the current working directory
//! 4. Global `~/.config/folio/config.toml`
//! 5. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

// ── Section configs ──────────────────────────────────────────────────────────

/// Extension sets used to classify entry names.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ExtensionsConfig {
    pub image: Option<Vec<String>>,
    pub video: Option<Vec<String>>,
    pub archive: Option<Vec<String>>,
}

/// Viewer tab settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ViewerConfig {
    /// Delay before a cursor move is forwarded to the viewer.
    pub cursor_debounce_ms: Option<u64>,
}

/// Explorer (browsing grid) tab settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Delay before a typed search query is sent to the session owner.
    pub search_debounce_ms: Option<u64>,
    /// Folders per page.
    pub page_size: Option<usize>,
}

/// Filesystem watcher settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WatcherConfig {
    /// Enable directory watching for auto-rebuild.
    pub enabled: Option<bool>,
    /// Debounce interval in milliseconds.
    pub debounce_ms: Option<u64>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Top-level application configuration.
///
/// All fields are optional so that partial configs from different sources
/// can be merged together (CLI overrides file, file overrides defaults).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub extensions: ExtensionsConfig,
    pub viewer: ViewerConfig,
    pub explorer: ExplorerConfig,
    pub watcher: WatcherConfig,
}

// ── Default constants ────────────────────────────────────────────────────────

pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "jpe", "jfif", "pjpeg", "pjp", "png", "gif", "tif", "tiff", "bmp", "dib",
    "webp",
];
pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm"];
pub const DEFAULT_ARCHIVE_EXTENSIONS: &[&str] = &["zip", "tar", "gz", "bz2", "xz", "7z"];

/// Default cursor emission delay in milliseconds.
pub const DEFAULT_CURSOR_DEBOUNCE_MS: u64 = 100;
/// Default search intent delay in milliseconds.
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;
/// Default explorer page size.
pub const DEFAULT_PAGE_SIZE: usize = 50;
/// Default watcher debounce interval in milliseconds.
pub const DEFAULT_WATCH_DEBOUNCE_MS: u64 = 300;

// ── Config file locator ──────────────────────────────────────────────────────

/// Return the list of candidate config file paths in priority order.
///
/// Does NOT include the CLI `--config` path, which is handled separately.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = std::env::var("FOLIO_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".folio.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("folio").join("config.toml"));
    }

    paths
}

/// Try to read and parse a TOML config file. Returns `None` if the file
/// doesn't exist or can't be parsed.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => {
            debug!(path = %path.display(), "loaded config file");
            Some(cfg)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to parse config file");
            None
        }
    }
}

fn owned_list(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// ── Merge logic ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Merge `other` on top of `self`; `other`'s `Some` values win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            extensions: ExtensionsConfig {
                image: other.extensions.image.clone().or(self.extensions.image),
                video: other.extensions.video.clone().or(self.extensions.video),
                archive: other.extensions.archive.clone().or(self.extensions.archive),
            },
            viewer: ViewerConfig {
                cursor_debounce_ms: other
                    .viewer
                    .cursor_debounce_ms
                    .or(self.viewer.cursor_debounce_ms),
            },
            explorer: ExplorerConfig {
                search_debounce_ms: other
                    .explorer
                    .search_debounce_ms
                    .or(self.explorer.search_debounce_ms),
                page_size: other.explorer.page_size.or(self.explorer.page_size),
            },
            watcher: WatcherConfig {
                enabled: other.watcher.enabled.or(self.watcher.enabled),
                debounce_ms: other.watcher.debounce_ms.or(self.watcher.debounce_ms),
            },
        }
    }

    /// Load the final merged configuration.
    ///
    /// `cli_config_path` is an explicit config file path from `--config`.
    /// `cli_overrides` are partial overrides derived from CLI flags.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> AppConfig {
        let mut config = AppConfig::default();

        // Walk in reverse so that highest-priority (env var) overwrites lower.
        for path in candidate_paths().iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(cli_path) = cli_config_path {
            if let Some(file_cfg) = load_file(cli_path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        config
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    pub fn image_extensions(&self) -> Vec<String> {
        self.extensions
            .image
            .clone()
            .unwrap_or_else(|| owned_list(DEFAULT_IMAGE_EXTENSIONS))
    }

    pub fn video_extensions(&self) -> Vec<String> {
        self.extensions
            .video
            .clone()
            .unwrap_or_else(|| owned_list(DEFAULT_VIDEO_EXTENSIONS))
    }

    pub fn archive_extensions(&self) -> Vec<String> {
        self.extensions
            .archive
            .clone()
            .unwrap_or_else(|| owned_list(DEFAULT_ARCHIVE_EXTENSIONS))
    }

    /// Delay between a cursor move and the viewer being told about it.
    pub fn cursor_debounce(&self) -> Duration {
        Duration::from_millis(
            self.viewer
                .cursor_debounce_ms
                .unwrap_or(DEFAULT_CURSOR_DEBOUNCE_MS),
        )
    }

    /// Quiet period before a search intent is sent.
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(
            self.explorer
                .search_debounce_ms
                .unwrap_or(DEFAULT_SEARCH_DEBOUNCE_MS),
        )
    }

    /// Explorer folders per page (never zero).
    pub fn page_size(&self) -> usize {
        self.explorer.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1)
    }

    /// Whether the watcher is enabled.
    pub fn watcher_enabled(&self) -> bool {
        self.watcher.enabled.unwrap_or(true)
    }

    /// Watcher debounce interval.
    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watcher.debounce_ms.unwrap_or(DEFAULT_WATCH_DEBOUNCE_MS))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
