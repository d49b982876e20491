use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level settings container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TrailSettings {
    #[serde(default)]
    pub timing: TimingSettings,
    #[serde(default)]
    pub markers: MarkerSettings,
    #[serde(default)]
    pub host: HostSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

/// Debounce windows and polling cadence, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingSettings {
    pub selection_debounce_ms: u64,
    pub render_debounce_ms: u64,
    pub container_poll_ms: u64,
    pub highlight_flash_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            selection_debounce_ms: 80,
            render_debounce_ms: 120,
            container_poll_ms: 800,
            highlight_flash_ms: 900,
        }
    }
}

impl TimingSettings {
    pub fn selection_debounce(&self) -> Duration {
        Duration::from_millis(self.selection_debounce_ms)
    }

    pub fn render_debounce(&self) -> Duration {
        Duration::from_millis(self.render_debounce_ms)
    }

    pub fn container_poll(&self) -> Duration {
        // A zero period would make tokio's interval panic.
        Duration::from_millis(self.container_poll_ms.max(1))
    }

    pub fn highlight_flash(&self) -> Duration {
        Duration::from_millis(self.highlight_flash_ms)
    }
}

/// Scroll-rail marker settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MarkerSettings {
    /// Upper clamp for marker positions so they stay on the visible track.
    pub max_percent: f64,
    #[serde(default = "default_true")]
    pub verify_fingerprints: bool,
}

fn default_true() -> bool {
    true
}

impl Default for MarkerSettings {
    fn default() -> Self {
        Self {
            max_percent: 0.995,
            verify_fingerprints: true,
        }
    }
}

/// Attribute names and tags the host page uses to mark up its transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HostSettings {
    pub message_id_attribute: String,
    pub role_attribute: String,
    pub block_tags: Vec<String>,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            message_id_attribute: "data-message-id".to_string(),
            role_attribute: "data-message-author-role".to_string(),
            block_tags: ["p", "li", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    pub enabled: bool,
    /// Key of the record holding every conversation's bookmark list.
    pub namespace: String,
    /// SQLite file; `None` uses the platform data directory.
    pub database_path: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "prompttrail_bookmarks_v2".to_string(),
            database_path: None,
        }
    }
}
