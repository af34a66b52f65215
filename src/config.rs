// OpenSpace Hub - Configuration
//
// Tunables for the bridge, store, watcher, and search tools. Loaded from
// <workspace>/.openspace/hub.json when present, defaults otherwise.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Internal state directory under the workspace root.
pub const OPENSPACE_DIR: &str = ".openspace";
/// Artifact subsystem home: history/ + events.ndjson.
pub const ARTIFACTS_DIR: &str = ".openspace/artifacts";
/// Append-only audit log, newline-delimited JSON.
pub const EVENTS_FILE: &str = ".openspace/artifacts/events.ndjson";
/// Rolling backup tree, one directory per artifact.
pub const HISTORY_DIR: &str = ".openspace/artifacts/history";
/// Patch engine version map, rewritten in full per successful apply.
pub const VERSIONS_FILE: &str = ".openspace/patch-versions.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Bridge round-trip timeout in milliseconds.
    pub bridge_timeout_ms: u64,
    /// Rolling backups kept per artifact.
    pub history_limit: usize,
    /// Watcher poll/debounce interval.
    pub watcher_debounce_ms: u64,
    /// Self-write echo suppression window. Must outlast the watcher
    /// debounce or the store's own writes leak back as user changes.
    pub echo_window_ms: u64,
    /// file.search result cap.
    pub search_max_results: usize,
    /// file.read refuses files larger than this.
    pub max_read_bytes: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bridge_timeout_ms: 30_000,
            history_limit: 20,
            watcher_debounce_ms: 500,
            echo_window_ms: 1_500,
            search_max_results: 200,
            max_read_bytes: 2_000_000,
        }
    }
}

impl HubConfig {
    /// Load from `<root>/.openspace/hub.json`, falling back to defaults.
    /// A corrupt config file is a warning, never a fatal error.
    pub fn load(root: &Path) -> Self {
        let path = root.join(OPENSPACE_DIR).join("hub.json");
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("Invalid config at {:?}: {} — using defaults", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Cannot read config at {:?}: {} — using defaults", path, e);
                Self::default()
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
