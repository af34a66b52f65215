// OpenSpace Hub - External Change Watcher
//
// Observes the workspace root for changes the store did not make itself
// (editor saves, terminal commands) and reports them to the artifact
// store, which handles self-write echo suppression. Watcher failures
// are logged and never abort anything — the watcher detects external
// mutation, it does not prevent it.

use crate::config::HubConfig;
use crate::paths::relative_key;
use crate::store::ArtifactStore;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Keep this alive for as long as the workspace should be observed;
/// dropping it stops the watch.
pub struct WorkspaceWatcher {
    _watcher: RecommendedWatcher,
}

/// Paths the watcher never reports: Hub internals, dependency trees,
/// VCS metadata, and in-flight temp files.
pub(crate) fn is_excluded(rel_path: &str) -> bool {
    if rel_path.ends_with(".tmp") {
        return true;
    }
    let mut segments = rel_path.split('/');
    if rel_path.starts_with(".openspace/") || rel_path == ".openspace" {
        return true;
    }
    segments.any(|seg| seg == "node_modules" || seg == ".git")
}

/// Start watching the workspace root, feeding external changes into the
/// store's notification stream with actor "user".
pub fn watch(
    root: &Path,
    store: &Arc<ArtifactStore>,
    config: &HubConfig,
) -> notify::Result<WorkspaceWatcher> {
    let root = root.to_path_buf();
    let store = Arc::clone(store);
    let watch_root = root.clone();

    let mut watcher = RecommendedWatcher::new(
        move |result: Result<Event, notify::Error>| {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("Watcher error: {}", e);
                    return;
                }
            };
            if !matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                return;
            }
            for path in &event.paths {
                let key = relative_key(&root, path);
                if is_excluded(&key) {
                    continue;
                }
                store.notify_external(&key);
            }
        },
        notify::Config::default()
            .with_poll_interval(Duration::from_millis(config.watcher_debounce_ms)),
    )?;

    watcher.watch(&watch_root, RecursiveMode::Recursive)?;
    log::info!("Watching workspace at {:?}", watch_root);
    Ok(WorkspaceWatcher { _watcher: watcher })
}

// ============================================================================
// TESTS
// ============================================================================
