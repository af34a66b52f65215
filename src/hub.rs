// OpenSpace Hub - Hub Assembly
//
// Owns the long-lived pieces: config, artifact store, patch engine, and
// command bridge. One Hub per workspace per process; the MCP layer and
// CLI both run against this object. The bridge's pending-command map is
// instance-scoped here, never per-request.

use crate::bridge::CommandBridge;
use crate::config::HubConfig;
use crate::errors::HubResult;
use crate::patch::PatchEngine;
use crate::store::ArtifactStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub struct Hub {
    pub root: PathBuf,
    pub config: HubConfig,
    pub store: Arc<ArtifactStore>,
    pub patch: PatchEngine,
    pub bridge: CommandBridge,
}

impl Hub {
    /// Open a Hub over an existing workspace root.
    pub fn open(root: &Path) -> HubResult<Arc<Self>> {
        let root = root.canonicalize()?;
        let config = HubConfig::load(&root);

        let store = ArtifactStore::open(&root, &config)?;
        let patch = PatchEngine::new(Arc::clone(&store));
        patch.load_versions();

        let bridge = CommandBridge::new(Duration::from_millis(config.bridge_timeout_ms));

        log::info!("Hub open at {:?}", root);
        Ok(Arc::new(Self { root, config, store, patch, bridge }))
    }
}

// ============================================================================
// TESTS
// ============================================================================
