// OpenSpace Hub - Patch Engine
//
// OCC-versioned operation application over the artifact store. Every
// artifact carries a monotonically increasing version (0 = never
// patched); a patch request states the version it expects and is
// rejected with the authoritative current version on mismatch. The
// check-then-apply sequence is linearized behind one apply lock, so two
// concurrent callers at the same base produce exactly one success and
// one conflict — never silent data loss.

use crate::config::VERSIONS_FILE;
use crate::errors::{HubError, HubResult, PatchErrorCode, PatchValidationError};
use crate::paths::{relative_key, resolve_safe_path};
use crate::store::{ArtifactStore, WriteOptions};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

/// A single patch operation. Wire format is tagged on `op` with
/// camelCase fields, matching the tool schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchOp {
    #[serde(rename_all = "camelCase")]
    ReplaceContent { content: String },
    #[serde(rename_all = "camelCase")]
    ReplaceLines { start_line: usize, end_line: usize, content: String },
}

#[derive(Debug, Clone)]
pub struct PatchRequest {
    pub base_version: u64,
    pub actor: crate::store::Actor,
    pub intent: String,
    pub tool_call_id: Option<String>,
    pub ops: Vec<PatchOp>,
}

/// Result of a successful apply.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ApplyOutcome {
    pub version: u64,
    pub bytes: u64,
}

pub struct PatchEngine {
    root: PathBuf,
    store: Arc<ArtifactStore>,
    versions: Mutex<BTreeMap<String, u64>>,
    /// Linearizes OCC check → content write → version persist per engine.
    apply_lock: Mutex<()>,
}

impl PatchEngine {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self {
            root: store.root().to_path_buf(),
            store,
            versions: Mutex::new(BTreeMap::new()),
            apply_lock: Mutex::new(()),
        }
    }

    /// Hydrate the version map from disk. A missing or corrupt file means
    /// "start all versions at 0" — never a fatal error.
    pub fn load_versions(&self) {
        let path = self.root.join(VERSIONS_FILE);
        let loaded: BTreeMap<String, u64> = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(map) => map,
                Err(e) => {
                    log::warn!("Corrupt version map at {:?}: {} — starting at 0", path, e);
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };
        *self.versions.lock().expect("version map poisoned") = loaded;
    }

    /// Snapshot of the full version map, for status and inspection.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.versions.lock().expect("version map poisoned").clone()
    }

    /// Current version of an artifact; 0 if never patched.
    pub fn version(&self, rel_path: &str) -> HubResult<u64> {
        let key = self.key_for(rel_path)?;
        Ok(self.versions.lock().expect("version map poisoned").get(&key).copied().unwrap_or(0))
    }

    /// Apply a patch with the OCC precondition `base_version`.
    pub fn apply(&self, rel_path: &str, req: &PatchRequest) -> HubResult<ApplyOutcome> {
        let key = self.key_for(rel_path)?;
        let guard = self.apply_lock.lock().expect("apply lock poisoned");

        let current = self.versions.lock().expect("version map poisoned").get(&key).copied().unwrap_or(0);
        if req.base_version != current {
            return Err(HubError::Conflict { current_version: current, file_path: key });
        }
        self.apply_locked(&key, current, req, guard)
    }

    /// Apply without an OCC precondition: the request is validated and
    /// executed against whatever the current version is. Backs file.patch,
    /// where callers do not track versions.
    pub fn apply_unconditional(&self, rel_path: &str, req: &PatchRequest) -> HubResult<ApplyOutcome> {
        let key = self.key_for(rel_path)?;
        let guard = self.apply_lock.lock().expect("apply lock poisoned");
        let current = self.versions.lock().expect("version map poisoned").get(&key).copied().unwrap_or(0);
        self.apply_locked(&key, current, req, guard)
    }

    fn apply_locked(
        &self,
        key: &str,
        current: u64,
        req: &PatchRequest,
        _guard: MutexGuard<'_, ()>,
    ) -> HubResult<ApplyOutcome> {
        validate_ops(&req.ops)?;

        let new_content = match &req.ops[0] {
            PatchOp::ReplaceContent { content } => content.clone(),
            PatchOp::ReplaceLines { .. } => {
                let existing = self.store.read(key).unwrap_or_default();
                let existing = String::from_utf8_lossy(&existing).into_owned();
                apply_line_ops(&existing, &req.ops)?
            }
        };

        self.store.write(
            key,
            new_content.as_bytes(),
            WriteOptions {
                actor: req.actor,
                reason: req.intent.clone(),
                tool_call_id: req.tool_call_id.clone(),
            },
        )?;

        let new_version = current + 1;
        {
            let mut versions = self.versions.lock().expect("version map poisoned");
            versions.insert(key.to_string(), new_version);
            // Persist before returning: a crash after a successful apply
            // must not leave the map behind the on-disk content.
            self.persist_versions(&versions)?;
        }

        Ok(ApplyOutcome { version: new_version, bytes: new_content.len() as u64 })
    }

    fn key_for(&self, rel_path: &str) -> HubResult<String> {
        let abs = resolve_safe_path(&self.root, rel_path)?;
        Ok(relative_key(&self.root, &abs))
    }

    fn persist_versions(&self, versions: &BTreeMap<String, u64>) -> HubResult<()> {
        let path = self.root.join(VERSIONS_FILE);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(versions).map_err(std::io::Error::other)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

// ============================================================================
// OP PARSING + VALIDATION
// ============================================================================

/// Parse raw JSON ops into typed operations, reporting unsupported op
/// tags and malformed shapes with machine-readable codes.
pub fn parse_ops(raw: &[Value]) -> Result<Vec<PatchOp>, PatchValidationError> {
    if raw.is_empty() {
        return Err(PatchValidationError::new(
            PatchErrorCode::NoOps,
            "ops",
            "request contained no operations; supply exactly one replace_content op or one or more replace_lines ops".to_string(),
        ));
    }

    let mut ops = Vec::with_capacity(raw.len());
    for (i, value) in raw.iter().enumerate() {
        let location = format!("ops[{i}]");
        let tag = value.get("op").and_then(|v| v.as_str()).unwrap_or("");
        match tag {
            "replace_content" | "replace_lines" => {}
            other => {
                return Err(PatchValidationError::new(
                    PatchErrorCode::UnsupportedOp,
                    &location,
                    format!("unsupported op '{other}'; supported ops are replace_content and replace_lines"),
                ));
            }
        }
        let op: PatchOp = serde_json::from_value(value.clone()).map_err(|e| {
            PatchValidationError::new(
                PatchErrorCode::InvalidOp,
                &location,
                format!("malformed {tag} op: {e}"),
            )
        })?;
        ops.push(op);
    }
    Ok(ops)
}

/// Shape check: exactly one replace_content, or one-or-more replace_lines.
fn validate_ops(ops: &[PatchOp]) -> Result<(), PatchValidationError> {
    if ops.is_empty() {
        return Err(PatchValidationError::new(
            PatchErrorCode::NoOps,
            "ops",
            "request contained no operations; supply exactly one replace_content op or one or more replace_lines ops".to_string(),
        ));
    }

    let content_ops = ops
        .iter()
        .filter(|op| matches!(op, PatchOp::ReplaceContent { .. }))
        .count();
    if content_ops > 0 && (content_ops != 1 || ops.len() != 1) {
        return Err(PatchValidationError::new(
            PatchErrorCode::InvalidOp,
            "ops",
            "replace_content must be the only operation in a request".to_string(),
        ));
    }

    for (i, op) in ops.iter().enumerate() {
        if let PatchOp::ReplaceLines { start_line, end_line, .. } = op {
            if start_line > end_line {
                return Err(PatchValidationError::new(
                    PatchErrorCode::InvalidOp,
                    &format!("ops[{i}]"),
                    format!("startLine {start_line} is greater than endLine {end_line}"),
                ));
            }
        }
    }
    Ok(())
}

/// Apply replace_lines ops to `content`. All ranges are bounds-checked
/// against the original line count before any op is applied; ops are
/// then applied in descending startLine order so earlier edits cannot
/// shift not-yet-applied ranges.
fn apply_line_ops(content: &str, ops: &[PatchOp]) -> Result<String, PatchValidationError> {
    let had_trailing_newline = content.ends_with('\n');
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
    let line_count = lines.len();

    let mut ranges: Vec<(usize, usize, &str)> = Vec::with_capacity(ops.len());
    for (i, op) in ops.iter().enumerate() {
        let PatchOp::ReplaceLines { start_line, end_line, content } = op else {
            return Err(PatchValidationError::new(
                PatchErrorCode::InvalidOp,
                &format!("ops[{i}]"),
                "replace_content cannot be mixed with replace_lines".to_string(),
            ));
        };
        if *end_line >= line_count {
            return Err(PatchValidationError::new(
                PatchErrorCode::OutOfBounds,
                &format!("ops[{i}]"),
                format!(
                    "line range {start_line}-{end_line} is out of bounds for a {line_count}-line file (lines are zero-indexed)"
                ),
            ));
        }
        ranges.push((*start_line, *end_line, content));
    }

    ranges.sort_by(|a, b| b.0.cmp(&a.0));
    for (start, end, replacement) in ranges {
        let replacement_lines: Vec<String> = replacement.split('\n').map(str::to_string).collect();
        lines.splice(start..=end, replacement_lines);
    }

    let mut result = lines.join("\n");
    if had_trailing_newline && !result.is_empty() {
        result.push('\n');
    }
    Ok(result)
}

// ============================================================================
// TESTS
// ============================================================================
