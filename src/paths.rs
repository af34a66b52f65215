// OpenSpace Hub - Path Safety Resolver
//
// Resolves agent-supplied paths against the workspace root and rejects
// anything that lands outside it. Two fidelity levels:
//   - resolve_safe_path: pure lexical join + normalize, no disk access.
//     Used by the patch engine and inline tool code.
//   - resolve_real_path: additionally resolves symlinks via real-path
//     lookup (walking up to the nearest existing ancestor for files that
//     do not exist yet) before the containment check. Defeats
//     symlink-escape attacks the lexical resolver cannot see.

use crate::errors::{HubError, HubResult};
use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path: drop `.`, fold `..` into its parent.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    // Nothing left to pop — keep the parent so the result
                    // stays outside root and fails containment.
                    out.push("..");
                }
            }
            Component::Normal(c) => out.push(c),
        }
    }
    out
}

fn contains(root: &Path, candidate: &Path) -> bool {
    candidate == root || candidate.starts_with(root)
}

/// Fast resolver: join `candidate` onto `root` and reject escapes.
/// `.` (and the empty string) resolve to the root itself. Absolute
/// candidates are accepted only when they already live under the root.
pub fn resolve_safe_path(root: &Path, candidate: &str) -> HubResult<PathBuf> {
    let root = normalize(root);
    if candidate.is_empty() || candidate == "." {
        return Ok(root);
    }

    let joined = {
        let p = Path::new(candidate);
        if p.is_absolute() { p.to_path_buf() } else { root.join(p) }
    };
    let resolved = normalize(&joined);

    if contains(&root, &resolved) {
        Ok(resolved)
    } else {
        Err(HubError::PathTraversal(candidate.to_string()))
    }
}

/// Hardened resolver: real-path resolution before the containment check.
///
/// The target usually does not exist yet (new artifacts), so this walks
/// up to the nearest existing ancestor, canonicalizes it, then re-appends
/// the non-existing suffix. Any `..` remaining in the suffix is rejected
/// outright.
pub fn resolve_real_path(root: &Path, candidate: &str) -> HubResult<PathBuf> {
    let canonical_root = root
        .canonicalize()
        .map_err(|_| HubError::PathTraversal(candidate.to_string()))?;

    let lexical = resolve_safe_path(&canonical_root, candidate)?;

    // Nearest existing ancestor of the lexical resolution.
    let mut existing = lexical.clone();
    let mut suffix: Vec<std::ffi::OsString> = Vec::new();
    while !existing.exists() {
        match (existing.file_name(), existing.parent()) {
            (Some(name), Some(parent)) => {
                suffix.push(name.to_os_string());
                existing = parent.to_path_buf();
            }
            _ => return Err(HubError::PathTraversal(candidate.to_string())),
        }
    }

    let mut real = existing
        .canonicalize()
        .map_err(|_| HubError::PathTraversal(candidate.to_string()))?;
    for part in suffix.iter().rev() {
        if part == ".." {
            return Err(HubError::PathTraversal(candidate.to_string()));
        }
        real.push(part);
    }

    if contains(&canonical_root, &real) {
        Ok(real)
    } else {
        Err(HubError::PathTraversal(candidate.to_string()))
    }
}

/// Workspace-relative form of an absolute path, with forward slashes.
/// Identity key for audit events, version map entries, and echo markers.
pub fn relative_key(root: &Path, abs: &Path) -> String {
    abs.strip_prefix(root)
        .map(|p| {
            p.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_else(|_| abs.to_string_lossy().into_owned())
}

// ============================================================================
// TESTS
// ============================================================================
