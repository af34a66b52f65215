// OpenSpace Hub - Workspace Search
//
// Regex search over workspace files for the file.search tool. The
// nested-quantifier guard predates the move to a linear-time regex
// engine and is kept as contract behavior: it is a heuristic, not a
// proof of ReDoS-freedom.

use crate::config::{HubConfig, OPENSPACE_DIR};
use crate::errors::{HubError, HubResult};
use crate::paths::{relative_key, resolve_real_path};
use crate::sensitive::is_sensitive;
use ignore::WalkBuilder;
use regex::RegexBuilder;
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchMatch {
    pub path: String,
    pub line: usize,
    pub text: String,
}

/// Heuristic rejection of patterns with a quantified group that itself
/// contains a quantifier, e.g. `(a+)+` or `(?:.*)*`.
pub fn is_unsafe_pattern(pattern: &str) -> bool {
    static NESTED: OnceLock<regex::Regex> = OnceLock::new();
    let nested = NESTED.get_or_init(|| {
        regex::Regex::new(r"\([^()]*[+*{][^()]*\)\s*[+*{]").expect("guard regex is valid")
    });
    nested.is_match(pattern)
}

/// Search files under `rel_dir` (relative to the workspace root) for
/// `pattern`. Sensitive files and Hub internals are never searched.
pub fn search(
    root: &Path,
    rel_dir: &str,
    pattern: &str,
    case_insensitive: bool,
    config: &HubConfig,
) -> HubResult<Vec<SearchMatch>> {
    if is_unsafe_pattern(pattern) {
        return Err(HubError::UnsafePattern(pattern.to_string()));
    }
    let re = RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| HubError::InvalidRegex(e.to_string()))?;

    let dir = resolve_real_path(root, rel_dir)?;
    let mut matches = Vec::new();

    let walker = WalkBuilder::new(&dir)
        .hidden(false)
        .git_ignore(true)
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            name != OPENSPACE_DIR
                && name != "node_modules"
                && name != ".git"
                && !name.ends_with(".tmp")
        })
        .build();

    'files: for entry in walker {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let key = relative_key(root, entry.path());
        if is_sensitive(&key) {
            continue;
        }
        // Binary files (or anything not valid UTF-8) are skipped.
        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        for (idx, line) in content.lines().enumerate() {
            if re.is_match(line) {
                matches.push(SearchMatch {
                    path: key.clone(),
                    line: idx + 1,
                    text: line.trim_end().to_string(),
                });
                if matches.len() >= config.search_max_results {
                    break 'files;
                }
            }
        }
    }

    matches.sort_by(|a, b| a.path.cmp(&b.path).then(a.line.cmp(&b.line)));
    Ok(matches)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "fn alpha() {}\nfn beta() {}\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "Alpha docs\n").unwrap();
        std::fs::write(dir.path().join(".env"), "TOKEN=abc\n").unwrap();
        dir
    }

    #[test]
    fn finds_matches_with_line_numbers() {
        let dir = workspace();
        let config = HubConfig::default();
        let matches = search(dir.path(), ".", "fn beta", false, &config).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].path, "src/lib.rs");
        assert_eq!(matches[0].line, 2);
    }

    #[test]
    fn case_insensitive_option() {
        let dir = workspace();
        let config = HubConfig::default();
        let matches = search(dir.path(), ".", "alpha", true, &config).unwrap();
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn sensitive_files_never_searched() {
        let dir = workspace();
        let config = HubConfig::default();
        let matches = search(dir.path(), ".", "TOKEN", false, &config).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn unsafe_patterns_rejected() {
        assert!(is_unsafe_pattern("(a+)+"));
        assert!(is_unsafe_pattern("(.*)*"));
        assert!(is_unsafe_pattern("(x{2,}){3}"));
        assert!(!is_unsafe_pattern("fn \\w+"));
        assert!(!is_unsafe_pattern("(abc)+"));

        let dir = workspace();
        let config = HubConfig::default();
        let err = search(dir.path(), ".", "(a+)+", false, &config).unwrap_err();
        assert!(matches!(err, HubError::UnsafePattern(_)));
    }

    #[test]
    fn invalid_regex_rejected() {
        let dir = workspace();
        let config = HubConfig::default();
        let err = search(dir.path(), ".", "[unclosed", false, &config).unwrap_err();
        assert!(matches!(err, HubError::InvalidRegex(_)));
    }

    #[test]
    fn result_cap_honored() {
        let dir = workspace();
        let mut config = HubConfig::default();
        config.search_max_results = 1;
        let matches = search(dir.path(), ".", "fn", false, &config).unwrap();
        assert_eq!(matches.len(), 1);
    }
}
