// OpenSpace Hub - Error Types
//
// One error enum for the core subsystems plus a machine-readable patch
// validation error that crosses the tool boundary intact: the agent
// gets a stable code, a location, and a hint it can act on.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub type HubResult<T> = Result<T, HubError>;

/// Stable codes for patch validation failures. Serialized (and
/// displayed) in SCREAMING_SNAKE_CASE as part of the tool contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatchErrorCode {
    NoOps,
    UnsupportedOp,
    InvalidOp,
    OutOfBounds,
}

impl fmt::Display for PatchErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PatchErrorCode::NoOps => "NO_OPS",
            PatchErrorCode::UnsupportedOp => "UNSUPPORTED_OP",
            PatchErrorCode::InvalidOp => "INVALID_OP",
            PatchErrorCode::OutOfBounds => "OUT_OF_BOUNDS",
        };
        f.write_str(s)
    }
}

/// A rejected patch request. `location` pinpoints the offending op
/// (e.g. "ops[2]"), `hint` says what to fix.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{code} at {location}: {hint}")]
pub struct PatchValidationError {
    pub code: PatchErrorCode,
    pub location: String,
    pub hint: String,
}

impl PatchValidationError {
    pub fn new(code: PatchErrorCode, location: &str, hint: String) -> Self {
        Self { code, location: location.to_string(), hint }
    }
}

#[derive(Debug, Error)]
pub enum HubError {
    #[error("path '{0}' resolves outside the workspace root")]
    PathTraversal(String),

    #[error("path '{0}' escapes the workspace root")]
    PathEscape(String),

    /// OCC rejection. Carries the authoritative current version so the
    /// caller can re-read and retry.
    #[error("version conflict on {file_path}: current version is {current_version}")]
    Conflict { current_version: u64, file_path: String },

    #[error(transparent)]
    PatchValidation(#[from] PatchValidationError),

    #[error("pattern '{0}' rejected: quantified group containing a quantifier")]
    UnsafePattern(String),

    #[error("invalid regex: {0}")]
    InvalidRegex(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_render_screaming_snake() {
        assert_eq!(PatchErrorCode::NoOps.to_string(), "NO_OPS");
        assert_eq!(PatchErrorCode::UnsupportedOp.to_string(), "UNSUPPORTED_OP");
        assert_eq!(PatchErrorCode::InvalidOp.to_string(), "INVALID_OP");
        assert_eq!(PatchErrorCode::OutOfBounds.to_string(), "OUT_OF_BOUNDS");
    }

    #[test]
    fn error_codes_serialize_like_display() {
        let json = serde_json::to_string(&PatchErrorCode::OutOfBounds).unwrap();
        assert_eq!(json, "\"OUT_OF_BOUNDS\"");
    }

    #[test]
    fn validation_error_display_carries_location_and_hint() {
        let err = PatchValidationError::new(
            PatchErrorCode::OutOfBounds,
            "ops[1]",
            "line range 5-9 is out of bounds".to_string(),
        );
        let text = err.to_string();
        assert!(text.contains("OUT_OF_BOUNDS"));
        assert!(text.contains("ops[1]"));
        assert!(text.contains("5-9"));
    }

    #[test]
    fn conflict_display_names_file_and_version() {
        let err = HubError::Conflict { current_version: 3, file_path: "a.txt".to_string() };
        let text = err.to_string();
        assert!(text.contains("a.txt"));
        assert!(text.contains('3'));
    }
}
