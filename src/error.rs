use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BuildError>;

/// Why a single setting failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The raw value cannot be coerced to the setting's declared type.
    TypeMismatch,
    /// The coerced value falls outside the declared [minimum, maximum].
    OutOfRange,
    /// The value is not a member of the setting's allowed-value set.
    InvalidEnumValue,
}

/// One offending setting from a validation pass.
///
/// Failures are collected, not short-circuited, so a build reports every
/// bad key in a single round-trip.
#[derive(Debug, Clone)]
pub struct ValidationFailure {
    pub key: String,
    pub kind: FailureKind,
    pub detail: String,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.detail)
    }
}

fn join_failures(failures: &[ValidationFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("  {}", f))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Error)]
pub enum BuildError {
    /// Recoverable: callers may degrade to an empty schema and validate
    /// nothing rather than abort the build.
    #[error("constraint schema unavailable: {0}")]
    SchemaUnavailable(String),

    #[error("unknown preset: {0}")]
    UnknownPreset(String),

    #[error("no build source selected; use a preset, an extraction file, or manual settings")]
    NoSourceSelected,

    #[error("ambiguous build sources: {0}")]
    AmbiguousSource(String),

    #[error("malformed extraction: {0}")]
    MalformedExtraction(String),

    #[error("malformed manual settings: {0}")]
    MalformedManualSettings(String),

    #[error("validation failed for {} setting(s):\n{}", .0.len(), join_failures(.0))]
    Validation(Vec<ValidationFailure>),

    #[error("failed to write archive {}: {source}", .path.display())]
    ArchiveWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_lists_every_key() {
        let err = BuildError::Validation(vec![
            ValidationFailure {
                key: "layer_height".to_string(),
                kind: FailureKind::OutOfRange,
                detail: "value 9 above maximum 2".to_string(),
            },
            ValidationFailure {
                key: "support_enable".to_string(),
                kind: FailureKind::TypeMismatch,
                detail: "cannot coerce \"maybe\" to bool".to_string(),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("2 setting(s)"), "got: {}", msg);
        assert!(msg.contains("layer_height"), "got: {}", msg);
        assert!(msg.contains("support_enable"), "got: {}", msg);
    }

    #[test]
    fn test_archive_write_keeps_cause() {
        let err = BuildError::ArchiveWrite {
            path: PathBuf::from("/tmp/out.curaprofile"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("out.curaprofile"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
