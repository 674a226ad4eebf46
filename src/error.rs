// ❗ Error Types - one enum for the whole import run
//
// Every fatal condition aborts the run. Nothing here is retried.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while validating, decoding or persisting an SKS import
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== Input structure =====
    #[error("input directory {} contains no files", .0.display())]
    EmptyInputDirectory(PathBuf),

    #[error("input structure is invalid: {0}")]
    InvalidInputStructure(String),

    // ===== Record decoding =====
    /// Unknown record type, unknown operation code or unparsable date.
    /// Carries the offending line so the feed can be inspected.
    #[error("malformed record at line {line_number}: {reason}. line={line}")]
    MalformedRecord {
        line_number: usize,
        reason: String,
        line: String,
    },

    // ===== Collaborators =====
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("audit logging failed: {0}")]
    Audit(String),
}

impl ImportError {
    pub fn malformed(line_number: usize, reason: impl Into<String>, line: &str) -> Self {
        ImportError::MalformedRecord {
            line_number,
            reason: reason.into(),
            line: line.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ImportError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors caused by the content of the input file itself
    pub fn is_malformed_record(&self) -> bool {
        matches!(self, ImportError::MalformedRecord { .. })
    }
}

impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => ImportError::Persistence(msg),
            other => ImportError::Persistence(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::Audit(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_record_message_contains_line() {
        let err = ImportError::malformed(7, "unknown record type", "xyz123");
        let msg = err.to_string();

        assert!(err.is_malformed_record());
        assert!(msg.contains("line 7"));
        assert!(msg.contains("line=xyz123"));
    }

    #[test]
    fn test_sqlite_error_maps_to_persistence() {
        let err: ImportError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, ImportError::Persistence(_)));
    }
}
