use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating a cell library.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// The library file could not be read.
    #[error("Failed to read library {}: {source}", path.display())]
    Io {
        /// File that failed to open or read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The library file is not valid JSON for the library schema.
    #[error("Invalid library JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The function pattern of a cell does not parse.
    #[error("Cell '{cell}': bad function pattern '{pattern}': {message}")]
    Pattern {
        /// Cell carrying the pattern.
        cell: String,
        /// Pattern text.
        pattern: String,
        /// What went wrong, with the character offset.
        message: String,
    },

    /// A cell definition breaks a library rule.
    #[error("Cell '{cell}' is invalid: {reason}")]
    InvalidCell {
        /// Offending cell.
        cell: String,
        /// Violated rule.
        reason: String,
    },

    /// Two cells share a name.
    #[error("Cell '{0}' is defined more than once")]
    DuplicateCell(String),
}

impl LibraryError {
    pub(crate) fn invalid(cell: &str, reason: impl Into<String>) -> Self {
        Self::InvalidCell {
            cell: cell.to_string(),
            reason: reason.into(),
        }
    }
}
