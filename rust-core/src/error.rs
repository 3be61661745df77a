//! error.rs – единый тип ошибок для keyword-слоя

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`ExcelError`]
pub type Result<T> = std::result::Result<T, ExcelError>;

/// Errors surfaced to the test runner.
#[derive(Debug, Error)]
pub enum ExcelError {
    /// Workbook or sheet could not be created (bad name, duplicate title)
    #[error("Cannot create document: {0}")]
    Creation(String),

    /// Cell reference outside the supported grid or malformed label
    #[error("Invalid cell address: {0}")]
    Address(String),

    /// Reading or writing the file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Document with such id {0} is opened.")]
    DocumentExists(String),

    #[error("Document with such id {0} is not opened yet.")]
    NoSuchDocument(String),

    #[error("No opened documents in cache.")]
    NoOpenedDocuments,

    #[error("Worksheet {0} does not exist.")]
    SheetNotFound(String),

    /// Value cannot be stored in a cell (NaN, infinity)
    #[error("Invalid cell value: {0}")]
    InvalidValue(String),

    /// Package is not a readable XLSX document
    #[error("Malformed document: {0:#}")]
    Format(#[from] anyhow::Error),

    /// Keyword called with wrong arguments
    #[error("{0}")]
    Argument(String),

    #[error("No keyword with name '{0}' found.")]
    UnknownKeyword(String),
}

impl ExcelError {
    pub(crate) fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        ExcelError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn argument<S: Into<String>>(msg: S) -> Self {
        ExcelError::Argument(msg.into())
    }
}
