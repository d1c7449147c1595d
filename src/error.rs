//! Error handling for the ingestion core
//!
//! Only whole-batch failures live here. Row-level problems are reported as
//! [`crate::models::ParseWarning`] and never abort a parse.

use thiserror::Error;

use crate::models::{CanonicalField, Source, SourceType};

/// Fatal errors: the file yields no drafts at all
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("unrecognized file: {0}")]
    UnrecognizedFile(String),

    #[error("unsupported combination: {source_type} export from {institution}")]
    UnsupportedCombination {
        institution: Source,
        source_type: SourceType,
    },

    #[error("header row not found within the first {scanned} lines")]
    HeaderNotFound { scanned: usize },

    #[error("required column for {0} missing from header")]
    MissingColumn(CanonicalField),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("pdf error: {0}")]
    Pdf(String),

    #[error("csv error")]
    Csv(#[from] csv::Error),

    #[error("io error")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the ingestion core
pub type Result<T> = std::result::Result<T, ImportError>;
