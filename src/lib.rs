//! Ledger Ingest - statement ingestion core for Chinese banks and payment platforms
//!
//! Turns heterogeneous exports (Alipay CSV, CCB spreadsheets, CMB and BOCOM
//! PDFs) into canonical [`models::TransactionDraft`]s with row-level warnings,
//! and flags bank rows that duplicate payment-platform rows.

pub mod commit;
pub mod config;
pub mod dedup;
pub mod error;
pub mod importers;
pub mod models;

pub use error::{ImportError, Result};
pub use importers::{import_file, parse_bytes, ImportHints, ParseOptions};
pub use models::{ParseResult, ParseWarning, TransactionDraft};
