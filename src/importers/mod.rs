// Import module - statement parsers for Alipay, CCB, CMB and BOCOM exports

pub mod aliases;
pub mod alipay_csv;
pub mod assembler;
pub mod bocom_pdf;
pub mod ccb_excel;
pub mod cmb_pdf;
mod file_detector;
pub mod locator;
pub mod normalize;
pub mod pdf_text;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{ImportError, Result};
use crate::models::{ParseResult, Source, SourceType};

pub use file_detector::{infer_source, infer_source_type, ImportHints};

/// Tunables for header location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Physical lines scanned for the header of a delimited export
    pub header_scan_lines: usize,
    /// Sheet rows scanned for the header of a spreadsheet export
    pub sheet_header_scan_rows: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            header_scan_lines: 30,
            sheet_header_scan_rows: 10,
        }
    }
}

/// One extractor for one (institution, container) pair
pub trait StatementParser: Send + Sync {
    fn source(&self) -> Source;
    fn source_type(&self) -> SourceType;
    /// Text that identifies this institution's exports
    fn markers(&self) -> &'static [&'static str];
    fn parse(&self, bytes: &[u8], options: &ParseOptions) -> Result<ParseResult>;
}

impl fmt::Debug for dyn StatementParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StatementParser({} {})", self.source(), self.source_type())
    }
}

struct AlipayCsvParser;
struct CcbExcelParser;
struct CmbPdfParser;
struct BocomPdfParser;

impl StatementParser for AlipayCsvParser {
    fn source(&self) -> Source {
        Source::Alipay
    }
    fn source_type(&self) -> SourceType {
        SourceType::Csv
    }
    fn markers(&self) -> &'static [&'static str] {
        alipay_csv::NATIVE_MARKERS
    }
    fn parse(&self, bytes: &[u8], options: &ParseOptions) -> Result<ParseResult> {
        alipay_csv::parse_alipay_csv(bytes, options)
    }
}

impl StatementParser for CcbExcelParser {
    fn source(&self) -> Source {
        Source::Ccb
    }
    fn source_type(&self) -> SourceType {
        SourceType::Xls
    }
    fn markers(&self) -> &'static [&'static str] {
        &["建设银行", "China Construction Bank"]
    }
    fn parse(&self, bytes: &[u8], options: &ParseOptions) -> Result<ParseResult> {
        ccb_excel::parse_ccb_excel(bytes, options)
    }
}

impl StatementParser for CmbPdfParser {
    fn source(&self) -> Source {
        Source::Cmb
    }
    fn source_type(&self) -> SourceType {
        SourceType::Pdf
    }
    fn markers(&self) -> &'static [&'static str] {
        cmb_pdf::NATIVE_MARKERS
    }
    fn parse(&self, bytes: &[u8], options: &ParseOptions) -> Result<ParseResult> {
        cmb_pdf::parse_cmb_pdf(bytes, options)
    }
}

impl StatementParser for BocomPdfParser {
    fn source(&self) -> Source {
        Source::Bocom
    }
    fn source_type(&self) -> SourceType {
        SourceType::Pdf
    }
    fn markers(&self) -> &'static [&'static str] {
        bocom_pdf::NATIVE_MARKERS
    }
    fn parse(&self, bytes: &[u8], options: &ParseOptions) -> Result<ParseResult> {
        bocom_pdf::parse_bocom_pdf(bytes, options)
    }
}

/// Every registered extractor
pub static PARSERS: &[&dyn StatementParser] = &[
    &AlipayCsvParser,
    &CcbExcelParser,
    &CmbPdfParser,
    &BocomPdfParser,
];

fn find_parser(source: Source, source_type: SourceType) -> Option<&'static dyn StatementParser> {
    PARSERS
        .iter()
        .copied()
        .find(|p| p.source() == source && p.source_type() == source_type)
}

/// Pick exactly one extractor for a buffer
///
/// Explicit hints win over the file name. With only a container type and
/// several candidate institutions, the content decides: the institution
/// whose marker appears first in the text.
pub fn select_parser(
    bytes: &[u8],
    filename: Option<&str>,
    hints: &ImportHints,
) -> Result<&'static dyn StatementParser> {
    let source = hints.source.or_else(|| filename.and_then(infer_source));
    let source_type = hints
        .source_type
        .or_else(|| filename.and_then(infer_source_type));
    let label = filename.unwrap_or("<unnamed buffer>");

    match (source, source_type) {
        (Some(source), Some(source_type)) => find_parser(source, source_type).ok_or(
            ImportError::UnsupportedCombination {
                institution: source,
                source_type,
            },
        ),
        (Some(source), None) => find_parser(source, source.native_type()).ok_or(
            ImportError::UnsupportedCombination {
                institution: source,
                source_type: source.native_type(),
            },
        ),
        (None, Some(source_type)) => {
            let candidates: Vec<&'static dyn StatementParser> = PARSERS
                .iter()
                .copied()
                .filter(|p| p.source_type() == source_type)
                .collect();
            match candidates.as_slice() {
                [] => Err(ImportError::UnrecognizedFile(label.to_string())),
                [only] => Ok(*only),
                _ => sniff(bytes, source_type, &candidates)?
                    .ok_or_else(|| ImportError::UnrecognizedFile(label.to_string())),
            }
        }
        (None, None) => Err(ImportError::UnrecognizedFile(label.to_string())),
    }
}

/// Content-based choice among extractors sharing a container
///
/// Only PDF has several registered institutions; other containers never
/// reach this with more than one candidate.
fn sniff(
    bytes: &[u8],
    source_type: SourceType,
    candidates: &[&'static dyn StatementParser],
) -> Result<Option<&'static dyn StatementParser>> {
    let text = match source_type {
        SourceType::Pdf => pdf_text::extract_pdf_text(bytes)?,
        SourceType::Csv | SourceType::Xls => return Ok(None),
    };

    let chosen = earliest_marker(&text, candidates);
    if let Some(parser) = chosen {
        debug!("Content markers point to {}", parser.source());
    }
    Ok(chosen)
}

/// The candidate whose marker appears first in `text`
fn earliest_marker(
    text: &str,
    candidates: &[&'static dyn StatementParser],
) -> Option<&'static dyn StatementParser> {
    candidates
        .iter()
        .copied()
        .filter_map(|p| {
            p.markers()
                .iter()
                .filter_map(|m| text.find(m))
                .min()
                .map(|pos| (pos, p))
        })
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, p)| p)
}

/// Parse one buffer into drafts
pub fn parse_bytes(
    bytes: &[u8],
    filename: Option<&str>,
    hints: &ImportHints,
    options: &ParseOptions,
) -> Result<ParseResult> {
    let parser = select_parser(bytes, filename, hints)?;
    info!(
        "Importing {} as {} {}",
        filename.unwrap_or("<unnamed buffer>"),
        parser.source(),
        parser.source_type()
    );
    parser.parse(bytes, options)
}

/// Read and parse one file
pub fn import_file<P: AsRef<Path>>(
    path: P,
    hints: &ImportHints,
    options: &ParseOptions,
) -> Result<ParseResult> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let filename = path.to_string_lossy();
    parse_bytes(&bytes, Some(filename.as_ref()), hints, options)
}
