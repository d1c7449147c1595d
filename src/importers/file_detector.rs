use once_cell::sync::Lazy;
use std::path::Path;
use tracing::debug;

use crate::models::{Source, SourceType};

/// Explicit `(source, sourceType)` overrides supplied by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportHints {
    pub source: Option<Source>,
    pub source_type: Option<SourceType>,
}

impl ImportHints {
    pub fn new(source: Option<Source>, source_type: Option<SourceType>) -> Self {
        Self { source, source_type }
    }
}

/// Institution names as they appear in exported file names, native and short code
const FILENAME_ALIASES: &[(&str, Source)] = &[
    ("支付宝", Source::Alipay),
    ("alipay", Source::Alipay),
    ("中国建设银行", Source::Ccb),
    ("建设银行", Source::Ccb),
    ("建行", Source::Ccb),
    ("ccb", Source::Ccb),
    ("招商银行", Source::Cmb),
    ("招行", Source::Cmb),
    ("cmb", Source::Cmb),
    ("交通银行", Source::Bocom),
    ("交行", Source::Bocom),
    ("bankcomm", Source::Bocom),
    ("bocom", Source::Bocom),
];

static SORTED_FILENAME_ALIASES: Lazy<Vec<(&'static str, Source)>> = Lazy::new(|| {
    let mut aliases = FILENAME_ALIASES.to_vec();
    aliases.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));
    aliases
});

/// Container type from the file extension
///
/// - `.csv` → delimited text
/// - `.xls`, `.xlsx` → spreadsheet
/// - `.pdf` → PDF text
pub fn infer_source_type(filename: &str) -> Option<SourceType> {
    let inferred = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(SourceType::from_extension);
    debug!("Container type from '{}': {:?}", filename, inferred);
    inferred
}

/// Institution from an alias contained in the file name (directories are ignored)
pub fn infer_source(filename: &str) -> Option<Source> {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename)
        .to_lowercase();

    let inferred = SORTED_FILENAME_ALIASES
        .iter()
        .find(|(alias, _)| name.contains(alias))
        .map(|(_, source)| *source);
    debug!("Institution from '{}': {:?}", filename, inferred);
    inferred
}
