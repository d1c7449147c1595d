//! Encoding detection and header-row location for text exports
//!
//! Exports from Chinese institutions arrive either as UTF-8 (with or without
//! BOM) or as GBK/GB18030. A strict UTF-8 decode that happens to succeed on
//! GBK bytes is possible, so a successful decode is only trusted when it
//! contains one of the caller's native-language marker tokens.

use encoding_rs::{GB18030, UTF_8};
use tracing::debug;

use crate::error::{ImportError, Result};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Decoded text plus the encoding that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding: &'static str,
}

/// Decode bytes as UTF-8, falling back to GB18030.
///
/// The fallback is taken when the strict UTF-8 decode fails, or when it
/// succeeds without containing any of `markers` while the GB18030 reading does.
pub fn decode_text(bytes: &[u8], markers: &[&str]) -> DecodedText {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let has_marker = |text: &str| markers.iter().any(|m| text.contains(m));

    let utf8 = UTF_8.decode_without_bom_handling_and_without_replacement(body);
    if let Some(text) = &utf8 {
        if has_marker(text) {
            return DecodedText {
                text: text.to_string(),
                encoding: UTF_8.name(),
            };
        }
    }

    let (legacy, had_errors) = GB18030.decode_without_bom_handling(body);
    if utf8.is_none() || has_marker(&legacy) {
        if had_errors {
            debug!("GB18030 decode replaced malformed sequences");
        }
        return DecodedText {
            text: legacy.into_owned(),
            encoding: GB18030.name(),
        };
    }

    // Valid UTF-8 without markers: keep it, header location decides
    DecodedText {
        text: utf8.map(|t| t.into_owned()).unwrap_or_default(),
        encoding: UTF_8.name(),
    }
}

/// Index (0-based) of the first line within `window` lines that contains at
/// least two distinct `markers`
pub fn locate_header(text: &str, markers: &[&str], window: usize) -> Result<usize> {
    for (idx, line) in text.lines().take(window).enumerate() {
        let hits = markers.iter().filter(|m| line.contains(*m)).count();
        if hits >= 2 {
            debug!("Header found on line {} ({} markers)", idx + 1, hits);
            return Ok(idx);
        }
    }
    Err(ImportError::HeaderNotFound { scanned: window })
}
