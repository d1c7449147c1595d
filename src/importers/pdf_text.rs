//! Shared plumbing for statement PDFs: text extraction, line cleanup and
//! record accumulation.
//!
//! Bank PDFs wrap long counterparty names and remarks onto continuation
//! lines. Records are rebuilt by accumulating lines from one record-start
//! line up to the next.

use pdf_extract::extract_text_from_mem;
use tracing::debug;

use super::normalize::normalize_text;
use crate::error::{ImportError, Result};

/// Plain text of every page, pages separated by form feeds
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    extract_text_from_mem(bytes).map_err(|e| ImportError::Pdf(e.to_string()))
}

/// Physical lines as (1-based line number, cleaned text); blank lines dropped
pub fn cleaned_lines(text: &str) -> impl Iterator<Item = (usize, String)> + '_ {
    text.lines().enumerate().filter_map(|(idx, raw)| {
        let line = normalize_text(raw.trim_matches('\u{c}'));
        (!line.is_empty()).then_some((idx + 1, line))
    })
}

/// Lines of one record, joined with single spaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRecord {
    pub line: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccumulatorState {
    AwaitingStart,
    Accumulating(PendingRecord),
}

/// Line-driven state machine: a start line opens a record, other lines
/// extend it, the next start line (or end of input) closes it
#[derive(Debug)]
pub struct LineAccumulator {
    is_start: fn(&str) -> bool,
    state: AccumulatorState,
    records: Vec<PendingRecord>,
}

impl LineAccumulator {
    pub fn new(is_start: fn(&str) -> bool) -> Self {
        Self {
            is_start,
            state: AccumulatorState::AwaitingStart,
            records: Vec::new(),
        }
    }

    pub fn state(&self) -> &AccumulatorState {
        &self.state
    }

    pub fn feed(&mut self, line_no: usize, line: &str) {
        if (self.is_start)(line) {
            let opened = AccumulatorState::Accumulating(PendingRecord {
                line: line_no,
                text: line.to_string(),
            });
            if let AccumulatorState::Accumulating(done) = std::mem::replace(&mut self.state, opened) {
                self.records.push(done);
            }
            return;
        }

        match &mut self.state {
            AccumulatorState::Accumulating(pending) => {
                pending.text.push(' ');
                pending.text.push_str(line);
            }
            AccumulatorState::AwaitingStart => {
                debug!("Ignoring line {} before first record: {}", line_no, line);
            }
        }
    }

    pub fn finish(mut self) -> Vec<PendingRecord> {
        if let AccumulatorState::Accumulating(done) =
            std::mem::replace(&mut self.state, AccumulatorState::AwaitingStart)
        {
            self.records.push(done);
        }
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn starts_with_digit(line: &str) -> bool {
        line.starts_with(|c: char| c.is_ascii_digit())
    }

    #[test]
    fn test_continuation_lines_join_current_record() {
        let mut acc = LineAccumulator::new(starts_with_digit);
        acc.feed(1, "title");
        assert_eq!(acc.state(), &AccumulatorState::AwaitingStart);
        acc.feed(2, "1 first");
        acc.feed(3, "wrapped");
        acc.feed(4, "2 second");
        let records = acc.finish();
        assert_eq!(
            records,
            vec![
                PendingRecord { line: 2, text: "1 first wrapped".into() },
                PendingRecord { line: 4, text: "2 second".into() },
            ]
        );
    }

    #[test]
    fn test_cleaned_lines_keep_physical_numbers() {
        let text = "a\n\n\u{c}  b\u{3000}c \n";
        let lines: Vec<(usize, String)> = cleaned_lines(text).collect();
        assert_eq!(lines, vec![(1, "a".to_string()), (3, "b c".to_string())]);
    }

    #[test]
    fn test_garbage_bytes_are_a_pdf_error() {
        let err = extract_pdf_text(b"not a pdf").unwrap_err();
        assert!(matches!(err, ImportError::Pdf(_)));
    }
}
