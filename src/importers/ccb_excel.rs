//! China Construction Bank (建设银行) account-detail export, XLS or XLSX
//!
//! Layout of the first sheet:
//! - a few metadata rows (title, `卡号：6217…`, query period)
//! - the header row (序号, 摘要, 币别, 钞汇, 交易日期, 交易金额, 账户余额, …)
//! - one transaction per row, signed amount (negative = outflow)

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Cursor;
use tracing::{debug, info};

use super::aliases::{normalize_label, AliasTable};
use super::assembler::DraftAssembler;
use super::normalize::{excel_serial_to_datetime, normalize_account, synthesize_account_name};
use super::ParseOptions;
use crate::error::{ImportError, Result};
use crate::models::{CanonicalField, ParseResult, RawRow, RawValue, Source, SourceType};

const DATE_MARKERS: &[&str] = &["日期", "时间", "date"];
const AMOUNT_MARKERS: &[&str] = &["金额", "amount"];

static ACCOUNT_WATERMARK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:卡号|账号|帐号|账户)\s*[:：]?\s*([0-9][0-9 *]{7,}[0-9])")
        .expect("account watermark regex")
});

/// Parse a CCB spreadsheet from memory
pub fn parse_ccb_excel(bytes: &[u8], options: &ParseOptions) -> Result<ParseResult> {
    info!("Parsing CCB spreadsheet ({} bytes)", bytes.len());

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ImportError::Spreadsheet(format!("cannot open workbook: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ImportError::Spreadsheet("workbook has no sheets".to_string()))?
        .map_err(|e| ImportError::Spreadsheet(format!("cannot read first sheet: {}", e)))?;

    // rows() starts at the first used cell, not necessarily A1
    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let grid: Vec<Vec<Data>> = range.rows().map(|row| row.to_vec()).collect();

    parse_ccb_grid(&grid, first_row, options)
}

/// Grid-level parse; `first_row` is the 0-based sheet row of `grid[0]`
pub fn parse_ccb_grid(grid: &[Vec<Data>], first_row: usize, options: &ParseOptions) -> Result<ParseResult> {
    let window = options.sheet_header_scan_rows;
    let header_idx = grid
        .iter()
        .take(window)
        .position(|row| is_header_row(row))
        .ok_or(ImportError::HeaderNotFound { scanned: window })?;

    let labels: Vec<String> = grid[header_idx]
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();
    debug!("CCB header on sheet row {}: {:?}", first_row + header_idx + 1, labels);

    let aliases = AliasTable::for_source(Source::Ccb);
    for required in [CanonicalField::OccurredAt, CanonicalField::Amount] {
        if !aliases.covers(labels.iter().map(|l| l.as_str()), required) {
            return Err(ImportError::MissingColumn(required));
        }
    }

    let account_name = find_account_number(&grid[..header_idx])
        .and_then(|number| synthesize_account_name(Source::Ccb, &number));
    if let Some(name) = &account_name {
        debug!("CCB statement account: {}", name);
    }

    let mut assembler = DraftAssembler::new(Source::Ccb, SourceType::Xls).with_account_name(account_name);

    for (offset, cells) in grid.iter().enumerate().skip(header_idx + 1) {
        let filled = cells.iter().filter(|c| !is_blank(c)).count();
        if filled < 2 {
            continue;
        }

        let mut row = RawRow::new(first_row + offset + 1);
        for (label, cell) in labels.iter().zip(cells) {
            if label.is_empty() {
                continue;
            }
            row.push(label.as_str(), to_raw_value(cell));
        }
        assembler.push(&row);
    }

    let result = assembler.finish();
    info!(
        "Parsed {} CCB drafts ({} warnings)",
        result.row_count,
        result.warnings.len()
    );
    Ok(result)
}

fn is_header_row(row: &[Data]) -> bool {
    let labels: Vec<String> = row
        .iter()
        .filter_map(|cell| match cell {
            Data::String(s) => Some(normalize_label(s)),
            _ => None,
        })
        .collect();
    let has = |markers: &[&str]| labels.iter().any(|l| markers.iter().any(|m| l.contains(m)));
    has(DATE_MARKERS) && has(AMOUNT_MARKERS)
}

/// First labeled account number in the metadata rows, digits and mask only
fn find_account_number(metadata: &[Vec<Data>]) -> Option<String> {
    metadata.iter().flatten().find_map(|cell| match cell {
        Data::String(s) => ACCOUNT_WATERMARK
            .captures(s)
            .and_then(|caps| normalize_account(&caps[1])),
        _ => None,
    })
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn to_raw_value(cell: &Data) -> RawValue {
    match cell {
        Data::String(s) => RawValue::Text(s.clone()),
        Data::Float(f) => RawValue::Number(*f),
        Data::Int(i) => RawValue::Number(*i as f64),
        Data::Bool(b) => RawValue::Text(b.to_string()),
        Data::DateTime(dt) => match excel_serial_to_datetime(dt.as_f64()) {
            Some(ts) => RawValue::Text(ts.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => RawValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => RawValue::Text(s.clone()),
        Data::Error(_) | Data::Empty => RawValue::Empty,
    }
}
