use csv::{ReaderBuilder, Trim};
use tracing::{debug, info};

use super::assembler::DraftAssembler;
use super::aliases::AliasTable;
use super::locator::{decode_text, locate_header};
use super::ParseOptions;
use crate::error::{ImportError, Result};
use crate::models::{CanonicalField, ParseResult, ParseWarning, RawRow, Source, SourceType};

/// Tokens that only show up in a correctly decoded Alipay export
pub const NATIVE_MARKERS: &[&str] = &["交易时间", "支付宝", "交易对方", "金额"];

/// Header row candidates; two on one line make it the header
const HEADER_MARKERS: &[&str] = &[
    "交易时间",
    "交易创建时间",
    "金额",
    "收/支",
    "交易对方",
    "交易状态",
    "商品名称",
    "商品说明",
    "Transaction Time",
    "Amount",
];

/// Parse an Alipay transaction-detail export (CSV, UTF-8 or GBK)
///
/// The export starts with a free-form banner (account, date range, notices)
/// and ends with a summary trailer; only the table between them is read.
pub fn parse_alipay_csv(bytes: &[u8], options: &ParseOptions) -> Result<ParseResult> {
    let decoded = decode_text(bytes, NATIVE_MARKERS);
    info!("Parsing Alipay CSV ({} bytes, {})", bytes.len(), decoded.encoding);

    let header_idx = locate_header(&decoded.text, HEADER_MARKERS, options.header_scan_lines)?;
    let body = decoded
        .text
        .lines()
        .skip(header_idx)
        .collect::<Vec<_>>()
        .join("\n");

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(body.as_bytes());

    let headers = reader.headers()?.clone();
    debug!("Alipay headers on line {}: {:?}", header_idx + 1, headers);

    let aliases = AliasTable::for_source(Source::Alipay);
    for required in [CanonicalField::OccurredAt, CanonicalField::Amount] {
        if !aliases.covers(headers.iter(), required) {
            return Err(ImportError::MissingColumn(required));
        }
    }

    let mut assembler = DraftAssembler::new(Source::Alipay, SourceType::Csv);

    for (idx, result) in reader.records().enumerate() {
        // header is physical line header_idx + 1; csv positions are 1-based
        let fallback_line = header_idx + idx + 2;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e
                    .position()
                    .map(|p| header_idx + p.line() as usize)
                    .unwrap_or(fallback_line);
                assembler.warn(ParseWarning::new(line, None, format!("unreadable record: {}", e)));
                continue;
            }
        };
        let line = record
            .position()
            .map(|p| header_idx + p.line() as usize)
            .unwrap_or(fallback_line);

        if is_filler(&record) {
            continue;
        }

        let mut row = RawRow::new(line);
        for (label, value) in headers.iter().zip(record.iter()) {
            if label.is_empty() {
                continue;
            }
            row.push_text(label, value);
        }
        assembler.push(&row);
    }

    let result = assembler.finish();
    info!(
        "Parsed {} Alipay drafts ({} warnings)",
        result.row_count,
        result.warnings.len()
    );
    Ok(result)
}

/// Blank lines, `-----` rules and one-cell trailer lines ("共12笔记录")
fn is_filler(record: &csv::StringRecord) -> bool {
    let filled: Vec<&str> = record.iter().filter(|f| !f.is_empty()).collect();
    filled.len() < 2 || filled[0].starts_with("---")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;
    use rust_decimal_macros::dec;

    const HEADER: &str = "交易时间,交易分类,交易对方,对方账号,商品说明,收/支,金额,收/付款方式,交易状态,交易订单号,商家订单号,备注,";

    fn export(rows: &[&str]) -> String {
        let mut text = String::from(
            "------------------------------------------------------------------------------------\n\
             导出信息：\n\
             姓名：张三\n\
             支付宝账户：foo@example.com\n",
        );
        text.push_str(HEADER);
        text.push('\n');
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        text
    }

    #[test]
    fn test_header_after_banner_and_row_lines() {
        let text = export(&[
            "2024-01-05 12:30:00,餐饮美食,便利店,shop***@x.com,午餐,支出,35.00,余额宝,交易成功,2024010522001\t,M001\t,,",
        ]);
        let result = parse_alipay_csv(text.as_bytes(), &ParseOptions::default()).unwrap();
        assert_eq!(result.row_count, 1);
        let draft = &result.drafts[0];
        assert_eq!(draft.amount, dec!(35.00));
        assert_eq!(draft.direction, Direction::Out);
        assert_eq!(draft.category.as_deref(), Some("餐饮美食"));
        assert_eq!(draft.account_name.as_deref(), Some("余额宝"));
        assert_eq!(draft.merchant_order_ref.as_deref(), Some("M001"));
        assert_eq!(draft.source_row_id, "alipay:2024010522001");
    }

    #[test]
    fn test_warning_rows_use_physical_line_numbers() {
        let text = export(&[
            "2024-01-05 12:30:00,,便利店,,,支出,35.00,,,,,,",
            "not a date,,便利店,,,支出,35.00,,,,,,",
        ]);
        let result = parse_alipay_csv(text.as_bytes(), &ParseOptions::default()).unwrap();
        assert_eq!(result.warnings.len(), 1);
        // banner is 4 lines, header line 5, rows on 6 and 7
        assert_eq!(result.warnings[0].row, 7);
        assert_eq!(result.warnings[0].field, Some(CanonicalField::OccurredAt));
    }

    #[test]
    fn test_trailer_and_rule_lines_are_ignored() {
        let mut text = export(&["2024-01-05 12:30:00,,便利店,,,支出,35.00,,,,,,"]);
        text.push_str("------------------------------------------------------------------------------------\n");
        text.push_str("共1笔记录\n");
        let result = parse_alipay_csv(text.as_bytes(), &ParseOptions::default()).unwrap();
        assert_eq!(result.row_count, 1);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_missing_amount_column_is_fatal() {
        let text = "交易时间,交易对方,收/支\n2024-01-05 12:30:00,便利店,支出\n";
        let err = parse_alipay_csv(text.as_bytes(), &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ImportError::MissingColumn(CanonicalField::Amount)));
    }
}
