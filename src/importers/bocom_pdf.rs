//! Bank of Communications (交通银行) account statement PDF
//!
//! A record starts with date, time and serial number on one line. Summary,
//! amount/balance and counterparty follow on the same line or wrap onto the
//! next ones; the block runs until the next start line.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use super::assembler::DraftAssembler;
use super::normalize::{clean_text, split_account_and_name, synthesize_account_name};
use super::pdf_text::{cleaned_lines, extract_pdf_text, LineAccumulator, PendingRecord};
use super::ParseOptions;
use crate::error::Result;
use crate::models::{CanonicalField, ParseResult, ParseWarning, RawRow, Source, SourceType};

pub const NATIVE_MARKERS: &[&str] = &["交通银行", "BANK OF COMMUNICATIONS", "Bank of Communications"];

/// Page furniture repeated on every page (line prefixes)
const NOISE_PREFIXES: &[&str] = &[
    "交通银行个人",
    "交通银行账户",
    "BANK OF COMMUNICATIONS",
    "交易日期 交易时间",
    "打印时间",
    "本清单",
    "温馨提示",
    "账号：",
    "户名：",
    "币种：",
];

static PAGE_FOOTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:第\s*\d+\s*页(?:\s*[/，,]?\s*共\s*\d+\s*页)?|共\s*\d+\s*页|\d+/\d+)$")
        .expect("page footer regex")
});
static RECORD_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2})\s+(\d{2}:\d{2}:\d{2})\s+([0-9A-Z]{8,})(?:\s+(.*))?$")
        .expect("record start regex")
});
static AMOUNT_BALANCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([+-]?\d[\d,]*\.\d{2})\s+(\d[\d,]*\.\d{2})").expect("amount pair regex")
});
static ACCOUNT_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:账号|卡号)[:：]\s*([0-9]{8,})").expect("account regex"));
static CURRENCY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"币种[:：]\s*(\S+)").expect("currency regex"));

pub fn parse_bocom_pdf(bytes: &[u8], _options: &ParseOptions) -> Result<ParseResult> {
    let text = extract_pdf_text(bytes)?;
    info!("Parsing BOCOM statement PDF ({} bytes)", bytes.len());
    Ok(parse_bocom_text(&text))
}

pub fn parse_bocom_text(text: &str) -> ParseResult {
    let account_name = ACCOUNT_NUMBER
        .captures(text)
        .and_then(|caps| synthesize_account_name(Source::Bocom, &caps[1]));
    let currency = CURRENCY.captures(text).map(|caps| caps[1].to_string());
    debug!("BOCOM statement account: {:?}, currency: {:?}", account_name, currency);

    let mut accumulator = LineAccumulator::new(is_record_start);
    for (line_no, line) in cleaned_lines(text) {
        if PAGE_FOOTER.is_match(&line) || NOISE_PREFIXES.iter().any(|p| line.starts_with(p)) {
            continue;
        }
        accumulator.feed(line_no, &line);
    }

    let mut assembler =
        DraftAssembler::new(Source::Bocom, SourceType::Pdf).with_account_name(account_name);
    for block in accumulator.finish() {
        match split_block(&block, currency.as_deref()) {
            Ok(row) => assembler.push(&row),
            Err(warning) => assembler.warn(warning),
        }
    }

    let result = assembler.finish();
    info!(
        "Parsed {} BOCOM drafts ({} warnings)",
        result.row_count,
        result.warnings.len()
    );
    result
}

fn is_record_start(line: &str) -> bool {
    RECORD_START.is_match(line)
}

fn split_block(block: &PendingRecord, currency: Option<&str>) -> std::result::Result<RawRow, ParseWarning> {
    let Some(caps) = RECORD_START.captures(&block.text) else {
        return Err(ParseWarning::new(block.line, None, "malformed record start"));
    };
    let rest = caps.get(4).map_or("", |m| m.as_str());

    let Some(pair) = AMOUNT_BALANCE.captures(rest) else {
        return Err(ParseWarning::new(
            block.line,
            Some(CanonicalField::Amount),
            format!("no amount/balance pair in '{}'", block.text),
        ));
    };
    let whole = pair.get(0).map_or(0..0, |m| m.range());
    let description = &rest[..whole.start];
    let (counterparty, account) = split_account_and_name(&rest[whole.end..]);

    let mut row = RawRow::new(block.line);
    row.push_text("交易日期", &caps[1]);
    row.push_text("交易时间", &caps[2]);
    row.push_text("流水号", &caps[3]);
    row.push_text("摘要", clean_text(description).unwrap_or_default());
    row.push_text("交易金额", &pair[1]);
    row.push_text("余额", &pair[2]);
    row.push_text("对方户名", counterparty.unwrap_or_default());
    row.push_text("对方账号", account.unwrap_or_default());
    if let Some(currency) = currency {
        row.push_text("币种", currency);
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    const STATEMENT: &str = "交通银行个人客户交易清单
账号：6222600123456789012 户名：张三 币种：人民币
交易日期 交易时间 流水号 摘要 交易金额 余额 对方户名 对方账号
2024-01-05 10:11:12 A1B2C3D4E5 网上支付 -35.00 1,234.56 支付宝（中国）网络技术有限公司 215500690
2024-01-06 09:00:00 F6G7H8J9K0 转账收入
2,000.00 3,234.56 李四 6217****8888
第 1 页
2024-01-07 18:30:00 L1M2N3P4Q5 跨行转出 -1,000.00
";

    #[test]
    fn test_blocks_become_drafts() {
        let result = parse_bocom_text(STATEMENT);
        assert_eq!(result.row_count, 2);
        assert_eq!(result.warnings.len(), 1);

        let first = &result.drafts[0];
        assert_eq!(first.source_row_id, "bocom:A1B2C3D4E5");
        assert_eq!(
            first.occurred_at,
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap().and_hms_opt(10, 11, 12).unwrap()
        );
        assert_eq!(first.direction, Direction::Out);
        assert_eq!(first.amount, dec!(35.00));
        assert_eq!(first.description.as_deref(), Some("网上支付"));
        assert_eq!(first.counterparty.as_deref(), Some("支付宝（中国）网络技术有限公司"));
        assert_eq!(first.counterparty_account.as_deref(), Some("215500690"));
        assert_eq!(first.currency.as_deref(), Some("CNY"));
        assert_eq!(first.account_name.as_deref(), Some("交通银行储蓄卡(9012)"));

        let wrapped = &result.drafts[1];
        assert_eq!(wrapped.direction, Direction::In);
        assert_eq!(wrapped.amount, dec!(2000.00));
        assert_eq!(wrapped.balance, Some(dec!(3234.56)));
        assert_eq!(wrapped.counterparty.as_deref(), Some("李四"));
        assert_eq!(wrapped.counterparty_account.as_deref(), Some("6217****8888"));
    }

    #[test]
    fn test_block_without_balance_is_reported() {
        let result = parse_bocom_text(STATEMENT);
        let warning = &result.warnings[0];
        assert_eq!(warning.row, 8);
        assert_eq!(warning.field, Some(CanonicalField::Amount));
    }

    #[test]
    fn test_bank_name_in_counterparty_is_kept() {
        let text = "2024-01-05 10:11:12 A1B2C3D4E5 信用卡还款 -500.00 734.56\n交通银行信用卡中心\n";
        let result = parse_bocom_text(text);
        assert_eq!(result.drafts[0].counterparty.as_deref(), Some("交通银行信用卡中心"));
    }

    #[test]
    fn test_footer_lines_do_not_leak_into_records() {
        let text = "2024-01-05 10:11:12 A1B2C3D4E5 网上支付 -35.00 1,234.56 便利店\n打印时间：2024-02-01\n2/3\n";
        let result = parse_bocom_text(text);
        assert_eq!(result.drafts[0].counterparty.as_deref(), Some("便利店"));
        assert_eq!(result.drafts[0].currency, None);
    }
}
