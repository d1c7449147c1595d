//! China Merchants Bank (招商银行) transaction statement PDF
//!
//! Each record starts with `记账日期 货币 交易金额 联机余额` on one line,
//! followed by the transaction summary and counterparty, which may wrap onto
//! continuation lines:
//!
//! ```text
//! 2024-01-05 CNY -35.00 1,234.56 快捷支付 支付宝-便利店
//! 2024-01-06 CNY 5,000.00 6,234.56 代发工资 某某科技有限公司
//! 上海分公司
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use super::assembler::DraftAssembler;
use super::normalize::synthesize_account_name;
use super::pdf_text::{cleaned_lines, extract_pdf_text, LineAccumulator, PendingRecord};
use super::ParseOptions;
use crate::error::Result;
use crate::models::{ParseResult, ParseWarning, RawRow, Source, SourceType};

/// Text that identifies a CMB statement
pub const NATIVE_MARKERS: &[&str] = &["招商银行交易流水", "招商银行", "China Merchants Bank"];

/// Transaction summaries as printed by CMB; a detail text starting with one
/// of these is split there, otherwise at the first space
const SUMMARY_PREFIXES: &[&str] = &[
    "代发住房公积金",
    "信用卡自动还款",
    "本行ATM无卡取款",
    "一网通支付鼓励金",
    "结售汇即时售汇",
    "结售汇即时结汇",
    "基金快速赎回",
    "基金申购",
    "基金赎回",
    "基金认购",
    "行内转账转入",
    "行内转账转出",
    "朝朝宝转入",
    "朝朝宝转出",
    "国际结算解付款项",
    "银联无卡自助消费",
    "银联快捷支付",
    "信用卡还款",
    "转账汇款",
    "个贷交易",
    "个贷放款",
    "账户结息",
    "快捷退款",
    "快捷支付",
    "银联消费",
    "银联代付",
    "汇入汇款",
    "代发工资",
    "转出到分仓",
    "转入到分仓",
    "从分仓转入",
    "基金退款",
    "即时委托",
    "分红",
    "强赎",
    "还本",
    "申购",
    "赎回",
];

static SORTED_SUMMARIES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    let mut prefixes = SUMMARY_PREFIXES.to_vec();
    prefixes.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    prefixes
});

/// Column header lines (Chinese and English), repeated on every page
const HEADER_PREFIXES: &[&str] = &[
    "记账日期 货币 交易金额 联机余额 交易摘要 对手信息",
    "Date Currency Transaction",
    "Amount Balance Transaction Type Counter Party",
];

/// Statement metadata block on the first page
const META_PREFIXES: &[&str] = &[
    "户 名：",
    "户 名:",
    "户名：",
    "账户类型：",
    "申请时间：",
    "账号：",
    "开 户 行：",
    "开户行：",
    "验 证 码：",
    "温馨提示",
];

const META_EXACT: &[&str] = &[
    "招商银行交易流水",
    "Transaction Statement of China Merchants Bank",
    "Name",
    "Account Type",
    "Date",
    "Account No",
    "Sub Branch",
    "Verification Code",
];

static PAGE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+/\d+$").expect("page regex"));
static DATE_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}\s*--\s*\d{4}-\d{2}-\d{2}").expect("date range regex")
});
static RECORD_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}(?:\s|$)").expect("record start regex"));
static ACCOUNT_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"账号[:：]\s*([0-9]{8,})").expect("account regex"));

pub fn parse_cmb_pdf(bytes: &[u8], _options: &ParseOptions) -> Result<ParseResult> {
    let text = extract_pdf_text(bytes)?;
    info!("Parsing CMB statement PDF ({} bytes)", bytes.len());
    Ok(parse_cmb_text(&text))
}

/// Parse already-extracted statement text
pub fn parse_cmb_text(text: &str) -> ParseResult {
    let account_name = ACCOUNT_NUMBER
        .captures(text)
        .and_then(|caps| synthesize_account_name(Source::Cmb, &caps[1]));
    debug!("CMB statement account: {:?}", account_name);

    let mut accumulator = LineAccumulator::new(is_record_start);
    for (line_no, line) in cleaned_lines(text) {
        if is_noise(&line) {
            continue;
        }
        accumulator.feed(line_no, &line);
    }

    let mut assembler = DraftAssembler::new(Source::Cmb, SourceType::Pdf).with_account_name(account_name);
    for record in accumulator.finish() {
        match split_record(&record) {
            Ok(row) => assembler.push(&row),
            Err(warning) => assembler.warn(warning),
        }
    }

    let result = assembler.finish();
    info!(
        "Parsed {} CMB drafts ({} warnings)",
        result.row_count,
        result.warnings.len()
    );
    result
}

fn is_record_start(line: &str) -> bool {
    RECORD_START.is_match(line)
}

fn is_noise(line: &str) -> bool {
    PAGE_NUMBER.is_match(line)
        || META_EXACT.contains(&line)
        || HEADER_PREFIXES.iter().any(|p| line.starts_with(p))
        || META_PREFIXES.iter().any(|p| line.starts_with(p))
        || DATE_RANGE.is_match(line)
}

/// Positional split: date, currency, amount, balance, then free text
fn split_record(record: &PendingRecord) -> std::result::Result<RawRow, ParseWarning> {
    let mut tokens = record.text.split_whitespace().peekable();
    let date = tokens.next().unwrap_or_default();

    let currency = tokens
        .next_if(|t| t.len() == 3 && t.chars().all(|c| c.is_ascii_uppercase()))
        .map(|t| t.to_string());

    let (Some(amount), Some(balance)) = (tokens.next(), tokens.next()) else {
        return Err(ParseWarning::new(
            record.line,
            None,
            format!("truncated record '{}'", record.text),
        ));
    };

    let detail = tokens.collect::<Vec<_>>().join(" ");
    let (summary, counterparty) = split_summary(&detail);

    let mut row = RawRow::new(record.line);
    row.push_text("记账日期", date);
    if let Some(currency) = currency {
        row.push_text("货币", currency);
    }
    row.push_text("交易金额", amount);
    row.push_text("联机余额", balance);
    row.push_text("交易摘要", summary);
    row.push_text("对手信息", counterparty);
    Ok(row)
}

/// Split detail text into (summary, counterparty).
///
/// Longest known summary prefix first, then the first space. A counterparty
/// whose name happens to start with a summary keyword is split wrongly
/// ("分红网络科技有限公司" → "分红" / "网络科技有限公司").
pub fn split_summary(detail: &str) -> (String, String) {
    let text = detail.trim();
    if let Some(prefix) = SORTED_SUMMARIES.iter().find(|p| text.starts_with(**p)) {
        return (prefix.to_string(), text[prefix.len()..].trim().to_string());
    }
    match text.split_once(' ') {
        Some((summary, rest)) => (summary.to_string(), rest.trim().to_string()),
        None => (text.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;
    use rust_decimal_macros::dec;

    const STATEMENT: &str = "招商银行交易流水
Transaction Statement of China Merchants Bank
2024-01-01 -- 2024-01-31
户 名：张三
账号：6214830212345678
记账日期 货币 交易金额 联机余额 交易摘要 对手信息
2024-01-05 CNY -35.00 1,234.56 快捷支付 支付宝-便利店
2024-01-06 CNY 5,000.00 6,234.56 代发工资 某某科技有限公司
上海分公司
1/2
2024-01-07 CNY -100.00 6,134.56 银联消费
";

    #[test]
    fn test_statement_text_to_drafts() {
        let result = parse_cmb_text(STATEMENT);
        assert_eq!(result.row_count, 3);
        assert!(result.warnings.is_empty());

        let first = &result.drafts[0];
        assert_eq!(first.direction, Direction::Out);
        assert_eq!(first.amount, dec!(35.00));
        assert_eq!(first.balance, Some(dec!(1234.56)));
        assert_eq!(first.currency.as_deref(), Some("CNY"));
        assert_eq!(first.description.as_deref(), Some("快捷支付"));
        assert_eq!(first.counterparty.as_deref(), Some("支付宝-便利店"));
        assert_eq!(first.account_name.as_deref(), Some("招商银行储蓄卡(5678)"));

        let salary = &result.drafts[1];
        assert_eq!(salary.direction, Direction::In);
        assert_eq!(salary.amount, dec!(5000.00));
        assert_eq!(salary.counterparty.as_deref(), Some("某某科技有限公司 上海分公司"));

        assert_eq!(result.drafts[2].counterparty, None);
    }

    #[test]
    fn test_truncated_record_is_a_warning() {
        let text = "2024-01-05 CNY -35.00\n2024-01-06 CNY -1.00 99.00 快捷支付 x\n";
        let result = parse_cmb_text(text);
        assert_eq!(result.row_count, 1);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].row, 1);
    }

    #[test]
    fn test_summary_prefers_longest_keyword() {
        assert_eq!(
            split_summary("基金快速赎回 某基金"),
            ("基金快速赎回".to_string(), "某基金".to_string())
        );
        assert_eq!(
            split_summary("银联快捷支付美团"),
            ("银联快捷支付".to_string(), "美团".to_string())
        );
        assert_eq!(
            split_summary("网上转账 王五"),
            ("网上转账".to_string(), "王五".to_string())
        );
    }

    #[test]
    fn test_counterparty_starting_with_keyword_is_split_wrongly() {
        // known limitation of keyword-prefix splitting
        assert_eq!(
            split_summary("分红网络科技有限公司"),
            ("分红".to_string(), "网络科技有限公司".to_string())
        );
    }
}
