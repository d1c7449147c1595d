//! Field normalization: timestamps, signed amounts, direction words,
//! currencies and account identifiers

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::models::{Direction, Source};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y.%m.%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
    "%Y年%m月%d日 %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y年%m月%d日"];

/// Cell contents that mean "nothing here"
const PLACEHOLDERS: &[&str] = &["/", "-", "--", "---", "null", "none", "n/a"];

static DIGIT_MASK_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9*]{4,}").expect("digit/mask regex"));

/// Direction word as printed by a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionHint {
    Known(Direction),
    /// e.g. Alipay "不计收支": internal movement with no in/out meaning
    Neutral,
}

/// Collapse whitespace (tabs, NBSP, ideographic space) and trim
pub fn normalize_text(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c == '\u{a0}' || c == '\u{3000}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized text, or `None` when empty or a placeholder
pub fn clean_text(raw: &str) -> Option<String> {
    let text = normalize_text(raw);
    if text.is_empty() || PLACEHOLDERS.contains(&text.to_lowercase().as_str()) {
        None
    } else {
        Some(text)
    }
}

/// Parse a calendar timestamp; date-only inputs land on midnight
pub fn parse_date_time(raw: &str) -> Option<NaiveDateTime> {
    let text = normalize_text(raw);
    let text = text.trim_matches(|c| c == '[' || c == ']');
    if text.is_empty() {
        return None;
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }

    // "20240105 10:11:12"
    if let Some((date_part, time_part)) = text.split_once(' ') {
        if let (Some(date), Some(time)) = (parse_date(date_part), parse_time(time_part)) {
            return Some(date.and_time(time));
        }
    }

    parse_date(text).map(|d| d.and_time(NaiveTime::MIN))
}

/// Date only, including the 8-digit compact form (YYYYMMDD)
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();

    if s.len() == 8 && s.chars().all(|c| c.is_ascii_digit()) {
        let y: i32 = s[0..4].parse().ok()?;
        let m: u32 = s[4..6].parse().ok()?;
        let d: u32 = s[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d);
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let s = raw.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

/// Timestamp from one or more cells mapped to the same field.
///
/// Some layouts split date and time into two columns; when the first value
/// is date-only and a later value is a bare time, they are combined.
pub fn parse_timestamp(values: &[String]) -> Option<NaiveDateTime> {
    let first = values.first()?;
    let parsed = parse_date_time(first)?;

    if parsed.time() == NaiveTime::MIN && parse_date(first).is_some() {
        if let Some(time) = values[1..].iter().find_map(|v| parse_time(v)) {
            return Some(parsed.date().and_time(time));
        }
    }
    Some(parsed)
}

/// Signed decimal amount; strips currency glyphs and thousands separators.
/// "(12.50)" is read as negative.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let mut s: String = raw
        .chars()
        .filter(|c| {
            !c.is_whitespace() && !matches!(c, ',' | '，' | '¥' | '￥' | '元' | '$' | '\u{a0}')
        })
        .collect();
    for code in ["RMB", "CNY", "rmb", "cny"] {
        s = s.replace(code, "");
    }
    if s.is_empty() {
        return None;
    }

    let mut negative = false;
    if s.starts_with('(') && s.ends_with(')') && s.len() > 2 {
        negative = true;
        s = s[1..s.len() - 1].to_string();
    }
    if let Some(rest) = s.strip_prefix('+') {
        s = rest.to_string();
    }

    let value = Decimal::from_str(&s).ok()?;
    Some(if negative { -value } else { value })
}

pub fn parse_direction(raw: &str) -> Option<DirectionHint> {
    match normalize_text(raw).to_lowercase().as_str() {
        "收入" | "收" | "贷" | "转入" | "in" | "income" | "credit" | "cr" => {
            Some(DirectionHint::Known(Direction::In))
        }
        "支出" | "支" | "借" | "转出" | "out" | "expense" | "debit" | "dr" => {
            Some(DirectionHint::Known(Direction::Out))
        }
        "不计收支" | "其他" | "neutral" | "other" => Some(DirectionHint::Neutral),
        _ => None,
    }
}

/// ISO code for a currency cell ("人民币元" → "CNY")
pub fn normalize_currency(raw: &str) -> Option<String> {
    let text = clean_text(raw)?;
    let code = match text.as_str() {
        t if t.contains("人民币") => "CNY",
        t if t.contains("美元") => "USD",
        t if t.contains("港币") || t.contains("港元") => "HKD",
        t if t.contains("欧元") => "EUR",
        t if t.contains("日元") => "JPY",
        t if t.contains("英镑") => "GBP",
        "RMB" | "rmb" | "¥" | "￥" => "CNY",
        t => return Some(t.to_uppercase()),
    };
    Some(code.to_string())
}

/// Keep digits and mask characters of an account identifier
pub fn normalize_account(raw: &str) -> Option<String> {
    let account: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '*')
        .collect();
    if account.chars().any(|c| c.is_ascii_digit()) {
        Some(account)
    } else {
        None
    }
}

/// Split free text into (name, account) at the first run of digits/mask
/// characters. The name is the text before the run, or after it when the
/// run comes first ("6217****1234 张三").
pub fn split_account_and_name(text: &str) -> (Option<String>, Option<String>) {
    match DIGIT_MASK_RUN.find(text) {
        Some(m) => {
            let before = clean_text(&text[..m.start()]);
            let name = before.or_else(|| clean_text(&text[m.end()..]));
            (name, Some(m.as_str().to_string()))
        }
        None => (clean_text(text), None),
    }
}

/// Display name such as "建设银行储蓄卡(5678)": institution, card type by
/// leading digit, last four digits
pub fn synthesize_account_name(source: Source, account_number: &str) -> Option<String> {
    let digits: Vec<char> = account_number.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return None;
    }
    let kind = match digits[0] {
        '6' => "储蓄卡",
        '3' | '4' | '5' => "信用卡",
        _ => "账户",
    };
    let last4: String = digits[digits.len() - 4..].iter().collect();
    Some(format!("{}{}({})", source.display_name(), kind, last4))
}

/// Excel serial date (1900 system, 1899-12-30 epoch) to timestamp
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_time(NaiveTime::MIN);
    let days = Duration::try_days(serial.floor() as i64)?;
    let seconds = Duration::try_seconds(((serial - serial.floor()) * 86_400.0).round() as i64)?;
    epoch.checked_add_signed(days.checked_add(&seconds)?)
}
