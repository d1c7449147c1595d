//! Canonical data model shared by every extractor
//!
//! Everything downstream of the parsers only sees [`ParseResult`]; the
//! [`RawRow`] shape stays private to one extraction pass.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Issuing institution of a statement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Alipay, // 支付宝 (payment platform)
    Ccb,    // 中国建设银行
    Cmb,    // 招商银行
    Bocom,  // 交通银行
}

impl Source {
    pub const ALL: [Source; 4] = [Source::Alipay, Source::Ccb, Source::Cmb, Source::Bocom];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Alipay => "alipay",
            Source::Ccb => "ccb",
            Source::Cmb => "cmb",
            Source::Bocom => "bocom",
        }
    }

    /// Native-language institution name, used for display account names
    pub fn display_name(&self) -> &'static str {
        match self {
            Source::Alipay => "支付宝",
            Source::Ccb => "建设银行",
            Source::Cmb => "招商银行",
            Source::Bocom => "交通银行",
        }
    }

    /// Container type the institution exports
    pub fn native_type(&self) -> SourceType {
        match self {
            Source::Alipay => SourceType::Csv,
            Source::Ccb => SourceType::Xls,
            Source::Cmb | Source::Bocom => SourceType::Pdf,
        }
    }

    pub fn is_payment_platform(&self) -> bool {
        matches!(self, Source::Alipay)
    }

    /// Sources that print informational 0.00 lines (coupons, free services).
    /// Those rows are dropped without a warning.
    pub fn emits_advisory_zero_rows(&self) -> bool {
        matches!(self, Source::Alipay)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "alipay" | "支付宝" => Ok(Source::Alipay),
            "ccb" | "建设银行" | "建行" | "中国建设银行" => Ok(Source::Ccb),
            "cmb" | "招商银行" | "招行" => Ok(Source::Cmb),
            "bocom" | "bankcomm" | "交通银行" | "交行" => Ok(Source::Bocom),
            _ => Err(()),
        }
    }
}

/// Container (file format family)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Csv, // delimited text
    Xls, // spreadsheet (xls or xlsx)
    Pdf, // extracted-text PDF
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Csv => "csv",
            SourceType::Xls => "xls",
            SourceType::Pdf => "pdf",
        }
    }

    /// Container type implied by a file extension (without the dot)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(SourceType::Csv),
            "xls" | "xlsx" => Some(SourceType::Xls),
            "pdf" => Some(SourceType::Pdf),
            _ => None,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" | "delimited" => Ok(SourceType::Csv),
            "xls" | "xlsx" | "spreadsheet" => Ok(SourceType::Xls),
            "pdf" => Ok(SourceType::Pdf),
            _ => Err(()),
        }
    }
}

/// Money flow relative to the statement owner
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

/// Source-independent transaction attribute
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalField {
    OccurredAt,
    Amount,
    Direction,
    Currency,
    Counterparty,
    CounterpartyAccount,
    Description,
    Category,
    AccountName,
    Balance,
    Status,
    TransactionRef,
    MerchantOrderRef,
    Memo,
    CashType,
}

impl CanonicalField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::OccurredAt => "occurredAt",
            CanonicalField::Amount => "amount",
            CanonicalField::Direction => "direction",
            CanonicalField::Currency => "currency",
            CanonicalField::Counterparty => "counterparty",
            CanonicalField::CounterpartyAccount => "counterpartyAccount",
            CanonicalField::Description => "description",
            CanonicalField::Category => "category",
            CanonicalField::AccountName => "accountName",
            CanonicalField::Balance => "balance",
            CanonicalField::Status => "status",
            CanonicalField::TransactionRef => "transactionRef",
            CanonicalField::MerchantOrderRef => "merchantOrderRef",
            CanonicalField::Memo => "memo",
            CanonicalField::CashType => "cashType",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Untyped cell value as it came out of the container
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(f64),
    Empty,
}

impl RawValue {
    /// Text form; `None` for empty cells and whitespace-only text
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Text(s) if !s.trim().is_empty() => Some(s.clone()),
            RawValue::Text(_) | RawValue::Empty => None,
            RawValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(format!("{}", *n as i64))
            }
            RawValue::Number(n) => Some(n.to_string()),
        }
    }
}

/// One record as materialized by an extractor, keyed by the source's own labels
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// 1-based physical line (or sheet row) the record starts on
    pub line: usize,
    pub cells: Vec<(String, RawValue)>,
}

impl RawRow {
    pub fn new(line: usize) -> Self {
        Self {
            line,
            cells: Vec::new(),
        }
    }

    pub fn push(&mut self, label: impl Into<String>, value: RawValue) {
        self.cells.push((label.into(), value));
    }

    pub fn push_text(&mut self, label: impl Into<String>, value: impl Into<String>) {
        self.push(label, RawValue::Text(value.into()));
    }

    /// Ordered serialization of every cell; input to the content hash.
    /// Labels are included so the same values under different layouts differ.
    pub fn fingerprint(&self) -> String {
        let mut out = String::new();
        for (label, value) in &self.cells {
            out.push_str(label);
            out.push('\u{1f}');
            match value {
                RawValue::Text(s) => {
                    out.push('s');
                    out.push_str(s);
                }
                RawValue::Number(n) => {
                    out.push('n');
                    out.push_str(&n.to_string());
                }
                RawValue::Empty => out.push('e'),
            }
            out.push('\u{1e}');
        }
        out
    }
}

/// Parsed-but-not-yet-persisted canonical transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDraft {
    pub source: Source,
    pub source_type: SourceType,
    pub source_row_id: String,
    pub occurred_at: NaiveDateTime,
    /// Always non-negative; sign lives in `direction`
    pub amount: Decimal,
    pub direction: Direction,
    pub currency: Option<String>,
    pub counterparty: Option<String>,
    pub counterparty_account: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub account_name: Option<String>,
    pub balance: Option<Decimal>,
    pub status: Option<String>,
    pub transaction_ref: Option<String>,
    pub merchant_order_ref: Option<String>,
    pub memo: Option<String>,
    pub cash_type: Option<String>,
}

/// Non-fatal, row-level problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub row: usize,
    pub field: Option<CanonicalField>,
    pub message: String,
}

impl ParseWarning {
    pub fn new(row: usize, field: Option<CanonicalField>, message: impl Into<String>) -> Self {
        Self {
            row,
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field {
            Some(field) => write!(f, "row {} [{}]: {}", self.row, field, self.message),
            None => write!(f, "row {}: {}", self.row, self.message),
        }
    }
}

/// Output of parsing one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    pub drafts: Vec<TransactionDraft>,
    pub warnings: Vec<ParseWarning>,
    pub source: Source,
    pub source_type: SourceType,
    pub row_count: usize,
}

impl ParseResult {
    pub fn new(
        source: Source,
        source_type: SourceType,
        drafts: Vec<TransactionDraft>,
        warnings: Vec<ParseWarning>,
    ) -> Self {
        let row_count = drafts.len();
        Self {
            drafts,
            warnings,
            source,
            source_type,
            row_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_from_str_is_bilingual() {
        assert_eq!(Source::from_str("支付宝"), Ok(Source::Alipay));
        assert_eq!(Source::from_str(" CCB "), Ok(Source::Ccb));
        assert_eq!(Source::from_str("招行"), Ok(Source::Cmb));
        assert_eq!(Source::from_str("BankComm"), Ok(Source::Bocom));
        assert!(Source::from_str("wechat").is_err());
    }

    #[test]
    fn test_source_type_from_extension() {
        assert_eq!(SourceType::from_extension("XLSX"), Some(SourceType::Xls));
        assert_eq!(SourceType::from_extension("csv"), Some(SourceType::Csv));
        assert_eq!(SourceType::from_extension("pdf"), Some(SourceType::Pdf));
        assert_eq!(SourceType::from_extension("ofx"), None);
    }

    #[test]
    fn test_raw_value_as_text() {
        assert_eq!(RawValue::Number(20240105.0).as_text().as_deref(), Some("20240105"));
        assert_eq!(RawValue::Number(-12.5).as_text().as_deref(), Some("-12.5"));
        assert_eq!(RawValue::Text("  ".into()).as_text(), None);
        assert_eq!(RawValue::Empty.as_text(), None);
    }

    #[test]
    fn test_fingerprint_depends_on_labels_and_values() {
        let mut a = RawRow::new(1);
        a.push_text("金额", "10.00");
        let mut b = RawRow::new(7);
        b.push_text("金额", "10.00");
        let mut c = RawRow::new(1);
        c.push_text("余额", "10.00");

        // line numbers are not part of the content
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_draft_serializes_camel_case() {
        let field = serde_json::to_string(&CanonicalField::CounterpartyAccount).unwrap();
        assert_eq!(field, "\"counterpartyAccount\"");
        let dir = serde_json::to_string(&Direction::Out).unwrap();
        assert_eq!(dir, "\"out\"");
    }
}
