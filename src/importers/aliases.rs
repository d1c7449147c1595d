//! Column label → canonical field resolution
//!
//! Each source has its own alias table. Labels in real exports overlap
//! textually ("对方账号" contains "对方", "账户余额" contains "余额"), so the
//! table is kept sorted by alias length, longest first, and the first
//! containment hit wins. That makes the longest matching alias win without
//! any tie-breaking logic at lookup time.

use once_cell::sync::Lazy;
use unicode_normalization::UnicodeNormalization;

use crate::models::{CanonicalField, Source};

use CanonicalField::*;

const ALIPAY_ALIASES: &[(&str, CanonicalField)] = &[
    ("交易时间", OccurredAt),
    ("交易创建时间", OccurredAt),
    ("付款时间", OccurredAt),
    ("交易分类", Category),
    ("类型", Category),
    ("对方", Counterparty),
    ("交易对方", Counterparty),
    ("对方账号", CounterpartyAccount),
    ("商品说明", Description),
    ("商品名称", Description),
    ("收/支", Direction),
    ("金额", Amount),
    ("收/付款方式", AccountName),
    ("交易状态", Status),
    ("交易订单号", TransactionRef),
    ("交易号", TransactionRef),
    ("商家订单号", MerchantOrderRef),
    ("备注", Memo),
    // English export
    ("transaction time", OccurredAt),
    ("category", Category),
    ("counterparty", Counterparty),
    ("counterparty account", CounterpartyAccount),
    ("description", Description),
    ("income/expense", Direction),
    ("amount", Amount),
    ("payment method", AccountName),
    ("status", Status),
    ("transaction id", TransactionRef),
    ("merchant order id", MerchantOrderRef),
    ("remarks", Memo),
];

const CCB_ALIASES: &[(&str, CanonicalField)] = &[
    ("交易日期", OccurredAt),
    ("记账日期", OccurredAt),
    ("交易时间", OccurredAt),
    ("金额", Amount),
    ("交易金额", Amount),
    ("余额", Balance),
    ("账户余额", Balance),
    ("币别", Currency),
    ("币种", Currency),
    ("钞汇", CashType),
    ("摘要", Description),
    ("附言", Memo),
    ("交易地点/附言", Memo),
    ("对方", Counterparty),
    ("对方户名", Counterparty),
    ("对方账号", CounterpartyAccount),
    ("对方账号与户名", Counterparty),
    ("借贷", Direction),
    ("收支", Direction),
    ("流水号", TransactionRef),
    ("transaction date", OccurredAt),
    ("amount", Amount),
    ("balance", Balance),
    ("currency", Currency),
    ("summary", Description),
];

const CMB_ALIASES: &[(&str, CanonicalField)] = &[
    ("记账日期", OccurredAt),
    ("货币", Currency),
    ("交易金额", Amount),
    ("联机余额", Balance),
    ("余额", Balance),
    ("交易摘要", Description),
    ("对手信息", Counterparty),
    ("date", OccurredAt),
    ("currency", Currency),
    ("transaction amount", Amount),
    ("balance", Balance),
    ("transaction type", Description),
    ("counter party", Counterparty),
];

const BOCOM_ALIASES: &[(&str, CanonicalField)] = &[
    ("交易日期", OccurredAt),
    ("交易时间", OccurredAt),
    ("流水号", TransactionRef),
    ("交易金额", Amount),
    ("余额", Balance),
    ("摘要", Description),
    ("对方", Counterparty),
    ("对方户名", Counterparty),
    ("对方账号", CounterpartyAccount),
    ("币种", Currency),
];

static ALIPAY_TABLE: Lazy<AliasTable> = Lazy::new(|| AliasTable::new(ALIPAY_ALIASES));
static CCB_TABLE: Lazy<AliasTable> = Lazy::new(|| AliasTable::new(CCB_ALIASES));
static CMB_TABLE: Lazy<AliasTable> = Lazy::new(|| AliasTable::new(CMB_ALIASES));
static BOCOM_TABLE: Lazy<AliasTable> = Lazy::new(|| AliasTable::new(BOCOM_ALIASES));

/// Outcome of resolving one label
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Field(CanonicalField),
    /// Label kept verbatim (trimmed) for diagnostics
    Unmatched(String),
}

/// Read-only alias table, sorted longest alias first
#[derive(Debug, Clone)]
pub struct AliasTable {
    entries: Vec<(String, CanonicalField)>,
}

impl AliasTable {
    pub fn new(aliases: &[(&str, CanonicalField)]) -> Self {
        let mut entries: Vec<(String, CanonicalField)> = aliases
            .iter()
            .map(|(alias, field)| (normalize_label(alias), *field))
            .collect();
        // stable: equal lengths keep declaration order
        entries.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));
        Self { entries }
    }

    pub fn for_source(source: Source) -> &'static AliasTable {
        match source {
            Source::Alipay => &ALIPAY_TABLE,
            Source::Ccb => &CCB_TABLE,
            Source::Cmb => &CMB_TABLE,
            Source::Bocom => &BOCOM_TABLE,
        }
    }

    pub fn resolve(&self, label: &str) -> Resolved {
        let norm = normalize_label(label);
        if norm.is_empty() {
            return Resolved::Unmatched(label.trim().to_string());
        }

        if let Some((_, field)) = self.entries.iter().find(|(alias, _)| norm.contains(alias.as_str())) {
            return Resolved::Field(*field);
        }

        // Truncated label: a strict prefix of some alias
        if norm.chars().count() >= 2 {
            if let Some((_, field)) = self
                .entries
                .iter()
                .find(|(alias, _)| alias.starts_with(norm.as_str()))
            {
                return Resolved::Field(*field);
            }
        }

        Resolved::Unmatched(label.trim().to_string())
    }

    pub fn field_of(&self, label: &str) -> Option<CanonicalField> {
        match self.resolve(label) {
            Resolved::Field(field) => Some(field),
            Resolved::Unmatched(_) => None,
        }
    }

    /// Whether any of `labels` resolves to `field`
    pub fn covers<'a>(&self, labels: impl IntoIterator<Item = &'a str>, field: CanonicalField) -> bool {
        labels.into_iter().any(|l| self.field_of(l) == Some(field))
    }
}

/// NFKC (full-width colon, ideographic space, full-width parentheses),
/// lower-case, whitespace collapsed
pub fn normalize_label(label: &str) -> String {
    let folded: String = label.nfkc().collect::<String>().to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}
