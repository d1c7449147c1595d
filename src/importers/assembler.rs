//! Draft assembly: one raw row in, one draft (or warning, or silent skip) out
//!
//! The assembler is also where `sourceRowId` is decided. A source-native
//! reference wins; otherwise the id is a blake3 hash of the raw row content.
//! Identical rows within one batch get `#2`, `#3`… suffixes in encounter order
//! so ids stay unique per batch and still reproduce on a re-parse.

use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::aliases::AliasTable;
use super::normalize::{
    clean_text, normalize_account, normalize_currency, parse_amount, parse_direction,
    parse_timestamp, split_account_and_name, DirectionHint,
};
use crate::models::{
    CanonicalField, Direction, ParseResult, ParseWarning, RawRow, Source, SourceType,
    TransactionDraft,
};

/// Outcome for one raw row
#[derive(Debug, Clone, PartialEq)]
pub enum Assembled {
    Draft(TransactionDraft),
    /// Advisory line the source is known to print; dropped without a warning
    Skipped,
    Rejected(ParseWarning),
}

/// Per-batch assembler; holds the id occurrence counter
#[derive(Debug)]
pub struct DraftAssembler {
    source: Source,
    source_type: SourceType,
    aliases: &'static AliasTable,
    account_name: Option<String>,
    seen_ids: HashMap<String, usize>,
    drafts: Vec<TransactionDraft>,
    warnings: Vec<ParseWarning>,
}

/// Cleaned cell values grouped by canonical field, in column order
#[derive(Debug, Default)]
struct FieldValues {
    values: HashMap<CanonicalField, Vec<String>>,
}

impl FieldValues {
    fn first(&self, field: CanonicalField) -> Option<&str> {
        self.values
            .get(&field)
            .and_then(|v| v.first())
            .map(|s| s.as_str())
    }

    fn all(&self, field: CanonicalField) -> &[String] {
        self.values.get(&field).map(|v| v.as_slice()).unwrap_or(&[])
    }

    fn owned(&self, field: CanonicalField) -> Option<String> {
        self.first(field).map(|s| s.to_string())
    }
}

impl DraftAssembler {
    pub fn new(source: Source, source_type: SourceType) -> Self {
        Self {
            source,
            source_type,
            aliases: AliasTable::for_source(source),
            account_name: None,
            seen_ids: HashMap::new(),
            drafts: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Account name to use when a row carries none (statement-level watermark)
    pub fn with_account_name(mut self, account_name: Option<String>) -> Self {
        self.account_name = account_name;
        self
    }

    /// Assemble one row and keep the outcome for [`DraftAssembler::finish`]
    pub fn push(&mut self, row: &RawRow) {
        match self.assemble(row) {
            Assembled::Draft(draft) => self.drafts.push(draft),
            Assembled::Rejected(warning) => self.warn(warning),
            Assembled::Skipped => {
                debug!("Dropping advisory {} row {}", self.source, row.line);
            }
        }
    }

    /// Record a row-level warning (also used by extractors for rows that
    /// never reach assembly)
    pub fn warn(&mut self, warning: ParseWarning) {
        warn!("Skipping {} row {}: {}", self.source, warning.row, warning.message);
        self.warnings.push(warning);
    }

    pub fn finish(self) -> ParseResult {
        ParseResult::new(self.source, self.source_type, self.drafts, self.warnings)
    }

    pub fn assemble(&mut self, row: &RawRow) -> Assembled {
        let fields = self.collect_fields(row);
        let line = row.line;

        let signed_amount = fields.first(CanonicalField::Amount).and_then(parse_amount);
        let advisory = self.source.emits_advisory_zero_rows();
        if advisory && signed_amount.map_or(true, |a| a.is_zero()) {
            return Assembled::Skipped;
        }

        let occurred_at = match parse_timestamp(fields.all(CanonicalField::OccurredAt)) {
            Some(ts) => ts,
            None => {
                let message = match fields.first(CanonicalField::OccurredAt) {
                    Some(raw) => format!("unparsable timestamp '{}'", raw),
                    None => "missing timestamp".to_string(),
                };
                return reject(line, CanonicalField::OccurredAt, message);
            }
        };

        let signed_amount = match signed_amount {
            Some(a) if !a.is_zero() => a,
            Some(_) => return reject(line, CanonicalField::Amount, "zero amount"),
            None => {
                let message = match fields.first(CanonicalField::Amount) {
                    Some(raw) => format!("unparsable amount '{}'", raw),
                    None => "missing amount".to_string(),
                };
                return reject(line, CanonicalField::Amount, message);
            }
        };

        let direction = match fields.first(CanonicalField::Direction) {
            Some(raw) => match parse_direction(raw) {
                Some(DirectionHint::Known(d)) => d,
                Some(DirectionHint::Neutral) => {
                    return reject(
                        line,
                        CanonicalField::Direction,
                        format!("neutral direction '{}' has no in/out meaning", raw),
                    )
                }
                None => {
                    return reject(
                        line,
                        CanonicalField::Direction,
                        format!("unknown direction '{}'", raw),
                    )
                }
            },
            None if signed_amount < Decimal::ZERO => Direction::Out,
            None => Direction::In,
        };

        let transaction_ref = fields.owned(CanonicalField::TransactionRef);
        let source_row_id = self.next_row_id(transaction_ref.as_deref(), row);

        let mut counterparty = fields.owned(CanonicalField::Counterparty);
        let mut counterparty_account = fields
            .first(CanonicalField::CounterpartyAccount)
            .and_then(normalize_account);
        let combined = counterparty.as_deref().map(split_account_and_name);
        if let Some((name, Some(account))) = combined {
            // short digit runs are part of names ("12306铁路")
            if counterparty_account.is_none() && (account.len() >= 8 || account.contains('*')) {
                counterparty = name;
                counterparty_account = Some(account);
            }
        }

        let currency = fields
            .first(CanonicalField::Currency)
            .and_then(normalize_currency)
            .or_else(|| self.default_currency());

        Assembled::Draft(TransactionDraft {
            source: self.source,
            source_type: self.source_type,
            source_row_id,
            occurred_at,
            amount: signed_amount.abs(),
            direction,
            currency,
            counterparty,
            counterparty_account,
            description: fields.owned(CanonicalField::Description),
            category: fields.owned(CanonicalField::Category),
            account_name: fields
                .owned(CanonicalField::AccountName)
                .or_else(|| self.account_name.clone()),
            balance: fields.first(CanonicalField::Balance).and_then(parse_amount),
            status: fields.owned(CanonicalField::Status),
            transaction_ref,
            merchant_order_ref: fields.owned(CanonicalField::MerchantOrderRef),
            memo: fields.owned(CanonicalField::Memo),
            cash_type: fields.owned(CanonicalField::CashType),
        })
    }

    fn collect_fields(&self, row: &RawRow) -> FieldValues {
        let mut fields = FieldValues::default();
        for (label, value) in &row.cells {
            let Some(field) = self.aliases.field_of(label) else {
                continue;
            };
            if let Some(text) = value.as_text().as_deref().and_then(clean_text) {
                fields.values.entry(field).or_default().push(text);
            }
        }
        fields
    }

    fn next_row_id(&mut self, transaction_ref: Option<&str>, row: &RawRow) -> String {
        let base = match transaction_ref {
            Some(reference) => format!("{}:{}", self.source, reference),
            None => {
                let hash = blake3::hash(row.fingerprint().as_bytes());
                format!("{}:h:{}", self.source, &hash.to_hex()[..32])
            }
        };

        let seen = self.seen_ids.entry(base.clone()).or_insert(0);
        *seen += 1;
        if *seen == 1 {
            base
        } else {
            format!("{}#{}", base, seen)
        }
    }

    fn default_currency(&self) -> Option<String> {
        // Alipay amounts are always 元
        match self.source {
            Source::Alipay => Some("CNY".to_string()),
            _ => None,
        }
    }
}

fn reject(line: usize, field: CanonicalField, message: impl Into<String>) -> Assembled {
    Assembled::Rejected(ParseWarning::new(line, Some(field), message))
}
