// Cross-source deduplication - bank debits that mirror payment-platform records
//
// Paying with a bank card through Alipay produces two drafts: the Alipay row
// (merchant, goods) and the bank row (often just "快捷支付 支付宝"). Matches are
// flagged, never deleted; the caller decides what to keep.

use itertools::Itertools;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::models::TransactionDraft;

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Largest amount difference still treated as equal
    pub amount_epsilon: Decimal,

    /// Timestamps within this many hours of each other may match
    pub time_tolerance_hours: i64,

    /// Bank free text containing one of these names a payment platform
    pub platform_keywords: Vec<String>,

    /// Bank summaries for generic card payments
    pub card_payment_markers: Vec<String>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            amount_epsilon: Decimal::new(1, 2),
            time_tolerance_hours: 48,
            platform_keywords: ["支付宝", "alipay", "蚂蚁"].map(String::from).to_vec(),
            card_payment_markers: ["快捷支付", "银联快捷支付", "银联消费", "消费", "网上支付"]
                .map(String::from)
                .to_vec(),
        }
    }
}

// ============================================================================
// MATCH RESULT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    /// Bank text names the payment platform
    PlatformKeyword,
    /// Generic card payment whose counterparty overlaps the platform's
    CardPaymentCounterparty,
}

impl MatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchReason::PlatformKeyword => "platform keyword",
            MatchReason::CardPaymentCounterparty => "card payment counterparty",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateFlag {
    /// Index of the bank draft in the input slice
    pub bank_index: usize,
    /// Index of the payment-platform draft in the input slice
    pub platform_index: usize,
    pub bank_row_id: String,
    pub platform_row_id: String,
    pub reason: MatchReason,
    /// Absolute time difference between the two records
    pub time_delta_minutes: i64,
}

// ============================================================================
// DEDUPLICATOR
// ============================================================================

pub struct CrossSourceDeduplicator {
    config: DedupConfig,
}

impl CrossSourceDeduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    /// Flag bank drafts that duplicate a payment-platform draft
    ///
    /// Each platform draft is claimed by at most one bank draft; bank drafts
    /// are visited in input order and take the closest unclaimed candidate.
    pub fn find_duplicates(&self, drafts: &[TransactionDraft]) -> Vec<DuplicateFlag> {
        let platform: Vec<usize> = (0..drafts.len())
            .filter(|&i| drafts[i].source.is_payment_platform())
            .collect();
        let mut claimed: HashSet<usize> = HashSet::new();
        let mut flags = Vec::new();

        for (bank_index, bank) in drafts.iter().enumerate() {
            if bank.source.is_payment_platform() {
                continue;
            }

            let best = platform
                .iter()
                .filter(|i| !claimed.contains(*i))
                .filter_map(|&i| {
                    let candidate = &drafts[i];
                    let delta = self.within_window(bank, candidate)?;
                    if (bank.amount - candidate.amount).abs() > self.config.amount_epsilon {
                        return None;
                    }
                    let reason = self.match_reason(bank, candidate)?;
                    Some((delta, i, reason))
                })
                .min_by_key(|(delta, i, _)| (*delta, *i));

            if let Some((delta, platform_index, reason)) = best {
                claimed.insert(platform_index);
                let candidate = &drafts[platform_index];
                debug!(
                    "{} duplicates {} ({}, {} min apart)",
                    bank.source_row_id,
                    candidate.source_row_id,
                    reason.as_str(),
                    delta
                );
                flags.push(DuplicateFlag {
                    bank_index,
                    platform_index,
                    bank_row_id: bank.source_row_id.clone(),
                    platform_row_id: candidate.source_row_id.clone(),
                    reason,
                    time_delta_minutes: delta,
                });
            }
        }

        flags
    }

    /// Absolute minutes between the two timestamps, if within tolerance
    fn within_window(&self, a: &TransactionDraft, b: &TransactionDraft) -> Option<i64> {
        let delta = (a.occurred_at - b.occurred_at).abs();
        let tolerance = chrono::Duration::hours(self.config.time_tolerance_hours);
        (delta <= tolerance).then_some(delta.num_minutes())
    }

    fn match_reason(&self, bank: &TransactionDraft, platform: &TransactionDraft) -> Option<MatchReason> {
        let bank_text = [&bank.description, &bank.counterparty, &bank.memo]
            .iter()
            .filter_map(|f| f.as_deref())
            .join(" ")
            .to_lowercase();

        if self
            .config
            .platform_keywords
            .iter()
            .any(|k| bank_text.contains(&k.to_lowercase()))
        {
            return Some(MatchReason::PlatformKeyword);
        }

        let is_card_payment = bank.description.as_deref().is_some_and(|d| {
            self.config
                .card_payment_markers
                .iter()
                .any(|m| d.contains(m.as_str()))
        });
        if is_card_payment && names_overlap(bank.counterparty.as_deref(), platform.counterparty.as_deref()) {
            return Some(MatchReason::CardPaymentCounterparty);
        }

        None
    }
}

/// Either name contains the other (case-insensitive); empty names never overlap
fn names_overlap(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => {
            let (a, b) = (a.trim().to_lowercase(), b.trim().to_lowercase());
            !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a))
        }
        _ => false,
    }
}
