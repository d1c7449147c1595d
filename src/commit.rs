//! Commit boundary: where drafts leave the ingestion core
//!
//! A sink must insert each `(source, sourceRowId)` at most once, even when
//! several batches are committed concurrently. Re-importing the same file is
//! therefore a no-op that reports every draft as skipped.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::info;

use crate::models::{Source, TransactionDraft};

/// Drafts from one parsed file plus file metadata
#[derive(Debug, Clone)]
pub struct CommitBatch {
    pub drafts: Vec<TransactionDraft>,
    pub warning_count: usize,
    pub file_name: String,
    pub file_size: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub inserted: usize,
    pub skipped: usize,
}

pub trait CommitSink: Send + Sync {
    fn commit(&self, batch: CommitBatch) -> Result<CommitSummary>;
}

/// Reference sink keeping drafts in memory
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    rows: Mutex<HashMap<(Source, String), TransactionDraft>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of stored drafts, ordered by timestamp then id
    pub fn drafts(&self) -> Result<Vec<TransactionDraft>> {
        let rows = self
            .rows
            .lock()
            .map_err(|_| anyhow!("ledger lock poisoned"))?;
        let mut drafts: Vec<TransactionDraft> = rows.values().cloned().collect();
        drafts.sort_by(|a, b| {
            a.occurred_at
                .cmp(&b.occurred_at)
                .then_with(|| a.source_row_id.cmp(&b.source_row_id))
        });
        Ok(drafts)
    }
}

impl CommitSink for InMemoryLedger {
    fn commit(&self, batch: CommitBatch) -> Result<CommitSummary> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| anyhow!("ledger lock poisoned"))?;

        let mut summary = CommitSummary::default();
        for draft in batch.drafts {
            let key = (draft.source, draft.source_row_id.clone());
            if rows.contains_key(&key) {
                summary.skipped += 1;
            } else {
                rows.insert(key, draft);
                summary.inserted += 1;
            }
        }

        info!(
            "Committed {} ({} bytes, {} warnings): {} inserted, {} skipped",
            batch.file_name, batch.file_size, batch.warning_count, summary.inserted, summary.skipped
        );
        Ok(summary)
    }
}
