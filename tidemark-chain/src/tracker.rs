//! Per-record sync status.
//!
//! Rule precedence is "latest applicable wins":
//! 1. a chained event sets `conflict` (broken chain), `pending` (needs
//!    review), or `synced`
//! 2. a settled review of the record's latest event sets `synced`
//! 3. an external freshness check may set `stale`
//!
//! The tracker never decides staleness by itself; [`SyncTracker::stale_candidates`]
//! lists records for a freshness collaborator to confirm via
//! [`SyncTracker::mark_stale`].

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use tidemark_core::types::{ChangeEvent, RecordKey, SyncStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncRecord {
    pub status: SyncStatus,
    pub updated_at: DateTime<Utc>,
    /// Id of the most recent accepted event for the record.
    pub last_event_id: Uuid,
}

/// Count of tracked records per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub synced: usize,
    pub pending: usize,
    pub conflict: usize,
    pub stale: usize,
}

impl SyncSummary {
    pub fn total(&self) -> usize {
        self.synced + self.pending + self.conflict + self.stale
    }
}

#[derive(Debug, Default)]
pub struct SyncTracker {
    records: RwLock<HashMap<RecordKey, SyncRecord>>,
}

impl SyncTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the status implied by a freshly chained event.
    pub fn record_chained(&self, event: &ChangeEvent, chain_broken: bool) -> SyncStatus {
        let status = SyncStatus::after_chain(chain_broken, event.requires_review);
        self.records.write().insert(
            event.record_key(),
            SyncRecord {
                status,
                updated_at: Utc::now(),
                last_event_id: event.id,
            },
        );
        tracing::debug!(
            record = %event.record_key(),
            event_id = %event.id,
            status = %status,
            "sync status updated from chain",
        );
        status
    }

    /// Settle the record once the review of its latest event completes.
    ///
    /// Returns the new status, or `None` if the event is not the record's
    /// latest, the record is untracked, or review has not settled.
    pub fn record_reconciled(&self, event: &ChangeEvent) -> Option<SyncStatus> {
        if !event.reconciliation_status.is_terminal() {
            return None;
        }
        let key = event.record_key();
        let mut records = self.records.write();
        let record = records.get_mut(&key)?;
        if record.last_event_id != event.id {
            tracing::debug!(
                record = %key,
                event_id = %event.id,
                "review settled on a superseded event; sync status unchanged",
            );
            return None;
        }
        record.status = SyncStatus::Synced;
        record.updated_at = Utc::now();
        Some(SyncStatus::Synced)
    }

    /// Mark a tracked record stale. Returns `false` if it is not tracked.
    pub fn mark_stale(&self, key: &RecordKey) -> bool {
        let mut records = self.records.write();
        match records.get_mut(key) {
            Some(record) => {
                record.status = SyncStatus::Stale;
                record.updated_at = Utc::now();
                tracing::info!(record = %key, "record marked stale");
                true
            }
            None => false,
        }
    }

    /// Records not updated within `max_age` of `now` that are not already stale.
    pub fn stale_candidates(&self, now: DateTime<Utc>, max_age: Duration) -> Vec<RecordKey> {
        let cutoff = now - max_age;
        let mut keys: Vec<RecordKey> = self
            .records
            .read()
            .iter()
            .filter(|(_, r)| r.status != SyncStatus::Stale && r.updated_at < cutoff)
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn get(&self, key: &RecordKey) -> Option<SyncRecord> {
        self.records.read().get(key).cloned()
    }

    pub fn status(&self, key: &RecordKey) -> Option<SyncStatus> {
        self.records.read().get(key).map(|r| r.status)
    }

    pub fn summary(&self) -> SyncSummary {
        let mut summary = SyncSummary::default();
        for record in self.records.read().values() {
            match record.status {
                SyncStatus::Synced => summary.synced += 1,
                SyncStatus::Pending => summary.pending += 1,
                SyncStatus::Conflict => summary.conflict += 1,
                SyncStatus::Stale => summary.stale += 1,
            }
        }
        summary
    }
}

/// Compact age such as `42s`, `5m`, `3h`, or `2d`.
pub fn format_age(since: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = now.signed_duration_since(since).num_seconds().max(0) as u64;
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}
