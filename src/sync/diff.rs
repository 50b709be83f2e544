//! Change detection.
//!
//! Every batch is deduplicated by natural key, then classified against the
//! hashes already in the store: new keys are inserted, unchanged hashes are
//! skipped and changed hashes are updated.

use std::collections::HashMap;
use std::hash::Hash;

use crate::models::{Attributes, ExistingState, ImportRow, SyncStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupStats {
    pub before: usize,
    pub after: usize,
}

impl DedupStats {
    pub fn removed(&self) -> usize {
        self.before - self.after
    }
}

/// Keeps the last occurrence of every key, at the position of the first.
pub fn dedup_last<T, K, F>(rows: Vec<T>, key: F) -> (Vec<T>, DedupStats)
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let before = rows.len();
    let mut positions: HashMap<K, usize> = HashMap::with_capacity(before);
    let mut kept: Vec<T> = Vec::with_capacity(before);

    for row in rows {
        let k = key(&row);
        match positions.get(&k) {
            Some(&index) => kept[index] = row,
            None => {
                positions.insert(k, kept.len());
                kept.push(row);
            }
        }
    }

    let stats = DedupStats {
        before,
        after: kept.len(),
    };
    if stats.removed() > 0 {
        tracing::warn!(
            before = stats.before,
            after = stats.after,
            "duplicate natural keys in batch, keeping the last occurrence"
        );
    }
    (kept, stats)
}

/// Rows to write plus what happened to each input row.
#[derive(Debug, Clone)]
pub struct DiffPlan<A> {
    pub rows: Vec<ImportRow<A>>,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub requeued: usize,
}

/// Classifies rows against the stored state of their keys.
pub fn classify<A: Attributes>(
    rows: Vec<ImportRow<A>>,
    existing: &HashMap<A::Key, ExistingState>,
) -> DiffPlan<A> {
    let mut plan = DiffPlan {
        rows: Vec::with_capacity(rows.len()),
        inserted: 0,
        updated: 0,
        skipped: 0,
        requeued: 0,
    };

    for mut row in rows {
        match existing.get(&row.key()) {
            None => {
                row.status = SyncStatus::Pending;
                plan.inserted += 1;
                plan.rows.push(row);
            }
            Some(state) if state.hash.as_deref() == Some(row.hash.as_str()) => {
                plan.skipped += 1;
            }
            Some(state) => {
                row.status = match state.status {
                    SyncStatus::Disabled => SyncStatus::Disabled,
                    SyncStatus::Synced => {
                        plan.requeued += 1;
                        SyncStatus::Pending
                    }
                    SyncStatus::Pending | SyncStatus::Error => SyncStatus::Pending,
                };
                plan.updated += 1;
                plan.rows.push(row);
            }
        }
    }

    plan
}
