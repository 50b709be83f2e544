use std::fmt;

/// Counters for one import or sync step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub fetched: usize,
    /// Source records without a usable identifier.
    pub dropped: usize,
    /// Duplicate natural keys collapsed within the batch.
    pub deduplicated: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped_unchanged: usize,
    /// Synced records put back to pending by a content change.
    pub requeued: usize,
    pub written: usize,
    pub created: usize,
    pub linked: usize,
    pub errored: usize,
    pub skipped_unresolved: usize,
    /// Records whose parent is not in the store.
    pub skipped_orphans: usize,
}

impl SyncReport {
    /// True when no record ended in error.
    pub fn succeeded(&self) -> bool {
        self.errored == 0
    }

    pub fn merge(&mut self, other: &SyncReport) {
        self.fetched += other.fetched;
        self.dropped += other.dropped;
        self.deduplicated += other.deduplicated;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.skipped_unchanged += other.skipped_unchanged;
        self.requeued += other.requeued;
        self.written += other.written;
        self.created += other.created;
        self.linked += other.linked;
        self.errored += other.errored;
        self.skipped_unresolved += other.skipped_unresolved;
        self.skipped_orphans += other.skipped_orphans;
    }

    fn counters(&self) -> [(&'static str, usize); 13] {
        [
            ("fetched", self.fetched),
            ("dropped", self.dropped),
            ("deduplicated", self.deduplicated),
            ("inserted", self.inserted),
            ("updated", self.updated),
            ("skipped_unchanged", self.skipped_unchanged),
            ("requeued", self.requeued),
            ("written", self.written),
            ("created", self.created),
            ("linked", self.linked),
            ("errored", self.errored),
            ("skipped_unresolved", self.skipped_unresolved),
            ("skipped_orphans", self.skipped_orphans),
        ]
    }
}

/// Non-zero counters as `name=value` pairs.
impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .counters()
            .iter()
            .filter(|(_, value)| *value > 0)
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();

        if parts.is_empty() {
            write!(f, "nothing to do")
        } else {
            write!(f, "{}", parts.join(" "))
        }
    }
}
