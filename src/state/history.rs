//! Bounded change history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

/// Default number of change records kept.
pub const DEFAULT_MAX_HISTORY: usize = 50;

/// Audit entry for one successful `set`.
///
/// Kept for diagnostics only; the history is never replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    /// Key that changed.
    pub key: String,
    /// Value before the change, `None` if the key was absent.
    pub old_value: Option<Value>,
    /// Value after the change.
    pub new_value: Option<Value>,
    /// When the change was applied.
    pub timestamp: DateTime<Utc>,
}

/// Ring buffer of [`ChangeRecord`]s; the oldest record is evicted first.
#[derive(Debug, Clone)]
pub(crate) struct ChangeHistory {
    records: VecDeque<ChangeRecord>,
    capacity: usize,
}

impl ChangeHistory {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, record: ChangeRecord) {
        if self.capacity == 0 {
            return;
        }
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// The `limit` most recent records, oldest first.
    pub(crate) fn recent(&self, limit: usize) -> Vec<ChangeRecord> {
        let skip = self.records.len().saturating_sub(limit);
        self.records.iter().skip(skip).cloned().collect()
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}
