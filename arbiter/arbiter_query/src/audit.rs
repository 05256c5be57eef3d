//! Recent permission checks.
//!
//! This module keeps a bounded, in-memory record of recent checks for
//! diagnostics. Nothing in it is ever read back by the decision path.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use arbiter_core::{Actor, Decision, DecisionLevel, Resource};

/// One recorded check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRecord {
    /// When the check completed.
    pub timestamp: DateTime<Utc>,

    /// The actor's `id` attribute, if any.
    pub actor_id: Option<String>,

    pub action: String,
    pub resource: Resource,
    pub allowed: bool,
    pub level: DecisionLevel,
    pub reason: Option<String>,
    pub source: Option<String>,
    pub used_default: bool,
}

impl CheckRecord {
    pub fn new(actor: &Actor, decision: &Decision) -> Self {
        Self {
            timestamp: Utc::now(),
            actor_id: actor.id().map(str::to_string),
            action: decision.action.clone(),
            resource: decision.resource.clone(),
            allowed: decision.allowed,
            level: decision.level,
            reason: decision.reason.clone(),
            source: decision.source.clone(),
            used_default: decision.used_default,
        }
    }
}

/// A circular buffer of check records. The oldest record is evicted first.
pub struct CheckLog {
    /// Records, oldest first.
    entries: Mutex<VecDeque<CheckRecord>>,

    /// The maximum number of records kept. Zero disables recording.
    capacity: usize,
}

impl CheckLog {
    /// Create a new check log.
    ///
    /// # Arguments
    ///
    /// * `capacity` - The maximum number of records to keep.
    ///
    /// # Returns
    ///
    /// A new, empty check log.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Record a completed check.
    pub fn record(&self, record: CheckRecord) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(record);
    }

    /// Up to `limit` records, newest first.
    pub fn recent(&self, limit: usize) -> Vec<CheckRecord> {
        self.entries.lock().iter().rev().take(limit).cloned().collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
