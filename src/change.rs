//! Change records and transactions.
//!
//! Every mutation of the task collection is described by a [`ChangeRecord`]
//! carrying full task snapshots, so it can be inverted without consulting
//! the live collection. Records are grouped into a [`Transaction`], the unit
//! that undo and redo operate on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::task::Task;

/// One invertible task mutation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ChangeRecord {
    Add { after: Task },
    Update { before: Task, after: Task },
    Delete { before: Task },
}

impl ChangeRecord {
    pub fn task_id(&self) -> u64 {
        match self {
            ChangeRecord::Add { after } => after.id,
            ChangeRecord::Update { after, .. } => after.id,
            ChangeRecord::Delete { before } => before.id,
        }
    }

    /// The record that reverts this one when applied.
    pub fn inverse(&self) -> ChangeRecord {
        match self {
            ChangeRecord::Add { after } => ChangeRecord::Delete {
                before: after.clone(),
            },
            ChangeRecord::Update { before, after } => ChangeRecord::Update {
                before: after.clone(),
                after: before.clone(),
            },
            ChangeRecord::Delete { before } => ChangeRecord::Add {
                after: before.clone(),
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChangeRecord::Add { .. } => "add",
            ChangeRecord::Update { .. } => "update",
            ChangeRecord::Delete { .. } => "delete",
        }
    }
}

/// Ordered change records undone and redone as one user action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    /// Short description of the command that produced it, e.g. `complete #1 #2`
    pub label: String,
    pub changes: Vec<ChangeRecord>,
}

impl Transaction {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            label: label.into(),
            changes: Vec::new(),
        }
    }

    pub fn single(label: impl Into<String>, change: ChangeRecord) -> Self {
        let mut tx = Self::new(label);
        tx.push(change);
        tx
    }

    pub fn push(&mut self, change: ChangeRecord) {
        self.changes.push(change);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Records that revert this transaction, most recent change first.
    pub fn inverse_changes(&self) -> Vec<ChangeRecord> {
        self.changes.iter().rev().map(ChangeRecord::inverse).collect()
    }

    pub fn task_ids(&self) -> Vec<u64> {
        self.changes.iter().map(ChangeRecord::task_id).collect()
    }
}
