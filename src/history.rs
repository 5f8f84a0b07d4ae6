//! Undo/redo history for tix.
//!
//! The history file holds two stacks of [`Transaction`]s. Recording a new
//! transaction clears the redo stack (linear history, no branches). Undo
//! replays the inverse of the top transaction, most recent change first;
//! redo replays the original changes in order. Replays go through a
//! [`ChangeSink`] and never record history themselves.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::change::{ChangeRecord, Transaction};
use crate::error::Result;
use crate::lock::{self, DEFAULT_LOCK_TIMEOUT_MS};
use crate::storage;

/// Target of undo/redo replays.
pub trait ChangeSink {
    /// Apply `changes` in the given order as one unit, without recording
    /// history.
    fn apply_changes(&self, changes: &[ChangeRecord]) -> Result<()>;
}

/// Persisted undo and redo stacks; the last element is the top.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct History {
    #[serde(default)]
    pub undo_stack: Vec<Transaction>,
    #[serde(default)]
    pub redo_stack: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UndoOutcome {
    Undone(Transaction),
    NothingToUndo,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedoOutcome {
    Redone(Transaction),
    NothingToRedo,
}

/// What `tix history` shows: depths and the labels on top of each stack.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HistoryStatus {
    pub undo_depth: usize,
    pub redo_depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_undo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_redo: Option<String>,
}

/// History manager bound to one history file
#[derive(Debug, Clone)]
pub struct HistoryManager {
    path: PathBuf,
    limit: Option<usize>,
    lock_timeout_ms: u64,
}

impl HistoryManager {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            limit: None,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    /// Cap the undo stack; the oldest transactions are evicted first.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit.filter(|limit| *limit > 0);
        self
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current stacks
    pub fn load(&self) -> Result<History> {
        lock::critical_section(&self.path, self.lock_timeout_ms, || self.read_unlocked())
    }

    /// Push a transaction on the undo stack and drop the redo branch
    pub fn record(&self, transaction: Transaction) -> Result<()> {
        if transaction.is_empty() {
            return Ok(());
        }

        let limit = self.limit;
        self.update(|history| {
            tracing::debug!(
                label = %transaction.label,
                changes = transaction.len(),
                dropped_redo = history.redo_stack.len(),
                "recording transaction"
            );
            history.undo_stack.push(transaction);
            history.redo_stack.clear();

            if let Some(limit) = limit {
                let excess = history.undo_stack.len().saturating_sub(limit);
                if excess > 0 {
                    history.undo_stack.drain(..excess);
                    tracing::debug!(evicted = excess, "history limit reached");
                }
            }
            Ok(())
        })
    }

    /// Revert the most recent transaction
    pub fn undo<S: ChangeSink + ?Sized>(&self, sink: &S) -> Result<UndoOutcome> {
        self.update(|history| {
            let Some(transaction) = history.undo_stack.pop() else {
                return Ok(UndoOutcome::NothingToUndo);
            };

            tracing::debug!(label = %transaction.label, "undo");
            sink.apply_changes(&transaction.inverse_changes())?;
            history.redo_stack.push(transaction.clone());
            Ok(UndoOutcome::Undone(transaction))
        })
    }

    /// Re-apply the most recently undone transaction
    pub fn redo<S: ChangeSink + ?Sized>(&self, sink: &S) -> Result<RedoOutcome> {
        self.update(|history| {
            let Some(transaction) = history.redo_stack.pop() else {
                return Ok(RedoOutcome::NothingToRedo);
            };

            tracing::debug!(label = %transaction.label, "redo");
            sink.apply_changes(&transaction.changes)?;
            history.undo_stack.push(transaction.clone());
            Ok(RedoOutcome::Redone(transaction))
        })
    }

    pub fn status(&self) -> Result<HistoryStatus> {
        let history = self.load()?;
        Ok(HistoryStatus {
            undo_depth: history.undo_stack.len(),
            redo_depth: history.redo_stack.len(),
            next_undo: history.undo_stack.last().map(|tx| tx.label.clone()),
            next_redo: history.redo_stack.last().map(|tx| tx.label.clone()),
        })
    }

    /// Forget both stacks
    pub fn clear(&self) -> Result<()> {
        self.update(|history| {
            *history = History::default();
            Ok(())
        })
    }

    /// Locked read-modify-write of the history file.
    ///
    /// An error from `f` leaves the file untouched; an unchanged history is
    /// not rewritten.
    fn update<T>(&self, f: impl FnOnce(&mut History) -> Result<T>) -> Result<T> {
        lock::critical_section(&self.path, self.lock_timeout_ms, || {
            let mut history = self.read_unlocked()?;
            let original = history.clone();
            let result = f(&mut history)?;
            if history != original {
                let json = serde_json::to_string_pretty(&history)?;
                lock::write_atomic(&self.path, json.as_bytes())?;
            }
            Ok(result)
        })
    }

    fn read_unlocked(&self) -> Result<History> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(History::default())
            }
            Err(err) => return Err(err.into()),
        };

        if content.trim().is_empty() {
            return Ok(History::default());
        }

        match serde_json::from_str(&content) {
            Ok(history) => Ok(history),
            Err(err) => {
                let backup = storage::quarantine(&self.path)?;
                tracing::warn!(
                    path = %self.path.display(),
                    backup = %backup.display(),
                    error = %err,
                    "history file unreadable; starting with empty history"
                );
                Ok(History::default())
            }
        }
    }
}
