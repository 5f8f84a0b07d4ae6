//! Task store for tix.
//!
//! The store is the only writer of the task file. Every operation is a
//! whole-file read-modify-write inside a locked critical section
//! ([`TaskStore::mutate`]); nothing is cached between calls. Mutations hand
//! a [`Transaction`] to the [`HistoryManager`] unless `record_history` is
//! false, which is how undo/redo replays avoid recording themselves.
//!
//! The task file is `{"next_id": N, "tasks": [...]}`. A legacy bare array
//! of tasks is upgraded in place on first read. Entries are read one at a
//! time: an unreadable entry is dropped (after the file is copied to
//! `<file>.corrupt`) without losing its neighbours or the stored `next_id`.
//! A file that is not JSON at all is backed up the same way and treated as
//! an empty store.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::change::{ChangeRecord, Transaction};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::history::{ChangeSink, HistoryManager, RedoOutcome, UndoOutcome};
use crate::lock;
use crate::storage::{self, Storage};
use crate::task::{Priority, Task};

/// Persisted task collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskCollection {
    pub next_id: u64,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Default for TaskCollection {
    fn default() -> Self {
        Self::empty()
    }
}

impl TaskCollection {
    pub fn empty() -> Self {
        Self {
            next_id: 1,
            tasks: Vec::new(),
        }
    }

    pub fn find(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    fn position(&self, id: u64) -> Option<usize> {
        self.tasks.iter().position(|task| task.id == id)
    }

    fn max_id(&self) -> u64 {
        self.tasks.iter().map(|task| task.id).max().unwrap_or(0)
    }

    /// Keep `next_id` above every stored id. Returns true if it moved.
    fn repair_next_id(&mut self) -> bool {
        let floor = self.max_id() + 1;
        if self.next_id < floor {
            self.next_id = floor;
            return true;
        }
        false
    }

    /// Put a snapshot back under its own id, keeping id order.
    fn insert_snapshot(&mut self, task: Task) {
        match self.position(task.id) {
            Some(index) => self.tasks[index] = task,
            None => {
                let index = self.tasks.partition_point(|existing| existing.id < task.id);
                self.tasks.insert(index, task);
            }
        }
        self.repair_next_id();
    }

    fn apply_batch(
        &mut self,
        ids: &[u64],
        operation: &BatchOperation,
        label: String,
    ) -> Transaction {
        let mut transaction = Transaction::new(label);
        for &id in ids {
            let Some(index) = self.position(id) else {
                tracing::debug!(task_id = id, "batch skipped unknown task");
                continue;
            };

            if *operation == BatchOperation::Delete {
                let before = self.tasks.remove(index);
                transaction.push(ChangeRecord::Delete { before });
                continue;
            }

            let before = self.tasks[index].clone();
            let mut after = before.clone();
            operation.apply(&mut after);
            if after != before {
                self.tasks[index] = after.clone();
                transaction.push(ChangeRecord::Update { before, after });
            }
        }
        transaction
    }

    /// Apply one replayed change. Drift between the record and the stored
    /// state is tolerated: the snapshot wins.
    fn apply_replay(&mut self, change: &ChangeRecord) {
        match change {
            ChangeRecord::Add { after } => {
                if self.position(after.id).is_some() {
                    tracing::warn!(task_id = after.id, "replayed add over an existing task");
                }
                self.insert_snapshot(after.clone());
            }
            ChangeRecord::Update { after, .. } => match self.position(after.id) {
                Some(index) => self.tasks[index] = after.clone(),
                None => {
                    tracing::warn!(task_id = after.id, "replayed update of a missing task");
                    self.insert_snapshot(after.clone());
                }
            },
            ChangeRecord::Delete { before } => match self.position(before.id) {
                Some(index) => {
                    self.tasks.remove(index);
                }
                None => {
                    tracing::warn!(task_id = before.id, "replayed delete of a missing task");
                }
            },
        }
    }
}

/// Single-task operation applied across many ids by [`TaskStore::batch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    Complete,
    Reopen,
    Delete,
    SetPriority(Priority),
    AddTag(String),
    RemoveTag(String),
}

impl BatchOperation {
    pub fn name(&self) -> &'static str {
        match self {
            BatchOperation::Complete => "complete",
            BatchOperation::Reopen => "reopen",
            BatchOperation::Delete => "delete",
            BatchOperation::SetPriority(_) => "priority",
            BatchOperation::AddTag(_) => "tag",
            BatchOperation::RemoveTag(_) => "untag",
        }
    }

    fn apply(&self, task: &mut Task) {
        match self {
            BatchOperation::Complete => task.mark_done(),
            BatchOperation::Reopen => task.reopen(),
            BatchOperation::SetPriority(priority) => task.priority = *priority,
            BatchOperation::AddTag(tag) => {
                task.add_tag(tag);
            }
            BatchOperation::RemoveTag(tag) => {
                task.remove_tag(tag);
            }
            BatchOperation::Delete => {}
        }
    }

    fn label(&self, ids: &[u64]) -> String {
        format!("{} {}", self.name(), id_list(ids))
    }
}

/// Which tasks [`TaskStore::clear`] deletes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearSelection {
    Completed,
    Active,
    All,
}

impl ClearSelection {
    pub fn name(self) -> &'static str {
        match self {
            ClearSelection::Completed => "completed",
            ClearSelection::Active => "active",
            ClearSelection::All => "all",
        }
    }

    pub fn matches(self, task: &Task) -> bool {
        match self {
            ClearSelection::Completed => task.completed,
            ClearSelection::Active => !task.completed,
            ClearSelection::All => true,
        }
    }
}

fn id_list(ids: &[u64]) -> String {
    ids.iter()
        .map(|id| format!("#{id}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Task store bound to one context
#[derive(Debug, Clone)]
pub struct TaskStore {
    storage: Storage,
    history: HistoryManager,
    lock_timeout_ms: u64,
}

impl TaskStore {
    pub fn new(storage: Storage, config: &Config) -> Self {
        let history = HistoryManager::new(storage.history_file())
            .with_limit(config.history.limit)
            .with_lock_timeout(config.lock.timeout_ms);
        Self {
            storage,
            history,
            lock_timeout_ms: config.lock.timeout_ms,
        }
    }

    /// Open the store, creating the data directories and an empty task file
    /// if none exists yet.
    pub fn open(storage: Storage, config: &Config) -> Result<Self> {
        storage.init()?;
        let store = Self::new(storage, config);
        let path = store.tasks_file();
        if !path.exists() {
            lock::critical_section(&path, store.lock_timeout_ms, || {
                if !path.exists() {
                    store.write_unlocked(&TaskCollection::empty())?;
                }
                Ok(())
            })?;
        }
        Ok(store)
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn tasks_file(&self) -> PathBuf {
        self.storage.tasks_file()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn load_collection(&self) -> Result<TaskCollection> {
        lock::critical_section(&self.tasks_file(), self.lock_timeout_ms, || {
            self.read_unlocked()
        })
    }

    pub fn load_all(&self) -> Result<Vec<Task>> {
        Ok(self.load_collection()?.tasks)
    }

    pub fn get(&self, id: u64) -> Result<Option<Task>> {
        Ok(self.load_collection()?.find(id).cloned())
    }

    /// Like [`get`](Self::get), but a missing task is `NotFound`.
    pub fn require(&self, id: u64) -> Result<Task> {
        self.get(id)?.ok_or(Error::NotFound(id))
    }

    pub fn active(&self) -> Result<Vec<Task>> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|task| !task.completed)
            .collect())
    }

    pub fn completed(&self) -> Result<Vec<Task>> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|task| task.completed)
            .collect())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Create a task with the next id
    pub fn add(
        &self,
        text: &str,
        priority: Priority,
        tags: Vec<String>,
        record_history: bool,
    ) -> Result<Task> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidArgument("task text cannot be empty".to_string()));
        }

        let task = self.mutate(|collection| {
            let task = Task::new(collection.next_id, text, priority, tags);
            collection.next_id += 1;
            collection.tasks.push(task.clone());
            Ok(task)
        })?;

        tracing::debug!(task_id = task.id, "added task");
        self.record(
            record_history,
            Transaction::single(
                format!("add #{}", task.id),
                ChangeRecord::Add {
                    after: task.clone(),
                },
            ),
        )?;
        Ok(task)
    }

    /// Replace the stored task that has `task.id`
    pub fn update(&self, task: Task, record_history: bool) -> Result<Task> {
        let label = format!("update #{}", task.id);
        let (task, _) = self.modify(task.id, label, record_history, move |stored| {
            *stored = task;
            Ok(())
        })?;
        Ok(task)
    }

    /// Load, change and store one task in a single critical section.
    ///
    /// An error from `f` aborts the write, so e.g. a timer `InvalidState`
    /// leaves the file untouched. A change that leaves the task identical
    /// records no history.
    pub fn modify<R>(
        &self,
        id: u64,
        label: impl Into<String>,
        record_history: bool,
        f: impl FnOnce(&mut Task) -> Result<R>,
    ) -> Result<(Task, R)> {
        let (before, after, result) = self.mutate(|collection| {
            let index = collection.position(id).ok_or(Error::NotFound(id))?;
            let before = collection.tasks[index].clone();
            let mut after = before.clone();
            let result = f(&mut after)?;
            after.id = id;
            after.normalize();
            collection.tasks[index] = after.clone();
            Ok((before, after, result))
        })?;

        if before != after {
            tracing::debug!(task_id = id, "updated task");
            self.record(
                record_history,
                Transaction::single(
                    label,
                    ChangeRecord::Update {
                        before,
                        after: after.clone(),
                    },
                ),
            )?;
        }
        Ok((after, result))
    }

    /// Remove a task, returning the removed snapshot
    pub fn delete(&self, id: u64, record_history: bool) -> Result<Task> {
        let before = self.mutate(|collection| {
            let index = collection.position(id).ok_or(Error::NotFound(id))?;
            Ok(collection.tasks.remove(index))
        })?;

        tracing::debug!(task_id = id, "deleted task");
        self.record(
            record_history,
            Transaction::single(
                format!("delete #{id}"),
                ChangeRecord::Delete {
                    before: before.clone(),
                },
            ),
        )?;
        Ok(before)
    }

    /// Apply one operation to many tasks as a single transaction.
    ///
    /// Unknown ids, and tasks the operation leaves unchanged, are skipped
    /// and do not appear in the returned transaction.
    pub fn batch(
        &self,
        ids: &[u64],
        operation: &BatchOperation,
        record_history: bool,
    ) -> Result<Transaction> {
        let transaction = self.mutate(|collection| {
            Ok(collection.apply_batch(ids, operation, operation.label(ids)))
        })?;

        tracing::debug!(
            operation = operation.name(),
            requested = ids.len(),
            applied = transaction.len(),
            "batch applied"
        );
        self.record(record_history, transaction.clone())?;
        Ok(transaction)
    }

    /// Delete every task matching `selection` as a single transaction.
    ///
    /// The selection is evaluated inside the same critical section as the
    /// delete, so a task that changes state concurrently is judged by its
    /// state at delete time.
    pub fn clear(&self, selection: ClearSelection, record_history: bool) -> Result<Transaction> {
        let transaction = self.mutate(|collection| {
            let ids: Vec<u64> = collection
                .tasks
                .iter()
                .filter(|task| selection.matches(task))
                .map(|task| task.id)
                .collect();
            let label = format!("clear {} {}", selection.name(), id_list(&ids));
            let label = label.trim_end().to_string();
            Ok(collection.apply_batch(&ids, &BatchOperation::Delete, label))
        })?;

        tracing::debug!(
            selection = selection.name(),
            deleted = transaction.len(),
            "cleared tasks"
        );
        self.record(record_history, transaction.clone())?;
        Ok(transaction)
    }

    // =========================================================================
    // History
    // =========================================================================

    pub fn undo(&self) -> Result<UndoOutcome> {
        self.history.undo(self)
    }

    pub fn redo(&self) -> Result<RedoOutcome> {
        self.history.redo(self)
    }

    fn record(&self, record_history: bool, transaction: Transaction) -> Result<()> {
        if !record_history || transaction.is_empty() {
            return Ok(());
        }
        self.history.record(transaction)
    }

    // =========================================================================
    // Critical section
    // =========================================================================

    /// Read, change and write the whole collection under the task-file lock.
    ///
    /// If `f` fails nothing is written.
    pub fn mutate<T>(&self, f: impl FnOnce(&mut TaskCollection) -> Result<T>) -> Result<T> {
        lock::critical_section(&self.tasks_file(), self.lock_timeout_ms, || {
            let mut collection = self.read_unlocked()?;
            let result = f(&mut collection)?;
            self.write_unlocked(&collection)?;
            Ok(result)
        })
    }

    fn write_unlocked(&self, collection: &TaskCollection) -> Result<()> {
        self.storage.write_json(&self.tasks_file(), collection)
    }

    fn read_unlocked(&self) -> Result<TaskCollection> {
        let path = self.tasks_file();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(TaskCollection::empty())
            }
            Err(err) => return Err(err.into()),
        };

        let value: Value = match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(err) => return self.recover_corrupt(&err.to_string()),
        };

        match value {
            Value::Array(items) => {
                let (tasks, dropped) = parse_entries(items, 1);
                if dropped > 0 {
                    self.back_up_dropped(dropped)?;
                }
                let mut collection = TaskCollection { next_id: 0, tasks };
                collection.repair_next_id();
                self.write_unlocked(&collection)?;
                tracing::info!(
                    path = %path.display(),
                    tasks = collection.tasks.len(),
                    "upgraded legacy task file"
                );
                Ok(collection)
            }
            Value::Object(mut map) if map.contains_key("next_id") => {
                let stored_next_id = map.get("next_id").and_then(Value::as_u64);
                let items = match map.remove("tasks") {
                    Some(Value::Array(items)) => items,
                    None | Some(Value::Null) => Vec::new(),
                    Some(_) => return self.recover_corrupt("tasks is not an array"),
                };

                let (tasks, dropped) = parse_entries(items, stored_next_id.unwrap_or(1));
                if dropped > 0 {
                    self.back_up_dropped(dropped)?;
                }
                if stored_next_id.is_none() {
                    tracing::warn!("next_id is not a number; deriving it from task ids");
                }

                let mut collection = TaskCollection {
                    next_id: stored_next_id.unwrap_or(0),
                    tasks,
                };
                if collection.repair_next_id() {
                    tracing::warn!(
                        next_id = collection.next_id,
                        "next_id was not above every task id; repaired"
                    );
                }
                Ok(collection)
            }
            _ => self.recover_corrupt("unexpected top-level shape"),
        }
    }

    /// Keep the file as it was before dropping entries that could not be
    /// read; the next write would lose them.
    fn back_up_dropped(&self, dropped: usize) -> Result<()> {
        let path = self.tasks_file();
        let backup = storage::quarantine(&path)?;
        tracing::warn!(
            path = %path.display(),
            backup = %backup.display(),
            dropped,
            "dropped unreadable task entries"
        );
        Ok(())
    }

    fn recover_corrupt(&self, reason: &str) -> Result<TaskCollection> {
        let path = self.tasks_file();
        let backup = storage::quarantine(&path)?;
        tracing::warn!(
            path = %path.display(),
            backup = %backup.display(),
            reason,
            "task file unreadable; starting with an empty store"
        );
        Ok(TaskCollection::empty())
    }
}

impl ChangeSink for TaskStore {
    fn apply_changes(&self, changes: &[ChangeRecord]) -> Result<()> {
        self.mutate(|collection| {
            for change in changes {
                tracing::debug!(op = change.kind(), task_id = change.task_id(), "replay");
                collection.apply_replay(change);
            }
            Ok(())
        })
    }
}

/// Read task entries one at a time, dropping those that are not tasks.
///
/// An entry without a positive integer id takes its 1-based position when
/// no other entry claims that id. Any id already taken moves to a fresh id
/// past both the largest id in the file and `next_free`. Returns the tasks
/// in file order and the number of entries dropped.
fn parse_entries(items: Vec<Value>, next_free: u64) -> (Vec<Task>, usize) {
    let claimed: HashSet<u64> = items
        .iter()
        .filter_map(|item| item.get("id").and_then(Value::as_u64))
        .filter(|id| *id > 0)
        .collect();

    let mut tasks: Vec<Task> = Vec::with_capacity(items.len());
    let mut seen = HashSet::new();
    let mut displaced = Vec::new();
    let mut dropped = 0;

    for (index, item) in items.into_iter().enumerate() {
        let Value::Object(mut map) = item else {
            tracing::warn!(index, "dropping non-object task entry");
            dropped += 1;
            continue;
        };

        let positional = !map
            .get("id")
            .and_then(Value::as_u64)
            .is_some_and(|id| id > 0);
        if positional {
            map.insert("id".to_string(), Value::from(index as u64 + 1));
        }

        match serde_json::from_value::<Task>(Value::Object(map)) {
            Ok(task) => {
                if (positional && claimed.contains(&task.id)) || !seen.insert(task.id) {
                    displaced.push(tasks.len());
                }
                tasks.push(task);
            }
            Err(err) => {
                tracing::warn!(index, error = %err, "dropping unreadable task entry");
                dropped += 1;
            }
        }
    }

    let max_id = tasks.iter().map(|task| task.id).max().unwrap_or(0);
    let mut next = next_free.max(max_id + 1);
    for index in displaced {
        tracing::warn!(
            old_id = tasks[index].id,
            new_id = next,
            "task id already taken; renumbered"
        );
        tasks[index].id = next;
        next += 1;
    }

    (tasks, dropped)
}
