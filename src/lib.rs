//! tix - Personal Task Tracker Library
//!
//! This library provides the core functionality for the tix CLI: a task
//! list whose every change can be undone and redone across invocations.
//!
//! # Core Concepts
//!
//! - **Tasks**: Snapshotable task records with tags, estimates and timers
//! - **Change Records**: Invertible add/update/delete snapshots
//! - **Transactions**: Ordered change records undone as one user action
//! - **History**: Persisted undo/redo stacks with a linear-history policy
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `config.toml`
//! - `error`: Error types and result aliases
//! - `task`: The task entity and its timer logic
//! - `change`: Change records and transactions
//! - `history`: Undo/redo stacks and replay
//! - `store`: The task store, sole writer of the task file
//! - `stats`: Aggregate task statistics
//! - `storage`: Data root, contexts and file layout
//! - `lock`: File locking and atomic writes for concurrency safety
//! - `output`: Human and JSON output

pub mod change;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod lock;
pub mod output;
pub mod stats;
pub mod storage;
pub mod store;
pub mod task;

pub use error::{Error, Result};
