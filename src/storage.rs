//! Storage layout for tix
//!
//! All state lives under one data root (`--home`, `TIX_HOME`, or `~/.tix`).
//! Each context has its own task file and history file.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.tix/
//!   config.toml                   # Optional configuration
//!   active_context                # Name of the active context
//!   tasks.json                    # Tasks of the default context
//!   history.json                  # Undo/redo stacks of the default context
//!   contexts/
//!     <name>.json                 # Tasks of a named context
//!     history/
//!       <name>.json               # Undo/redo stacks of a named context
//!   attachments/
//!     <task id>/                  # Files attached to a task
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::lock;

/// Name of the data root under the home directory
pub const DATA_DIR: &str = ".tix";

/// Context used when none is selected
pub const DEFAULT_CONTEXT: &str = "default";

/// Environment variable overriding the data root
pub const HOME_ENV: &str = "TIX_HOME";

/// Storage manager for tix state
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
    context: String,
}

impl Storage {
    /// Create storage rooted at `root` for the given context
    pub fn new(root: PathBuf, context: impl Into<String>) -> Result<Self> {
        let context = context.into();
        validate_context_name(&context)?;
        Ok(Self { root, context })
    }

    /// Resolve the data root and context the way the CLI does.
    ///
    /// Root: explicit path, then `TIX_HOME`, then `~/.tix`.
    /// Context: explicit name, then the `active_context` file, then `default`.
    pub fn resolve(root: Option<PathBuf>, context: Option<String>) -> Result<Self> {
        let root = match root {
            Some(root) => root,
            None => default_root()?,
        };

        let context = match non_empty(context.as_deref()) {
            Some(name) => name.to_string(),
            None => read_active_context(&root).unwrap_or_else(|| DEFAULT_CONTEXT.to_string()),
        };

        Self::new(root, context)
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn is_default_context(&self) -> bool {
        self.context == DEFAULT_CONTEXT
    }

    /// Path to the file naming the active context
    pub fn active_context_file(&self) -> PathBuf {
        self.root.join("active_context")
    }

    /// Path to the named-contexts directory
    pub fn contexts_dir(&self) -> PathBuf {
        self.root.join("contexts")
    }

    /// Path to the task collection of the current context
    pub fn tasks_file(&self) -> PathBuf {
        if self.is_default_context() {
            self.root.join("tasks.json")
        } else {
            self.contexts_dir().join(format!("{}.json", self.context))
        }
    }

    /// Directory holding the histories of named contexts.
    ///
    /// Kept apart from the task files so no context name can map onto
    /// another context's history.
    pub fn context_history_dir(&self) -> PathBuf {
        self.contexts_dir().join("history")
    }

    /// Path to the undo/redo history of the current context
    pub fn history_file(&self) -> PathBuf {
        if self.is_default_context() {
            self.root.join("history.json")
        } else {
            self.context_history_dir()
                .join(format!("{}.json", self.context))
        }
    }

    /// Directory holding attachments for a task
    pub fn attachment_dir(&self, task_id: u64) -> PathBuf {
        self.root.join("attachments").join(task_id.to_string())
    }

    // =========================================================================
    // Directory initialization
    // =========================================================================

    /// Create the data root and the directory holding this context's files
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        if !self.is_default_context() {
            fs::create_dir_all(self.context_history_dir())?;
        }
        Ok(())
    }

    // =========================================================================
    // File I/O helpers
    // =========================================================================

    /// Write JSON data atomically (pretty-printed)
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        lock::write_atomic(path, json.as_bytes())
    }

    /// Persist the active context name
    pub fn write_active_context(&self, name: &str) -> Result<()> {
        validate_context_name(name)?;
        fs::create_dir_all(&self.root)?;
        lock::write_atomic(self.active_context_file(), format!("{name}\n").as_bytes())
    }
}

/// Copy an unreadable data file aside as `<path>.corrupt` before it gets
/// replaced, returning the backup path.
pub fn quarantine(path: &Path) -> Result<PathBuf> {
    let backup = PathBuf::from(format!("{}.corrupt", path.display()));
    fs::copy(path, &backup)?;
    Ok(backup)
}

fn default_root() -> Result<PathBuf> {
    if let Ok(root) = std::env::var(HOME_ENV) {
        if let Some(root) = non_empty(Some(root.as_str())) {
            return Ok(PathBuf::from(root));
        }
    }

    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(DATA_DIR))
        .ok_or_else(|| Error::OperationFailed("could not determine home directory".to_string()))
}

fn read_active_context(root: &Path) -> Option<String> {
    let raw = fs::read_to_string(root.join("active_context")).ok()?;
    non_empty(Some(raw.as_str())).map(str::to_string)
}

/// Context names become file names, so they must stay inside `contexts/`.
pub fn validate_context_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument(
            "context name cannot be empty".to_string(),
        ));
    }
    if trimmed != name
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control)
    {
        return Err(Error::InvalidArgument(format!(
            "invalid context name '{name}'"
        )));
    }
    Ok(())
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}
