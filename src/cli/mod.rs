//! Command-line interface for tix
//!
//! This module defines the CLI structure using clap derive macros.
//! Command implementations live in the submodules.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::error::Result;
use crate::output::OutputOptions;
use crate::storage::Storage;
use crate::store::{ClearSelection, TaskStore};

mod context;
mod history;
mod stats;
mod task;

/// tix - personal task tracker
///
/// Every change to your task list can be undone and redone, even across
/// invocations.
#[derive(Parser, Debug)]
#[command(name = "tix")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory (defaults to ~/.tix)
    #[arg(long, global = true, env = "TIX_HOME")]
    pub home: Option<PathBuf>,

    /// Context (separate task list) to operate on
    #[arg(long, global = true, env = "TIX_CONTEXT")]
    pub context: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a new task
    Add {
        /// Task text
        text: String,

        /// Priority: low, medium, high
        #[arg(short, long)]
        priority: Option<String>,

        /// Tag to attach (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// List tasks
    Ls {
        /// Include completed tasks
        #[arg(short, long)]
        all: bool,

        /// Only completed tasks
        #[arg(long, conflicts_with = "all")]
        completed: bool,

        /// Only tasks with this tag
        #[arg(short, long)]
        tag: Option<String>,

        /// Only tasks with this priority
        #[arg(short, long)]
        priority: Option<String>,
    },

    /// Show one task in detail
    Show {
        /// Task id
        id: u64,
    },

    /// Edit a task
    Edit {
        /// Task id
        id: u64,

        /// New text
        #[arg(long)]
        text: Option<String>,

        /// New priority
        #[arg(short, long)]
        priority: Option<String>,

        /// Tag to add (repeatable)
        #[arg(long = "add-tag")]
        add_tags: Vec<String>,

        /// Tag to remove (repeatable)
        #[arg(long = "remove-tag")]
        remove_tags: Vec<String>,

        /// Time estimate in minutes (0 clears it)
        #[arg(long)]
        estimate: Option<u32>,
    },

    /// Mark a task as completed
    Done {
        /// Task id
        id: u64,
    },

    /// Mark several tasks as completed in one undoable step
    DoneAll {
        /// Task ids
        #[arg(required = true)]
        ids: Vec<u64>,
    },

    /// Mark a completed task as active again
    Reopen {
        /// Task id
        id: u64,
    },

    /// Delete a task
    Rm {
        /// Task id
        id: u64,
    },

    /// Delete completed (default) or active tasks in one undoable step
    Clear {
        /// Delete completed tasks
        #[arg(long)]
        completed: bool,

        /// Delete active tasks
        #[arg(long)]
        active: bool,
    },

    /// Start the timer on a task
    Start {
        /// Task id
        id: u64,
    },

    /// Stop the timer on a task and log the time
    Stop {
        /// Task id
        id: u64,
    },

    /// Undo the last change
    Undo,

    /// Redo the last undone change
    Redo,

    /// Show what undo and redo would do next
    History {
        /// Forget all undo and redo entries
        #[arg(long)]
        clear: bool,
    },

    /// Show task statistics
    Stats,

    /// Show or switch the active context
    Context {
        /// Context to make active
        name: Option<String>,
    },
}

/// Flags shared by every command
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub home: Option<PathBuf>,
    pub context: Option<String>,
    pub json: bool,
    pub quiet: bool,
}

impl GlobalOptions {
    pub fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }
}

/// Everything a command needs, resolved once per invocation.
pub(crate) struct CommandContext {
    pub config: Config,
    pub store: TaskStore,
}

pub(crate) fn load_context(global: &GlobalOptions) -> Result<CommandContext> {
    let storage = Storage::resolve(global.home.clone(), global.context.clone())?;
    let config = Config::load_from_dir(storage.root());
    tracing::debug!(
        root = %storage.root().display(),
        context = storage.context(),
        "resolved storage"
    );
    let store = TaskStore::open(storage, &config)?;
    Ok(CommandContext { config, store })
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let global = GlobalOptions {
            home: self.home,
            context: self.context,
            json: self.json,
            quiet: self.quiet,
        };

        match self.command {
            Commands::Add {
                text,
                priority,
                tags,
            } => task::run_add(task::AddOptions { text, priority, tags }, &global),
            Commands::Ls {
                all,
                completed,
                tag,
                priority,
            } => task::run_list(
                task::ListOptions {
                    all,
                    completed,
                    tag,
                    priority,
                },
                &global,
            ),
            Commands::Show { id } => task::run_show(id, &global),
            Commands::Edit {
                id,
                text,
                priority,
                add_tags,
                remove_tags,
                estimate,
            } => task::run_edit(
                task::EditOptions {
                    id,
                    text,
                    priority,
                    add_tags,
                    remove_tags,
                    estimate,
                },
                &global,
            ),
            Commands::Done { id } => task::run_done(id, &global),
            Commands::DoneAll { ids } => task::run_done_all(&ids, &global),
            Commands::Reopen { id } => task::run_reopen(id, &global),
            Commands::Rm { id } => task::run_rm(id, &global),
            Commands::Clear { completed, active } => {
                let selection = match (completed, active) {
                    (true, true) => ClearSelection::All,
                    (false, true) => ClearSelection::Active,
                    _ => ClearSelection::Completed,
                };
                task::run_clear(selection, &global)
            }
            Commands::Start { id } => task::run_start(id, &global),
            Commands::Stop { id } => task::run_stop(id, &global),
            Commands::Undo => history::run_undo(&global),
            Commands::Redo => history::run_redo(&global),
            Commands::History { clear } => history::run_status(clear, &global),
            Commands::Stats => stats::run(&global),
            Commands::Context { name } => context::run(name, &global),
        }
    }
}
