//! Undo, redo and history status commands.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::change::Transaction;
use crate::cli::{load_context, GlobalOptions};
use crate::error::Result;
use crate::history::{RedoOutcome, UndoOutcome};
use crate::output::{emit_success, HumanOutput};

#[derive(Serialize)]
struct ReplayOutput {
    applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    transaction: Option<TransactionSummary>,
}

#[derive(Serialize)]
struct TransactionSummary {
    id: Uuid,
    label: String,
    recorded_at: DateTime<Utc>,
    changes: usize,
    task_ids: Vec<u64>,
}

impl From<&Transaction> for TransactionSummary {
    fn from(transaction: &Transaction) -> Self {
        Self {
            id: transaction.id,
            label: transaction.label.clone(),
            recorded_at: transaction.recorded_at,
            changes: transaction.len(),
            task_ids: transaction.task_ids(),
        }
    }
}

pub fn run_undo(global: &GlobalOptions) -> Result<()> {
    let ctx = load_context(global)?;
    let (human, output) = match ctx.store.undo()? {
        UndoOutcome::Undone(transaction) => {
            let mut human = HumanOutput::new(format!("Undid: {}", transaction.label));
            push_transaction(&mut human, &transaction);
            human.push_next_step("tix redo");
            (human, applied(&transaction))
        }
        UndoOutcome::NothingToUndo => (HumanOutput::new("Nothing to undo"), nothing()),
    };
    emit_success(global.output(), "undo", &output, Some(&human))
}

pub fn run_redo(global: &GlobalOptions) -> Result<()> {
    let ctx = load_context(global)?;
    let (human, output) = match ctx.store.redo()? {
        RedoOutcome::Redone(transaction) => {
            let mut human = HumanOutput::new(format!("Redid: {}", transaction.label));
            push_transaction(&mut human, &transaction);
            human.push_next_step("tix undo");
            (human, applied(&transaction))
        }
        RedoOutcome::NothingToRedo => (HumanOutput::new("Nothing to redo"), nothing()),
    };
    emit_success(global.output(), "redo", &output, Some(&human))
}

pub fn run_status(clear: bool, global: &GlobalOptions) -> Result<()> {
    let ctx = load_context(global)?;
    if clear {
        ctx.store.history().clear()?;
    }
    let status = ctx.store.history().status()?;

    let mut human = HumanOutput::new(if clear { "History cleared" } else { "History" });
    human.push_summary("Undo", status.undo_depth.to_string());
    human.push_summary("Redo", status.redo_depth.to_string());
    if let Some(label) = status.next_undo.as_deref() {
        human.push_summary("Next undo", label);
    }
    if let Some(label) = status.next_redo.as_deref() {
        human.push_summary("Next redo", label);
    }
    if let Some(limit) = ctx.config.history.limit {
        human.push_summary("Limit", limit.to_string());
    }

    emit_success(global.output(), "history", &status, Some(&human))
}

fn applied(transaction: &Transaction) -> ReplayOutput {
    ReplayOutput {
        applied: true,
        transaction: Some(TransactionSummary::from(transaction)),
    }
}

fn nothing() -> ReplayOutput {
    ReplayOutput {
        applied: false,
        transaction: None,
    }
}

fn push_transaction(human: &mut HumanOutput, transaction: &Transaction) {
    human.push_summary("Changes", transaction.len().to_string());
    human.push_summary(
        "Recorded",
        transaction
            .recorded_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
            .to_string(),
    );
    for change in &transaction.changes {
        human.push_detail(format!("{} #{}", change.kind(), change.task_id()));
    }
}
