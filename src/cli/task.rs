//! Task commands: add, ls, show, edit, done, done-all, reopen, rm, clear,
//! start, stop.

use serde::Serialize;

use crate::cli::{load_context, GlobalOptions};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::store::{BatchOperation, ClearSelection};
use crate::task::{format_minutes, Priority, Task};

pub struct AddOptions {
    pub text: String,
    pub priority: Option<String>,
    pub tags: Vec<String>,
}

pub struct ListOptions {
    pub all: bool,
    pub completed: bool,
    pub tag: Option<String>,
    pub priority: Option<String>,
}

pub struct EditOptions {
    pub id: u64,
    pub text: Option<String>,
    pub priority: Option<String>,
    pub add_tags: Vec<String>,
    pub remove_tags: Vec<String>,
    pub estimate: Option<u32>,
}

#[derive(Serialize)]
struct TaskListOutput {
    total: usize,
    tasks: Vec<Task>,
}

#[derive(Serialize)]
struct BatchOutput {
    label: String,
    changed: Vec<u64>,
    skipped: Vec<u64>,
}

#[derive(Serialize)]
struct TimerOutput {
    task: Task,
    #[serde(skip_serializing_if = "Option::is_none")]
    logged_minutes: Option<u32>,
}

pub fn run_add(options: AddOptions, global: &GlobalOptions) -> Result<()> {
    let ctx = load_context(global)?;
    let priority = parse_priority(options.priority.as_deref())?
        .unwrap_or(ctx.config.tasks.default_priority);

    let task = ctx.store.add(&options.text, priority, options.tags, true)?;

    let mut human = HumanOutput::new(format!("Added task #{}", task.id));
    push_task_summary(&mut human, &task);
    human.push_next_step("tix undo");

    emit_success(global.output(), "add", &task, Some(&human))
}

pub fn run_list(options: ListOptions, global: &GlobalOptions) -> Result<()> {
    let ctx = load_context(global)?;
    let priority = parse_priority(options.priority.as_deref())?;

    let tasks = if options.completed {
        ctx.store.completed()?
    } else if options.all {
        ctx.store.load_all()?
    } else {
        ctx.store.active()?
    };

    let tasks: Vec<Task> = tasks
        .into_iter()
        .filter(|task| {
            options
                .tag
                .as_deref()
                .map_or(true, |tag| task.has_tag(tag.trim()))
        })
        .filter(|task| priority.map_or(true, |priority| task.priority == priority))
        .collect();

    let mut human = HumanOutput::new(if tasks.is_empty() {
        "No tasks"
    } else {
        "Tasks"
    });
    if !tasks.is_empty() {
        human.push_summary("Total", tasks.len().to_string());
    }
    for task in &tasks {
        human.push_detail(task_line(task));
    }

    let output = TaskListOutput {
        total: tasks.len(),
        tasks,
    };
    emit_success(global.output(), "ls", &output, Some(&human))
}

pub fn run_show(id: u64, global: &GlobalOptions) -> Result<()> {
    let ctx = load_context(global)?;
    let task = ctx.store.require(id)?;

    let mut human = HumanOutput::new(format!("Task #{}", task.id));
    push_task_summary(&mut human, &task);
    human.push_summary("Created", task.created_at.format("%Y-%m-%d %H:%M").to_string());
    if let Some(completed_at) = task.completed_at {
        human.push_summary("Completed", completed_at.format("%Y-%m-%d %H:%M").to_string());
    }
    if let Some(estimate) = task.estimate {
        human.push_summary("Estimate", format_minutes(estimate));
    }
    if task.time_spent > 0 {
        human.push_summary("Time spent", format_minutes(task.time_spent));
    }
    if let Some(remaining) = task.time_remaining() {
        if remaining < 0 {
            human.push_summary(
                "Over estimate by",
                format_minutes(u32::try_from(-remaining).unwrap_or(u32::MAX)),
            );
        } else {
            human.push_summary(
                "Remaining",
                format_minutes(u32::try_from(remaining).unwrap_or(u32::MAX)),
            );
        }
    }
    if let Some(started_at) = task.started_at {
        human.push_summary(
            "Timer",
            format!(
                "running since {} ({})",
                started_at.format("%H:%M"),
                format_minutes(task.current_session_minutes())
            ),
        );
    }
    for log in &task.time_logs {
        human.push_detail(format!(
            "{} - {} ({})",
            log.started_at.format("%Y-%m-%d %H:%M"),
            log.ended_at.format("%H:%M"),
            format_minutes(log.duration)
        ));
    }
    let attachment_dir = ctx.store.storage().attachment_dir(task.id);
    if attachment_dir.is_dir() {
        human.push_summary("Attachments", attachment_dir.display().to_string());
    }
    for attachment in &task.attachments {
        human.push_detail(format!("attachment: {attachment}"));
    }
    for link in &task.links {
        human.push_detail(format!("link: {link}"));
    }

    emit_success(global.output(), "show", &task, Some(&human))
}

pub fn run_edit(options: EditOptions, global: &GlobalOptions) -> Result<()> {
    if options.text.is_none()
        && options.priority.is_none()
        && options.add_tags.is_empty()
        && options.remove_tags.is_empty()
        && options.estimate.is_none()
    {
        return Err(Error::InvalidArgument(
            "nothing to edit: pass --text, --priority, --add-tag, --remove-tag or --estimate"
                .to_string(),
        ));
    }

    let text = match options.text.as_deref().map(str::trim) {
        Some("") => {
            return Err(Error::InvalidArgument(
                "task text cannot be empty".to_string(),
            ))
        }
        other => other.map(str::to_string),
    };
    let priority = parse_priority(options.priority.as_deref())?;

    let ctx = load_context(global)?;
    let label = format!("edit #{}", options.id);
    let (task, _) = ctx.store.modify(options.id, label, true, |task| {
        if let Some(text) = text {
            task.text = text;
        }
        if let Some(priority) = priority {
            task.priority = priority;
        }
        for tag in &options.add_tags {
            task.add_tag(tag);
        }
        for tag in &options.remove_tags {
            task.remove_tag(tag);
        }
        if let Some(estimate) = options.estimate {
            task.estimate = (estimate > 0).then_some(estimate);
        }
        Ok(())
    })?;

    let mut human = HumanOutput::new(format!("Updated task #{}", task.id));
    push_task_summary(&mut human, &task);
    emit_success(global.output(), "edit", &task, Some(&human))
}

pub fn run_done(id: u64, global: &GlobalOptions) -> Result<()> {
    let ctx = load_context(global)?;
    let (task, was_completed) = ctx.store.modify(id, format!("done #{id}"), true, |task| {
        let was_completed = task.completed;
        task.mark_done();
        Ok(was_completed)
    })?;

    let mut human = if was_completed {
        HumanOutput::new(format!("Task #{id} already completed"))
    } else {
        let mut human = HumanOutput::new(format!("Completed task #{id}"));
        human.push_next_step("tix undo");
        human
    };
    push_task_summary(&mut human, &task);
    emit_success(global.output(), "done", &task, Some(&human))
}

pub fn run_done_all(ids: &[u64], global: &GlobalOptions) -> Result<()> {
    let ctx = load_context(global)?;
    let transaction = ctx.store.batch(ids, &BatchOperation::Complete, true)?;
    emit_batch(global, "done-all", "Completed", ids, transaction)
}

pub fn run_reopen(id: u64, global: &GlobalOptions) -> Result<()> {
    let ctx = load_context(global)?;
    let (task, was_completed) = ctx.store.modify(id, format!("reopen #{id}"), true, |task| {
        let was_completed = task.completed;
        task.reopen();
        Ok(was_completed)
    })?;

    let mut human = if was_completed {
        HumanOutput::new(format!("Reopened task #{id}"))
    } else {
        HumanOutput::new(format!("Task #{id} is already active"))
    };
    push_task_summary(&mut human, &task);
    emit_success(global.output(), "reopen", &task, Some(&human))
}

pub fn run_rm(id: u64, global: &GlobalOptions) -> Result<()> {
    let ctx = load_context(global)?;
    let task = ctx.store.delete(id, true)?;

    let mut human = HumanOutput::new(format!("Deleted task #{id}"));
    push_task_summary(&mut human, &task);
    human.push_next_step("tix undo");
    emit_success(global.output(), "rm", &task, Some(&human))
}

pub fn run_clear(selection: ClearSelection, global: &GlobalOptions) -> Result<()> {
    let ctx = load_context(global)?;
    let transaction = ctx.store.clear(selection, true)?;
    let ids = transaction.task_ids();
    emit_batch(global, "clear", "Cleared", &ids, transaction)
}

pub fn run_start(id: u64, global: &GlobalOptions) -> Result<()> {
    let ctx = load_context(global)?;
    let (task, _) = ctx
        .store
        .modify(id, format!("start #{id}"), true, |task| task.start_timer())?;

    let mut human = HumanOutput::new(format!("Started timer on task #{id}"));
    push_task_summary(&mut human, &task);
    human.push_next_step(format!("tix stop {id}"));

    let output = TimerOutput {
        task,
        logged_minutes: None,
    };
    emit_success(global.output(), "start", &output, Some(&human))
}

pub fn run_stop(id: u64, global: &GlobalOptions) -> Result<()> {
    let ctx = load_context(global)?;
    let (task, minutes) = ctx
        .store
        .modify(id, format!("stop #{id}"), true, |task| task.stop_timer())?;

    let mut human = HumanOutput::new(format!("Stopped timer on task #{id}"));
    push_task_summary(&mut human, &task);
    human.push_summary("Logged", format_minutes(minutes));
    human.push_summary("Total", format_minutes(task.time_spent));

    let output = TimerOutput {
        task,
        logged_minutes: Some(minutes),
    };
    emit_success(global.output(), "stop", &output, Some(&human))
}

fn emit_batch(
    global: &GlobalOptions,
    command: &str,
    verb: &str,
    requested: &[u64],
    transaction: crate::change::Transaction,
) -> Result<()> {
    let changed = transaction.task_ids();
    let skipped: Vec<u64> = requested
        .iter()
        .copied()
        .filter(|id| !changed.contains(id))
        .collect();

    let mut human = if changed.is_empty() {
        HumanOutput::new("Nothing changed")
    } else {
        let mut human = HumanOutput::new(format!("{verb} {} task(s)", changed.len()));
        human.push_next_step("tix undo");
        human
    };
    for id in &changed {
        human.push_detail(format!("#{id}"));
    }
    if !skipped.is_empty() {
        let skipped: Vec<String> = skipped.iter().map(|id| format!("#{id}")).collect();
        human.push_warning(format!("skipped {}", skipped.join(" ")));
    }

    let output = BatchOutput {
        label: transaction.label,
        changed,
        skipped,
    };
    emit_success(global.output(), command, &output, Some(&human))
}

fn parse_priority(value: Option<&str>) -> Result<Option<Priority>> {
    value.map(str::parse::<Priority>).transpose()
}

fn task_line(task: &Task) -> String {
    let mut line = format!(
        "[{}] #{} ({}) {}",
        if task.completed { "x" } else { " " },
        task.id,
        task.priority,
        task.text
    );
    for tag in &task.tags {
        line.push_str(&format!(" @{tag}"));
    }
    if task.is_timer_running() {
        line.push_str(" (timer running)");
    }
    line
}

fn push_task_summary(human: &mut HumanOutput, task: &Task) {
    human.push_summary("Task", task.text.clone());
    human.push_summary("Priority", task.priority.to_string());
    human.push_summary(
        "Status",
        if task.completed { "completed" } else { "active" },
    );
    if !task.tags.is_empty() {
        human.push_summary("Tags", task.tags.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_line_marks_completed_and_tags() {
        let mut task = Task::new(
            3,
            "Write report",
            Priority::High,
            vec!["work".to_string()],
        );
        assert_eq!(task_line(&task), "[ ] #3 (high) Write report @work");

        task.mark_done();
        assert!(task_line(&task).starts_with("[x] #3"));
    }

    #[test]
    fn parse_priority_rejects_unknown_values() {
        assert_eq!(parse_priority(None).unwrap(), None);
        assert_eq!(parse_priority(Some("h")).unwrap(), Some(Priority::High));
        assert!(parse_priority(Some("urgent")).is_err());
    }
}
