use crate::cli::{load_context, GlobalOptions};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::stats::{self, percent};
use crate::task::{format_minutes, now};

pub fn run(global: &GlobalOptions) -> Result<()> {
    let ctx = load_context(global)?;
    let tasks = ctx.store.load_all()?;
    let stats = stats::compute(&tasks, now().date());

    let mut human = HumanOutput::new("Task stats");
    human.push_summary("Total", stats.total.to_string());
    human.push_summary(
        "Active",
        format!("{} ({}%)", stats.active, percent(stats.active, stats.total)),
    );
    human.push_summary(
        "Completed",
        format!(
            "{} ({}%)",
            stats.completed,
            percent(stats.completed, stats.total)
        ),
    );
    human.push_summary("Completed today", stats.completed_today.to_string());

    if stats.with_estimate > 0 || stats.with_tracked_time > 0 {
        human.push_summary(
            "Estimated",
            format!(
                "{} across {} task(s)",
                format_minutes(u32::try_from(stats.estimated_minutes).unwrap_or(u32::MAX)),
                stats.with_estimate
            ),
        );
        human.push_summary(
            "Tracked",
            format!(
                "{} across {} task(s)",
                format_minutes(u32::try_from(stats.spent_minutes).unwrap_or(u32::MAX)),
                stats.with_tracked_time
            ),
        );
    }
    if stats.running_timers > 0 {
        human.push_summary("Running timers", stats.running_timers.to_string());
    }

    for count in &stats.by_priority {
        human.push_detail(format!("{}: {} active", count.priority, count.count));
    }
    if !stats.top_tags.is_empty() {
        let tags: Vec<String> = stats
            .top_tags
            .iter()
            .map(|tag| format!("@{} ({})", tag.tag, tag.count))
            .collect();
        human.push_detail(format!("Top tags: {}", tags.join(", ")));
    }

    emit_success(global.output(), "stats", &stats, Some(&human))
}
