//! Aggregate statistics over a task collection.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::task::{Priority, Task};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PriorityCount {
    pub priority: Priority,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TaskStats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    /// Active tasks only
    pub by_priority: Vec<PriorityCount>,
    pub with_estimate: usize,
    pub with_tracked_time: usize,
    pub estimated_minutes: u64,
    pub spent_minutes: u64,
    pub running_timers: usize,
    pub completed_today: usize,
    /// Most used tags, most frequent first
    pub top_tags: Vec<TagCount>,
}

const TOP_TAGS: usize = 3;

pub fn compute(tasks: &[Task], today: NaiveDate) -> TaskStats {
    let completed = tasks.iter().filter(|task| task.completed).count();

    let by_priority = Priority::ALL
        .iter()
        .map(|priority| PriorityCount {
            priority: *priority,
            count: tasks
                .iter()
                .filter(|task| !task.completed && task.priority == *priority)
                .count(),
        })
        .collect();

    let mut tag_counts: HashMap<&str, usize> = HashMap::new();
    for tag in tasks.iter().flat_map(|task| task.tags.iter()) {
        *tag_counts.entry(tag.as_str()).or_default() += 1;
    }
    let mut top_tags: Vec<TagCount> = tag_counts
        .into_iter()
        .map(|(tag, count)| TagCount {
            tag: tag.to_string(),
            count,
        })
        .collect();
    top_tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    top_tags.truncate(TOP_TAGS);

    TaskStats {
        total: tasks.len(),
        active: tasks.len() - completed,
        completed,
        by_priority,
        with_estimate: tasks
            .iter()
            .filter(|task| task.estimate.unwrap_or(0) > 0)
            .count(),
        with_tracked_time: tasks.iter().filter(|task| task.time_spent > 0).count(),
        estimated_minutes: tasks
            .iter()
            .map(|task| u64::from(task.estimate.unwrap_or(0)))
            .sum(),
        spent_minutes: tasks.iter().map(|task| u64::from(task.time_spent)).sum(),
        running_timers: tasks.iter().filter(|task| task.is_timer_running()).count(),
        completed_today: tasks
            .iter()
            .filter(|task| {
                task.completed_at
                    .is_some_and(|completed_at| completed_at.date() == today)
            })
            .count(),
        top_tags,
    }
}

/// Share of `part` in `total` as a whole percentage.
pub fn percent(part: usize, total: usize) -> usize {
    if total == 0 {
        return 0;
    }
    (part * 100 + total / 2) / total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::now;

    fn task(id: u64, priority: Priority, tags: &[&str]) -> Task {
        Task::new(
            id,
            format!("task {id}"),
            priority,
            tags.iter().map(|tag| tag.to_string()).collect(),
        )
    }

    #[test]
    fn counts_priorities_of_active_tasks_only() {
        let mut done = task(1, Priority::High, &[]);
        done.mark_done();
        let tasks = vec![
            done,
            task(2, Priority::High, &[]),
            task(3, Priority::Low, &[]),
        ];

        let stats = compute(&tasks, now().date());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.completed_today, 1);
        assert_eq!(
            stats.by_priority[0],
            PriorityCount {
                priority: Priority::High,
                count: 1
            }
        );
    }

    #[test]
    fn top_tags_sorted_by_frequency() {
        let tasks = vec![
            task(1, Priority::Medium, &["work", "urgent"]),
            task(2, Priority::Medium, &["work"]),
            task(3, Priority::Medium, &["home"]),
        ];
        let stats = compute(&tasks, now().date());
        assert_eq!(stats.top_tags[0].tag, "work");
        assert_eq!(stats.top_tags[0].count, 2);
        assert_eq!(stats.top_tags.len(), 3);
    }

    #[test]
    fn time_totals() {
        let mut a = task(1, Priority::Medium, &[]);
        a.estimate = Some(60);
        a.time_spent = 30;
        let b = task(2, Priority::Medium, &[]);

        let stats = compute(&[a, b], now().date());
        assert_eq!(stats.with_estimate, 1);
        assert_eq!(stats.estimated_minutes, 60);
        assert_eq!(stats.spent_minutes, 30);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(0, 0), 0);
    }
}
