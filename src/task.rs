//! Task entity for tix.
//!
//! A task is the unit every history record snapshots. Timestamps are naive
//! local times in ISO-8601 form so existing task files keep parsing.

use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Current local wall-clock time.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" | "l" => Ok(Priority::Low),
            "medium" | "med" | "m" => Ok(Priority::Medium),
            "high" | "h" => Ok(Priority::High),
            other => Err(Error::InvalidArgument(format!(
                "invalid priority '{other}' (expected low|medium|high)"
            ))),
        }
    }
}

/// One closed timer session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeLog {
    pub started_at: NaiveDateTime,
    pub ended_at: NaiveDateTime,
    /// Whole minutes
    pub duration: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: u64,
    pub text: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
    #[serde(default = "now")]
    pub created_at: NaiveDateTime,
    #[serde(default)]
    pub completed_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub estimate: Option<u32>,
    #[serde(default)]
    pub time_spent: u32,
    #[serde(default)]
    pub started_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub time_logs: Vec<TimeLog>,
}

impl Task {
    pub fn new(id: u64, text: impl Into<String>, priority: Priority, tags: Vec<String>) -> Self {
        let mut task = Self {
            id,
            text: text.into(),
            priority,
            completed: false,
            created_at: now(),
            completed_at: None,
            tags: Vec::new(),
            attachments: Vec::new(),
            links: Vec::new(),
            estimate: None,
            time_spent: 0,
            started_at: None,
            time_logs: Vec::new(),
        };
        for tag in tags {
            task.add_tag(&tag);
        }
        task
    }

    pub fn mark_done(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        self.completed_at = Some(now());
    }

    pub fn reopen(&mut self) {
        self.completed = false;
        self.completed_at = None;
    }

    /// Returns false when the tag was already present.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.has_tag(tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|existing| existing != tag.trim());
        self.tags.len() != before
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|existing| existing == tag)
    }

    pub fn start_timer(&mut self) -> Result<()> {
        self.start_timer_at(now())
    }

    /// Stops the running timer and returns the logged minutes.
    pub fn stop_timer(&mut self) -> Result<u32> {
        self.stop_timer_at(now())
    }

    pub fn start_timer_at(&mut self, at: NaiveDateTime) -> Result<()> {
        if self.started_at.is_some() {
            return Err(Error::InvalidState(format!(
                "timer already running for task #{}",
                self.id
            )));
        }
        self.started_at = Some(at);
        Ok(())
    }

    pub fn stop_timer_at(&mut self, at: NaiveDateTime) -> Result<u32> {
        let Some(started_at) = self.started_at else {
            return Err(Error::InvalidState(format!(
                "timer not running for task #{}",
                self.id
            )));
        };

        let duration = minutes_between(started_at, at);
        self.time_logs.push(TimeLog {
            started_at,
            ended_at: at,
            duration,
        });
        self.time_spent = self.time_spent.saturating_add(duration);
        self.started_at = None;
        Ok(duration)
    }

    pub fn is_timer_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn current_session_minutes(&self) -> u32 {
        self.started_at
            .map(|started_at| minutes_between(started_at, now()))
            .unwrap_or(0)
    }

    /// Estimate minus time spent; negative once over budget.
    pub fn time_remaining(&self) -> Option<i64> {
        self.estimate
            .filter(|estimate| *estimate > 0)
            .map(|estimate| i64::from(estimate) - i64::from(self.time_spent))
    }

    /// Restore the field invariants a hand-edited task may have broken.
    pub fn normalize(&mut self) {
        if self.completed {
            if self.completed_at.is_none() {
                self.completed_at = Some(now());
            }
        } else {
            self.completed_at = None;
        }

        let mut seen = Vec::with_capacity(self.tags.len());
        for tag in self.tags.drain(..) {
            let tag = tag.trim().to_string();
            if !tag.is_empty() && !seen.contains(&tag) {
                seen.push(tag);
            }
        }
        self.tags = seen;
    }
}

fn minutes_between(start: NaiveDateTime, end: NaiveDateTime) -> u32 {
    let minutes = (end - start).num_minutes();
    u32::try_from(minutes.max(0)).unwrap_or(u32::MAX)
}

/// Render minutes as `45m`, `2h` or `1h 30m`.
pub fn format_minutes(minutes: u32) -> String {
    if minutes < 60 {
        return format!("{minutes}m");
    }
    let hours = minutes / 60;
    let rest = minutes % 60;
    if rest == 0 {
        format!("{hours}h")
    } else {
        format!("{hours}h {rest}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn new_task_dedupes_tags() {
        let task = Task::new(
            1,
            "write docs",
            Priority::High,
            vec!["docs".to_string(), "docs".to_string(), " ".to_string()],
        );
        assert_eq!(task.tags, vec!["docs".to_string()]);
        assert!(!task.completed);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn mark_done_and_reopen_keep_completed_at_in_sync() {
        let mut task = Task::new(1, "a", Priority::Medium, Vec::new());
        task.mark_done();
        assert!(task.completed);
        assert!(task.completed_at.is_some());

        task.reopen();
        assert!(!task.completed);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn timer_rejects_double_start_and_stray_stop() {
        let mut task = Task::new(3, "timed", Priority::Low, Vec::new());
        assert!(matches!(task.stop_timer(), Err(Error::InvalidState(_))));

        let start = now();
        task.start_timer_at(start).unwrap();
        assert!(matches!(task.start_timer(), Err(Error::InvalidState(_))));

        let minutes = task.stop_timer_at(start + Duration::minutes(25)).unwrap();
        assert_eq!(minutes, 25);
        assert_eq!(task.time_spent, 25);
        assert_eq!(task.time_logs.len(), 1);
        assert!(!task.is_timer_running());
    }

    #[test]
    fn time_remaining_uses_estimate() {
        let mut task = Task::new(1, "a", Priority::Medium, Vec::new());
        assert_eq!(task.time_remaining(), None);
        task.estimate = Some(60);
        task.time_spent = 90;
        assert_eq!(task.time_remaining(), Some(-30));
    }

    #[test]
    fn format_minutes_variants() {
        assert_eq!(format_minutes(45), "45m");
        assert_eq!(format_minutes(120), "2h");
        assert_eq!(format_minutes(90), "1h 30m");
    }

    #[test]
    fn sparse_record_fills_defaults() {
        let task: Task = serde_json::from_str(r#"{"id": 7, "text": "old"}"#).unwrap();
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.time_spent, 0);
        assert!(task.tags.is_empty());
        assert!(task.started_at.is_none());
    }

    #[test]
    fn parses_python_isoformat_timestamps() {
        let raw = r#"{"id": 1, "text": "t", "created_at": "2024-03-01T09:15:30.123456",
            "completed": true, "completed_at": "2024-03-02T10:00:00"}"#;
        let task: Task = serde_json::from_str(raw).unwrap();
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn priority_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }
}
