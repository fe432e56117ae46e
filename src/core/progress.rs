//! Progress tracking for a download run

use crate::download::task::{TaskId, TaskOutcome};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

/// Aggregate state of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolState {
    /// Number of tasks in the run
    pub total: usize,
    /// Tasks that reached a terminal state
    pub processed: usize,
    /// Tasks whose remux finished
    pub completed: usize,
    /// Tasks whose file already existed
    pub skipped: usize,
    /// Titles of failed tasks, in completion order
    pub failed: Vec<String>,
    /// Tasks stopped by cancellation
    pub aborted: usize,
    /// Tasks currently executing
    pub active: usize,
}

impl PoolState {
    /// Create an empty state for a run of `total` tasks
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Tasks not downloaded: aborted plus anything not yet processed
    pub fn pending(&self) -> usize {
        self.total
            .saturating_sub(self.completed + self.skipped + self.failed.len())
    }

    /// Run progress as a percentage (0 to 100)
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.processed * 100) / self.total) as u8
    }

    /// Check the accounting invariant
    pub fn is_consistent(&self) -> bool {
        self.processed == self.completed + self.skipped + self.failed.len() + self.aborted
            && self.processed <= self.total
    }

    /// Check if every task reached a terminal state
    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }
}

/// Final outcome of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub completed: usize,
    pub skipped: usize,
    pub pending: usize,
    pub failed_titles: Vec<String>,
    /// The run was cancelled before every task finished on its own
    pub cancelled: bool,
}

impl RunSummary {
    /// Build a summary from a state snapshot
    pub fn from_state(state: &PoolState, cancelled: bool) -> Self {
        Self {
            total: state.total,
            completed: state.completed,
            skipped: state.skipped,
            pending: state.pending(),
            failed_titles: state.failed.clone(),
            cancelled,
        }
    }

    /// One-line headline for the run
    pub fn status_message(&self) -> &'static str {
        if self.total == 0 {
            "No highlights found"
        } else if self.cancelled || self.pending > 0 {
            "Download stopped or partially completed"
        } else {
            "All downloads processed"
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.status_message())?;
        writeln!(f, "Total: {}", self.total)?;
        writeln!(f, "Downloaded: {}", self.completed)?;
        writeln!(f, "Skipped: {}", self.skipped)?;
        writeln!(f, "Not downloaded: {}", self.pending)?;
        write!(f, "Failed: {}", self.failed_titles.len())?;
        if !self.failed_titles.is_empty() {
            write!(f, "\nFailed titles:")?;
            for title in &self.failed_titles {
                write!(f, "\n  {}", title)?;
            }
        }
        Ok(())
    }
}

/// Folds task completions into a [`PoolState`].
///
/// Owned by a single consumer; each task ID is counted once.
#[derive(Debug)]
pub struct ProgressAggregator {
    state: PoolState,
    seen: HashSet<TaskId>,
}

impl ProgressAggregator {
    /// Create an aggregator for a run of `total` tasks
    pub fn new(total: usize) -> Self {
        Self {
            state: PoolState::new(total),
            seen: HashSet::with_capacity(total),
        }
    }

    /// Record a terminal outcome. Returns false for a duplicate or overflow.
    pub fn record(&mut self, id: TaskId, title: &str, outcome: TaskOutcome) -> bool {
        if self.state.processed >= self.state.total || !self.seen.insert(id) {
            return false;
        }

        self.state.processed += 1;
        match outcome {
            TaskOutcome::Completed => self.state.completed += 1,
            TaskOutcome::Skipped => self.state.skipped += 1,
            TaskOutcome::Failed => self.state.failed.push(title.to_string()),
            TaskOutcome::Aborted => self.state.aborted += 1,
        }
        true
    }

    /// Update the number of executing tasks
    pub fn set_active(&mut self, active: usize) {
        self.state.active = active;
    }

    /// Current state
    pub fn state(&self) -> &PoolState {
        &self.state
    }

    /// Check if every task has been counted
    pub fn is_complete(&self) -> bool {
        self.state.is_complete()
    }

    /// Summary of what has been counted so far
    pub fn summary(&self, cancelled: bool) -> RunSummary {
        RunSummary::from_state(&self.state, cancelled)
    }
}

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    if total_seconds < 60 {
        format!("{}s", total_seconds)
    } else if total_seconds < 3600 {
        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;
        if seconds == 0 {
            format!("{}m", minutes)
        } else {
            format!("{}m {}s", minutes, seconds)
        }
    } else {
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        if minutes == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h {}m", hours, minutes)
        }
    }
}
