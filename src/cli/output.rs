//! Output formatting and progress display

use crate::cli::args::VerbosityLevel;
use crate::core::progress::{format_duration, PoolState, RunSummary};
use crate::core::video_info::VideoRecord;
use crate::core::RunEvent;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Output formatter for hlget
pub struct OutputFormatter {
    verbosity: VerbosityLevel,
    progress_bar: Option<ProgressBar>,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            progress_bar: None,
        }
    }

    /// Create a progress bar over the tasks of a run
    pub fn create_progress_bar(&mut self, total: u64) -> Option<ProgressBar> {
        if self.verbosity == VerbosityLevel::Quiet {
            return None;
        }

        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");

        let progress_bar = ProgressBar::new(total);
        progress_bar.set_style(style);
        progress_bar.set_message("Downloading...");
        progress_bar.enable_steady_tick(Duration::from_millis(120));

        self.progress_bar = Some(progress_bar.clone());
        Some(progress_bar)
    }

    /// Move the bar to match a state snapshot
    pub fn update_progress(&self, state: &PoolState) {
        if let Some(progress_bar) = &self.progress_bar {
            progress_bar.set_length(state.total as u64);
            progress_bar.set_position(state.processed as u64);
            progress_bar.set_message(format!("{} active", state.active));
        }
    }

    /// Render one run event
    pub fn handle_event(&self, event: &RunEvent) {
        match event {
            RunEvent::Listed { total, interrupted } => {
                if let Some(reason) = interrupted {
                    self.warning(&format!("Listing stopped early: {}", reason));
                }
                self.info(&format!("Found {} highlights", total));
            }
            RunEvent::Progress { title, message, .. } => {
                self.debug(&format!("{}: {}", title, message));
            }
            RunEvent::Finished {
                title,
                success,
                outcome,
                ..
            } => {
                let line = format!("{} ({})", title, outcome);
                if *success {
                    self.line(&format!("✅ {}", line));
                } else {
                    self.line(&format!("❌ {}", line));
                }
            }
            RunEvent::Summary(_) => {}
        }
    }

    /// Finish progress bar
    pub fn finish_progress(&self, message: &str) {
        if let Some(progress_bar) = &self.progress_bar {
            progress_bar.finish_with_message(message.to_string());
        }
    }

    fn line(&self, message: &str) {
        if self.verbosity == VerbosityLevel::Quiet {
            return;
        }
        match &self.progress_bar {
            Some(progress_bar) => progress_bar.println(message),
            None => println!("{}", message),
        }
    }

    /// Print info message
    pub fn info(&self, message: &str) {
        self.line(&format!("ℹ️  {}", message));
    }

    /// Print warning message
    pub fn warning(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            eprintln!("⚠️  {}", message);
        }
    }

    /// Print debug message
    pub fn debug(&self, message: &str) {
        if self.verbosity == VerbosityLevel::Verbose {
            self.line(&format!("🐛 {}", message));
        }
    }

    /// Print one highlight of a listing
    pub fn print_highlight(&self, index: usize, total: usize, video: &VideoRecord) {
        if self.verbosity == VerbosityLevel::Quiet {
            return;
        }

        let released = video
            .released_at()
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| video.release_time.clone());
        println!(
            "📥 [{}/{}] {} | {} | {} | {}",
            index + 1,
            total,
            video.title,
            format_duration(Duration::from_secs(video.duration_seconds)),
            released,
            video.source_url
        );
    }

    /// Print the end-of-run summary
    pub fn print_summary(&self, summary: &RunSummary, elapsed: Duration) {
        if self.verbosity == VerbosityLevel::Quiet {
            if !summary.failed_titles.is_empty() {
                eprintln!("{} downloads failed", summary.failed_titles.len());
            }
            return;
        }

        println!();
        println!("{}", summary);
        println!("⏱️  Time: {}", format_duration(elapsed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::{TaskId, TaskOutcome};

    #[test]
    fn test_create_progress_bar_quiet_mode() {
        let mut formatter = OutputFormatter::new(VerbosityLevel::Quiet);
        assert!(formatter.create_progress_bar(10).is_none());
    }

    #[test]
    fn test_progress_bar_follows_state() {
        let mut formatter = OutputFormatter::new(VerbosityLevel::Normal);
        let bar = formatter.create_progress_bar(0).unwrap();

        let mut state = PoolState::new(4);
        state.processed = 3;
        state.active = 1;
        formatter.update_progress(&state);

        assert_eq!(bar.length(), Some(4));
        assert_eq!(bar.position(), 3);
        assert_eq!(bar.message(), "1 active");

        formatter.finish_progress("done");
        assert!(bar.is_finished());
    }

    #[test]
    fn test_handle_event_without_bar() {
        let formatter = OutputFormatter::new(VerbosityLevel::Verbose);
        formatter.handle_event(&RunEvent::Listed {
            total: 2,
            interrupted: Some("listing endpoint returned status 503".to_string()),
        });
        formatter.handle_event(&RunEvent::Progress {
            id: TaskId(0),
            title: "Clip".to_string(),
            message: "starting download".to_string(),
        });
        formatter.handle_event(&RunEvent::Finished {
            id: TaskId(0),
            title: "Clip".to_string(),
            success: false,
            outcome: TaskOutcome::Failed,
        });
    }

    #[test]
    fn test_print_highlight_and_summary() {
        let formatter = OutputFormatter::new(VerbosityLevel::Normal);
        let video = VideoRecord::new("1", "Clip", 3661, "2024-02-03T04:05:06Z");
        formatter.print_highlight(0, 1, &video);

        let summary = RunSummary::from_state(&PoolState::new(0), false);
        formatter.print_summary(&summary, Duration::from_secs(5));
        OutputFormatter::new(VerbosityLevel::Quiet).print_summary(&summary, Duration::ZERO);
    }
}
