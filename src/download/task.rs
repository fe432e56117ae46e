//! One highlight's pipeline: existence check, resolve, remux

use crate::core::video_info::VideoRecord;
use crate::download::remux::{with_appended_extension, Remuxer};
use crate::platform::gql::PlaybackResolver;
use crate::utils::output_file_stem;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Identifier carried by every event of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Terminal state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOutcome {
    /// Target file already existed
    Skipped,
    /// Remux finished
    Completed,
    /// Resolution or remux failed
    Failed,
    /// Cancellation observed at a checkpoint
    Aborted,
}

impl TaskOutcome {
    /// Skipped and completed both count as success
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Skipped | TaskOutcome::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskOutcome::Skipped => "skipped",
            TaskOutcome::Completed => "completed",
            TaskOutcome::Failed => "failed",
            TaskOutcome::Aborted => "aborted",
        }
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Done(TaskOutcome),
}

/// Events emitted while a task runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TaskEvent {
    /// Human-readable step message
    Progress {
        id: TaskId,
        title: String,
        message: String,
    },
    /// Sent exactly once, on reaching a terminal state
    Finished {
        id: TaskId,
        title: String,
        success: bool,
        outcome: TaskOutcome,
    },
}

/// Collaborators shared by every task of a run
pub struct TaskContext {
    pub resolver: Arc<dyn PlaybackResolver>,
    pub remuxer: Arc<dyn Remuxer>,
    pub container: String,
    pub events: UnboundedSender<TaskEvent>,
}

/// Unit of work for one highlight
#[derive(Debug)]
pub struct DownloadTask {
    id: TaskId,
    video: VideoRecord,
    output_stem: PathBuf,
    target_path: PathBuf,
    cancel: CancellationToken,
    state: TaskState,
}

impl DownloadTask {
    /// Create a pending task writing into `target_dir`
    pub fn new(
        id: TaskId,
        video: VideoRecord,
        target_dir: &Path,
        container: &str,
        cancel: CancellationToken,
    ) -> Self {
        let output_stem = target_dir.join(output_file_stem(&video.title, &video.video_id));
        let target_path = with_appended_extension(&output_stem, container);
        Self {
            id,
            video,
            output_stem,
            target_path,
            cancel,
            state: TaskState::Pending,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn video(&self) -> &VideoRecord {
        &self.video
    }

    /// Final file this task writes
    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Cooperative cancel handle for this task
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the task may still make progress
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    fn progress(&self, ctx: &TaskContext, message: impl Into<String>) {
        let _ = ctx.events.send(TaskEvent::Progress {
            id: self.id,
            title: self.video.title.clone(),
            message: message.into(),
        });
    }

    fn finish(&mut self, ctx: &TaskContext, outcome: TaskOutcome, message: &str) -> TaskOutcome {
        debug_assert!(
            !matches!(self.state, TaskState::Done(_)),
            "task {} finished twice",
            self.id
        );
        self.state = TaskState::Done(outcome);
        self.progress(ctx, message);
        let _ = ctx.events.send(TaskEvent::Finished {
            id: self.id,
            title: self.video.title.clone(),
            success: outcome.is_success(),
            outcome,
        });
        outcome
    }

    /// Drive the task to a terminal state, checking for cancellation
    /// between every step.
    pub async fn run(mut self, ctx: &TaskContext) -> TaskOutcome {
        if !self.is_running() {
            return self.finish(ctx, TaskOutcome::Aborted, "download aborted");
        }
        self.state = TaskState::Running;

        let exists = tokio::fs::try_exists(&self.target_path)
            .await
            .unwrap_or(false);
        if exists {
            info!("{} already exists, skipping", self.target_path.display());
            return self.finish(ctx, TaskOutcome::Skipped, "file already exists, skipping");
        }

        if !self.is_running() {
            return self.finish(ctx, TaskOutcome::Aborted, "download aborted");
        }

        self.progress(ctx, "resolving stream URL");
        let resolved = ctx.resolver.resolve_playback_url(&self.video.video_id).await;
        if !self.is_running() {
            return self.finish(ctx, TaskOutcome::Aborted, "download aborted");
        }

        let stream_url = match resolved {
            Ok(url) => url,
            Err(e) => {
                warn!("{} ({}): {}", self.video.title, self.video.video_id, e);
                return self.finish(ctx, TaskOutcome::Failed, "could not obtain stream URL");
            }
        };

        self.progress(ctx, "starting download");
        debug!("Task {} remuxing into {}", self.id, self.target_path.display());
        let remuxed = ctx
            .remuxer
            .remux(&stream_url, &self.output_stem, &ctx.container, &self.cancel)
            .await;
        if !self.is_running() {
            return self.finish(ctx, TaskOutcome::Aborted, "download aborted");
        }

        match remuxed {
            Ok(path) => {
                info!("Downloaded {}", path.display());
                self.finish(ctx, TaskOutcome::Completed, "download complete")
            }
            Err(e) => {
                match e.diagnostics() {
                    Some(diagnostics) => warn!(
                        "Download of {} failed: {}\n{}",
                        self.video.title, e, diagnostics
                    ),
                    None => warn!("Download of {} failed: {}", self.video.title, e),
                }
                self.finish(ctx, TaskOutcome::Failed, "download failed")
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeRemuxer, FakeResolver};
    use super::*;
    use tokio::sync::mpsc;

    fn context(
        resolver: Arc<FakeResolver>,
        remuxer: Arc<FakeRemuxer>,
    ) -> (TaskContext, mpsc::UnboundedReceiver<TaskEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            TaskContext {
                resolver,
                remuxer,
                container: "mp4".to_string(),
                events: tx,
            },
            rx,
        )
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<TaskEvent>) -> Vec<TaskEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn finished_count(events: &[TaskEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, TaskEvent::Finished { .. }))
            .count()
    }

    fn video(id: &str, title: &str) -> VideoRecord {
        VideoRecord::new(id, title, 60, "2024-01-01T00:00:00Z")
    }

    #[tokio::test]
    async fn test_existing_file_is_skipped_without_calls() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Speedrun Day 1.mp4"), b"old").unwrap();

        let resolver = Arc::new(FakeResolver::default().with("1", "http://edge/1.m3u8"));
        let remuxer = Arc::new(FakeRemuxer::default());
        let (ctx, mut rx) = context(resolver.clone(), remuxer.clone());

        let task = DownloadTask::new(
            TaskId(1),
            video("1", "Speedrun: Day 1"),
            dir.path(),
            "mp4",
            CancellationToken::new(),
        );
        assert_eq!(task.target_path(), dir.path().join("Speedrun Day 1.mp4"));
        let outcome = task.run(&ctx).await;

        assert_eq!(outcome, TaskOutcome::Skipped);
        assert_eq!(resolver.calls(), 0);
        assert_eq!(remuxer.calls(), 0);

        let events = drain(&mut rx);
        assert_eq!(finished_count(&events), 1);
        assert_eq!(
            events.last(),
            Some(&TaskEvent::Finished {
                id: TaskId(1),
                title: "Speedrun: Day 1".to_string(),
                success: true,
                outcome: TaskOutcome::Skipped,
            })
        );
    }

    #[tokio::test]
    async fn test_successful_download() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = Arc::new(FakeResolver::default().with("2", "http://edge/2.m3u8"));
        let remuxer = Arc::new(FakeRemuxer::default());
        let (ctx, mut rx) = context(resolver.clone(), remuxer.clone());

        let task = DownloadTask::new(TaskId(2), video("2", "Clip"), dir.path(), "mp4", CancellationToken::new());
        assert_eq!(task.state(), TaskState::Pending);
        let outcome = task.run(&ctx).await;

        assert_eq!(outcome, TaskOutcome::Completed);
        assert!(dir.path().join("Clip.mp4").exists());
        assert_eq!(remuxer.urls.lock().unwrap().as_slice(), ["http://edge/2.m3u8"]);

        let messages: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                TaskEvent::Progress { message, .. } => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(
            messages,
            vec!["resolving stream URL", "starting download", "download complete"]
        );
    }

    #[tokio::test]
    async fn test_resolution_failure_never_remuxes() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = Arc::new(FakeResolver::default());
        let remuxer = Arc::new(FakeRemuxer::default());
        let (ctx, mut rx) = context(resolver.clone(), remuxer.clone());

        let task = DownloadTask::new(TaskId(3), video("3", "Gone"), dir.path(), "mp4", CancellationToken::new());
        let outcome = task.run(&ctx).await;

        assert_eq!(outcome, TaskOutcome::Failed);
        assert_eq!(resolver.calls(), 1);
        assert_eq!(remuxer.calls(), 0);
        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            TaskEvent::Progress { message, .. } if message == "could not obtain stream URL"
        )));
        assert_eq!(finished_count(&events), 1);
    }

    #[tokio::test]
    async fn test_remux_failure_is_failed() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = Arc::new(FakeResolver::default().with("4", "http://edge/4.m3u8"));
        let remuxer = Arc::new(FakeRemuxer::failing());
        let (ctx, _rx) = context(resolver, remuxer.clone());

        let task = DownloadTask::new(TaskId(4), video("4", "Broken"), dir.path(), "mp4", CancellationToken::new());
        assert_eq!(task.run(&ctx).await, TaskOutcome::Failed);
        assert_eq!(remuxer.calls(), 1);
        assert!(!dir.path().join("Broken.mp4").exists());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = Arc::new(FakeResolver::default().with("5", "http://edge/5.m3u8"));
        let remuxer = Arc::new(FakeRemuxer::default());
        let (ctx, mut rx) = context(resolver.clone(), remuxer.clone());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let task = DownloadTask::new(TaskId(5), video("5", "Never"), dir.path(), "mp4", cancel);
        assert!(!task.is_running());

        assert_eq!(task.run(&ctx).await, TaskOutcome::Aborted);
        assert_eq!(resolver.calls(), 0);
        assert_eq!(remuxer.calls(), 0);

        let events = drain(&mut rx);
        assert_eq!(finished_count(&events), 1);
        assert!(matches!(
            events.last(),
            Some(TaskEvent::Finished { success: false, outcome: TaskOutcome::Aborted, .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_during_resolution_aborts_before_remux() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = Arc::new(
            FakeResolver::default()
                .with("6", "http://edge/6.m3u8")
                .with_delay(std::time::Duration::from_millis(200)),
        );
        let remuxer = Arc::new(FakeRemuxer::default());
        let (ctx, _rx) = context(resolver.clone(), remuxer.clone());

        let cancel = CancellationToken::new();
        let task = DownloadTask::new(TaskId(6), video("6", "Slow"), dir.path(), "mp4", cancel.clone());

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            cancel.cancel();
        });
        let outcome = task.run(&ctx).await;
        trigger.await.unwrap();

        assert_eq!(outcome, TaskOutcome::Aborted);
        assert_eq!(resolver.calls(), 1);
        assert_eq!(remuxer.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_remux_discards_result() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = Arc::new(FakeResolver::default().with("7", "http://edge/7.m3u8"));
        let remuxer = Arc::new(
            FakeRemuxer::default().with_delay(std::time::Duration::from_millis(200)),
        );
        let (ctx, _rx) = context(resolver, remuxer.clone());

        let cancel = CancellationToken::new();
        let task = DownloadTask::new(TaskId(7), video("7", "Long"), dir.path(), "mp4", cancel.clone());

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            cancel.cancel();
        });
        let outcome = task.run(&ctx).await;
        trigger.await.unwrap();

        assert_eq!(outcome, TaskOutcome::Aborted);
        assert_eq!(remuxer.calls(), 1);
    }

    #[test]
    fn test_outcome_helpers() {
        assert!(TaskOutcome::Skipped.is_success());
        assert!(TaskOutcome::Completed.is_success());
        assert!(!TaskOutcome::Failed.is_success());
        assert!(!TaskOutcome::Aborted.is_success());
        assert_eq!(TaskOutcome::Aborted.to_string(), "aborted");
        assert_eq!(TaskId(3).to_string(), "#3");
    }

    #[test]
    fn test_empty_title_uses_video_id() {
        let task = DownloadTask::new(
            TaskId(8),
            video("8675309", "???"),
            Path::new("/downloads"),
            "mkv",
            CancellationToken::new(),
        );
        assert_eq!(task.target_path(), Path::new("/downloads/8675309.mkv"));
    }
}
