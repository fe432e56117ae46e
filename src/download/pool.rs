//! Bounded worker pool for download tasks

use crate::download::task::{DownloadTask, TaskContext};
use crate::error::HlgetError;
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default number of tasks executing at once
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Shared count of executing tasks
#[derive(Debug, Clone, Default)]
pub struct Activity(Arc<AtomicUsize>);

impl Activity {
    pub fn active_count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs submitted tasks in FIFO order, at most `concurrency` at a time.
///
/// A single dispatcher pulls tasks off the queue and hands each one a
/// semaphore permit. After [`WorkerPool::cancel_all`] the dispatcher stops
/// waiting for permits and drains the queue, so every queued task still
/// reports an aborted outcome.
pub struct WorkerPool {
    queue: mpsc::UnboundedSender<DownloadTask>,
    dispatcher: JoinHandle<()>,
    activity: Activity,
    cancel: CancellationToken,
    concurrency: usize,
}

impl WorkerPool {
    /// Start a pool whose tasks stop when `parent` is cancelled
    pub fn new(
        concurrency: usize,
        context: Arc<TaskContext>,
        parent: &CancellationToken,
    ) -> Result<Self, HlgetError> {
        if concurrency == 0 {
            return Err(HlgetError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }

        let (queue, receiver) = mpsc::unbounded_channel();
        let activity = Activity::default();
        let cancel = parent.child_token();
        let dispatcher = tokio::spawn(dispatch(
            receiver,
            Arc::new(Semaphore::new(concurrency)),
            context,
            activity.clone(),
            cancel.clone(),
        ));

        debug!("Worker pool started with {} slots", concurrency);
        Ok(Self {
            queue,
            dispatcher,
            activity,
            cancel,
            concurrency,
        })
    }

    /// Token for a new task; cancelled along with the pool
    pub fn task_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    /// Queue a task. Its outcome arrives through the task event channel.
    pub fn submit(&self, task: DownloadTask) {
        let id = task.id();
        if self.queue.send(task).is_err() {
            // dispatcher is gone; only reachable after a panic
            warn!("Worker pool closed, dropping task {}", id);
        }
    }

    /// Cancel every running and queued task
    pub fn cancel_all(&self) {
        info!("Cancelling all downloads");
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Number of tasks currently executing
    pub fn active_count(&self) -> usize {
        self.activity.active_count()
    }

    /// Handle for polling the active count after the pool is moved
    pub fn activity(&self) -> Activity {
        self.activity.clone()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Stop accepting tasks and wait until every submitted task has finished
    pub async fn shutdown(self) {
        drop(self.queue);
        if let Err(e) = self.dispatcher.await {
            warn!("Worker pool dispatcher failed: {}", e);
        }
    }
}

async fn dispatch(
    mut receiver: mpsc::UnboundedReceiver<DownloadTask>,
    slots: Arc<Semaphore>,
    context: Arc<TaskContext>,
    activity: Activity,
    cancel: CancellationToken,
) {
    let mut running = Vec::new();

    while let Some(task) = receiver.recv().await {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = slots.clone().acquire_owned() => permit.ok(),
        };

        let Some(permit) = permit else {
            // cancelled while queued: the task aborts at its first checkpoint
            task.run(&context).await;
            continue;
        };

        activity.enter();
        let context = context.clone();
        let activity = activity.clone();
        running.push(tokio::spawn(async move {
            let id = task.id();
            let outcome = task.run(&context).await;
            debug!("Task {} finished: {}", id, outcome);
            activity.leave();
            drop(permit);
        }));
    }

    for result in join_all(running).await {
        if let Err(e) = result {
            warn!("Download task panicked: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::video_info::VideoRecord;
    use crate::download::task::testing::{FakeRemuxer, FakeResolver};
    use crate::download::task::{TaskEvent, TaskId, TaskOutcome};
    use std::collections::HashMap;
    use std::path::Path;
    use std::time::Duration;

    fn context(
        resolver: FakeResolver,
        remuxer: FakeRemuxer,
    ) -> (Arc<TaskContext>, mpsc::UnboundedReceiver<TaskEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(TaskContext {
                resolver: Arc::new(resolver),
                remuxer: Arc::new(remuxer),
                container: "mp4".to_string(),
                events: tx,
            }),
            rx,
        )
    }

    fn resolver_for(count: u64) -> FakeResolver {
        (0..count).fold(FakeResolver::default(), |r, i| {
            r.with(&i.to_string(), &format!("http://edge/{}.m3u8", i))
        })
    }

    fn submit_all(pool: &WorkerPool, dir: &Path, count: u64) {
        for i in 0..count {
            let video = VideoRecord::new(&i.to_string(), &format!("clip {}", i), 10, "");
            pool.submit(DownloadTask::new(TaskId(i), video, dir, "mp4", pool.task_token()));
        }
    }

    async fn collect(mut rx: mpsc::UnboundedReceiver<TaskEvent>) -> Vec<TaskEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn outcomes(events: &[TaskEvent]) -> HashMap<TaskId, Vec<TaskOutcome>> {
        let mut map: HashMap<TaskId, Vec<TaskOutcome>> = HashMap::new();
        for event in events {
            if let TaskEvent::Finished { id, outcome, .. } = event {
                map.entry(*id).or_default().push(*outcome);
            }
        }
        map
    }

    #[tokio::test]
    async fn test_zero_concurrency_is_rejected() {
        let (ctx, _rx) = context(FakeResolver::default(), FakeRemuxer::default());
        let err = WorkerPool::new(0, ctx, &CancellationToken::new()).err();
        assert!(matches!(err, Some(HlgetError::Config(_))));
    }

    #[tokio::test]
    async fn test_tasks_start_in_submission_order() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, rx) = context(resolver_for(5), FakeRemuxer::default());
        let pool = WorkerPool::new(1, ctx, &CancellationToken::new()).unwrap();

        submit_all(&pool, dir.path(), 5);
        pool.shutdown().await;

        let events = collect(rx).await;
        let started: Vec<TaskId> = events
            .iter()
            .filter_map(|e| match e {
                TaskEvent::Progress { id, message, .. } if message == "resolving stream URL" => {
                    Some(*id)
                }
                _ => None,
            })
            .collect();
        assert_eq!(started, (0..5).map(TaskId).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_active_count_never_exceeds_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, rx) = context(
            resolver_for(8),
            FakeRemuxer::default().with_delay(Duration::from_millis(30)),
        );
        let pool = WorkerPool::new(2, ctx, &CancellationToken::new()).unwrap();
        assert_eq!(pool.concurrency(), 2);
        let activity = pool.activity();

        submit_all(&pool, dir.path(), 8);
        let sampler = tokio::spawn(async move {
            let mut peak = 0;
            for _ in 0..100 {
                peak = peak.max(activity.active_count());
                tokio::time::sleep(Duration::from_millis(3)).await;
            }
            peak
        });
        pool.shutdown().await;
        let peak = sampler.await.unwrap();
        assert!(peak <= 2, "peak {}", peak);

        let finished = outcomes(&collect(rx).await);
        assert_eq!(finished.len(), 8);
        assert!(finished
            .values()
            .all(|o| o.as_slice() == [TaskOutcome::Completed]));
    }

    #[tokio::test]
    async fn test_cancel_all_reaches_every_task() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, rx) = context(
            resolver_for(6).with_delay(Duration::from_millis(100)),
            FakeRemuxer::default(),
        );
        let pool = WorkerPool::new(2, ctx, &CancellationToken::new()).unwrap();

        submit_all(&pool, dir.path(), 6);
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.cancel_all();
        assert!(pool.is_cancelled());
        pool.shutdown().await;

        let finished = outcomes(&collect(rx).await);
        assert_eq!(finished.len(), 6);
        for (id, list) in &finished {
            assert_eq!(list.as_slice(), [TaskOutcome::Aborted], "task {}", id);
        }
    }

    #[tokio::test]
    async fn test_parent_cancellation_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, rx) = context(resolver_for(3), FakeRemuxer::default());
        let parent = CancellationToken::new();
        let pool = WorkerPool::new(3, ctx, &parent).unwrap();

        parent.cancel();
        submit_all(&pool, dir.path(), 3);
        pool.shutdown().await;

        let finished = outcomes(&collect(rx).await);
        assert_eq!(finished.len(), 3);
        assert!(finished
            .values()
            .all(|o| o.as_slice() == [TaskOutcome::Aborted]));
    }
}
