//! Run coordination: listing, task dispatch and progress aggregation

use crate::core::progress::{PoolState, ProgressAggregator, RunSummary};
use crate::core::video_info::Credentials;
use crate::download::{
    DownloadTask, FfmpegRemuxer, Remuxer, TaskContext, TaskEvent, TaskId, TaskOutcome,
    WorkerPool, DEFAULT_CONCURRENCY, DEFAULT_CONTAINER,
};
use crate::error::HlgetError;
use crate::platform::{
    lookup_user_id, Endpoints, GqlResolver, HelixClient, HighlightSource, HttpClientConfig,
    Listing, PlaybackResolver, DEFAULT_TIMEOUT,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default cap on highlights per run
pub const DEFAULT_MAX_VIDEOS: usize = 50;

/// Main downloader configuration
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Tasks executing at once
    pub concurrency: usize,
    /// HTTP timeout for listing and token requests
    pub timeout: Duration,
    /// Output container extension
    pub container: String,
    /// Remux tool to run
    pub ffmpeg: PathBuf,
    /// Kill the remux tool when a task is cancelled
    pub kill_on_cancel: bool,
    /// Highlights fetched when the caller gives no limit
    pub max_videos: usize,
    /// Remote services
    pub endpoints: Endpoints,
    /// Proxy for every HTTP request
    pub proxy: Option<String>,
    /// User-Agent override for HTTP requests
    pub user_agent: Option<String>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
            container: DEFAULT_CONTAINER.to_string(),
            ffmpeg: PathBuf::from("ffmpeg"),
            kill_on_cancel: true,
            max_videos: DEFAULT_MAX_VIDEOS,
            endpoints: Endpoints::default(),
            proxy: None,
            user_agent: None,
        }
    }
}

/// Everything a caller observes during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RunEvent {
    /// Enumeration finished with `total` highlights
    Listed {
        total: usize,
        /// Why enumeration stopped early, if it did
        interrupted: Option<String>,
    },
    Progress {
        id: TaskId,
        title: String,
        message: String,
    },
    Finished {
        id: TaskId,
        title: String,
        success: bool,
        outcome: TaskOutcome,
    },
    /// Last event of a run
    Summary(RunSummary),
}

impl From<TaskEvent> for RunEvent {
    fn from(event: TaskEvent) -> Self {
        match event {
            TaskEvent::Progress { id, title, message } => RunEvent::Progress { id, title, message },
            TaskEvent::Finished {
                id,
                title,
                success,
                outcome,
            } => RunEvent::Finished {
                id,
                title,
                success,
                outcome,
            },
        }
    }
}

/// Handle to a run in progress
pub struct Run {
    events: mpsc::UnboundedReceiver<RunEvent>,
    state: watch::Receiver<PoolState>,
    cancel: CancellationToken,
    handle: JoinHandle<RunSummary>,
}

impl Run {
    /// Next event, or `None` once the run has ended and every event was read
    pub async fn next_event(&mut self) -> Option<RunEvent> {
        self.events.recv().await
    }

    /// Snapshot of the aggregated state
    pub fn state(&self) -> PoolState {
        self.state.borrow().clone()
    }

    /// Stop listing and every task of this run
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the run to end
    pub async fn wait(self) -> RunSummary {
        match self.handle.await {
            Ok(summary) => summary,
            Err(e) => {
                error!("Run coordinator failed: {}", e);
                RunSummary::from_state(&self.state.borrow(), true)
            }
        }
    }
}

/// Collaborators and parameters of one run
struct RunPlan {
    source: Arc<dyn HighlightSource>,
    resolver: Arc<dyn PlaybackResolver>,
    remuxer: Arc<dyn Remuxer>,
    credentials: Credentials,
    user_id: String,
    target_dir: PathBuf,
    max_videos: usize,
    container: String,
    concurrency: usize,
    cancel: CancellationToken,
}

/// Main downloader struct
pub struct Downloader {
    options: DownloadOptions,
    source: Option<Arc<dyn HighlightSource>>,
    resolver: Option<Arc<dyn PlaybackResolver>>,
    remuxer: Option<Arc<dyn Remuxer>>,
    current: Mutex<Option<CancellationToken>>,
}

impl Downloader {
    /// Create a new downloader with default options
    pub fn new() -> Self {
        Self::with_options(DownloadOptions::default())
    }

    /// Create a downloader from prepared options
    pub fn with_options(options: DownloadOptions) -> Self {
        Self {
            options,
            source: None,
            resolver: None,
            remuxer: None,
            current: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }

    /// Set the number of tasks executing at once
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.options.concurrency = concurrency;
        self
    }

    /// Set the HTTP timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    /// Set the remux tool
    pub fn with_ffmpeg(mut self, program: impl Into<PathBuf>) -> Self {
        self.options.ffmpeg = program.into();
        self
    }

    /// Set the output container extension
    pub fn with_container(mut self, ext: &str) -> Self {
        self.options.container = ext.trim_start_matches('.').to_string();
        self
    }

    /// Point the downloader at other services
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.options.endpoints = endpoints;
        self
    }

    /// Route HTTP requests through a proxy
    pub fn with_proxy(mut self, url: impl Into<String>) -> Self {
        self.options.proxy = Some(url.into());
        self
    }

    /// Override the User-Agent header
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.options.user_agent = Some(user_agent.into());
        self
    }

    /// Kill the remux tool on cancel (default) or let it finish and discard
    pub fn with_kill_on_cancel(mut self, kill: bool) -> Self {
        self.options.kill_on_cancel = kill;
        self
    }

    /// Replace the highlight listing
    pub fn with_source(mut self, source: Arc<dyn HighlightSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Replace the playback URL resolver
    pub fn with_resolver(mut self, resolver: Arc<dyn PlaybackResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Replace the remuxer
    pub fn with_remuxer(mut self, remuxer: Arc<dyn Remuxer>) -> Self {
        self.remuxer = Some(remuxer);
        self
    }

    fn http_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: self.options.timeout,
            user_agent: self.options.user_agent.clone(),
            proxy_url: self.options.proxy.clone(),
        }
    }

    fn source(&self) -> Result<Arc<dyn HighlightSource>, HlgetError> {
        match &self.source {
            Some(source) => Ok(source.clone()),
            None => Ok(Arc::new(HelixClient::new(
                &self.options.endpoints.helix_base,
                &self.http_config(),
            )?)),
        }
    }

    fn resolver(&self) -> Result<Arc<dyn PlaybackResolver>, HlgetError> {
        match &self.resolver {
            Some(resolver) => Ok(resolver.clone()),
            None => Ok(Arc::new(GqlResolver::new(
                &self.options.endpoints.gql_url,
                &self.options.endpoints.edge_base,
                &self.http_config(),
            )?)),
        }
    }

    fn remuxer(&self) -> Arc<dyn Remuxer> {
        match &self.remuxer {
            Some(remuxer) => remuxer.clone(),
            None => Arc::new(self.ffmpeg()),
        }
    }

    fn ffmpeg(&self) -> FfmpegRemuxer {
        FfmpegRemuxer::new(&self.options.ffmpeg).with_kill_on_cancel(self.options.kill_on_cancel)
    }

    /// Version line of the configured remux tool, if it runs
    pub async fn ffmpeg_version(&self) -> Option<String> {
        self.ffmpeg().version().await
    }

    /// Find the account an access token belongs to
    pub async fn resolve_user_id(&self, access_token: &str) -> Result<String, HlgetError> {
        lookup_user_id(
            &self.options.endpoints.user_lookup_base,
            access_token,
            &self.http_config(),
        )
        .await
    }

    /// Enumerate highlights without downloading anything
    pub async fn list(
        &self,
        credentials: &Credentials,
        user_id: &str,
        max_videos: usize,
    ) -> Result<Listing, HlgetError> {
        let source = self.source()?;
        Ok(source
            .list_highlights(credentials, user_id, max_videos, &CancellationToken::new())
            .await)
    }

    /// Start downloading up to `max_videos` highlights of `user_id` into
    /// `target_dir`. Must be called inside a tokio runtime.
    pub fn start_run(
        &self,
        credentials: Credentials,
        user_id: &str,
        target_dir: impl Into<PathBuf>,
        max_videos: usize,
    ) -> Result<Run, HlgetError> {
        if self.options.concurrency == 0 {
            return Err(HlgetError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.options.container.is_empty() {
            return Err(HlgetError::Config("container extension is empty".to_string()));
        }

        let cancel = CancellationToken::new();
        let plan = RunPlan {
            source: self.source()?,
            resolver: self.resolver()?,
            remuxer: self.remuxer(),
            credentials,
            user_id: user_id.to_string(),
            target_dir: target_dir.into(),
            max_videos,
            container: self.options.container.clone(),
            concurrency: self.options.concurrency,
            cancel: cancel.clone(),
        };

        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(cancel.clone());

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(PoolState::default());
        info!(
            "Starting run for user {} into {}",
            plan.user_id,
            plan.target_dir.display()
        );
        let handle = tokio::spawn(coordinate(plan, events_tx, state_tx));

        Ok(Run {
            events: events_rx,
            state: state_rx,
            cancel,
            handle,
        })
    }

    /// Cancel the most recently started run
    pub fn cancel_run(&self) {
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        match current.as_ref() {
            Some(cancel) => cancel.cancel(),
            None => debug!("No run to cancel"),
        }
    }
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new()
    }
}

fn finish(
    aggregator: &mut ProgressAggregator,
    cancel: &CancellationToken,
    events: &mpsc::UnboundedSender<RunEvent>,
    state: &watch::Sender<PoolState>,
) -> RunSummary {
    aggregator.set_active(0);
    state.send_replace(aggregator.state().clone());
    let summary = aggregator.summary(cancel.is_cancelled());
    info!(
        "{}: {} downloaded, {} skipped, {} failed, {} not downloaded",
        summary.status_message(),
        summary.completed,
        summary.skipped,
        summary.failed_titles.len(),
        summary.pending
    );
    let _ = events.send(RunEvent::Summary(summary.clone()));
    summary
}

async fn coordinate(
    plan: RunPlan,
    events: mpsc::UnboundedSender<RunEvent>,
    state: watch::Sender<PoolState>,
) -> RunSummary {
    let listing = plan
        .source
        .list_highlights(&plan.credentials, &plan.user_id, plan.max_videos, &plan.cancel)
        .await;

    let total = listing.videos.len();
    if let Some(e) = &listing.interrupted {
        warn!("Continuing with {} highlights after listing stopped: {}", total, e);
    }
    let _ = events.send(RunEvent::Listed {
        total,
        interrupted: listing.interrupted.as_ref().map(|e| e.to_string()),
    });

    let mut aggregator = ProgressAggregator::new(total);
    if total == 0 {
        return finish(&mut aggregator, &plan.cancel, &events, &state);
    }
    state.send_replace(aggregator.state().clone());

    let (task_tx, mut task_rx) = mpsc::unbounded_channel();
    let context = Arc::new(TaskContext {
        resolver: plan.resolver,
        remuxer: plan.remuxer,
        container: plan.container.clone(),
        events: task_tx,
    });
    let pool = match WorkerPool::new(plan.concurrency, context, &plan.cancel) {
        Ok(pool) => pool,
        Err(e) => {
            error!("Could not start worker pool: {}", e);
            return finish(&mut aggregator, &plan.cancel, &events, &state);
        }
    };

    for (index, video) in listing.videos.into_iter().enumerate() {
        pool.submit(DownloadTask::new(
            TaskId(index as u64),
            video,
            &plan.target_dir,
            &plan.container,
            pool.task_token(),
        ));
    }

    let activity = pool.activity();
    let drained = tokio::spawn(pool.shutdown());

    // channel closes once the pool and every task are gone
    while let Some(event) = task_rx.recv().await {
        if let TaskEvent::Finished {
            id, title, outcome, ..
        } = &event
        {
            if !aggregator.record(*id, title, *outcome) {
                debug!("Ignoring repeated completion of task {}", id);
            }
        }
        aggregator.set_active(activity.active_count());
        state.send_replace(aggregator.state().clone());
        let _ = events.send(event.into());

        if aggregator.is_complete() {
            break;
        }
    }

    if let Err(e) = drained.await {
        warn!("Worker pool shutdown failed: {}", e);
    }
    finish(&mut aggregator, &plan.cancel, &events, &state)
}
