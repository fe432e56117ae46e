//! # hlget - batch downloader for stream highlights
//!
//! Lists every highlight of an account, resolves a signed playback URL for
//! each one and remuxes the stream into a local file with ffmpeg.
//!
//! ## Features
//!
//! - Cursor-based listing capped at a maximum number of videos
//! - Bounded worker pool (three downloads at once by default)
//! - Existing files are skipped, so reruns resume where they stopped
//! - Cooperative cancellation with per-task outcomes and a run summary
//!
//! ## Example
//!
//! ```rust,no_run
//! use hlget::{Credentials, Downloader, RunEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = Downloader::new().with_concurrency(3);
//!     let credentials = Credentials::new("CLIENT_ID", "ACCESS_TOKEN");
//!
//!     let mut run = downloader.start_run(credentials, "USER_ID", "./highlights", 50)?;
//!     while let Some(event) = run.next_event().await {
//!         if let RunEvent::Finished { title, outcome, .. } = event {
//!             println!("{}: {}", title, outcome);
//!         }
//!     }
//!
//!     let summary = run.wait().await;
//!     println!("{}", summary);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod core;
pub mod download;
pub mod error;
pub mod platform;
pub mod utils;

// Re-export main types
pub use self::core::{
    Credentials, DownloadOptions, Downloader, PoolState, Run, RunEvent, RunSummary, VideoRecord,
};
pub use self::download::{TaskId, TaskOutcome};
pub use self::error::HlgetError;
pub use self::platform::Endpoints;

/// Result type alias for hlget operations
pub type Result<T> = std::result::Result<T, HlgetError>;
