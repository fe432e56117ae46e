//! Command line argument parsing

use crate::core::video_info::Credentials;
use crate::core::DEFAULT_MAX_VIDEOS;
use crate::download::{DEFAULT_CONCURRENCY, DEFAULT_CONTAINER};
use crate::error::HlgetError;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// hlget - download every highlight of a streaming account
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// OAuth access token
    #[arg(long, env = "HLGET_ACCESS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Application client ID sent with listing requests
    #[arg(long, env = "HLGET_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Account whose highlights to fetch (looked up from the token if omitted)
    #[arg(long, value_name = "ID")]
    pub user_id: Option<String>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Maximum number of highlights to fetch
    #[arg(long, default_value_t = DEFAULT_MAX_VIDEOS)]
    pub max_videos: usize,

    /// Downloads running at once
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// HTTP timeout (e.g., 10s, 1m)
    #[arg(long, value_name = "DURATION", default_value = "10s")]
    pub timeout: humantime::Duration,

    /// Proxy URL for API requests (http/https)
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,

    /// Override User-Agent header
    #[arg(long, value_name = "USER_AGENT")]
    pub user_agent: Option<String>,

    /// ffmpeg executable
    #[arg(long, env = "HLGET_FFMPEG", value_name = "PATH", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// Output container extension
    #[arg(short, long, value_name = "EXT", default_value = DEFAULT_CONTAINER)]
    pub ext: String,

    /// Print the highlights and exit (no download)
    #[arg(short, long)]
    pub list: bool,

    /// Disable progress output
    #[arg(long)]
    pub no_progress: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (only errors)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    /// Get HTTP timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        self.timeout.into()
    }

    /// Directory downloads land in; the working directory by default
    pub fn output_dir(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Credentials from the token and client ID, both required
    pub fn credentials(&self) -> Result<Credentials, HlgetError> {
        let token = non_empty(&self.token).ok_or_else(|| {
            HlgetError::Config(
                "an access token is required (--token or HLGET_ACCESS_TOKEN)".to_string(),
            )
        })?;
        let client_id = non_empty(&self.client_id).ok_or_else(|| {
            HlgetError::Config(
                "a client ID is required (--client-id or HLGET_CLIENT_ID)".to_string(),
            )
        })?;
        Ok(Credentials::new(client_id, token))
    }

    /// Check values clap cannot
    pub fn validate(&self) -> Result<(), HlgetError> {
        if self.concurrency == 0 {
            return Err(HlgetError::Config(
                "--concurrency must be at least 1".to_string(),
            ));
        }
        if self.ext.trim_start_matches('.').is_empty() {
            return Err(HlgetError::Config("--ext must not be empty".to_string()));
        }
        Ok(())
    }

    /// Get output verbosity level
    pub fn verbosity_level(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Output verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbosityLevel {
    /// Quiet (only errors)
    Quiet,
    /// Normal
    Normal,
    /// Verbose (debug info)
    Verbose,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            token: None,
            client_id: None,
            user_id: None,
            output: None,
            max_videos: DEFAULT_MAX_VIDEOS,
            concurrency: DEFAULT_CONCURRENCY,
            timeout: humantime::Duration::from(Duration::from_secs(10)),
            proxy: None,
            user_agent: None,
            ffmpeg: PathBuf::from("ffmpeg"),
            ext: DEFAULT_CONTAINER.to_string(),
            list: false,
            no_progress: false,
            verbose: false,
            quiet: false,
        }
    }
}
