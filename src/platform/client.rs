//! HTTP client configuration shared by the platform APIs

use crate::error::HlgetError;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::{debug, warn};

/// Default per-request timeout for API calls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Base URLs of every remote service the downloader talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// REST API root serving `/videos`
    pub helix_base: String,
    /// GraphQL endpoint issuing playback tokens
    pub gql_url: String,
    /// Edge host serving VOD manifests
    pub edge_base: String,
    /// Service mapping an access token to a user ID
    pub user_lookup_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            helix_base: "https://api.twitch.tv/helix".to_string(),
            gql_url: "https://gql.twitch.tv/gql".to_string(),
            edge_base: crate::utils::DEFAULT_EDGE_BASE.to_string(),
            user_lookup_base: "https://twitchtokengenerator.com/api/forgot".to_string(),
        }
    }
}

impl Endpoints {
    /// Point every service at one base URL (used against mock servers)
    pub fn all_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            helix_base: format!("{}/helix", base),
            gql_url: format!("{}/gql", base),
            edge_base: base.to_string(),
            user_lookup_base: format!("{}/api/forgot", base),
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: Option<String>,
    /// Proxy URL
    pub proxy_url: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            proxy_url: None,
        }
    }
}

impl HttpClientConfig {
    /// Config with a specific timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

/// Build a reqwest client from configuration
pub fn build_client(config: &HttpClientConfig) -> Result<Client, HlgetError> {
    let mut builder = ClientBuilder::new().timeout(config.timeout).gzip(true);

    let user_agent = config
        .user_agent
        .clone()
        .unwrap_or_else(|| format!("hlget/{}", env!("CARGO_PKG_VERSION")));
    builder = builder.user_agent(user_agent);

    if let Some(proxy_url) = &config.proxy_url {
        match reqwest::Proxy::all(proxy_url) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(e) => warn!("Ignoring invalid proxy {}: {}", proxy_url, e),
        }
    }

    debug!("Building HTTP client with timeout {:?}", config.timeout);
    Ok(builder.build()?)
}
