//! Playback token exchange over the GraphQL endpoint

use crate::error::{HlgetError, ResolveError};
use crate::platform::client::{build_client, HttpClientConfig};
use crate::utils::build_playback_url;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Public client ID of the web player, accepted by the token endpoint
pub const GQL_CLIENT_ID: &str = "kimne78kx3ncx6brgo4mv6wki5h1ko";

const PLAYBACK_TOKEN_QUERY: &str = r#"
query($id: ID!) {
    video(id: $id) {
        id
        title
        playbackAccessToken(params: {platform: "web", playerBackend: "mediaplayer", playerType: "site"}) {
            signature
            value
        }
    }
}
"#;

/// Turns a video ID into a signed, playable stream URL
#[async_trait]
pub trait PlaybackResolver: Send + Sync {
    /// Resolve once; retries are the caller's business
    async fn resolve_playback_url(&self, video_id: &str) -> Result<String, ResolveError>;
}

#[derive(Debug, Deserialize)]
struct GqlResponse {
    data: Option<GqlData>,
}

#[derive(Debug, Deserialize)]
struct GqlData {
    video: Option<GqlVideo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlVideo {
    playback_access_token: Option<PlaybackAccessToken>,
}

#[derive(Debug, Deserialize)]
struct PlaybackAccessToken {
    signature: Option<String>,
    value: Option<String>,
}

/// Signature and token value of a playback grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub signature: String,
    pub value: String,
}

/// Extract the access token from a response body
pub fn parse_access_token(video_id: &str, body: &str) -> Result<AccessToken, ResolveError> {
    let response: GqlResponse = serde_json::from_str(body)?;

    let video = response
        .data
        .and_then(|d| d.video)
        .ok_or_else(|| ResolveError::VideoUnavailable(video_id.to_string()))?;
    let token = video
        .playback_access_token
        .ok_or(ResolveError::MissingField("playbackAccessToken"))?;

    Ok(AccessToken {
        signature: token.signature.ok_or(ResolveError::MissingField("signature"))?,
        value: token.value.ok_or(ResolveError::MissingField("value"))?,
    })
}

/// Resolver backed by the GraphQL token endpoint
pub struct GqlResolver {
    client: Client,
    gql_url: String,
    edge_base: String,
}

impl GqlResolver {
    /// Create a resolver
    pub fn new(
        gql_url: impl Into<String>,
        edge_base: impl Into<String>,
        config: &HttpClientConfig,
    ) -> Result<Self, HlgetError> {
        Ok(Self {
            client: build_client(config)?,
            gql_url: gql_url.into(),
            edge_base: edge_base.into(),
        })
    }

    /// Request a playback access token for a video
    pub async fn access_token(&self, video_id: &str) -> Result<AccessToken, ResolveError> {
        let request_body = serde_json::json!({
            "query": PLAYBACK_TOKEN_QUERY,
            "variables": { "id": video_id },
        });

        debug!("Requesting playback token for video {}", video_id);
        let response = self
            .client
            .post(&self.gql_url)
            .header("Client-ID", GQL_CLIENT_ID)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Token request for {} returned status {}", video_id, status);
            return Err(ResolveError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_access_token(video_id, &body)
    }
}

#[async_trait]
impl PlaybackResolver for GqlResolver {
    async fn resolve_playback_url(&self, video_id: &str) -> Result<String, ResolveError> {
        let token = match self.access_token(video_id).await {
            Ok(token) => token,
            Err(e) => {
                warn!("Could not resolve video {}: {}", video_id, e);
                return Err(e);
            }
        };
        let url = build_playback_url(&self.edge_base, video_id, &token.signature, &token.value)?;
        info!("Resolved playback URL for video {}", video_id);
        Ok(url)
    }
}
