//! Paginated highlight listing over the REST API

use crate::core::video_info::{parse_duration_seconds, Credentials, VideoRecord};
use crate::error::{HlgetError, ListingError};
use crate::platform::client::{build_client, HttpClientConfig};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Largest page the listing endpoint accepts
pub const MAX_PAGE_SIZE: usize = 100;

/// Result of an enumeration: everything gathered, and what stopped it early
#[derive(Debug, Default)]
pub struct Listing {
    pub videos: Vec<VideoRecord>,
    /// Error that ended enumeration before exhaustion, if any
    pub interrupted: Option<ListingError>,
}

impl Listing {
    /// Check if enumeration ended without an error
    pub fn is_complete(&self) -> bool {
        self.interrupted.is_none()
    }
}

/// Source of highlight records for an account
#[async_trait]
pub trait HighlightSource: Send + Sync {
    /// Enumerate up to `max_videos` highlights in API order.
    ///
    /// Never fails outright: on error the records gathered so far are
    /// returned together with the error.
    async fn list_highlights(
        &self,
        credentials: &Credentials,
        user_id: &str,
        max_videos: usize,
        cancel: &CancellationToken,
    ) -> Listing;
}

/// One page of the listing
#[derive(Debug)]
pub struct Page {
    pub videos: Vec<VideoRecord>,
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    data: Option<Vec<HelixVideo>>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct HelixVideo {
    id: String,
    title: String,
    duration: DurationField,
    created_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DurationField {
    Seconds(u64),
    Text(String),
}

#[derive(Debug, Default, Deserialize)]
struct Pagination {
    cursor: Option<String>,
}

impl HelixVideo {
    fn into_record(self) -> Result<VideoRecord, ListingError> {
        let duration_seconds = match &self.duration {
            DurationField::Seconds(s) => *s,
            DurationField::Text(text) => parse_duration_seconds(text).ok_or_else(|| {
                ListingError::MalformedPage(format!(
                    "video {} has unparseable duration {:?}",
                    self.id, text
                ))
            })?,
        };
        Ok(VideoRecord::new(
            self.id,
            self.title,
            duration_seconds,
            self.created_at,
        ))
    }
}

/// Parse a listing page body
pub fn parse_page(body: &str) -> Result<Page, ListingError> {
    let response: VideosResponse =
        serde_json::from_str(body).map_err(|e| ListingError::MalformedPage(e.to_string()))?;

    let videos = response
        .data
        .unwrap_or_default()
        .into_iter()
        .map(HelixVideo::into_record)
        .collect::<Result<Vec<_>, _>>()?;

    let cursor = response
        .pagination
        .and_then(|p| p.cursor)
        .filter(|c| !c.is_empty());

    Ok(Page { videos, cursor })
}

/// Listing client for the REST API
pub struct HelixClient {
    client: Client,
    base_url: String,
}

impl HelixClient {
    /// Create a client against `base_url` (the API root serving `/videos`)
    pub fn new(base_url: impl Into<String>, config: &HttpClientConfig) -> Result<Self, HlgetError> {
        Ok(Self {
            client: build_client(config)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fetch a single page
    pub async fn fetch_page(
        &self,
        credentials: &Credentials,
        user_id: &str,
        page_size: usize,
        after: Option<&str>,
    ) -> Result<Page, ListingError> {
        let url = format!("{}/videos", self.base_url);
        let first = page_size.to_string();
        let mut params = vec![
            ("user_id", user_id),
            ("type", "highlight"),
            ("first", first.as_str()),
        ];
        if let Some(cursor) = after {
            params.push(("after", cursor));
        }

        debug!("Fetching highlight page (first={}, after={:?})", page_size, after);
        let response = self
            .client
            .get(&url)
            .header("Client-ID", &credentials.client_id)
            .header("Authorization", credentials.bearer())
            .query(&params)
            .send()
            .await
            .map_err(ListingError::from_request)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ListingError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(ListingError::from_request)?;
        parse_page(&body)
    }
}

#[async_trait]
impl HighlightSource for HelixClient {
    async fn list_highlights(
        &self,
        credentials: &Credentials,
        user_id: &str,
        max_videos: usize,
        cancel: &CancellationToken,
    ) -> Listing {
        let page_size = max_videos.min(MAX_PAGE_SIZE);
        let mut listing = Listing::default();
        let mut cursor: Option<String> = None;

        while listing.videos.len() < max_videos {
            if cancel.is_cancelled() {
                listing.interrupted = Some(ListingError::Cancelled);
                break;
            }

            let page = match self
                .fetch_page(credentials, user_id, page_size, cursor.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        "Highlight listing stopped after {} videos: {}",
                        listing.videos.len(),
                        e
                    );
                    listing.interrupted = Some(e);
                    break;
                }
            };

            if page.videos.is_empty() {
                break;
            }

            let room = max_videos - listing.videos.len();
            listing.videos.extend(page.videos.into_iter().take(room));

            match page.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!("Found {} highlights for user {}", listing.videos.len(), user_id);
        listing
    }
}
