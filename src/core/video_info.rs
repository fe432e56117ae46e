//! Highlight records and run credentials

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One highlight as returned by the listing endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    /// Video title
    pub title: String,
    /// Platform video ID
    pub video_id: String,
    /// Video duration in seconds
    pub duration_seconds: u64,
    /// Creation timestamp, as sent by the API
    pub release_time: String,
    /// Public page of the video
    pub source_url: String,
}

impl VideoRecord {
    /// Create a record with its public page derived from the ID
    pub fn new(
        video_id: impl Into<String>,
        title: impl Into<String>,
        duration_seconds: u64,
        release_time: impl Into<String>,
    ) -> Self {
        let video_id = video_id.into();
        Self {
            source_url: crate::utils::video_page_url(&video_id),
            title: title.into(),
            video_id,
            duration_seconds,
            release_time: release_time.into(),
        }
    }

    /// Parsed release time, if the API sent RFC 3339
    pub fn released_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.release_time)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Opaque API credentials, supplied once per run
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub access_token: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            access_token: access_token.into(),
        }
    }

    /// Value of the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Parse a platform duration such as `"1h2m3s"`, `"45m"` or `"17s"`.
///
/// A bare number is taken as seconds.
pub fn parse_duration_seconds(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds);
    }

    humantime::parse_duration(value).ok().map(|d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_record_new() {
        let record = VideoRecord::new("42", "Clip", 90, "2024-03-01T12:00:00Z");
        assert_eq!(record.source_url, "https://www.twitch.tv/videos/42");
        assert_eq!(record.video_id, "42");
        assert_eq!(record.duration_seconds, 90);
    }

    #[test]
    fn test_released_at() {
        let record = VideoRecord::new("1", "a", 0, "2024-03-01T12:00:00Z");
        let at = record.released_at().unwrap();
        assert_eq!(at.to_rfc3339(), "2024-03-01T12:00:00+00:00");

        let record = VideoRecord::new("1", "a", 0, "yesterday");
        assert!(record.released_at().is_none());
    }

    #[test]
    fn test_credentials_debug_redacts_token() {
        let creds = Credentials::new("client", "secret-token");
        let shown = format!("{:?}", creds);
        assert!(shown.contains("client"));
        assert!(!shown.contains("secret-token"));
        assert_eq!(creds.bearer(), "Bearer secret-token");
    }

    #[test]
    fn test_parse_duration_seconds() {
        assert_eq!(parse_duration_seconds("1h2m3s"), Some(3723));
        assert_eq!(parse_duration_seconds("45m"), Some(2700));
        assert_eq!(parse_duration_seconds("17s"), Some(17));
        assert_eq!(parse_duration_seconds("3h"), Some(10800));
        assert_eq!(parse_duration_seconds("125"), Some(125));
        assert_eq!(parse_duration_seconds("0s"), Some(0));
        assert_eq!(parse_duration_seconds("1h30m"), Some(5400));
        assert_eq!(parse_duration_seconds(" 2m5s "), Some(125));
    }

    #[test]
    fn test_parse_duration_seconds_invalid() {
        assert_eq!(parse_duration_seconds(""), None);
        assert_eq!(parse_duration_seconds("h"), None);
        assert_eq!(parse_duration_seconds("1x"), None);
        assert_eq!(parse_duration_seconds("1h30"), None);
        assert_eq!(parse_duration_seconds("-5s"), None);
    }
}
