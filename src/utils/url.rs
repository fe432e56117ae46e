//! URL utilities for the stream delivery host and video pages

use url::Url;

/// Edge host serving VOD manifests
pub const DEFAULT_EDGE_BASE: &str = "https://usher.ttvnw.net";

/// Player identifier sent with every manifest request
pub const PLAYER_ID: &str = "twitchweb";

/// Public page of a video
pub fn video_page_url(video_id: &str) -> String {
    format!("https://www.twitch.tv/videos/{}", video_id)
}

/// Build the signed manifest URL for a video.
///
/// The token is a JSON document and is percent-encoded with no safe
/// characters; the signature is a hex digest and goes in as-is.
pub fn build_playback_url(
    edge_base: &str,
    video_id: &str,
    signature: &str,
    token: &str,
) -> Result<String, url::ParseError> {
    let base = Url::parse(edge_base)?;
    let manifest = base.join(&format!("vod/{}.m3u8", urlencoding::encode(video_id)))?;

    Ok(format!(
        "{}?allow_source=true&player={}&sig={}&token={}",
        manifest,
        PLAYER_ID,
        signature,
        urlencoding::encode(token)
    ))
}

/// Query value of a signed URL, decoded
pub fn query_value(url: &str, key: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}
