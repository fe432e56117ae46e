//! User ID lookup from an access token

use crate::error::HlgetError;
use crate::platform::client::{build_client, HttpClientConfig};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Timeout for the lookup request
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct LookupResponse {
    data: Option<LookupData>,
}

#[derive(Debug, Deserialize)]
struct LookupData {
    userid: Option<String>,
}

/// Resolve the account behind `access_token` through the token service
///
/// The request always uses [`LOOKUP_TIMEOUT`]; other settings come from `config`.
pub async fn lookup_user_id(
    base_url: &str,
    access_token: &str,
    config: &HttpClientConfig,
) -> Result<String, HlgetError> {
    let client = build_client(&HttpClientConfig {
        timeout: LOOKUP_TIMEOUT,
        ..config.clone()
    })?;
    let url = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(access_token)
    );

    debug!("Looking up user ID for access token");
    let response = client.get(&url).send().await?;
    let status = response.status();
    if !status.is_success() {
        warn!("User lookup returned status {}", status);
        return Err(HlgetError::UserLookup(format!("lookup returned status {}", status)));
    }

    let body: LookupResponse = response.json().await?;
    body.data
        .and_then(|d| d.userid)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| HlgetError::UserLookup("no user is associated with this token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_user_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/forgot/tok123")
            .with_status(200)
            .with_body(r#"{"success": true, "data": {"userid": "98765", "username": "someone"}}"#)
            .create_async()
            .await;

        let base = format!("{}/api/forgot", server.url());
        let id = lookup_user_id(&base, "tok123", &HttpClientConfig::default()).await.unwrap();
        assert_eq!(id, "98765");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_lookup_user_id_without_data() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/forgot/bad")
            .with_status(200)
            .with_body(r#"{"success": false, "data": null}"#)
            .create_async()
            .await;

        let base = format!("{}/api/forgot", server.url());
        let err = lookup_user_id(&base, "bad", &HttpClientConfig::default()).await.unwrap_err();
        assert!(matches!(err, HlgetError::UserLookup(_)));
    }

    #[tokio::test]
    async fn test_lookup_user_id_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/forgot/tok")
            .with_status(404)
            .create_async()
            .await;

        let base = format!("{}/api/forgot", server.url());
        assert!(matches!(
            lookup_user_id(&base, "tok", &HttpClientConfig::default()).await,
            Err(HlgetError::UserLookup(_))
        ));
    }
}
