use crate::shared::error::AppResult;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared client for token endpoints and the auth backend.
pub(crate) fn build_http_client(connect_timeout_seconds: u32) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(format!("deepnote-signin/{}", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(u64::from(connect_timeout_seconds)))
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| format!("SYSTEM_ERROR: http client init failed: {e}").into())
}
