//! HTTP plumbing shared by every provider client.

use std::time::Duration;

use reqwest::{Client, Response};
use url::Url;

use healthnav_shared::{HealthNavError, Result};

/// User-Agent string for outbound requests.
const USER_AGENT: &str = concat!("HealthNav/", env!("CARGO_PKG_VERSION"));

/// Build a reqwest client with a per-request timeout.
pub(crate) fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| HealthNavError::Network(format!("failed to build HTTP client: {e}")))
}

/// Join `path` onto a configured base URL and attach query parameters.
pub(crate) fn endpoint(base_url: &str, path: &str, params: &[(&str, &str)]) -> Result<Url> {
    let raw = format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'));
    let parsed = if params.is_empty() {
        Url::parse(&raw)
    } else {
        Url::parse_with_params(&raw, params)
    };
    parsed.map_err(|e| HealthNavError::config(format!("invalid endpoint {raw}: {e}")))
}

/// Map a transport error, dropping the URL so query-string keys never leak.
pub(crate) fn transport_error(service: &'static str, err: reqwest::Error) -> HealthNavError {
    let err = err.without_url();
    if err.is_timeout() {
        HealthNavError::Network(format!("{service}: request timed out"))
    } else {
        HealthNavError::Network(format!("{service}: {err}"))
    }
}

/// Turn a non-success response into a provider error carrying the body excerpt.
pub(crate) async fn status_error(service: &'static str, response: Response) -> HealthNavError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("detail"))
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| body.chars().take(200).collect());
    HealthNavError::provider(service, format!("HTTP {status}: {}", detail.trim()))
}

/// Error returned when a service is called without a configured key.
pub(crate) fn missing_key(service: &'static str) -> HealthNavError {
    HealthNavError::provider(service, "API key not configured")
}
