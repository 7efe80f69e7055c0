//! Minimal HTTP client for a running HealthNav server's `/chat` route.

use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr, eyre};
use serde::Deserialize;
use serde_json::json;
use url::Url;

/// What the server answered for one chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChatReply {
    Response(String),
    Error(String),
}

#[derive(Debug, Deserialize)]
struct ChatBody {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub(crate) struct ChatClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl ChatClient {
    pub(crate) fn new(server: &str) -> Result<Self> {
        let base = Url::parse(server).wrap_err_with(|| format!("invalid server URL '{server}'"))?;
        let endpoint = base.join("chat").wrap_err("cannot build /chat URL")?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .wrap_err("failed to build HTTP client")?;
        Ok(Self { http, endpoint })
    }

    /// Send one message. Error objects from the server come back as
    /// [`ChatReply::Error`]; only transport failures are `Err`.
    pub(crate) async fn send(&self, user_id: &str, message: &str) -> Result<ChatReply> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&json!({ "user_id": user_id, "message": message }))
            .send()
            .await
            .wrap_err_with(|| format!("cannot reach {}", self.endpoint))?;

        let status = response.status();
        let body: ChatBody = response
            .json()
            .await
            .wrap_err_with(|| format!("unexpected reply from server (HTTP {status})"))?;

        match (body.response, body.error) {
            (Some(text), _) => Ok(ChatReply::Response(text)),
            (None, Some(error)) => Ok(ChatReply::Error(error)),
            (None, None) => Err(eyre!("server reply had neither response nor error")),
        }
    }
}
