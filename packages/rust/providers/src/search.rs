//! Web search (Tavily).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

use healthnav_shared::{HealthNavError, Result, SearchConfig};

use crate::http;

const SERVICE: &str = "search";

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    /// Extracted text body of the result.
    #[serde(default)]
    pub content: String,
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Run `query`, returning at most `max_results` hits.
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchHit>>;
}

/// Client for the Tavily search API.
pub struct TavilyClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

impl TavilyClient {
    pub fn new(config: &SearchConfig, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: http::build_client(config.timeout_secs)?,
            base_url: config.base_url.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl WebSearch for TavilyClient {
    #[instrument(skip(self))]
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchHit>> {
        let api_key = self.api_key.as_deref().ok_or_else(|| http::missing_key(SERVICE))?;
        let url = http::endpoint(&self.base_url, "search", &[])?;

        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&json!({
                "query": query,
                "max_results": max_results,
            }))
            .send()
            .await
            .map_err(|e| http::transport_error(SERVICE, e))?;

        if !response.status().is_success() {
            return Err(http::status_error(SERVICE, response).await);
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| HealthNavError::parse(format!("invalid search response: {e}")))?;

        let mut hits = body.results;
        hits.truncate(max_results as usize);
        debug!(hits = hits.len(), "search complete");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> TavilyClient {
        let config = SearchConfig {
            base_url: server.uri(),
            ..SearchConfig::default()
        };
        TavilyClient::new(&config, Some("tvly-key".into())).unwrap()
    }

    #[tokio::test]
    async fn search_posts_query_and_caps_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("authorization", "Bearer tvly-key"))
            .and(body_partial_json(json!({
                "query": "public health advisories in Lagos",
                "max_results": 2
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": "public health advisories in Lagos",
                "results": [
                    { "title": "A", "url": "https://a.example", "content": "Cholera alert." },
                    { "title": "B", "url": "https://b.example", "content": "Lassa fever." },
                    { "title": "C", "url": "https://c.example", "content": "Extra." }
                ]
            })))
            .mount(&server)
            .await;

        let hits = client_for(&server)
            .search("public health advisories in Lagos", 2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "Cholera alert.");
    }

    #[tokio::test]
    async fn server_error_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(432).set_body_json(json!({ "detail": "usage limit exceeded" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).search("x", 3).await.unwrap_err();
        assert!(err.to_string().contains("usage limit exceeded"));
    }
}
