//! Language-model client.
//!
//! Two call shapes are needed by the pipeline: a free-text completion and a
//! structured completion constrained to a named JSON schema. The production
//! client speaks the OpenAI chat-completions protocol, which most hosted and
//! local model servers implement.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use healthnav_shared::{ChatMessage, HealthNavError, LlmConfig, Result};

use crate::http;

const SERVICE: &str = "llm";

/// A named JSON schema the model output must conform to.
#[derive(Debug, Clone)]
pub struct StructuredSchema {
    pub name: &'static str,
    pub schema: Value,
}

/// Generic language-model interface.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Free-text completion.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Completion constrained to `schema`; returns the decoded JSON value.
    async fn complete_structured(
        &self,
        messages: &[ChatMessage],
        schema: &StructuredSchema,
    ) -> Result<Value>;
}

/// Run a structured completion and decode it into `T`.
pub async fn complete_as<T: DeserializeOwned>(
    model: &dyn LanguageModel,
    messages: &[ChatMessage],
    schema: &StructuredSchema,
) -> Result<T> {
    let value = model.complete_structured(messages, schema).await?;
    serde_json::from_value(value).map_err(|e| {
        HealthNavError::parse(format!("{} output does not match schema: {e}", schema.name))
    })
}

// ---------------------------------------------------------------------------
// OpenAI-compatible client
// ---------------------------------------------------------------------------

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: http::build_client(config.timeout_secs)?,
            base_url: config.base_url.clone(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    async fn chat(&self, messages: &[ChatMessage], response_format: Option<Value>) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| http::missing_key(SERVICE))?;
        let url = http::endpoint(&self.base_url, "chat/completions", &[])?;

        let mut body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": messages,
        });
        if let Some(format) = response_format {
            body["response_format"] = format;
        }

        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| http::transport_error(SERVICE, e))?;

        if !response.status().is_success() {
            return Err(http::status_error(SERVICE, response).await);
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| HealthNavError::parse(format!("invalid completion response: {e}")))?;

        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| HealthNavError::provider(SERVICE, "response has no choices"))?;

        if let Some(refusal) = message.refusal.filter(|r| !r.is_empty()) {
            return Err(HealthNavError::provider(SERVICE, format!("model refused: {refusal}")));
        }

        match message.content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(HealthNavError::provider(SERVICE, "model returned empty content")),
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    #[instrument(skip_all, fields(model = %self.model, messages = messages.len()))]
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.chat(messages, None).await
    }

    #[instrument(skip_all, fields(model = %self.model, schema = schema.name))]
    async fn complete_structured(
        &self,
        messages: &[ChatMessage],
        schema: &StructuredSchema,
    ) -> Result<Value> {
        let format = json!({
            "type": "json_schema",
            "json_schema": {
                "name": schema.name,
                "strict": true,
                "schema": schema.schema,
            }
        });
        let text = self.chat(messages, Some(format)).await?;
        debug!(chars = text.len(), "structured completion received");
        parse_json_output(&text)
    }
}

/// Decode model text as JSON, tolerating a surrounding Markdown code fence.
pub(crate) fn parse_json_output(raw: &str) -> Result<Value> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str(&cleaned)
        .map_err(|e| HealthNavError::parse(format!("model output is not valid JSON: {e}")))
}

fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    if lines.first().is_some_and(|l| l.trim_start().starts_with("```")) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|l| l.trim_start().starts_with("```")) {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> LlmConfig {
        LlmConfig {
            base_url: format!("{}/v1", server.uri()),
            ..LlmConfig::default()
        }
    }

    fn completion(content: &str) -> Value {
        json!({
            "id": "chatcmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
        })
    }

    #[test]
    fn strips_fenced_json() {
        let value = parse_json_output("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn rejects_prose() {
        assert!(parse_json_output("Sure! Here you go.").is_err());
    }

    #[tokio::test]
    async fn complete_returns_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({ "model": "gpt-4o-mini" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Rest and fluids.")))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&config_for(&server), Some("sk-test".into())).unwrap();
        let text = client
            .complete(&[ChatMessage::user("I have a cold")])
            .await
            .unwrap();
        assert_eq!(text, "Rest and fluids.");
    }

    #[tokio::test]
    async fn structured_sends_schema_and_decodes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "response_format": { "type": "json_schema", "json_schema": { "name": "extraction" } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                r#"{"symptoms":"fever","location":"Lagos"}"#,
            )))
            .mount(&server)
            .await;

        #[derive(Deserialize)]
        struct Out {
            symptoms: String,
            location: String,
        }

        let client = OpenAiClient::new(&config_for(&server), Some("sk-test".into())).unwrap();
        let schema = StructuredSchema {
            name: "extraction",
            schema: json!({ "type": "object" }),
        };
        let out: Out = complete_as(&client, &[ChatMessage::user("fever in Lagos")], &schema)
            .await
            .unwrap();
        assert_eq!(out.symptoms, "fever");
        assert_eq!(out.location, "Lagos");
    }

    #[tokio::test]
    async fn http_error_surfaces_api_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "Incorrect API key provided" }
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&config_for(&server), Some("sk-bad".into())).unwrap();
        let err = client.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("401"), "{msg}");
        assert!(msg.contains("Incorrect API key"), "{msg}");
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&config_for(&server), Some("sk-test".into())).unwrap();
        assert!(client.complete(&[ChatMessage::user("hi")]).await.is_err());
    }

    #[tokio::test]
    async fn missing_key_fails_without_request() {
        let server = MockServer::start().await;
        let client = OpenAiClient::new(&config_for(&server), None).unwrap();
        let err = client.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(err.to_string().contains("API key not configured"));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }
}
