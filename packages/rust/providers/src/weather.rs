//! Current weather lookup (OpenWeatherMap).
//!
//! OpenWeatherMap reports lookup failures in-band via a `cod` field (sometimes
//! a number, sometimes a string) alongside a non-2xx status, so the client
//! decodes the body regardless of HTTP status and leaves the interpretation
//! of `code` to the caller.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use healthnav_shared::{HealthNavError, Result, WeatherConfig};

use crate::http;

const SERVICE: &str = "weather";

/// Current conditions as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    /// Provider status code; 200 means the lookup succeeded.
    pub code: u16,
    pub description: Option<String>,
    /// Temperature in degrees Celsius.
    pub temp_c: Option<f64>,
    /// Provider message accompanying a failure code.
    pub message: Option<String>,
}

impl WeatherObservation {
    pub fn is_success(&self) -> bool {
        self.code == 200
    }
}

#[async_trait]
pub trait WeatherLookup: Send + Sync {
    /// Current conditions for a free-text location name.
    async fn current(&self, location: &str) -> Result<WeatherObservation>;
}

/// Client for the OpenWeatherMap current-weather endpoint.
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    cod: Value,
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    weather: Vec<Condition>,
    #[serde(default)]
    main: Option<MainBlock>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
}

impl OpenWeatherClient {
    pub fn new(config: &WeatherConfig, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: http::build_client(config.timeout_secs)?,
            base_url: config.base_url.clone(),
            api_key,
        })
    }
}

/// `cod` arrives as `200` on success and as `"404"` on failure.
fn parse_code(cod: &Value) -> Option<u16> {
    match cod {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl From<WeatherResponse> for WeatherObservation {
    fn from(body: WeatherResponse) -> Self {
        Self {
            code: parse_code(&body.cod).unwrap_or(0),
            description: body.weather.into_iter().next().map(|c| c.description),
            temp_c: body.main.map(|m| m.temp),
            message: body.message.map(|m| match m {
                Value::String(s) => s,
                other => other.to_string(),
            }),
        }
    }
}

#[async_trait]
impl WeatherLookup for OpenWeatherClient {
    #[instrument(skip(self))]
    async fn current(&self, location: &str) -> Result<WeatherObservation> {
        let api_key = self.api_key.as_deref().ok_or_else(|| http::missing_key(SERVICE))?;
        let url = http::endpoint(
            &self.base_url,
            "weather",
            &[("q", location), ("appid", api_key), ("units", "metric")],
        )?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| http::transport_error(SERVICE, e))?;

        let status = response.status();
        let body: WeatherResponse = response.json().await.map_err(|e| {
            HealthNavError::parse(format!("invalid weather response (HTTP {status}): {e}"))
        })?;

        let observation = WeatherObservation::from(body);
        debug!(code = observation.code, "weather lookup complete");
        Ok(observation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenWeatherClient {
        let config = WeatherConfig {
            base_url: server.uri(),
            ..WeatherConfig::default()
        };
        OpenWeatherClient::new(&config, Some("owm-key".into())).unwrap()
    }

    #[test]
    fn code_parses_from_number_or_string() {
        assert_eq!(parse_code(&json!(200)), Some(200));
        assert_eq!(parse_code(&json!("404")), Some(404));
        assert_eq!(parse_code(&json!(null)), None);
    }

    #[tokio::test]
    async fn current_conditions_in_metric() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "Lagos"))
            .and(query_param("appid", "owm-key"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "cod": 200,
                "weather": [{ "id": 500, "main": "Rain", "description": "light rain" }],
                "main": { "temp": 27.5, "humidity": 88 }
            })))
            .mount(&server)
            .await;

        let obs = client_for(&server).current("Lagos").await.unwrap();
        assert!(obs.is_success());
        assert_eq!(obs.description.as_deref(), Some("light rain"));
        assert_eq!(obs.temp_c, Some(27.5));
    }

    #[tokio::test]
    async fn city_not_found_is_reported_in_band() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "cod": "404",
                "message": "city not found"
            })))
            .mount(&server)
            .await;

        let obs = client_for(&server).current("Nowhere").await.unwrap();
        assert!(!obs.is_success());
        assert_eq!(obs.code, 404);
        assert_eq!(obs.message.as_deref(), Some("city not found"));
    }

    #[tokio::test]
    async fn non_json_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        assert!(client_for(&server).current("Lagos").await.is_err());
    }
}
