//! Wiring of the external service clients.

use std::sync::Arc;

use tracing::warn;

use healthnav_providers::{
    GoogleMapsClient, LanguageModel, OpenAiClient, OpenWeatherClient, PlacesLookup, TavilyClient,
    WeatherLookup, WebSearch,
};
use healthnav_shared::{AppConfig, Result, resolve_api_key, validate_api_key};

/// Handles to every external capability the pipeline and chat use.
#[derive(Clone)]
pub struct Services {
    pub llm: Arc<dyn LanguageModel>,
    pub places: Arc<dyn PlacesLookup>,
    pub search: Arc<dyn WebSearch>,
    pub weather: Arc<dyn WeatherLookup>,
}

impl Services {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        places: Arc<dyn PlacesLookup>,
        search: Arc<dyn WebSearch>,
        weather: Arc<dyn WeatherLookup>,
    ) -> Self {
        Self {
            llm,
            places,
            search,
            weather,
        }
    }

    /// Build the production HTTP clients from config.
    ///
    /// The language-model key is required. A missing maps, search or weather
    /// key only logs a warning; the corresponding adapter degrades per call.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        validate_api_key(config)?;
        let llm_key = resolve_api_key(&config.llm.api_key_env);

        let maps_key = optional_key("maps", &config.maps.api_key_env);
        let search_key = optional_key("search", &config.search.api_key_env);
        let weather_key = optional_key("weather", &config.weather.api_key_env);

        Ok(Self {
            llm: Arc::new(OpenAiClient::new(&config.llm, llm_key)?),
            places: Arc::new(GoogleMapsClient::new(&config.maps, maps_key)?),
            search: Arc::new(TavilyClient::new(&config.search, search_key)?),
            weather: Arc::new(OpenWeatherClient::new(&config.weather, weather_key)?),
        })
    }
}

fn optional_key(service: &str, var_name: &str) -> Option<String> {
    let key = resolve_api_key(var_name);
    if key.is_none() {
        warn!(service, env = var_name, "API key not set, results will be degraded");
    }
    key
}
