//! Clients for the external services HealthNav depends on.
//!
//! Each service sits behind a small async trait so the pipeline can be driven
//! by the real HTTP clients in production and by the `fake` doubles in tests
//! (enabled for other crates by the `test-util` feature):
//! - [`llm`]: OpenAI-compatible chat completions (free text and JSON schema)
//! - [`places`]: Google Maps geocoding + nearby search
//! - [`search`]: Tavily web search
//! - [`weather`]: OpenWeatherMap current conditions

mod http;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;
pub mod llm;
pub mod places;
pub mod search;
pub mod weather;

pub use llm::{LanguageModel, OpenAiClient, StructuredSchema, complete_as};
pub use places::{GoogleMapsClient, LatLng, Place, PlacesLookup};
pub use search::{SearchHit, TavilyClient, WebSearch};
pub use weather::{OpenWeatherClient, WeatherLookup, WeatherObservation};
