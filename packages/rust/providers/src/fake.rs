//! In-memory doubles for every provider trait.
//!
//! These give deterministic responses without network access and record how
//! they were called so tests can assert on prompts and on which services were
//! (or were not) contacted.
//!
//! ```rust,ignore
//! let model = FakeLanguageModel::new()
//!     .with_structured("extraction", json!({"symptoms": "fever", "location": "Lagos"}))
//!     .with_structured("plan", json!({"actions": ["medical", "hospitals"]}))
//!     .push_text("General guidance.");
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use healthnav_shared::{ChatMessage, HealthNavError, Result};

use crate::llm::{LanguageModel, StructuredSchema};
use crate::places::{LatLng, Place, PlacesLookup};
use crate::search::{SearchHit, WebSearch};
use crate::weather::{WeatherLookup, WeatherObservation};

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Language model
// ============================================================================

/// One recorded call to [`FakeLanguageModel`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Schema name for structured calls, `None` for free text.
    pub schema: Option<String>,
    pub messages: Vec<ChatMessage>,
}

/// Scripted language model.
///
/// Structured calls answer from a per-schema table (the same reply every
/// time). Free-text calls pop from a queue and fall back to a default reply
/// once it is empty.
pub struct FakeLanguageModel {
    structured: HashMap<String, std::result::Result<Value, String>>,
    text: Mutex<VecDeque<std::result::Result<String, String>>>,
    default_text: String,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeLanguageModel {
    pub fn new() -> Self {
        Self {
            structured: HashMap::new(),
            text: Mutex::new(VecDeque::new()),
            default_text: "General health information.".to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer structured calls for `schema` with `value`.
    pub fn with_structured(mut self, schema: &str, value: Value) -> Self {
        self.structured.insert(schema.to_string(), Ok(value));
        self
    }

    /// Fail structured calls for `schema`.
    pub fn failing_structured(mut self, schema: &str, error: &str) -> Self {
        self.structured
            .insert(schema.to_string(), Err(error.to_string()));
        self
    }

    /// Queue a free-text reply.
    pub fn push_text(self, text: &str) -> Self {
        lock(&self.text).push_back(Ok(text.to_string()));
        self
    }

    /// Queue a free-text failure.
    pub fn push_text_error(self, error: &str) -> Self {
        lock(&self.text).push_back(Err(error.to_string()));
        self
    }

    /// Reply used once the free-text queue is drained.
    pub fn with_default_text(mut self, text: &str) -> Self {
        self.default_text = text.to_string();
        self
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Free-text calls only.
    pub fn text_calls(&self) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.schema.is_none())
            .collect()
    }

    /// Structured calls made against `schema`.
    pub fn structured_calls(&self, schema: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.schema.as_deref() == Some(schema))
            .collect()
    }

    fn record(&self, schema: Option<&str>, messages: &[ChatMessage]) {
        lock(&self.calls).push(RecordedCall {
            schema: schema.map(str::to_string),
            messages: messages.to_vec(),
        });
    }
}

impl Default for FakeLanguageModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for FakeLanguageModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.record(None, messages);
        match lock(&self.text).pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(HealthNavError::provider("llm", e)),
            None => Ok(self.default_text.clone()),
        }
    }

    async fn complete_structured(
        &self,
        messages: &[ChatMessage],
        schema: &StructuredSchema,
    ) -> Result<Value> {
        self.record(Some(schema.name), messages);
        match self.structured.get(schema.name) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(e)) => Err(HealthNavError::provider("llm", e.clone())),
            None => Err(HealthNavError::provider(
                "llm",
                format!("no scripted reply for schema {}", schema.name),
            )),
        }
    }
}

// ============================================================================
// Places
// ============================================================================

/// Fixed geocode + nearby-search results.
pub struct FakePlaces {
    geocode: std::result::Result<Option<LatLng>, String>,
    places: Vec<Place>,
    geocode_calls: AtomicUsize,
    nearby_calls: AtomicUsize,
    last_radius: Mutex<Option<u32>>,
}

impl FakePlaces {
    /// Geocoding succeeds and the nearby search returns `places`.
    pub fn found(places: Vec<Place>) -> Self {
        Self::with(Ok(Some(LatLng { lat: 6.5244, lng: 3.3792 })), places)
    }

    /// Geocoding matches nothing.
    pub fn no_match() -> Self {
        Self::with(Ok(None), Vec::new())
    }

    /// Geocoding fails.
    pub fn failing(error: &str) -> Self {
        Self::with(Err(error.to_string()), Vec::new())
    }

    fn with(geocode: std::result::Result<Option<LatLng>, String>, places: Vec<Place>) -> Self {
        Self {
            geocode,
            places,
            geocode_calls: AtomicUsize::new(0),
            nearby_calls: AtomicUsize::new(0),
            last_radius: Mutex::new(None),
        }
    }

    pub fn geocode_calls(&self) -> usize {
        self.geocode_calls.load(Ordering::SeqCst)
    }

    pub fn nearby_calls(&self) -> usize {
        self.nearby_calls.load(Ordering::SeqCst)
    }

    pub fn last_radius(&self) -> Option<u32> {
        *lock(&self.last_radius)
    }
}

#[async_trait]
impl PlacesLookup for FakePlaces {
    async fn geocode(&self, _address: &str) -> Result<Option<LatLng>> {
        self.geocode_calls.fetch_add(1, Ordering::SeqCst);
        self.geocode
            .clone()
            .map_err(|e| HealthNavError::provider("maps", e))
    }

    async fn nearby(&self, _at: LatLng, radius_m: u32, _place_type: &str) -> Result<Vec<Place>> {
        self.nearby_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_radius) = Some(radius_m);
        Ok(self.places.clone())
    }
}

// ============================================================================
// Search
// ============================================================================

/// Fixed search results.
pub struct FakeSearch {
    hits: std::result::Result<Vec<SearchHit>, String>,
    calls: AtomicUsize,
    last_query: Mutex<Option<String>>,
}

impl FakeSearch {
    /// Results whose bodies are `contents`.
    pub fn with_contents(contents: &[&str]) -> Self {
        let hits = contents
            .iter()
            .enumerate()
            .map(|(i, c)| SearchHit {
                title: format!("Result {}", i + 1),
                url: format!("https://example.org/{}", i + 1),
                content: (*c).to_string(),
            })
            .collect();
        Self::with(Ok(hits))
    }

    pub fn empty() -> Self {
        Self::with(Ok(Vec::new()))
    }

    pub fn failing(error: &str) -> Self {
        Self::with(Err(error.to_string()))
    }

    fn with(hits: std::result::Result<Vec<SearchHit>, String>) -> Self {
        Self {
            hits,
            calls: AtomicUsize::new(0),
            last_query: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<String> {
        lock(&self.last_query).clone()
    }
}

#[async_trait]
impl WebSearch for FakeSearch {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_query) = Some(query.to_string());
        let mut hits = self
            .hits
            .clone()
            .map_err(|e| HealthNavError::provider("search", e))?;
        hits.truncate(max_results as usize);
        Ok(hits)
    }
}

// ============================================================================
// Weather
// ============================================================================

/// Fixed weather observation.
pub struct FakeWeather {
    observation: std::result::Result<WeatherObservation, String>,
    calls: AtomicUsize,
}

impl FakeWeather {
    /// A successful observation.
    pub fn clear(description: &str, temp_c: f64) -> Self {
        Self::with(Ok(WeatherObservation {
            code: 200,
            description: Some(description.to_string()),
            temp_c: Some(temp_c),
            message: None,
        }))
    }

    /// The provider answers with a failure code.
    pub fn not_found() -> Self {
        Self::with(Ok(WeatherObservation {
            code: 404,
            description: None,
            temp_c: None,
            message: Some("city not found".to_string()),
        }))
    }

    pub fn failing(error: &str) -> Self {
        Self::with(Err(error.to_string()))
    }

    fn with(observation: std::result::Result<WeatherObservation, String>) -> Self {
        Self {
            observation,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherLookup for FakeWeather {
    async fn current(&self, _location: &str) -> Result<WeatherObservation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.observation
            .clone()
            .map_err(|e| HealthNavError::provider("weather", e))
    }
}
