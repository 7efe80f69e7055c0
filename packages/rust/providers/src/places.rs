//! Geocoding and nearby-place search (Google Maps web services).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use healthnav_shared::{HealthNavError, MapsConfig, Result};

use crate::http;

const SERVICE: &str = "maps";

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// A place record as returned by the nearby search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    /// Short street address.
    #[serde(default)]
    pub vicinity: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
}

/// Resolve free-text locations and find places around them.
#[async_trait]
pub trait PlacesLookup: Send + Sync {
    /// Resolve `address` to coordinates; `None` when nothing matches.
    async fn geocode(&self, address: &str) -> Result<Option<LatLng>>;

    /// First page of places of `place_type` within `radius_m` of `at`.
    async fn nearby(&self, at: LatLng, radius_m: u32, place_type: &str) -> Result<Vec<Place>>;
}

// ---------------------------------------------------------------------------
// Google Maps client
// ---------------------------------------------------------------------------

/// Client for the Geocoding and Places Nearby Search APIs.
pub struct GoogleMapsClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct NearbyResponse {
    status: String,
    #[serde(default)]
    results: Vec<Place>,
    #[serde(default)]
    error_message: Option<String>,
}

impl GoogleMapsClient {
    pub fn new(config: &MapsConfig, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: http::build_client(config.timeout_secs)?,
            base_url: config.base_url.clone(),
            api_key,
        })
    }

    fn key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| http::missing_key(SERVICE))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = http::endpoint(&self.base_url, path, params)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| http::transport_error(SERVICE, e))?;

        if !response.status().is_success() {
            return Err(http::status_error(SERVICE, response).await);
        }

        response
            .json()
            .await
            .map_err(|e| HealthNavError::parse(format!("invalid {path} response: {e}")))
    }
}

/// Google reports failures in-band through `status`.
fn check_status(status: &str, error_message: Option<String>) -> Result<()> {
    match status {
        "OK" | "ZERO_RESULTS" => Ok(()),
        other => Err(HealthNavError::provider(
            SERVICE,
            match error_message {
                Some(msg) => format!("{other}: {msg}"),
                None => other.to_string(),
            },
        )),
    }
}

#[async_trait]
impl PlacesLookup for GoogleMapsClient {
    #[instrument(skip(self))]
    async fn geocode(&self, address: &str) -> Result<Option<LatLng>> {
        let key = self.key()?;
        let body: GeocodeResponse = self
            .get_json("geocode/json", &[("address", address), ("key", key)])
            .await?;
        check_status(&body.status, body.error_message)?;

        let location = body.results.into_iter().next().map(|r| r.geometry.location);
        debug!(found = location.is_some(), "geocode complete");
        Ok(location)
    }

    #[instrument(skip(self))]
    async fn nearby(&self, at: LatLng, radius_m: u32, place_type: &str) -> Result<Vec<Place>> {
        let key = self.key()?;
        let location = format!("{},{}", at.lat, at.lng);
        let radius = radius_m.to_string();
        let body: NearbyResponse = self
            .get_json(
                "place/nearbysearch/json",
                &[
                    ("location", location.as_str()),
                    ("radius", radius.as_str()),
                    ("type", place_type),
                    ("key", key),
                ],
            )
            .await?;
        check_status(&body.status, body.error_message)?;

        debug!(places = body.results.len(), "nearby search complete");
        Ok(body.results)
    }
}
