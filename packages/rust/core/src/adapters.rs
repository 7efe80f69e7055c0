//! External service adapters.
//!
//! Each adapter makes one call against an external capability and contains
//! every failure locally: the result is always a [`FieldOutcome`], never an
//! error, so nothing raised here can abort a pipeline run.

use tracing::{instrument, warn};

use healthnav_providers::{LanguageModel, Place, PlacesLookup, WeatherLookup, WebSearch};
use healthnav_shared::{ChatMessage, FieldOutcome, Hospital};

/// Placeholder for a missing address or rating.
const NOT_AVAILABLE: &str = "N/A";

/// Place category passed to the nearby search.
const HOSPITAL_TYPE: &str = "hospital";

pub const NO_ADVISORIES: &str = "No advisories.";
pub const WEATHER_UNAVAILABLE: &str = "Unavailable.";

/// Prompt for the general medical information call.
pub fn medical_prompt(symptoms: &str) -> String {
    format!(
        "Provide general info for '{symptoms}'. Suggest causes, urgency, advice. \
         No diagnosis. Consult doctor."
    )
}

/// General, non-diagnostic information about `symptoms`.
#[instrument(skip_all)]
pub async fn medical_info(llm: &dyn LanguageModel, symptoms: &str) -> FieldOutcome<String> {
    match llm.complete(&[ChatMessage::system(medical_prompt(symptoms))]).await {
        Ok(text) => FieldOutcome::Ok(text),
        Err(e) => {
            warn!(error = %e, "medical info degraded");
            FieldOutcome::degraded(e)
        }
    }
}

/// Hospitals within `radius_m` of `location`.
///
/// A location the geocoder cannot resolve yields an empty list, not a
/// degraded outcome.
#[instrument(skip(places))]
pub async fn hospitals(
    places: &dyn PlacesLookup,
    location: &str,
    radius_m: u32,
) -> FieldOutcome<Vec<Hospital>> {
    let at = match places.geocode(location).await {
        Ok(Some(at)) => at,
        Ok(None) => return FieldOutcome::Ok(Vec::new()),
        Err(e) => {
            warn!(error = %e, "hospital lookup degraded at geocode");
            return FieldOutcome::degraded(e);
        }
    };

    match places.nearby(at, radius_m, HOSPITAL_TYPE).await {
        Ok(found) => FieldOutcome::Ok(found.into_iter().map(to_hospital).collect()),
        Err(e) => {
            warn!(error = %e, "hospital lookup degraded at nearby search");
            FieldOutcome::degraded(e)
        }
    }
}

fn to_hospital(place: Place) -> Hospital {
    Hospital {
        name: place.name,
        address: place
            .vicinity
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        rating: place
            .rating
            .map_or_else(|| NOT_AVAILABLE.to_string(), format_decimal),
    }
}

/// Public health advisories for `location`, result bodies joined by blank lines.
#[instrument(skip(search))]
pub async fn advisories(
    search: &dyn WebSearch,
    location: &str,
    max_results: u32,
) -> FieldOutcome<String> {
    let query = format!("public health advisories in {location}");
    match search.search(&query, max_results).await {
        Ok(hits) => {
            let joined = hits
                .iter()
                .map(|h| h.content.as_str())
                .filter(|c| !c.is_empty())
                .collect::<Vec<_>>()
                .join("\n\n");
            if joined.is_empty() {
                FieldOutcome::Ok(NO_ADVISORIES.to_string())
            } else {
                FieldOutcome::Ok(joined)
            }
        }
        Err(e) => {
            warn!(error = %e, "advisory search degraded");
            FieldOutcome::degraded(e)
        }
    }
}

/// Current conditions in `location` as a one-line summary.
///
/// A provider-signalled failure (unknown city, bad key) is reported as
/// "Unavailable." rather than degraded.
#[instrument(skip(lookup))]
pub async fn weather(lookup: &dyn WeatherLookup, location: &str) -> FieldOutcome<String> {
    let observation = match lookup.current(location).await {
        Ok(obs) => obs,
        Err(e) => {
            warn!(error = %e, "weather lookup degraded");
            return FieldOutcome::degraded(e);
        }
    };

    if !observation.is_success() {
        return FieldOutcome::Ok(WEATHER_UNAVAILABLE.to_string());
    }

    match (observation.description, observation.temp_c) {
        (Some(description), Some(temp)) => FieldOutcome::Ok(format!(
            "{description}, {}°C. Consider health impact.",
            format_decimal(temp)
        )),
        _ => FieldOutcome::degraded("weather response is missing description or temperature"),
    }
}

/// Render a number the way the providers print it: whole values keep one
/// decimal place (`4.0`), others print as-is (`27.35`).
fn format_decimal(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}
