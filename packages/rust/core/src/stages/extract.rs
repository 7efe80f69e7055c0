use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use healthnav_providers::{LanguageModel, StructuredSchema, complete_as};
use healthnav_shared::{ChatMessage, HealthNavError, LOCATION_UNKNOWN, Result};

use crate::state::{Extraction, PipelineState};

pub const EXTRACT_PROMPT: &str = "Extract symptoms and location. No location? Use 'Unknown'.";

#[derive(Debug, Deserialize)]
struct ExtractionOutput {
    symptoms: String,
    location: String,
}

pub fn extraction_schema() -> StructuredSchema {
    StructuredSchema {
        name: "extraction",
        schema: json!({
            "type": "object",
            "properties": {
                "symptoms": {
                    "type": "string",
                    "description": "Symptoms described in the query."
                },
                "location": {
                    "type": "string",
                    "description": "Place named in the query, or 'Unknown'."
                }
            },
            "required": ["symptoms", "location"],
            "additionalProperties": false
        }),
    }
}

/// Collapse blank and case-variant "unknown" locations to the exact sentinel.
pub fn normalize_location(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(LOCATION_UNKNOWN) {
        LOCATION_UNKNOWN.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Pull symptoms and location out of the raw query.
#[instrument(skip_all)]
pub async fn extract(llm: &dyn LanguageModel, state: &mut PipelineState) -> Result<()> {
    let messages = [
        ChatMessage::system(EXTRACT_PROMPT),
        ChatMessage::user(state.query()),
    ];
    let output: ExtractionOutput = complete_as(llm, &messages, &extraction_schema())
        .await
        .map_err(|e| HealthNavError::stage("extract", e.to_string()))?;

    let extraction = Extraction {
        symptoms: output.symptoms.trim().to_string(),
        location: normalize_location(&output.location),
    };
    debug!(symptoms = %extraction.symptoms, location = %extraction.location, "extracted");
    state.set_extraction(extraction)
}
