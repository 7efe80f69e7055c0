//! Pipeline state threaded through every stage of one navigation run.
//!
//! Fields are only ever added. Each stage-owned field has a set-once setter
//! that rejects a second write, so a stage cannot revise what an earlier
//! stage (or an earlier call of itself) produced.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use healthnav_shared::{Action, FieldOutcome, HealthNavError, Hospital, LOCATION_UNKNOWN, Result};

/// Structured fields pulled out of the raw query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extraction {
    pub symptoms: String,
    /// A place name, or [`LOCATION_UNKNOWN`].
    pub location: String,
}

/// State of a single run. Owned by that run and never shared.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    query: String,
    #[serde(flatten)]
    extraction: Option<Extraction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    actions: Option<Vec<Action>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    triage: Option<FieldOutcome<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hospitals: Option<FieldOutcome<Vec<Hospital>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    advisories: Option<FieldOutcome<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    weather: Option<FieldOutcome<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    final_response: Option<String>,
}

fn set_once<T>(slot: &mut Option<T>, value: T, field: &'static str) -> Result<()> {
    if slot.is_some() {
        return Err(HealthNavError::State { field });
    }
    *slot = Some(value);
    Ok(())
}

impl PipelineState {
    /// Start a run for `query` with a fresh time-ordered run id.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            started_at: Utc::now(),
            query: query.into(),
            extraction: None,
            actions: None,
            triage: None,
            hospitals: None,
            advisories: None,
            weather: None,
            final_response: None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn extraction(&self) -> Option<&Extraction> {
        self.extraction.as_ref()
    }

    /// Extracted symptoms, empty before Extract has run.
    pub fn symptoms(&self) -> &str {
        self.extraction.as_ref().map_or("", |e| e.symptoms.as_str())
    }

    /// Extracted location, the sentinel before Extract has run.
    pub fn location(&self) -> &str {
        self.extraction
            .as_ref()
            .map_or(LOCATION_UNKNOWN, |e| e.location.as_str())
    }

    /// Planned actions, empty before Plan has run.
    pub fn actions(&self) -> &[Action] {
        self.actions.as_deref().unwrap_or_default()
    }

    pub fn has_action(&self, action: Action) -> bool {
        self.actions().contains(&action)
    }

    pub fn triage(&self) -> Option<&FieldOutcome<String>> {
        self.triage.as_ref()
    }

    pub fn hospitals(&self) -> Option<&FieldOutcome<Vec<Hospital>>> {
        self.hospitals.as_ref()
    }

    pub fn advisories(&self) -> Option<&FieldOutcome<String>> {
        self.advisories.as_ref()
    }

    pub fn weather(&self) -> Option<&FieldOutcome<String>> {
        self.weather.as_ref()
    }

    pub fn final_response(&self) -> Option<&str> {
        self.final_response.as_deref()
    }

    // -- set-once setters ---------------------------------------------------

    pub fn set_extraction(&mut self, extraction: Extraction) -> Result<()> {
        set_once(&mut self.extraction, extraction, "extraction")
    }

    pub fn set_actions(&mut self, actions: Vec<Action>) -> Result<()> {
        set_once(&mut self.actions, actions, "actions")
    }

    pub fn set_triage(&mut self, triage: FieldOutcome<String>) -> Result<()> {
        set_once(&mut self.triage, triage, "triage")
    }

    pub fn set_hospitals(&mut self, hospitals: FieldOutcome<Vec<Hospital>>) -> Result<()> {
        set_once(&mut self.hospitals, hospitals, "hospitals")
    }

    pub fn set_advisories(&mut self, advisories: FieldOutcome<String>) -> Result<()> {
        set_once(&mut self.advisories, advisories, "advisories")
    }

    pub fn set_weather(&mut self, weather: FieldOutcome<String>) -> Result<()> {
        set_once(&mut self.weather, weather, "weather")
    }

    pub fn set_final_response(&mut self, response: String) -> Result<()> {
        set_once(&mut self.final_response, response, "final_response")
    }
}
