//! End-to-end navigation pipeline: query → extract → plan → execute → synthesize.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use tracing::{info, instrument};

use healthnav_shared::{AppConfig, HealthNavError, PlannerMode, Result};

use crate::services::Services;
use crate::stages::{self, ExecuteOptions};
use crate::state::PipelineState;

/// Position of a run in the fixed linear sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Extract,
    Plan,
    Execute,
    Synthesize,
    Done,
}

impl Stage {
    /// The single successor of this stage. `Done` is terminal.
    pub fn next(self) -> Self {
        match self {
            Self::Extract => Self::Plan,
            Self::Plan => Self::Execute,
            Self::Execute => Self::Synthesize,
            Self::Synthesize | Self::Done => Self::Done,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Plan => "plan",
            Self::Execute => "execute",
            Self::Synthesize => "synthesize",
            Self::Done => "done",
        }
    }

    /// Human-readable description for progress displays.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Extract => "Extracting symptoms and location",
            Self::Plan => "Planning lookups",
            Self::Execute => "Gathering information",
            Self::Synthesize => "Composing answer",
            Self::Done => "Done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wall-clock time spent in one stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageTiming {
    pub stage: Stage,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Result of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    /// The synthesized answer.
    pub response: String,
    /// Final state with every populated field.
    pub state: PipelineState,
    pub timings: Vec<StageTiming>,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a stage.
    fn stage_started(&self, stage: Stage);
    /// Called when a stage completes.
    fn stage_finished(&self, stage: Stage, elapsed: Duration);
    /// Called when the pipeline completes.
    fn done(&self, outcome: &PipelineOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage_started(&self, _stage: Stage) {}
    fn stage_finished(&self, _stage: Stage, _elapsed: Duration) {}
    fn done(&self, _outcome: &PipelineOutcome) {}
}

/// Runs the navigation pipeline against a fixed set of services.
#[derive(Clone)]
pub struct Navigator {
    services: Services,
    planner: PlannerMode,
    execute: ExecuteOptions,
}

impl Navigator {
    pub fn new(services: Services, config: &AppConfig) -> Self {
        Self::with_options(services, config.pipeline.planner, ExecuteOptions::from(config))
    }

    pub fn with_options(services: Services, planner: PlannerMode, execute: ExecuteOptions) -> Self {
        Self {
            services,
            planner,
            execute,
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Run the full pipeline once for `query`.
    ///
    /// Fails only when Extract or Plan fails; no partial result is returned
    /// in that case.
    pub async fn run(
        &self,
        query: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<PipelineOutcome> {
        let state = PipelineState::new(query);
        self.drive(state, progress).await
    }

    #[instrument(skip_all, fields(run_id = %state.run_id()))]
    async fn drive(
        &self,
        mut state: PipelineState,
        progress: &dyn ProgressReporter,
    ) -> Result<PipelineOutcome> {
        let start = Instant::now();
        let llm = self.services.llm.as_ref();
        let mut timings = Vec::with_capacity(4);
        let mut stage = Stage::Extract;

        info!(query_chars = state.query().len(), "starting navigation pipeline");

        while stage != Stage::Done {
            progress.stage_started(stage);
            let stage_start = Instant::now();

            match stage {
                Stage::Extract => stages::extract(llm, &mut state).await?,
                Stage::Plan => stages::plan(llm, self.planner, &mut state).await?,
                Stage::Execute => stages::execute(&self.services, &self.execute, &mut state).await?,
                Stage::Synthesize => stages::synthesize(llm, &mut state).await?,
                Stage::Done => break,
            }

            let elapsed = stage_start.elapsed();
            info!(%stage, elapsed_ms = elapsed.as_millis() as u64, "stage complete");
            progress.stage_finished(stage, elapsed);
            timings.push(StageTiming { stage, elapsed });
            stage = stage.next();
        }

        let response = state
            .final_response()
            .map(str::to_string)
            .ok_or_else(|| HealthNavError::stage("synthesize", "no response was produced"))?;

        let outcome = PipelineOutcome {
            response,
            state,
            timings,
            elapsed: start.elapsed(),
        };

        info!(
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            actions = ?outcome.state.actions(),
            "navigation pipeline complete"
        );
        progress.done(&outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use healthnav_providers::Place;
    use healthnav_providers::fake::{FakeLanguageModel, FakePlaces, FakeSearch, FakeWeather};
    use healthnav_shared::{Action, DISCLAIMER, LOCATION_UNKNOWN};

    #[test]
    fn stages_form_a_single_chain() {
        let mut seen = vec![Stage::Extract];
        let mut stage = Stage::Extract;
        while stage != Stage::Done {
            stage = stage.next();
            seen.push(stage);
        }
        assert_eq!(
            seen,
            vec![
                Stage::Extract,
                Stage::Plan,
                Stage::Execute,
                Stage::Synthesize,
                Stage::Done
            ]
        );
        assert_eq!(Stage::Done.next(), Stage::Done);
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn stage_started(&self, stage: Stage) {
            self.events.lock().unwrap().push(format!("start:{stage}"));
        }
        fn stage_finished(&self, stage: Stage, _elapsed: Duration) {
            self.events.lock().unwrap().push(format!("end:{stage}"));
        }
        fn done(&self, _outcome: &PipelineOutcome) {
            self.events.lock().unwrap().push("done".into());
        }
    }

    struct Harness {
        llm: Arc<FakeLanguageModel>,
        places: Arc<FakePlaces>,
        weather: Arc<FakeWeather>,
        navigator: Navigator,
    }

    fn harness(llm: FakeLanguageModel, planner: PlannerMode) -> Harness {
        let llm = Arc::new(llm);
        let places = Arc::new(FakePlaces::found(vec![Place {
            name: "Lagos University Teaching Hospital".into(),
            vicinity: Some("Idi-Araba".into()),
            rating: Some(4.1),
        }]));
        let search = Arc::new(FakeSearch::with_contents(&["Cholera cases reported."]));
        let weather = Arc::new(FakeWeather::clear("humid", 29.0));
        let services = Services::new(llm.clone(), places.clone(), search, weather.clone());
        Harness {
            llm,
            places,
            weather,
            navigator: Navigator::with_options(services, planner, ExecuteOptions::default()),
        }
    }

    #[tokio::test]
    async fn fever_in_lagos_runs_every_lookup() {
        let llm = FakeLanguageModel::new()
            .with_structured(
                "extraction",
                json!({ "symptoms": "fever and headache", "location": "Lagos" }),
            )
            .with_structured(
                "plan",
                json!({ "actions": ["medical", "hospitals", "advisories", "weather"] }),
            )
            .push_text("Possible malaria; see a clinician.")
            .push_text("Summary with hospitals.");
        let h = harness(llm, PlannerMode::Model);
        let progress = RecordingProgress::default();

        let outcome = h.navigator.run("fever and headache in Lagos", &progress).await.unwrap();
        let state = &outcome.state;

        assert_eq!(state.location(), "Lagos");
        assert!(state.has_action(Action::Medical));
        assert!(state.has_action(Action::Hospitals));
        assert!(state.has_action(Action::Weather));
        assert!(state.triage().is_some());
        assert!(state.advisories().is_some());
        assert_eq!(
            state.weather().and_then(|w| w.ok()).map(String::as_str),
            Some("humid, 29.0°C. Consider health impact.")
        );
        assert_eq!(state.hospitals().and_then(|h| h.ok()).map(Vec::len), Some(1));
        assert!(outcome.response.contains(DISCLAIMER));
        assert_eq!(outcome.timings.len(), 4);

        // The synthesis prompt carries the hospitals section.
        let synthesis = h.llm.text_calls().pop().unwrap();
        assert!(
            synthesis.messages[0]
                .content
                .contains("Hospitals:\n- Lagos University Teaching Hospital, Idi-Araba (Rating: 4.1)")
        );

        assert_eq!(
            progress.events.lock().unwrap().clone(),
            vec![
                "start:extract",
                "end:extract",
                "start:plan",
                "end:plan",
                "start:execute",
                "end:execute",
                "start:synthesize",
                "end:synthesize",
                "done"
            ]
        );
    }

    #[tokio::test]
    async fn tired_without_location_skips_location_lookups() {
        let llm = FakeLanguageModel::new()
            .with_structured("extraction", json!({ "symptoms": "tired", "location": "Unknown" }))
            .with_default_text("Get some sleep.");
        let h = harness(llm, PlannerMode::Policy);

        let outcome = h.navigator.run("tired", &SilentProgress).await.unwrap();

        assert_eq!(outcome.state.location(), LOCATION_UNKNOWN);
        assert!(outcome.state.hospitals().is_none());
        assert!(outcome.state.weather().is_none());
        assert_eq!(h.places.geocode_calls(), 0);
        assert_eq!(h.weather.calls(), 0);
        assert!(!outcome.response.trim().is_empty());
        assert!(outcome.response.contains(DISCLAIMER));
    }

    #[tokio::test]
    async fn out_of_vocabulary_plan_still_completes() {
        let llm = FakeLanguageModel::new()
            .with_structured("extraction", json!({ "symptoms": "rash", "location": "Nairobi" }))
            .with_structured("plan", json!({ "actions": ["dermatology", "medical"] }));
        let h = harness(llm, PlannerMode::Model);

        let outcome = h.navigator.run("rash in Nairobi", &SilentProgress).await.unwrap();
        assert_eq!(outcome.state.actions(), &[Action::Medical]);
        assert!(outcome.response.contains(DISCLAIMER));
    }

    #[tokio::test]
    async fn extract_failure_aborts_before_later_stages() {
        let llm = FakeLanguageModel::new().failing_structured("extraction", "invalid api key");
        let h = harness(llm, PlannerMode::Model);
        let progress = RecordingProgress::default();

        let err = h.navigator.run("cough", &progress).await.unwrap_err();
        assert!(err.to_string().contains("invalid api key"));
        assert_eq!(progress.events.lock().unwrap().clone(), vec!["start:extract"]);
        assert!(h.llm.structured_calls("plan").is_empty());
        assert!(h.llm.text_calls().is_empty());
    }

    #[tokio::test]
    async fn outcome_serializes_with_timings() {
        let llm = FakeLanguageModel::new()
            .with_structured("extraction", json!({ "symptoms": "cough", "location": "Accra" }));
        let h = harness(llm, PlannerMode::Policy);
        let outcome = h.navigator.run("cough in Accra", &SilentProgress).await.unwrap();

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["state"]["location"], "Accra");
        assert_eq!(value["timings"][0]["stage"], "extract");
        assert!(value["timings"][0]["elapsed_ms"].is_u64());
    }
}
