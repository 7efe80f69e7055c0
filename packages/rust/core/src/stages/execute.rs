use std::future::Future;

use tracing::{debug, instrument};

use healthnav_shared::{Action, AppConfig, Result, is_known_location};

use crate::adapters;
use crate::services::Services;
use crate::state::PipelineState;

/// Tunables for the execute stage.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Hospital search radius in metres.
    pub radius_m: u32,
    /// Cap on advisory search results.
    pub max_results: u32,
    /// Run the selected adapters concurrently.
    pub concurrent: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ExecuteOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            radius_m: config.maps.radius_m,
            max_results: config.search.max_results,
            concurrent: config.pipeline.concurrent_execute,
        }
    }
}

async fn when<F: Future>(enabled: bool, fut: F) -> Option<F::Output> {
    if enabled { Some(fut.await) } else { None }
}

/// Run the planned adapters and merge their outcomes into `state`.
///
/// Adapter failures arrive as degraded fields; hospitals and weather are
/// skipped entirely while the location is the sentinel.
#[instrument(skip_all, fields(actions = ?state.actions(), concurrent = options.concurrent))]
pub async fn execute(
    services: &Services,
    options: &ExecuteOptions,
    state: &mut PipelineState,
) -> Result<()> {
    let symptoms = state.symptoms().to_string();
    let location = state.location().to_string();
    let known = is_known_location(&location);

    let run_medical = state.has_action(Action::Medical);
    let run_hospitals = state.has_action(Action::Hospitals) && known;
    let run_advisories = state.has_action(Action::Advisories);
    let run_weather = state.has_action(Action::Weather) && known;

    if !known && (state.has_action(Action::Hospitals) || state.has_action(Action::Weather)) {
        debug!("location unknown, skipping hospitals and weather");
    }

    let medical = adapters::medical_info(services.llm.as_ref(), &symptoms);
    let hospitals = adapters::hospitals(services.places.as_ref(), &location, options.radius_m);
    let advisories =
        adapters::advisories(services.search.as_ref(), &location, options.max_results);
    let weather = adapters::weather(services.weather.as_ref(), &location);

    let (triage, hospitals, advisories, weather) = if options.concurrent {
        tokio::join!(
            when(run_medical, medical),
            when(run_hospitals, hospitals),
            when(run_advisories, advisories),
            when(run_weather, weather)
        )
    } else {
        (
            when(run_medical, medical).await,
            when(run_hospitals, hospitals).await,
            when(run_advisories, advisories).await,
            when(run_weather, weather).await,
        )
    };

    if let Some(triage) = triage {
        state.set_triage(triage)?;
    }
    if let Some(hospitals) = hospitals {
        state.set_hospitals(hospitals)?;
    }
    if let Some(advisories) = advisories {
        state.set_advisories(advisories)?;
    }
    if let Some(weather) = weather {
        state.set_weather(weather)?;
    }
    Ok(())
}
