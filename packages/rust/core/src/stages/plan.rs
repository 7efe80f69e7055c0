use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};

use healthnav_providers::{LanguageModel, StructuredSchema, complete_as};
use healthnav_shared::{Action, ChatMessage, HealthNavError, PlannerMode, Result, is_known_location};

use crate::state::PipelineState;

#[derive(Debug, Deserialize)]
struct PlanOutput {
    actions: Vec<String>,
}

pub fn plan_schema() -> StructuredSchema {
    StructuredSchema {
        name: "plan",
        schema: json!({
            "type": "object",
            "properties": {
                "actions": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Action keywords from: medical, hospitals, advisories, weather."
                }
            },
            "required": ["actions"],
            "additionalProperties": false
        }),
    }
}

pub fn plan_prompt(symptoms: &str, location: &str) -> String {
    format!(
        "Plan actions for symptoms '{symptoms}' in '{location}'. Return ONLY these action keywords: \
         medical (always if symptoms), hospitals (if location known), advisories, \
         weather (if location known). Do not add descriptions or explanations, just the keywords."
    )
}

/// The planning policy applied directly, in vocabulary order.
pub fn policy_actions(symptoms: &str, location: &str) -> Vec<Action> {
    let known = is_known_location(location);
    Action::ALL
        .into_iter()
        .filter(|action| match action {
            Action::Medical => !symptoms.trim().is_empty(),
            Action::Hospitals | Action::Weather => known,
            Action::Advisories => true,
        })
        .collect()
}

/// Decide which adapters the execute stage runs.
#[instrument(skip_all, fields(planner = ?mode))]
pub async fn plan(
    llm: &dyn LanguageModel,
    mode: PlannerMode,
    state: &mut PipelineState,
) -> Result<()> {
    let actions = match mode {
        PlannerMode::Policy => policy_actions(state.symptoms(), state.location()),
        PlannerMode::Model => {
            let messages = [ChatMessage::system(plan_prompt(
                state.symptoms(),
                state.location(),
            ))];
            let output: PlanOutput = complete_as(llm, &messages, &plan_schema())
                .await
                .map_err(|e| HealthNavError::stage("plan", e.to_string()))?;

            let (accepted, ignored) = Action::parse_list(&output.actions);
            if !ignored.is_empty() {
                warn!(?ignored, "planner returned keywords outside the vocabulary");
            }
            accepted
        }
    };

    debug!(?actions, "planned");
    state.set_actions(actions)
}
