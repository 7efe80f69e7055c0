use tracing::{instrument, warn};

use healthnav_providers::LanguageModel;
use healthnav_shared::{ChatMessage, DISCLAIMER, FieldOutcome, Hospital, Result};

use crate::state::PipelineState;

/// Text shown for a field whose action was never run.
const ABSENT: &str = "None";

/// Render an optional text field for the synthesis prompt.
pub fn render_text(field: Option<&FieldOutcome<String>>) -> String {
    match field {
        None => ABSENT.to_string(),
        Some(FieldOutcome::Ok(text)) => text.clone(),
        Some(FieldOutcome::Degraded(reason)) => format!("Error: {reason}"),
    }
}

/// Render the hospitals field as one bullet per facility.
pub fn render_hospitals(field: Option<&FieldOutcome<Vec<Hospital>>>) -> String {
    match field {
        Some(FieldOutcome::Degraded(reason)) => format!("Error: {reason}"),
        Some(FieldOutcome::Ok(list)) if !list.is_empty() => list
            .iter()
            .map(Hospital::bullet)
            .collect::<Vec<_>>()
            .join("\n"),
        _ => "None.".to_string(),
    }
}

pub fn synthesis_prompt(state: &PipelineState) -> String {
    format!(
        "Compile: Triage: {}\nAdvisories: {}\nWeather: {}\nHospitals:\n{}\n\
         Structure response. Add disclaimer: '{DISCLAIMER}'",
        render_text(state.triage()),
        render_text(state.advisories()),
        render_text(state.weather()),
        render_hospitals(state.hospitals()),
    )
}

/// Answer composed without the model, used when the synthesis call fails.
pub fn fallback_answer(state: &PipelineState) -> String {
    format!(
        "Triage: {}\n\nAdvisories: {}\n\nWeather: {}\n\nHospitals:\n{}\n\n{DISCLAIMER}",
        render_text(state.triage()),
        render_text(state.advisories()),
        render_text(state.weather()),
        render_hospitals(state.hospitals()),
    )
}

/// Append the disclaimer unless the text already carries it verbatim.
pub fn ensure_disclaimer(text: &str) -> String {
    if text.contains(DISCLAIMER) {
        return text.to_string();
    }
    let body = text.trim_end();
    if body.is_empty() {
        DISCLAIMER.to_string()
    } else {
        format!("{body}\n\n{DISCLAIMER}")
    }
}

/// Compose the final answer. Never fails on model errors.
#[instrument(skip_all)]
pub async fn synthesize(llm: &dyn LanguageModel, state: &mut PipelineState) -> Result<()> {
    let prompt = synthesis_prompt(state);
    let response = match llm.complete(&[ChatMessage::system(prompt)]).await {
        Ok(text) => ensure_disclaimer(&text),
        Err(e) => {
            warn!(error = %e, "synthesis call failed, composing answer locally");
            fallback_answer(state)
        }
    };
    state.set_final_response(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthnav_providers::fake::FakeLanguageModel;

    fn hospital(name: &str) -> Hospital {
        Hospital {
            name: name.into(),
            address: "N/A".into(),
            rating: "3.9".into(),
        }
    }

    #[test]
    fn hospitals_rendering() {
        assert_eq!(render_hospitals(None), "None.");
        assert_eq!(render_hospitals(Some(&FieldOutcome::Ok(Vec::new()))), "None.");
        assert_eq!(
            render_hospitals(Some(&FieldOutcome::Ok(vec![hospital("A"), hospital("B")]))),
            "- A, N/A (Rating: 3.9)\n- B, N/A (Rating: 3.9)"
        );
        assert_eq!(
            render_hospitals(Some(&FieldOutcome::degraded("maps error: REQUEST_DENIED"))),
            "Error: maps error: REQUEST_DENIED"
        );
    }

    #[test]
    fn text_rendering() {
        assert_eq!(render_text(None), "None");
        assert_eq!(render_text(Some(&FieldOutcome::Ok("ok".into()))), "ok");
        assert_eq!(render_text(Some(&FieldOutcome::degraded("boom"))), "Error: boom");
    }

    #[test]
    fn disclaimer_is_appended_once() {
        let with = format!("Answer.\n\n{DISCLAIMER}");
        assert_eq!(ensure_disclaimer(&with), with);
        assert_eq!(ensure_disclaimer("Answer.\n"), format!("Answer.\n\n{DISCLAIMER}"));
        assert_eq!(ensure_disclaimer(""), DISCLAIMER);
    }

    #[test]
    fn prompt_renders_absent_fields() {
        let state = PipelineState::new("tired");
        let prompt = synthesis_prompt(&state);
        assert!(prompt.starts_with("Compile: Triage: None\nAdvisories: None\nWeather: None\nHospitals:\nNone.\n"));
        assert!(prompt.ends_with(&format!("Add disclaimer: '{DISCLAIMER}'")));
    }

    #[tokio::test]
    async fn model_answer_without_disclaimer_gets_one() {
        let llm = FakeLanguageModel::new().push_text("Drink water and rest.");
        let mut state = PipelineState::new("tired");
        synthesize(&llm, &mut state).await.unwrap();
        let answer = state.final_response().unwrap();
        assert!(answer.starts_with("Drink water and rest."));
        assert!(answer.contains(DISCLAIMER));
    }

    #[tokio::test]
    async fn model_failure_falls_back_to_local_answer() {
        let llm = FakeLanguageModel::new().push_text_error("HTTP 503");
        let mut state = PipelineState::new("tired");
        synthesize(&llm, &mut state).await.unwrap();
        let answer = state.final_response().unwrap();
        assert!(answer.contains("Triage: None"));
        assert!(answer.contains("Hospitals:\nNone."));
        assert!(answer.ends_with(DISCLAIMER));
    }
}
