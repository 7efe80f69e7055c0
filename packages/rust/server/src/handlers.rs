//! API handlers.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{instrument, warn};

use healthnav_core::SilentProgress;
use healthnav_shared::HealthNavError;

use crate::AppState;

type ApiResponse = (StatusCode, Json<Value>);

const DEFAULT_USER_ID: &str = "default";

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

fn ok(response: String) -> ApiResponse {
    (StatusCode::OK, Json(json!({ "response": response })))
}

fn error(status: StatusCode, message: impl Into<String>) -> ApiResponse {
    (status, Json(json!({ "error": message.into() })))
}

fn rejected(rejection: JsonRejection) -> ApiResponse {
    error(rejection.status(), rejection.body_text())
}

fn failed(err: HealthNavError) -> ApiResponse {
    let status = match err {
        HealthNavError::Validation { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error(status, err.to_string())
}

/// Present and not blank.
fn required(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.trim().is_empty())
}

pub async fn root() -> ApiResponse {
    (
        StatusCode::OK,
        Json(json!({ "message": "AI Health Navigator API is running" })),
    )
}

#[instrument(skip_all)]
pub async fn navigate(
    State(state): State<AppState>,
    body: Result<Json<NavigateRequest>, JsonRejection>,
) -> ApiResponse {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(rejection),
    };
    let Some(query) = required(request.query) else {
        return error(StatusCode::BAD_REQUEST, "Query required");
    };

    match state.navigator.run(&query, &SilentProgress).await {
        Ok(outcome) => ok(outcome.response),
        Err(e) => {
            warn!(error = %e, "navigation failed");
            failed(e)
        }
    }
}

#[instrument(skip_all)]
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResponse {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(rejection),
    };
    let Some(message) = required(request.message) else {
        return error(StatusCode::BAD_REQUEST, "Message required");
    };
    let user_id = request
        .user_id
        .unwrap_or_else(|| DEFAULT_USER_ID.to_string());

    match state.chat.respond(&user_id, &message).await {
        Ok(reply) => ok(reply),
        Err(e) => {
            warn!(error = %e, %user_id, "chat failed");
            failed(e)
        }
    }
}
