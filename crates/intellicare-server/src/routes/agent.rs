use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use intellicare::agent::{LocaleContext, ThinkingStep};
use intellicare::models::message::Message;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentRequest {
    message: String,
    #[serde(default)]
    chat_history: Vec<HistoryTurn>,
    #[serde(default = "default_time_zone")]
    user_time_zone: String,
    #[serde(default = "current_time")]
    user_current_time: String,
}

#[derive(Debug, Deserialize)]
struct HistoryTurn {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AgentReply {
    message: String,
    thinking_process: Vec<ThinkingStep>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AgentFailure {
    error: String,
    message: String,
    thinking_process: Vec<ThinkingStep>,
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

fn current_time() -> String {
    chrono::Utc::now().to_rfc3339()
}

// Callers may only replay user and assistant turns
fn convert_history(turns: Vec<HistoryTurn>) -> Vec<Message> {
    let mut messages = Vec::with_capacity(turns.len());

    for turn in turns {
        match turn.role.as_str() {
            "user" => messages.push(Message::user(turn.content)),
            "assistant" => messages.push(Message::assistant(turn.content)),
            _ => {
                tracing::warn!("Ignoring history turn with role: {}", turn.role);
            }
        }
    }

    messages
}

async fn handler(State(state): State<AppState>, Json(request): Json<AgentRequest>) -> Response {
    let locale = LocaleContext {
        time_zone: request.user_time_zone,
        current_time: request.user_current_time,
    };
    let history = convert_history(request.chat_history);

    let exchange = state
        .agent
        .converse(&request.message, &history, &locale)
        .await;

    match exchange.outcome {
        Ok(message) => Json(AgentReply {
            message,
            thinking_process: exchange.trace,
        })
        .into_response(),
        Err(e) => {
            let status = if e.is_transport() {
                StatusCode::BAD_GATEWAY
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            let failure = AgentFailure {
                error: e.summary(),
                message: e.user_message().to_string(),
                thinking_process: exchange.trace,
            };
            (status, Json(failure)).into_response()
        }
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/agent", post(handler))
        .with_state(state)
}
