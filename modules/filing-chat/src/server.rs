use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::error;

use crate::error::ChatError;
use crate::finetune::{write_jsonl, FineTuneExample};
use crate::qa::GraphQa;
use crate::session::{ChatSession, APOLOGY, DEFAULT_PREAMBLE, EXAMPLE_PROMPTS};

pub struct AppState {
    /// Turns are serialized so history stays linear.
    pub session: Mutex<ChatSession>,
    pub qa: Option<GraphQa>,
}

impl AppState {
    pub fn new(session: ChatSession, qa: Option<GraphQa>) -> Self {
        Self {
            session: Mutex::new(session),
            qa,
        }
    }
}

#[derive(Deserialize)]
pub struct ChatRequest {
    message: String,
}

#[derive(Deserialize)]
pub struct AskRequest {
    question: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/examples", get(api_examples))
        .route("/chat", post(api_chat))
        .route("/history", get(api_history))
        .route("/history/export", get(api_history_export))
        .route("/clear", post(api_clear))
        .route("/ask", post(api_ask))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        // Method, path, status and latency only; message bodies stay out of logs.
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}

async fn api_examples() -> impl IntoResponse {
    Json(EXAMPLE_PROMPTS)
}

/// Always 200: failures come back as the apology text.
async fn api_chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatRequest>,
) -> impl IntoResponse {
    let reply = state.session.lock().await.chat_response(&body.message).await;
    Json(serde_json::json!({ "reply": reply }))
}

async fn api_history(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session = state.session.lock().await;
    Json(serde_json::json!({
        "session": session.id(),
        "messages": session.history(),
    }))
}

/// The conversation so far as a one-line fine-tuning file.
async fn api_history_export(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session = state.session.lock().await;
    let example = FineTuneExample::from_history(Some(DEFAULT_PREAMBLE), session.history());

    let mut body = Vec::new();
    match write_jsonl(&mut body, &[example]) {
        Ok(_) => ([(header::CONTENT_TYPE, "application/jsonl")], body).into_response(),
        Err(e) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

async fn api_clear(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.session.lock().await.clear();
    StatusCode::NO_CONTENT
}

async fn api_ask(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AskRequest>,
) -> impl IntoResponse {
    let Some(qa) = &state.qa else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "graph question answering is not configured"})),
        )
            .into_response();
    };

    match qa.ask(&body.question).await {
        Ok(answer) => Json(serde_json::json!({
            "answer": answer.answer,
            "cypher": answer.cypher,
        }))
        .into_response(),
        Err(e) => {
            error!(error = %e, "Graph question failed");
            let status = match e {
                ChatError::Input(_) => StatusCode::BAD_REQUEST,
                ChatError::UnsafeQuery(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ChatError::Upstream(_) | ChatError::Query(_) | ChatError::Internal(_) => {
                    StatusCode::BAD_GATEWAY
                }
            };
            (status, Json(serde_json::json!({"error": APOLOGY}))).into_response()
        }
    }
}
