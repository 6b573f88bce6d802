//! Chat API routes exercised in-process with stub model and store.
//!
//! Run with: cargo test -p filing-chat --test api_test

use std::sync::Arc;

use ai_client::{AiError, ChatAgent, Message};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use filing_chat::{router, AppState, ChatSession, GraphQa, ReadQuery, APOLOGY};

struct StubAgent;

#[async_trait]
impl ChatAgent for StubAgent {
    async fn chat(
        &self,
        preamble: Option<&str>,
        _history: &[Message],
        input: &str,
    ) -> ai_client::Result<String> {
        if input.contains("trigger-error") {
            return Err(AiError::Api {
                status: 503,
                body: "overloaded".into(),
            });
        }
        if input.contains("Schema:") {
            if input.contains("wipe") {
                return Ok("MATCH (n) DETACH DELETE n".into());
            }
            return Ok("MATCH (c:Company) RETURN c.name AS name".into());
        }
        if preamble.is_some() && input.starts_with("Question:") {
            return Ok("Acme is in the graph.".into());
        }
        Ok(format!("you said: {input}"))
    }
}

struct StubStore;

#[async_trait]
impl ReadQuery for StubStore {
    async fn read(&self, _cypher: &str, _row_cap: usize) -> anyhow::Result<Vec<Value>> {
        Ok(vec![json!({"name": "Acme"})])
    }
}

fn app(with_graph: bool) -> axum::Router {
    let agent = Arc::new(StubAgent);
    let qa = with_graph.then(|| GraphQa::new(agent.clone(), Arc::new(StubStore)));
    router(Arc::new(AppState::new(ChatSession::new(agent), qa)))
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_check() {
    let (status, _) = send(&app(false), "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn examples_are_listed() {
    let (status, body) = send(&app(false), "GET", "/examples", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn chat_turns_build_history() {
    let app = app(false);
    let (status, body) = send(&app, "POST", "/chat", Some(json!({"message": "hi"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "you said: hi");

    let (_, history) = send(&app, "GET", "/history", None).await;
    let messages = history["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
}

#[tokio::test]
async fn failing_turn_replies_with_apology() {
    let app = app(false);
    let (status, body) = send(
        &app,
        "POST",
        "/chat",
        Some(json!({"message": "trigger-error"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], APOLOGY);
    let (_, history) = send(&app, "GET", "/history", None).await;
    assert!(history["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn clear_resets_history() {
    let app = app(false);
    send(&app, "POST", "/chat", Some(json!({"message": "hi"}))).await;
    let (status, _) = send(&app, "POST", "/clear", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, history) = send(&app, "GET", "/history", None).await;
    assert!(history["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn ask_returns_answer_and_query() {
    let (status, body) = send(
        &app(true),
        "POST",
        "/ask",
        Some(json!({"question": "Which companies are there?"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "Acme is in the graph.");
    assert_eq!(body["cypher"], "MATCH (c:Company) RETURN c.name AS name");
}

#[tokio::test]
async fn ask_refuses_write_queries() {
    let (status, body) = send(
        &app(true),
        "POST",
        "/ask",
        Some(json!({"question": "please wipe the graph"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], APOLOGY);
}

#[tokio::test]
async fn ask_without_graph_is_unavailable() {
    let (status, _) = send(
        &app(false),
        "POST",
        "/ask",
        Some(json!({"question": "anything"})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn history_exports_as_a_fine_tuning_line() {
    let app = app(false);
    send(&app, "POST", "/chat", Some(json!({"message": "hi"}))).await;

    let (status, example) = send(&app, "GET", "/history/export", None).await;
    assert_eq!(status, StatusCode::OK);
    let roles: Vec<_> = example["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, ["system", "user", "assistant"]);
    assert_eq!(example["messages"][2]["content"], "you said: hi");
}

#[tokio::test]
async fn empty_history_has_nothing_to_export() {
    let (status, _) = send(&app(false), "GET", "/history/export", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
