use serde::{Deserialize, Serialize};

use crate::traits::{Message, MessageRole};

// =============================================================================
// Chat Completion
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WireMessage {
    pub role: MessageRole,
    #[serde(default)]
    pub content: Option<String>,
}

impl WireMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: Some(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Some(content.into()),
        }
    }
}

impl From<&Message> for WireMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role,
            content: Some(msg.content.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: None,
            max_tokens: None,
            max_completion_tokens: None,
        }
    }

    pub fn message(mut self, message: WireMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn messages(mut self, messages: impl IntoIterator<Item = WireMessage>) -> Self {
        self.messages.extend(messages);
        self
    }

    /// Apply the token limit field and temperature the model family accepts.
    pub fn limits(mut self, max_tokens: u32) -> Self {
        if uses_max_completion_tokens(&self.model) {
            self.max_completion_tokens = Some(max_tokens);
        } else {
            self.max_tokens = Some(max_tokens);
            self.temperature = Some(0.0);
        }
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Choice {
    pub message: WireMessage,
}

// =============================================================================
// Embeddings
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct EmbeddingRequest<'a> {
    pub model: &'a str,
    pub input: &'a [String],
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddingResponse {
    pub data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddingData {
    #[serde(default)]
    pub index: Option<usize>,
    pub embedding: Vec<f32>,
}

impl EmbeddingResponse {
    /// Vectors in request order. The API echoes an `index` per item; honor it
    /// when present instead of trusting response order.
    pub fn into_ordered(mut self) -> Vec<Vec<f32>> {
        if self.data.iter().all(|d| d.index.is_some()) {
            self.data.sort_by_key(|d| d.index);
        }
        self.data.into_iter().map(|d| d.embedding).collect()
    }
}

// =============================================================================
// Utilities
// =============================================================================

/// Check if a model requires max_completion_tokens instead of max_tokens.
pub(crate) fn uses_max_completion_tokens(model: &str) -> bool {
    model.starts_with("o1")
        || model.starts_with("o3")
        || model.starts_with("gpt-5")
        || model.contains("-o1")
        || model.contains("-o3")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeddings_are_reordered_by_index() {
        let raw = r#"{"data":[
            {"index":1,"embedding":[2.0]},
            {"index":0,"embedding":[1.0]}
        ]}"#;
        let response: EmbeddingResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.into_ordered(), vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn reasoning_models_use_max_completion_tokens() {
        let request = ChatRequest::new("o3-mini").limits(512);
        assert_eq!(request.max_completion_tokens, Some(512));
        assert_eq!(request.max_tokens, None);
        assert_eq!(request.temperature, None);

        let request = ChatRequest::new("gpt-4o-mini").limits(512);
        assert_eq!(request.max_tokens, Some(512));
        assert_eq!(request.temperature, Some(0.0));
    }

    #[test]
    fn chat_request_serializes_roles_lowercase() {
        let request = ChatRequest::new("gpt-4o-mini")
            .message(WireMessage::system("be brief"))
            .message(WireMessage::user("hi"));
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert!(json.get("max_tokens").is_none());
    }
}
