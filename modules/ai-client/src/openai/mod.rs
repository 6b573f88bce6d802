mod client;
pub(crate) mod types;

use async_trait::async_trait;

use crate::traits::{ChatAgent, EmbedAgent, Message};
use crate::Result;

use client::{OpenAiClient, OPENAI_API_URL};
use types::{ChatRequest, WireMessage};

const DEFAULT_MAX_TOKENS: u32 = 1024;

// =============================================================================
// OpenAi Agent
// =============================================================================

/// OpenAI (or OpenAI-compatible) chat and embedding agent.
#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    pub(crate) model: String,
    embedding_model: String,
    base_url: Option<String>,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            embedding_model: "text-embedding-3-small".to_string(),
            base_url: None,
        }
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Get the chat model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the embedding model name.
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    fn client(&self) -> Result<OpenAiClient> {
        OpenAiClient::new(
            &self.api_key,
            self.base_url.as_deref().unwrap_or(OPENAI_API_URL),
        )
    }
}

// =============================================================================
// ChatAgent Implementation
// =============================================================================

#[async_trait]
impl ChatAgent for OpenAi {
    async fn chat(
        &self,
        preamble: Option<&str>,
        history: &[Message],
        input: &str,
    ) -> Result<String> {
        let mut request = ChatRequest::new(&self.model);
        if let Some(preamble) = preamble {
            request = request.message(WireMessage::system(preamble));
        }
        let request = request
            .messages(history.iter().map(WireMessage::from))
            .message(WireMessage::user(input))
            .limits(DEFAULT_MAX_TOKENS);

        self.client()?.chat(&request).await
    }
}

// =============================================================================
// EmbedAgent Implementation
// =============================================================================

#[async_trait]
impl EmbedAgent for OpenAi {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.client()?
            .embed_batch(&self.embedding_model, &texts)
            .await
    }
}
