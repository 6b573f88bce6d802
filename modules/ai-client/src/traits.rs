use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

// =============================================================================
// Message Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

// =============================================================================
// EmbedAgent Trait
// =============================================================================

/// A hosted text-embedding capability.
///
/// `embed_batch` must return exactly one vector per input, in input order.
#[async_trait]
pub trait EmbedAgent: Send + Sync {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;
}

// =============================================================================
// ChatAgent Trait
// =============================================================================

/// A hosted chat-completion capability.
#[async_trait]
pub trait ChatAgent: Send + Sync {
    /// Send `input` as the latest user turn after `history`, with an optional
    /// system preamble. Returns the model's reply text.
    async fn chat(&self, preamble: Option<&str>, history: &[Message], input: &str)
        -> Result<String>;
}
