use std::sync::Arc;

use ai_client::{ChatAgent, Message};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::ChatError;

/// Returned to the user whenever a turn fails for any reason.
pub const APOLOGY: &str =
    "Sorry, I wasn't able to answer that just now. Please try again in a moment.";

pub const DEFAULT_PREAMBLE: &str = "You are a helpful assistant that answers questions about \
public companies using the business descriptions from their 10-K filings. Be concise and say \
so when you do not know.";

pub const EXAMPLE_PROMPTS: &[&str] = &[
    "What does Acme Corp do?",
    "Which companies describe themselves as semiconductor manufacturers?",
    "Summarize the main business lines of a company you know about.",
    "What risks do retailers usually mention in their 10-K business section?",
];

pub const MAX_INPUT_CHARS: usize = 4000;

/// A single conversation kept in memory for the life of the process.
///
/// History only grows: a turn that succeeds appends the user message and
/// the reply, a turn that fails leaves it untouched.
pub struct ChatSession {
    id: Uuid,
    agent: Arc<dyn ChatAgent>,
    history: Vec<Message>,
}

impl ChatSession {
    pub fn new(agent: Arc<dyn ChatAgent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent,
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn clear(&mut self) {
        info!(session = %self.id, turns = self.history.len() / 2, "Clearing chat history");
        self.history.clear();
    }

    /// Run one turn and surface the typed failure.
    pub async fn try_respond(&mut self, input: &str) -> Result<String, ChatError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ChatError::Input("message is empty".into()));
        }
        if input.chars().count() > MAX_INPUT_CHARS {
            return Err(ChatError::Input(format!(
                "message is longer than {MAX_INPUT_CHARS} characters"
            )));
        }

        let reply = self
            .agent
            .chat(Some(DEFAULT_PREAMBLE), &self.history, input)
            .await?;
        if reply.trim().is_empty() {
            return Err(ChatError::Internal("model returned an empty reply".into()));
        }

        self.history.push(Message::user(input));
        self.history.push(Message::assistant(reply.clone()));
        Ok(reply)
    }

    /// Run one turn. Any failure is logged and replaced by [`APOLOGY`].
    pub async fn chat_response(&mut self, input: &str) -> String {
        match self.try_respond(input).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(session = %self.id, error = %e, "Chat turn failed");
                APOLOGY.to_string()
            }
        }
    }
}
