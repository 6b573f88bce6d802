//! Chat fine-tuning training files: one JSON object per line, each holding a
//! `messages` array of `{role, content}` turns.

use std::io::{BufRead, Write};

use ai_client::{Message, MessageRole};
use serde::{Deserialize, Serialize};

use crate::error::FineTuneError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FineTuneExample {
    pub messages: Vec<Message>,
}

/// A question with the answer the tuned model should give.
#[derive(Debug, Clone, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

impl FineTuneExample {
    pub fn from_pair(system: Option<&str>, question: &str, answer: &str) -> Self {
        let mut messages = Vec::with_capacity(3);
        if let Some(system) = system {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(question));
        messages.push(Message::assistant(answer));
        Self { messages }
    }

    /// A whole conversation as one example.
    pub fn from_history(system: Option<&str>, history: &[Message]) -> Self {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if let Some(system) = system {
            messages.push(Message::system(system));
        }
        messages.extend_from_slice(history);
        Self { messages }
    }

    fn check(&self, index: usize) -> Result<(), FineTuneError> {
        let has = |role| self.messages.iter().any(|m| m.role == role);
        if !has(MessageRole::User) {
            return Err(FineTuneError::MissingRole { index, role: "user" });
        }
        if !has(MessageRole::Assistant) {
            return Err(FineTuneError::MissingRole {
                index,
                role: "assistant",
            });
        }
        Ok(())
    }
}

/// Validate every example, then write them as JSONL. Nothing is written if
/// any example is invalid.
pub fn write_jsonl<W: Write>(
    mut out: W,
    examples: &[FineTuneExample],
) -> Result<usize, FineTuneError> {
    for (index, example) in examples.iter().enumerate() {
        example.check(index)?;
    }
    for (index, example) in examples.iter().enumerate() {
        serde_json::to_writer(&mut out, example)
            .map_err(|source| FineTuneError::Json { line: index + 1, source })?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(examples.len())
}

/// Read `{question, answer}` objects, one per line. Blank lines are skipped.
pub fn read_pairs<R: BufRead>(input: R) -> Result<Vec<QaPair>, FineTuneError> {
    let mut pairs = Vec::new();
    for (i, line) in input.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let pair = serde_json::from_str(&line)
            .map_err(|source| FineTuneError::Json { line: i + 1, source })?;
        pairs.push(pair);
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_serialize_to_chat_lines() {
        let examples = vec![
            FineTuneExample::from_pair(Some("Be brief."), "What does Acme do?", "Anvils."),
            FineTuneExample::from_pair(None, "And Globex?", "Everything."),
        ];
        let mut out = Vec::new();
        assert_eq!(write_jsonl(&mut out, &examples).unwrap(), 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            r#"{"messages":[{"role":"system","content":"Be brief."},{"role":"user","content":"What does Acme do?"},{"role":"assistant","content":"Anvils."}]}"#
        );
    }

    #[test]
    fn example_without_an_answer_is_rejected() {
        let history = vec![Message::user("hello?")];
        let examples = vec![
            FineTuneExample::from_pair(None, "q", "a"),
            FineTuneExample::from_history(Some("sys"), &history),
        ];
        let mut out = Vec::new();

        let err = write_jsonl(&mut out, &examples).unwrap_err();
        assert!(matches!(
            err,
            FineTuneError::MissingRole { index: 1, role: "assistant" }
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn pairs_are_read_line_by_line() {
        let input = "{\"question\": \"q1\", \"answer\": \"a1\"}\n\n{\"question\": \"q2\", \"answer\": \"a2\"}\n";
        let pairs = read_pairs(input.as_bytes()).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1].answer, "a2");

        let err = read_pairs("{\"question\": 1}\n".as_bytes()).unwrap_err();
        assert!(matches!(err, FineTuneError::Json { line: 1, .. }));
    }
}
