use std::sync::{Arc, LazyLock};

use ai_client::{strip_code_blocks, truncate_to_char_boundary, ChatAgent};
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use filing_graph::GraphReader;

use crate::error::ChatError;

pub const DEFAULT_ROW_CAP: usize = 50;

/// Rows are handed back to the model as JSON; keep that prompt bounded.
const MAX_ROWS_BYTES: usize = 12_000;

pub const GRAPH_SCHEMA: &str = "\
Node labels and properties:
  (:Company {cusip: STRING, name: STRING})
  (:Document {id: STRING, type: STRING, seq_id: INTEGER, text: STRING, company_name: STRING, cusip: STRING, embedding: LIST<FLOAT>})
Relationships:
  (:Company)-[:HAS_DOCUMENT]->(:Document)
Each Document is one chunk of a company's 10-K business description, ordered by seq_id.";

const CYPHER_PREAMBLE: &str = "You translate questions into a single read-only Neo4j Cypher query. \
Use only the labels, relationships and properties in the schema. Never return the embedding \
property. Reply with the query only, no explanation.";

const ANSWER_PREAMBLE: &str = "You answer questions using only the query results provided. \
If the results are empty, say you could not find the answer in the filings.";

/// Statements that could change the graph or escape the read path.
static RE_WRITE_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(CREATE|MERGE|DELETE|DETACH|SET|REMOVE|DROP|FOREACH|CALL|LOAD\s+CSV|USE|ALTER|GRANT|DENY|REVOKE|START|STOP)\b",
    )
    .unwrap()
});

/// Everything that can hide clause keywords: string literals, backtick
/// identifiers and comments. One left-to-right pass, so a quote inside a
/// comment (or a comment marker inside a string) is consumed by whichever
/// construct opened first.
static RE_OPAQUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*"|`[^`]*`|//[^\n]*|/\*(?s:.*?)\*/"#).unwrap()
});
static RE_READ_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(MATCH|RETURN)\b").unwrap());

/// Executes vetted read queries.
#[async_trait]
pub trait ReadQuery: Send + Sync {
    async fn read(&self, cypher: &str, row_cap: usize) -> anyhow::Result<Vec<Value>>;
}

#[async_trait]
impl ReadQuery for GraphReader {
    async fn read(&self, cypher: &str, row_cap: usize) -> anyhow::Result<Vec<Value>> {
        Ok(self.run_read_query(cypher, row_cap).await?)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QaAnswer {
    pub answer: String,
    pub cypher: String,
    pub rows: usize,
}

/// Reject anything that is not a single read-only query. Literals,
/// backticked names and comments are blanked first so `CONTAINS 'set'` is not
/// mistaken for a clause and a stray quote cannot hide one.
pub fn ensure_read_only(cypher: &str) -> Result<(), ChatError> {
    let scrubbed = RE_OPAQUE.replace_all(cypher, " ");
    let body = scrubbed.trim().trim_end_matches(';');

    if body.contains(['\'', '"', '`']) || body.contains("/*") {
        return Err(ChatError::UnsafeQuery("unterminated quote or comment".into()));
    }
    if body.contains(';') {
        return Err(ChatError::UnsafeQuery("multiple statements".into()));
    }
    if let Some(m) = RE_WRITE_CLAUSE.find(body) {
        return Err(ChatError::UnsafeQuery(format!(
            "contains {}",
            m.as_str().to_uppercase()
        )));
    }
    if !RE_READ_CLAUSE.is_match(body) {
        return Err(ChatError::UnsafeQuery("not a MATCH/RETURN query".into()));
    }
    Ok(())
}

/// Question → Cypher → rows → answer, with the query checked before it runs.
pub struct GraphQa {
    agent: Arc<dyn ChatAgent>,
    store: Arc<dyn ReadQuery>,
    row_cap: usize,
}

impl GraphQa {
    pub fn new(agent: Arc<dyn ChatAgent>, store: Arc<dyn ReadQuery>) -> Self {
        Self {
            agent,
            store,
            row_cap: DEFAULT_ROW_CAP,
        }
    }

    pub fn with_row_cap(mut self, row_cap: usize) -> Self {
        self.row_cap = row_cap.max(1);
        self
    }

    pub async fn generate_cypher(&self, question: &str) -> Result<String, ChatError> {
        let prompt = format!("Schema:\n{GRAPH_SCHEMA}\n\nQuestion: {question}");
        let reply = self.agent.chat(Some(CYPHER_PREAMBLE), &[], &prompt).await?;
        let cypher = strip_code_blocks(&reply).trim().trim_end_matches(';').trim();
        if cypher.is_empty() {
            return Err(ChatError::Internal("model returned no query".into()));
        }
        Ok(cypher.to_string())
    }

    pub async fn ask(&self, question: &str) -> Result<QaAnswer, ChatError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ChatError::Input("question is empty".into()));
        }

        let cypher = self.generate_cypher(question).await?;
        if let Err(e) = ensure_read_only(&cypher) {
            warn!(%cypher, error = %e, "Generated query rejected");
            return Err(e);
        }

        let rows = self
            .store
            .read(&cypher, self.row_cap)
            .await
            .map_err(|e| ChatError::Query(e.to_string()))?;
        info!(%cypher, rows = rows.len(), "Graph query answered");

        let rows_json =
            serde_json::to_string(&rows).map_err(|e| ChatError::Internal(e.to_string()))?;
        let prompt = format!(
            "Question: {question}\n\nQuery results (JSON):\n{}",
            truncate_to_char_boundary(&rows_json, MAX_ROWS_BYTES)
        );
        let answer = self.agent.chat(Some(ANSWER_PREAMBLE), &[], &prompt).await?;
        if answer.trim().is_empty() {
            return Err(ChatError::Internal("model returned an empty answer".into()));
        }

        Ok(QaAnswer {
            answer,
            cypher,
            rows: rows.len(),
        })
    }
}
