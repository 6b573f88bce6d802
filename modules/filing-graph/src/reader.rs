use neo4rs::{query, Row, Txn};
use serde::Serialize;
use tracing::{debug, info};

use crate::GraphClient;

/// A Document node as read back through its Company link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredDocument {
    pub id: String,
    pub seq_id: i64,
    pub company_name: String,
    pub text: String,
}

/// A stored vector pulled for exploratory analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledEmbedding {
    pub id: String,
    pub company_name: String,
    pub embedding: Vec<f64>,
}

/// Read-side queries over the Company/Document graph.
#[derive(Clone)]
pub struct GraphReader {
    client: GraphClient,
}

impl GraphReader {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    pub async fn count_documents(&self) -> Result<u64, neo4rs::Error> {
        let mut stream = self
            .client
            .graph
            .execute(query("MATCH (d:Document) RETURN count(d) AS n"))
            .await?;
        if let Some(row) = stream.next().await? {
            let n: i64 = row.get("n").unwrap_or(0);
            return Ok(n.max(0) as u64);
        }
        Ok(0)
    }

    /// Documents linked from the company with this key, in sequence order.
    pub async fn documents_for_company(
        &self,
        cusip: &str,
    ) -> Result<Vec<StoredDocument>, neo4rs::Error> {
        let q = query(
            "MATCH (:Company {cusip: $cusip})-[:HAS_DOCUMENT]->(d:Document)
             RETURN d.id AS id, d.seq_id AS seq_id, d.company_name AS company_name, d.text AS text
             ORDER BY d.seq_id",
        )
        .param("cusip", cusip);

        let mut docs = Vec::new();
        let mut stream = self.client.graph.execute(q).await?;
        while let Some(row) = stream.next().await? {
            docs.push(StoredDocument {
                id: row.get("id").unwrap_or_default(),
                seq_id: row.get("seq_id").unwrap_or_default(),
                company_name: row.get("company_name").unwrap_or_default(),
                text: row.get("text").unwrap_or_default(),
            });
        }
        Ok(docs)
    }

    /// Up to `limit` stored vectors, ordered by id so repeated runs see the
    /// same sample.
    pub async fn sample_embeddings(
        &self,
        limit: usize,
    ) -> Result<Vec<SampledEmbedding>, neo4rs::Error> {
        let q = query(
            "MATCH (d:Document) WHERE d.embedding IS NOT NULL
             RETURN d.id AS id, d.company_name AS company_name, d.embedding AS embedding
             ORDER BY d.id
             LIMIT $limit",
        )
        .param("limit", limit as i64);

        let mut sample = Vec::new();
        let mut stream = self.client.graph.execute(q).await?;
        while let Some(row) = stream.next().await? {
            let id: String = row.get("id").unwrap_or_default();
            let embedding: Vec<f64> = row.get("embedding").unwrap_or_default();
            if !id.is_empty() && !embedding.is_empty() {
                sample.push(SampledEmbedding {
                    id,
                    company_name: row.get("company_name").unwrap_or_default(),
                    embedding,
                });
            }
        }

        info!(sampled = sample.len(), limit, "Fetched document embeddings");
        Ok(sample)
    }

    /// Run a caller-vetted read query and return at most `row_cap` rows as
    /// JSON objects keyed by the RETURN aliases.
    ///
    /// The query runs in an explicit transaction that is always rolled back,
    /// so nothing it does can persist even if the caller's vetting missed a
    /// write.
    pub async fn run_read_query(
        &self,
        cypher: &str,
        row_cap: usize,
    ) -> Result<Vec<serde_json::Value>, neo4rs::Error> {
        debug!(cypher, "Executing read query");

        let mut txn = self.client.graph.start_txn().await?;
        let rows = collect_json_rows(&mut txn, cypher, row_cap).await;
        let rolled_back = txn.rollback().await;

        let rows = rows?;
        rolled_back?;
        Ok(rows)
    }
}

async fn collect_json_rows(
    txn: &mut Txn,
    cypher: &str,
    row_cap: usize,
) -> Result<Vec<serde_json::Value>, neo4rs::Error> {
    let mut rows = Vec::new();
    let mut stream = txn.execute(query(cypher)).await?;
    while let Some(row) = stream.next(txn.handle()).await? {
        if rows.len() >= row_cap {
            break;
        }
        rows.push(row_json(&row)?);
    }
    Ok(rows)
}

fn row_json(row: &Row) -> Result<serde_json::Value, neo4rs::Error> {
    row.to().map_err(neo4rs::Error::DeserializationError)
}
