use async_trait::async_trait;
use neo4rs::{query, BoltFloat, BoltInteger, BoltMap, BoltString, BoltType};
use tracing::{debug, info, warn};

use filing_common::{
    DocumentSink, EmbeddingRecord, FilingDocument, FilingError, FilingResult, WriteStats,
    DOCUMENT_TYPE,
};

use crate::GraphClient;

/// Records per UNWIND round trip.
pub const DEFAULT_BATCH_SIZE: usize = 100;

const UPSERT_DOCUMENTS: &str = "UNWIND $rows AS row
     MATCH (c:Company {cusip: row.cusip})
     MERGE (d:Document {id: row.id})
     SET d.type = $doc_type,
         d.seq_id = row.seq_id,
         d.embedding = row.embedding,
         d.text = row.text,
         d.company_name = row.company_name,
         d.cusip = row.cusip
     MERGE (c)-[:HAS_DOCUMENT]->(d)
     RETURN count(d) AS written";

const UPSERT_COMPANIES: &str = "UNWIND $rows AS row
     MERGE (c:Company {cusip: row.cusip})
     SET c.name = row.name
     RETURN count(c) AS written";

/// Bulk upsert of embedding records as Document nodes under their Company.
///
/// Each batch is one auto-commit query. A failure mid-run leaves earlier
/// batches committed and later batches unattempted.
pub struct DocumentWriter {
    client: GraphClient,
    batch_size: usize,
}

impl DocumentWriter {
    pub fn new(client: GraphClient, batch_size: usize) -> Self {
        Self {
            client,
            batch_size: batch_size.max(1),
        }
    }

    /// Upsert all records, `batch_size` per round trip.
    /// Records whose Company node does not exist are not written.
    pub async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<WriteStats, neo4rs::Error> {
        let mut stats = WriteStats::default();

        for (i, batch) in records.chunks(self.batch_size).enumerate() {
            let q = query(UPSERT_DOCUMENTS)
                .param("rows", record_rows(batch))
                .param("doc_type", DOCUMENT_TYPE);

            let written = self.run_counting(q).await?;
            stats.batches += 1;
            stats.written += written;

            if written < batch.len() {
                warn!(
                    batch = i,
                    expected = batch.len(),
                    written,
                    "Some records had no matching Company node"
                );
            }
            debug!(batch = i, written, "Document batch committed");
        }

        info!(
            records = records.len(),
            batches = stats.batches,
            written = stats.written,
            "Document upsert complete"
        );
        Ok(stats)
    }

    /// Create or rename the Company nodes the given filings point at.
    pub async fn upsert_companies(
        &self,
        filings: &[FilingDocument],
    ) -> Result<WriteStats, neo4rs::Error> {
        let mut stats = WriteStats::default();

        for batch in filings.chunks(self.batch_size) {
            let rows: Vec<BoltType> = batch
                .iter()
                .map(|f| {
                    BoltType::Map(BoltMap::from_iter(vec![
                        (BoltString::from("cusip"), BoltType::from(f.cusip.as_str())),
                        (BoltString::from("name"), BoltType::from(f.company_name.as_str())),
                    ]))
                })
                .collect();

            let written = self
                .run_counting(query(UPSERT_COMPANIES).param("rows", rows))
                .await?;
            stats.batches += 1;
            stats.written += written;
        }

        info!(companies = stats.written, "Company nodes upserted");
        Ok(stats)
    }

    async fn run_counting(&self, q: neo4rs::Query) -> Result<usize, neo4rs::Error> {
        let mut stream = self.client.graph.execute(q).await?;
        if let Some(row) = stream.next().await? {
            let written: i64 = row.get("written").unwrap_or(0);
            return Ok(written.max(0) as usize);
        }
        Ok(0)
    }
}

#[async_trait]
impl DocumentSink for DocumentWriter {
    async fn write(&self, records: &[EmbeddingRecord]) -> FilingResult<WriteStats> {
        self.upsert(records)
            .await
            .map_err(|e| FilingError::Store(e.to_string()))
    }
}

/// Build the `$rows` parameter for one batch.
fn record_rows(batch: &[EmbeddingRecord]) -> Vec<BoltType> {
    batch
        .iter()
        .map(|r| {
            let embedding: Vec<BoltType> = r
                .embedding
                .iter()
                .map(|x| BoltType::Float(BoltFloat::new(f64::from(*x))))
                .collect();

            BoltType::Map(BoltMap::from_iter(vec![
                (BoltString::from("id"), BoltType::from(r.id.as_str())),
                (BoltString::from("cusip"), BoltType::from(r.cusip.as_str())),
                (
                    BoltString::from("company_name"),
                    BoltType::from(r.company_name.as_str()),
                ),
                (
                    BoltString::from("seq_id"),
                    BoltType::Integer(BoltInteger::new(r.seq_id as i64)),
                ),
                (BoltString::from("embedding"), BoltType::from(embedding)),
                (BoltString::from("text"), BoltType::from(r.text.as_str())),
            ]))
        })
        .collect()
}
