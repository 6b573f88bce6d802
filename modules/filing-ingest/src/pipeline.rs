use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use filing_common::{
    DocumentIdStrategy, DocumentSink, FilingDocument, FilingError, FilingResult, WriteStats,
};

use crate::chunker::{TextChunk, TextChunker};
use crate::embedder::BatchEmbedder;

/// What to do when one filing fails to embed or persist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the run at the first failed filing. Earlier filings stay persisted.
    #[default]
    Abort,
    /// Log the failure, record it in the report and continue.
    SkipFiling,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub filings_seen: usize,
    pub filings_persisted: usize,
    pub filings_empty: usize,
    /// (filing id, error)
    pub filings_failed: Vec<(String, String)>,
    pub chunks: usize,
    pub batches: usize,
    pub written: usize,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "filings={} persisted={} empty={} failed={} chunks={} batches={} written={} elapsed={}s",
            self.filings_seen,
            self.filings_persisted,
            self.filings_empty,
            self.filings_failed.len(),
            self.chunks,
            self.batches,
            self.written,
            (self.finished_at - self.started_at).num_seconds()
        )
    }
}

/// Chunk → embed → persist, one filing at a time.
pub struct IngestPipeline {
    chunker: TextChunker,
    embedder: BatchEmbedder,
    sink: Arc<dyn DocumentSink>,
    policy: FailurePolicy,
}

impl IngestPipeline {
    pub fn new(chunker: TextChunker, embedder: BatchEmbedder, sink: Arc<dyn DocumentSink>) -> Self {
        Self {
            chunker,
            embedder,
            sink,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn run(&self, filings: &[FilingDocument]) -> FilingResult<IngestReport> {
        let started_at = Utc::now();
        let mut stats = WriteStats::default();
        let mut chunk_total = 0;
        let mut persisted = 0;
        let mut empty = 0;
        let mut failed = Vec::new();

        if self.embedder.id_strategy() == DocumentIdStrategy::CompanyName {
            warn_on_shared_names(filings);
        }

        info!(filings = filings.len(), "Ingest run starting");

        for (i, filing) in filings.iter().enumerate() {
            let chunks: Vec<TextChunk<'_>> =
                self.chunker.split(&filing.business_description).collect();
            if chunks.is_empty() {
                empty += 1;
                continue;
            }

            match self.process(filing, &chunks).await {
                Ok(written) => {
                    chunk_total += chunks.len();
                    stats += written;
                    persisted += 1;
                    info!(
                        filing = i + 1,
                        of = filings.len(),
                        company = %filing.company_name,
                        chunks = chunks.len(),
                        written = written.written,
                        "Filing persisted"
                    );
                }
                Err(e) => match self.policy {
                    FailurePolicy::Abort => return Err(e),
                    FailurePolicy::SkipFiling => {
                        warn!(filing = %filing.filing_id, error = %e, "Filing failed, skipping");
                        failed.push((filing.filing_id.clone(), e.to_string()));
                    }
                },
            }
        }

        let report = IngestReport {
            started_at,
            finished_at: Utc::now(),
            filings_seen: filings.len(),
            filings_persisted: persisted,
            filings_empty: empty,
            filings_failed: failed,
            chunks: chunk_total,
            batches: stats.batches,
            written: stats.written,
        };
        info!("Ingest run complete. {report}");
        Ok(report)
    }

    async fn process(
        &self,
        filing: &FilingDocument,
        chunks: &[TextChunk<'_>],
    ) -> Result<WriteStats, FilingError> {
        let records = self.embedder.embed_filing(filing, chunks).await?;
        self.sink.write(&records).await
    }
}

/// Name-derived ids collide when two companies share a name.
fn warn_on_shared_names(filings: &[FilingDocument]) {
    let mut keys_by_name: HashMap<&str, Vec<&str>> = HashMap::new();
    for filing in filings {
        let keys = keys_by_name.entry(filing.company_name.as_str()).or_default();
        if !keys.contains(&filing.cusip.as_str()) {
            keys.push(filing.cusip.as_str());
        }
    }
    for (name, keys) in keys_by_name {
        if keys.len() > 1 {
            warn!(
                company = name,
                cusips = ?keys,
                "Company name shared by several keys; document ids will collide"
            );
        }
    }
}
