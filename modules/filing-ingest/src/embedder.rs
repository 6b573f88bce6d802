use std::sync::Arc;

use ai_client::{AiError, EmbedAgent};
use tracing::{debug, info};
use typed_builder::TypedBuilder;

use filing_common::{
    document_id, DocumentIdStrategy, EmbeddingRecord, FilingDocument, FilingError, FilingResult,
};

use crate::chunker::TextChunk;
use crate::throttle::{RateLimiter, RetryPolicy};

/// Embeds a filing's chunks in fixed-size groups, one upstream call per group.
///
/// The limiter is consulted before every call, so its policy sets the pace
/// between groups.
#[derive(TypedBuilder)]
pub struct BatchEmbedder {
    agent: Arc<dyn EmbedAgent>,
    #[builder(default = 5)]
    batch_size: usize,
    #[builder(default)]
    limiter: RateLimiter,
    #[builder(default)]
    retry: RetryPolicy,
    #[builder(default)]
    id_strategy: DocumentIdStrategy,
}

impl BatchEmbedder {
    pub fn id_strategy(&self) -> DocumentIdStrategy {
        self.id_strategy
    }

    /// One record per chunk, in order, with sequence ids `0..chunks.len()`.
    /// Any failed group aborts the whole filing.
    pub async fn embed_filing(
        &self,
        filing: &FilingDocument,
        chunks: &[TextChunk<'_>],
    ) -> FilingResult<Vec<EmbeddingRecord>> {
        let batch_size = self.batch_size.max(1);
        let mut records = Vec::with_capacity(chunks.len());

        for (group_idx, group) in chunks.chunks(batch_size).enumerate() {
            let texts: Vec<String> = group.iter().map(|c| c.text.to_string()).collect();

            self.limiter.acquire().await;
            let vectors = self
                .retry
                .run(&filing.company_name, || self.agent.embed_batch(texts.clone()))
                .await
                .map_err(|source| FilingError::Embedding {
                    company: filing.company_name.clone(),
                    source,
                })?;

            if vectors.len() != group.len() {
                return Err(FilingError::Embedding {
                    company: filing.company_name.clone(),
                    source: AiError::Parse(format!(
                        "expected {} vectors, got {}",
                        group.len(),
                        vectors.len()
                    )),
                });
            }

            for (chunk, embedding) in group.iter().zip(vectors) {
                let seq_id = records.len();
                records.push(EmbeddingRecord {
                    company_name: filing.company_name.clone(),
                    cusip: filing.cusip.clone(),
                    seq_id,
                    id: document_id(self.id_strategy, filing, seq_id),
                    embedding,
                    text: chunk.text.to_string(),
                });
            }

            debug!(
                company = %filing.company_name,
                group = group_idx,
                size = group.len(),
                "Embedded chunk group"
            );
        }

        info!(
            company = %filing.company_name,
            cusip = %filing.cusip,
            records = records.len(),
            "Filing embedded"
        );
        Ok(records)
    }
}
