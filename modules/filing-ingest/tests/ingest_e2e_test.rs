//! End-to-end ingest: filings → chunks → stub vectors → Neo4j.
//!
//! **Requires:** Docker (for Neo4j via testcontainers) OR `NEO4J_TEST_URI`
//! pointing at a disposable server, with `--test-threads=1`.
//!
//! Run with: cargo test -p filing-ingest --test ingest_e2e_test

use std::sync::Arc;

use ai_client::EmbedAgent;
use async_trait::async_trait;

use filing_common::FilingDocument;
use filing_graph::migrate::migrate;
use filing_graph::{DocumentWriter, GraphClient, GraphReader};
use filing_ingest::{
    read_staging, BatchEmbedder, ChunkConfig, CsvStaging, IngestPipeline, TextChunker,
};

/// Deterministic vectors so the test never reaches a real provider.
struct LengthEmbedder;

#[async_trait]
impl EmbedAgent for LengthEmbedder {
    async fn embed_batch(&self, texts: Vec<String>) -> ai_client::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| vec![t.len() as f32, 0.5, -0.5])
            .collect())
    }
}

async fn setup() -> (impl std::any::Any, GraphClient) {
    let (container, client) = filing_graph::testutil::neo4j_container().await;
    migrate(&client, None).await.expect("migrate");
    (container, client)
}

fn acme() -> FilingDocument {
    let mut text = "Acme designs, manufactures and sells industrial anvils. ".repeat(100);
    text.truncate(5000);
    FilingDocument {
        filing_id: "0000001-10k".into(),
        company_name: "Acme".into(),
        cusip: "C1".into(),
        business_description: text,
    }
}

fn pipeline(sink: Arc<dyn filing_common::DocumentSink>) -> IngestPipeline {
    let chunker = TextChunker::new(ChunkConfig::default()).expect("chunker");
    let embedder = BatchEmbedder::builder()
        .agent(Arc::new(LengthEmbedder))
        .batch_size(5)
        .build();
    IngestPipeline::new(chunker, embedder, sink)
}

#[tokio::test]
async fn filing_lands_as_linked_documents() {
    let (_container, client) = setup().await;
    let filings = [acme()];

    let writer = Arc::new(DocumentWriter::new(client.clone(), 100));
    writer.upsert_companies(&filings).await.expect("companies");

    let report = pipeline(writer).run(&filings).await.expect("run");
    assert_eq!(report.chunks, 3);
    assert_eq!(report.written, 3);

    let docs = GraphReader::new(client)
        .documents_for_company("C1")
        .await
        .expect("read back");
    let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, ["Acme0", "Acme1", "Acme2"]);
    assert_eq!(
        docs.iter().map(|d| d.seq_id).collect::<Vec<_>>(),
        [0, 1, 2]
    );
    assert!(docs.iter().all(|d| d.company_name == "Acme"));
}

#[tokio::test]
async fn rerunning_ingest_does_not_duplicate_documents() {
    let (_container, client) = setup().await;
    let filings = [acme()];

    let writer = Arc::new(DocumentWriter::new(client.clone(), 2));
    writer.upsert_companies(&filings).await.expect("companies");

    pipeline(writer.clone()).run(&filings).await.expect("first run");
    pipeline(writer).run(&filings).await.expect("second run");

    let count = GraphReader::new(client).count_documents().await.expect("count");
    assert_eq!(count, 3);
}

#[tokio::test]
async fn staged_file_loads_like_a_direct_run() {
    let (_container, client) = setup().await;
    let filings = [acme()];
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("staging.csv");

    let staging = Arc::new(CsvStaging::create(&path).expect("staging"));
    pipeline(staging).run(&filings).await.expect("stage");

    let writer = DocumentWriter::new(client.clone(), 100);
    writer.upsert_companies(&filings).await.expect("companies");
    let records = read_staging(&path).expect("read staging");
    let stats = writer.upsert(&records).await.expect("load");
    assert_eq!(stats.written, 3);

    let docs = GraphReader::new(client)
        .documents_for_company("C1")
        .await
        .expect("read back");
    assert_eq!(docs.len(), 3);
    assert_eq!(docs[0].text, records[0].text);
}
