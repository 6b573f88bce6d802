#![cfg(feature = "test-utils")]

// Bulk upsert integration tests against a real Neo4j.
//
// Requirements: Docker (for Neo4j via testcontainers), or NEO4J_TEST_URI
// pointing at a disposable server (run with --test-threads=1 then).
//
// Run with: cargo test -p filing-graph --features test-utils --test writer_test

use filing_common::{EmbeddingRecord, FilingDocument};
use filing_graph::migrate::{migrate, missing_schema};
use filing_graph::{DocumentWriter, GraphClient, GraphReader};

async fn setup() -> (impl std::any::Any, GraphClient) {
    let (container, client) = filing_graph::testutil::neo4j_container().await;
    migrate(&client, None).await.expect("migrate");
    (container, client)
}

fn filing(cusip: &str, name: &str) -> FilingDocument {
    FilingDocument {
        filing_id: format!("{cusip}-10k"),
        company_name: name.to_string(),
        cusip: cusip.to_string(),
        business_description: String::new(),
    }
}

fn records(name: &str, cusip: &str, n: usize) -> Vec<EmbeddingRecord> {
    (0..n)
        .map(|seq_id| EmbeddingRecord {
            company_name: name.to_string(),
            cusip: cusip.to_string(),
            seq_id,
            id: format!("{name}{seq_id}"),
            embedding: vec![seq_id as f32, 1.0, -1.0],
            text: format!("chunk {seq_id} of {name}"),
        })
        .collect()
}

#[tokio::test]
async fn migrate_creates_required_indexes_and_is_repeatable() {
    let (_c, client) = setup().await;
    migrate(&client, Some(3)).await.expect("second migrate");
    assert!(missing_schema(&client).await.unwrap().is_empty());
}

#[tokio::test]
async fn rerunning_upsert_does_not_duplicate_documents() {
    let (_c, client) = setup().await;
    let writer = DocumentWriter::new(client.clone(), 100);
    let reader = GraphReader::new(client);

    writer.upsert_companies(&[filing("C1", "Acme")]).await.unwrap();
    let batch = records("Acme", "C1", 3);

    writer.upsert(&batch).await.unwrap();
    assert_eq!(reader.count_documents().await.unwrap(), 3);

    writer.upsert(&batch).await.unwrap();
    assert_eq!(reader.count_documents().await.unwrap(), 3);

    let docs = reader.documents_for_company("C1").await.unwrap();
    let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, ["Acme0", "Acme1", "Acme2"]);
}

#[tokio::test]
async fn upsert_issues_one_round_trip_per_batch() {
    let (_c, client) = setup().await;
    let writer = DocumentWriter::new(client.clone(), 4);

    writer.upsert_companies(&[filing("C2", "Globex")]).await.unwrap();
    let stats = writer.upsert(&records("Globex", "C2", 10)).await.unwrap();

    assert_eq!(stats.batches, 3);
    assert_eq!(stats.written, 10);
}

#[tokio::test]
async fn records_without_a_company_are_not_written() {
    let (_c, client) = setup().await;
    let writer = DocumentWriter::new(client.clone(), 100);
    let reader = GraphReader::new(client);

    let stats = writer.upsert(&records("Orphan", "NOPE", 2)).await.unwrap();

    assert_eq!(stats.batches, 1);
    assert_eq!(stats.written, 0);
    assert_eq!(reader.count_documents().await.unwrap(), 0);
}

#[tokio::test]
async fn sample_returns_stored_vectors() {
    let (_c, client) = setup().await;
    let writer = DocumentWriter::new(client.clone(), 100);
    let reader = GraphReader::new(client);

    writer.upsert_companies(&[filing("C1", "Acme")]).await.unwrap();
    writer.upsert(&records("Acme", "C1", 5)).await.unwrap();

    let sample = reader.sample_embeddings(2).await.unwrap();
    assert_eq!(sample.len(), 2);
    assert_eq!(sample[0].id, "Acme0");
    assert_eq!(sample[0].embedding, vec![0.0, 1.0, -1.0]);
    assert_eq!(sample[0].company_name, "Acme");
}

#[tokio::test]
async fn read_query_rows_come_back_as_json() {
    let (_c, client) = setup().await;
    let writer = DocumentWriter::new(client.clone(), 100);
    let reader = GraphReader::new(client);

    writer.upsert_companies(&[filing("C1", "Acme")]).await.unwrap();
    writer.upsert(&records("Acme", "C1", 3)).await.unwrap();

    let rows = reader
        .run_read_query(
            "MATCH (c:Company)-[:HAS_DOCUMENT]->(d:Document) RETURN c.name AS name, count(d) AS docs",
            10,
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "Acme");
    assert_eq!(rows[0]["docs"], 3);
}

#[tokio::test]
async fn read_query_node_rows_decode_to_properties() {
    let (_container, client) = setup().await;
    let writer = DocumentWriter::new(client.clone(), 100);
    writer.upsert_companies(&[filing("C1", "Acme")]).await.unwrap();

    let rows = GraphReader::new(client)
        .run_read_query("MATCH (c:Company) RETURN c", 10)
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["c"]["cusip"], "C1");
}

#[tokio::test]
async fn writes_through_the_read_path_never_persist() {
    let (_container, client) = setup().await;
    let reader = GraphReader::new(client);

    reader
        .run_read_query("CREATE (c:Company {cusip: 'X', name: 'Ghost'}) RETURN c.cusip AS cusip", 10)
        .await
        .unwrap();

    let rows = reader
        .run_read_query("MATCH (c:Company {cusip: 'X'}) RETURN count(c) AS n", 10)
        .await
        .unwrap();
    assert_eq!(rows[0]["n"], 0);
}
