use neo4rs::query;
use tracing::{info, warn};

use crate::GraphClient;

/// Uniqueness constraint on the Document key; backs the writer's MERGE.
pub const DOCUMENT_ID_CONSTRAINT: &str = "document_id";
/// Lookup index on the Company key; backs the writer's MATCH.
pub const COMPANY_KEY_INDEX: &str = "company_cusip";
pub const DOCUMENT_VECTOR_INDEX: &str = "document_embedding";

/// Run idempotent schema migrations: the two indexes the bulk load depends
/// on, plus an optional vector index when the embedding width is known.
pub async fn migrate(
    client: &GraphClient,
    embedding_dimensions: Option<usize>,
) -> Result<(), neo4rs::Error> {
    let g = &client.graph;

    info!("Running schema migrations...");

    run_ignoring_exists(
        g,
        &format!(
            "CREATE CONSTRAINT {DOCUMENT_ID_CONSTRAINT} IF NOT EXISTS \
             FOR (d:Document) REQUIRE d.id IS UNIQUE"
        ),
    )
    .await?;
    info!("Document id uniqueness constraint ready");

    run_ignoring_exists(
        g,
        &format!("CREATE INDEX {COMPANY_KEY_INDEX} IF NOT EXISTS FOR (c:Company) ON (c.cusip)"),
    )
    .await?;
    info!("Company key index ready");

    // Vector indexes need Neo4j 5.11+; older servers still get a usable load.
    if let Some(dims) = embedding_dimensions {
        let cypher = format!(
            "CREATE VECTOR INDEX {DOCUMENT_VECTOR_INDEX} IF NOT EXISTS \
             FOR (d:Document) ON (d.embedding) \
             OPTIONS {{indexConfig: {{`vector.dimensions`: {dims}, `vector.similarity_function`: 'cosine'}}}}"
        );
        match g.run(query(&cypher)).await {
            Ok(_) => info!(dims, "Document vector index ready"),
            Err(e) => warn!("Vector index creation failed (non-fatal): {e}"),
        }
    }

    info!("Schema migrations complete");
    Ok(())
}

/// Names of the indexes the bulk load depends on that are not present.
pub async fn missing_schema(client: &GraphClient) -> Result<Vec<&'static str>, neo4rs::Error> {
    let mut present = Vec::new();
    let mut stream = client
        .graph
        .execute(query("SHOW INDEXES YIELD name RETURN name"))
        .await?;
    while let Some(row) = stream.next().await? {
        let name: String = row.get("name").unwrap_or_default();
        present.push(name);
    }

    Ok(required_missing(&present))
}

fn required_missing(present: &[String]) -> Vec<&'static str> {
    [DOCUMENT_ID_CONSTRAINT, COMPANY_KEY_INDEX]
        .into_iter()
        .filter(|name| !present.iter().any(|p| p == name))
        .collect()
}

async fn run_ignoring_exists(g: &neo4rs::Graph, cypher: &str) -> Result<(), neo4rs::Error> {
    match g.run(query(cypher)).await {
        Ok(_) => Ok(()),
        Err(e) => {
            let msg = e.to_string().to_lowercase();
            if msg.contains("already exists") || msg.contains("equivalent") {
                warn!("Already exists (skipped): {}", cypher.chars().take(80).collect::<String>());
                Ok(())
            } else {
                Err(e)
            }
        }
    }
}
