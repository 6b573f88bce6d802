use filing_common::GraphConfig;
use neo4rs::{ConfigBuilder, Graph};
use tracing::info;

/// Pooled Bolt connection to the filings graph. Clones share the pool.
#[derive(Clone)]
pub struct GraphClient {
    pub(crate) graph: Graph,
}

impl GraphClient {
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self, neo4rs::Error> {
        let config = ConfigBuilder::default()
            .uri(uri)
            .user(user)
            .password(password)
            .fetch_size(500)
            .max_connections(10)
            .build()?;
        let graph = Graph::connect(config).await?;
        info!(uri, "Connected to Neo4j");
        Ok(Self { graph })
    }

    pub async fn from_config(config: &GraphConfig) -> Result<Self, neo4rs::Error> {
        Self::connect(&config.uri, &config.user, &config.password).await
    }
}
