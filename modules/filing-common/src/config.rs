use std::env;
use std::str::FromStr;

use crate::error::{FilingError, FilingResult};

/// Neo4j connection settings.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

/// Hosted model settings shared by the embedder and the chat wrapper.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub embedding_model: String,
    pub chat_model: String,
}

/// Application configuration loaded from environment variables.
/// Pipeline tunables carry defaults; CLI flags override them per run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Present when `NEO4J_URI` is set.
    pub graph: Option<GraphConfig>,
    /// Present when `OPENAI_API_KEY` is set.
    pub models: Option<ModelConfig>,

    // Ingest
    pub archive_url: Option<String>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embed_batch_size: usize,
    pub embed_interval_ms: u64,
    pub embed_max_retries: u32,
    pub write_batch_size: usize,

    // Chat API
    pub chat_host: String,
    pub chat_port: u16,
}

impl GraphConfig {
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> FilingResult<Self> {
        Ok(Self {
            uri: required(lookup, "NEO4J_URI")?,
            user: lookup("NEO4J_USER").unwrap_or_else(|| "neo4j".to_string()),
            password: required(lookup, "NEO4J_PASSWORD")?,
        })
    }
}

impl ModelConfig {
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> FilingResult<Self> {
        Ok(Self {
            openai_api_key: required(lookup, "OPENAI_API_KEY")?,
            openai_base_url: lookup("OPENAI_BASE_URL").filter(|s| !s.is_empty()),
            embedding_model: lookup("EMBEDDING_MODEL")
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            chat_model: lookup("CHAT_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
        })
    }
}

impl Config {
    pub fn from_env() -> FilingResult<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(&|key| env::var(key).ok())?;
        config.log_keys();
        Ok(config)
    }

    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> FilingResult<Self> {
        Ok(Self {
            graph: match lookup("NEO4J_URI").filter(|s| !s.is_empty()) {
                Some(_) => Some(GraphConfig::from_lookup(lookup)?),
                None => None,
            },
            models: match lookup("OPENAI_API_KEY").filter(|s| !s.is_empty()) {
                Some(_) => Some(ModelConfig::from_lookup(lookup)?),
                None => None,
            },
            archive_url: lookup("FILINGS_ARCHIVE_URL").filter(|s| !s.is_empty()),
            chunk_size: parsed(lookup, "CHUNK_SIZE", 2000)?,
            chunk_overlap: parsed(lookup, "CHUNK_OVERLAP", 15)?,
            embed_batch_size: parsed(lookup, "EMBED_BATCH_SIZE", 5)?,
            embed_interval_ms: parsed(lookup, "EMBED_INTERVAL_MS", 1000)?,
            embed_max_retries: parsed(lookup, "EMBED_MAX_RETRIES", 0)?,
            write_batch_size: parsed(lookup, "WRITE_BATCH_SIZE", 100)?,
            chat_host: lookup("CHAT_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            chat_port: parsed(lookup, "CHAT_PORT", 7860)?,
        })
    }

    /// The graph settings, for commands that cannot run without a store.
    pub fn require_graph(&self) -> FilingResult<&GraphConfig> {
        self.graph
            .as_ref()
            .ok_or_else(|| FilingError::Config("NEO4J_URI environment variable is required".into()))
    }

    /// The model settings, for commands that embed or chat.
    pub fn require_models(&self) -> FilingResult<&ModelConfig> {
        self.models.as_ref().ok_or_else(|| {
            FilingError::Config("OPENAI_API_KEY environment variable is required".into())
        })
    }

    fn log_keys(&self) {
        tracing::info!("Config loaded:");
        match &self.graph {
            Some(graph) => {
                tracing::info!("  NEO4J_URI: {}", graph.uri);
                tracing::info!("  NEO4J_PASSWORD: {}", preview(&graph.password));
            }
            None => tracing::info!("  NEO4J_URI: <not set>"),
        }
        match &self.models {
            Some(models) => {
                tracing::info!("  OPENAI_API_KEY: {}", preview(&models.openai_api_key));
                tracing::info!("  EMBEDDING_MODEL: {}", models.embedding_model);
                tracing::info!("  CHAT_MODEL: {}", models.chat_model);
            }
            None => tracing::info!("  OPENAI_API_KEY: <not set>"),
        }
    }
}

/// Redacted secret preview for logs.
pub fn preview(val: &str) -> String {
    let n = val.chars().take(5).map(char::len_utf8).sum::<usize>();
    format!("{}...({} chars)", &val[..n], val.chars().count())
}

fn required(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> FilingResult<String> {
    lookup(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| FilingError::Config(format!("{key} environment variable is required")))
}

fn parsed<T: FromStr>(
    lookup: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> FilingResult<T> {
    match lookup(key) {
        Some(raw) if !raw.is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| FilingError::Config(format!("{key} must be a number, got '{raw}'"))),
        _ => Ok(default),
    }
}
