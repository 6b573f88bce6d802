use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilingError {
    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Malformed filing {filing_id}: {reason}")]
    MalformedFiling { filing_id: String, reason: String },

    #[error("Chunking error: {0}")]
    Chunking(String),

    #[error("Embedding error for {company}: {source}")]
    Embedding {
        company: String,
        #[source]
        source: ai_client::AiError,
    },

    #[error("Graph store error: {0}")]
    Store(String),

    #[error("Staging file error: {0}")]
    Staging(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type FilingResult<T> = std::result::Result<T, FilingError>;
