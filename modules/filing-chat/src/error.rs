use ai_client::AiError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Model call failed: {0}")]
    Upstream(#[from] AiError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Refusing to run query: {0}")]
    UnsafeQuery(String),

    #[error("Graph query failed: {0}")]
    Query(String),
}

#[derive(Error, Debug)]
pub enum FineTuneError {
    #[error("Example {index} has no {role} message")]
    MissingRole { index: usize, role: &'static str },

    #[error("Line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
