pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, GraphConfig, ModelConfig};
pub use error::{FilingError, FilingResult};
pub use types::{
    document_id, DocumentIdStrategy, DocumentSink, EmbeddingRecord, FilingDocument, WriteStats,
    DOCUMENT_TYPE,
};
