pub mod archive;
pub mod chunker;
pub mod embedder;
pub mod pipeline;
pub mod staging;
pub mod throttle;

pub use archive::{fetch_archive, load_filings, open_archive, ArchiveContents};
pub use chunker::{reassemble, ChunkConfig, TextChunk, TextChunker};
pub use embedder::BatchEmbedder;
pub use pipeline::{FailurePolicy, IngestPipeline, IngestReport};
pub use staging::{read_staging, CsvStaging};
pub use throttle::{RateLimiter, RetryPolicy};
