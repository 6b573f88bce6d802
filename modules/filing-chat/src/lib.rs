pub mod error;
pub mod finetune;
pub mod qa;
pub mod server;
pub mod session;

pub use error::{ChatError, FineTuneError};
pub use finetune::{read_pairs, write_jsonl, FineTuneExample, QaPair};
pub use qa::{ensure_read_only, GraphQa, QaAnswer, ReadQuery, GRAPH_SCHEMA};
pub use server::{router, AppState};
pub use session::{ChatSession, APOLOGY, EXAMPLE_PROMPTS};
