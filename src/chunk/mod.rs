//! Plan chunking: turns a human-authored Markdown plan into an ordered,
//! dependency-chained list of chunks small enough for a single worker
//! session's context budget.

mod parser;
mod slug;
mod types;
mod validate;

pub use parser::{chunk_plan, estimate_tokens, ChunkWithBody};
pub use slug::{letter_sequence, slugify};
pub use types::{Chunk, ChunkResult, ChunkStatus, ChunkType};
pub use validate::{validate_chunks, Severity, ValidationIssue, ValidationResult};
