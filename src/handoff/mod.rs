//! Handoff documents: parsing, validation, and git-based recovery when a
//! worker exits without writing one.

pub mod parser;
pub mod recovery;
pub mod types;
pub mod validate;

pub use parser::parse_handoff;
pub use recovery::{read_progress_file, recover_handoff};
pub use types::{ContextUsage, Decision, Handoff, HandoffSource, Section};
pub use validate::{validate_handoff, validate_missing};
