//! Handoff document types.
//!
//! A handoff is the artifact a worker leaves behind at the end of a chunk:
//! a Markdown file with a fixed set of sections plus an embedded context-
//! usage readout. When a worker exits without writing one, the supervisor
//! falls back to a recovered handoff reconstructed from git history
//! ([`crate::handoff::recovery`]) — `source` records which happened.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextUsage {
    pub final_pct: Option<u8>,
    pub peak_pct: Option<u8>,
    pub final_tokens: Option<u64>,
    pub peak_tokens: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub decision: String,
    pub rationale: Option<String>,
    pub tradeoff: Option<String>,
}

/// One `##`/`###` section, in document order, with its body text verbatim
/// (used both for rendering and for section-presence checks during
/// validation). `title` is the normalized heading text — leading numbering
/// and a trailing parenthetical stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub body: String,
}

/// Distinguishes a handoff parsed from worker output from one recovered by
/// the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffSource {
    Worker,
    Recovered,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Handoff {
    pub source: HandoffSource,
    pub from_chunk: Option<String>,
    pub to_chunk: Option<String>,
    pub sections: Vec<Section>,
    pub completed_items: Vec<String>,
    pub files_created: Vec<String>,
    pub files_modified: Vec<String>,
    pub decisions: Vec<Decision>,
    pub context_for_next: String,
    pub integration_notes: String,
    pub remaining_work: Option<String>,
    pub blockers: Option<String>,
    pub test_status: Option<String>,
    pub context_usage: Option<ContextUsage>,
    pub raw: String,
}

impl Handoff {
    pub fn is_recovered(&self) -> bool {
        matches!(self.source, HandoffSource::Recovered)
    }

    /// Finds a section whose normalized title contains `needle`
    /// case-insensitively.
    pub fn section(&self, needle: &str) -> Option<&Section> {
        let needle = needle.to_lowercase();
        self.sections
            .iter()
            .find(|s| s.title.to_lowercase().contains(&needle))
    }
}

/// The six sections every worker-written handoff is expected to carry,
/// matched case-insensitively by substring against the normalized heading.
pub const REQUIRED_SECTIONS: &[&str] = &[
    "what i completed",
    "files created",
    "files modified",
    "key decisions made",
    "context for next chunk",
    "integration notes",
];

/// Sections a handoff may optionally carry. Never required, never scored.
pub const OPTIONAL_SECTIONS: &[&str] = &["remaining work", "blockers", "tests status", "context usage"];
