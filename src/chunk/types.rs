//! Chunk and chunk-result types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkType {
    Setup,
    Implementation,
    Testing,
    ReviewFix,
    Validation,
}

/// An atomic, ordered unit of work carved from the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub order: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub chunk_type: ChunkType,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub plan_path: String,
    pub estimated_tokens: u64,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expected_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expected_modifications: Vec<String>,
}

impl Chunk {
    pub fn body_filename(&self) -> String {
        format!("{}.md", self.id)
    }
}

/// Lifecycle status of a chunk within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl ChunkStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

/// Per-chunk execution record attached to a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkResult {
    pub chunk_id: String,
    pub status: ChunkStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handoff_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub compile_attempts: u32,
    #[serde(default)]
    pub retry_count: u32,
    /// The handoff's "Context for Next Chunk" section, carried forward so
    /// the next chunk's prompt can include it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_for_next: Option<String>,
    /// The handoff's "Integration Notes" section, carried forward the same
    /// way.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration_notes: Option<String>,
}

impl ChunkResult {
    pub fn pending(chunk_id: &str) -> Self {
        Self {
            chunk_id: chunk_id.to_string(),
            status: ChunkStatus::Pending,
            start_time: None,
            end_time: None,
            handoff_path: None,
            commit_hash: None,
            error: None,
            compile_attempts: 0,
            retry_count: 0,
            context_for_next: None,
            integration_notes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_status_terminal_classification() {
        assert!(!ChunkStatus::Pending.is_terminal());
        assert!(!ChunkStatus::InProgress.is_terminal());
        assert!(ChunkStatus::Completed.is_terminal());
        assert!(ChunkStatus::Failed.is_terminal());
        assert!(ChunkStatus::Skipped.is_terminal());
    }

    #[test]
    fn chunk_result_pending_has_no_timestamps() {
        let result = ChunkResult::pending("00-setup");
        assert_eq!(result.status, ChunkStatus::Pending);
        assert!(result.start_time.is_none());
        assert!(result.end_time.is_none());
    }

    #[test]
    fn chunk_type_serializes_kebab_case() {
        let json = serde_json::to_string(&ChunkType::ReviewFix).unwrap();
        assert_eq!(json, "\"review-fix\"");
    }
}
