//! Pipeline state: a single JSON document (`state.json`) that is the
//! authoritative record of a run's progress, rewritten atomically after
//! every transition so a crashed orchestrator can resume exactly where it
//! left off.
//!
//! All transitions here are pure functions over `PipelineState` — no I/O.
//! `StateStore` is the thin wrapper that persists it to disk.

use crate::chunk::{Chunk, ChunkResult, ChunkStatus};
use crate::errors::OrchestratorError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Initialized,
    Chunking,
    Executing,
    Completed,
    Failed,
}

/// One chunk id paired with its result, kept in insertion order.
///
/// Chunk ids are not lexically sortable (`01a`, `01b`, ... `01z`, `01aa`),
/// so the state document stores results as an ordered list of pairs rather
/// than a JSON object, and execution order is always the order chunks were
/// produced in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkResultEntry {
    pub id: String,
    pub result: ChunkResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub run_id: uuid::Uuid,
    pub status: PipelineStatus,
    pub plan_path: String,
    pub worktree: PathBuf,
    pub branch: String,
    #[serde(default)]
    pub chunks: Vec<Chunk>,
    #[serde(default)]
    pub results: Vec<ChunkResultEntry>,
    /// Non-empty iff exactly one chunk result is `in_progress`.
    #[serde(default)]
    pub current_chunk_id: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    /// Set only when `status` lands on a terminal value.
    #[serde(default)]
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl PipelineState {
    /// Create a fresh state immediately after a worktree has been prepared,
    /// before chunking has run. Every run gets its own id so a report can
    /// name the run it describes.
    pub fn initialize(
        plan_path: impl Into<String>,
        worktree: impl Into<PathBuf>,
        branch: impl Into<String>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4(),
            status: PipelineStatus::Initialized,
            plan_path: plan_path.into(),
            worktree: worktree.into(),
            branch: branch.into(),
            chunks: Vec::new(),
            results: Vec::new(),
            current_chunk_id: None,
            created_at: now,
            updated_at: now,
            end_time: None,
            failure_reason: None,
        }
    }

    pub fn start_chunking(&mut self, now: chrono::DateTime<chrono::Utc>) {
        self.status = PipelineStatus::Chunking;
        self.updated_at = now;
    }

    /// Record the chunker's output and move into the executing state, each
    /// chunk starting out pending.
    pub fn start_execution(
        &mut self,
        chunks: Vec<Chunk>,
        now: chrono::DateTime<chrono::Utc>,
    ) {
        self.results = chunks
            .iter()
            .map(|c| ChunkResultEntry {
                id: c.id.clone(),
                result: ChunkResult::pending(&c.id),
            })
            .collect();
        self.chunks = chunks;
        self.status = PipelineStatus::Executing;
        self.updated_at = now;
    }

    /// Update one chunk's result in place. Returns an error if no such
    /// chunk exists in this run. `currentChunkId` tracks whichever chunk is
    /// `in_progress` — set here, not by the caller.
    pub fn update_chunk_status(
        &mut self,
        chunk_id: &str,
        result: ChunkResult,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), OrchestratorError> {
        let entry = self
            .results
            .iter_mut()
            .find(|e| e.id == chunk_id)
            .ok_or_else(|| OrchestratorError::UnknownChunk(chunk_id.to_string()))?;
        entry.result = result;

        self.current_chunk_id = self
            .results
            .iter()
            .find(|e| e.result.status == ChunkStatus::InProgress)
            .map(|e| e.id.clone());
        self.updated_at = now;
        Ok(())
    }

    pub fn complete(&mut self, now: chrono::DateTime<chrono::Utc>) {
        self.status = PipelineStatus::Completed;
        self.failure_reason = None;
        self.updated_at = now;
        self.end_time = Some(now);
    }

    pub fn fail(&mut self, reason: impl Into<String>, now: chrono::DateTime<chrono::Utc>) {
        self.status = PipelineStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.updated_at = now;
        self.end_time = Some(now);
    }

    /// The next chunk whose dependencies are all completed and which is
    /// itself still pending, in chunk order. `None` if nothing is runnable
    /// right now (either done, or blocked on a dependency).
    pub fn next_pending_chunk(&self) -> Option<&Chunk> {
        self.chunks.iter().find(|chunk| {
            let status = self.status_of(&chunk.id);
            status == Some(ChunkStatus::Pending)
                && chunk
                    .depends_on
                    .iter()
                    .all(|dep| self.status_of(dep) == Some(ChunkStatus::Completed))
        })
    }

    pub fn status_of(&self, chunk_id: &str) -> Option<ChunkStatus> {
        self.results
            .iter()
            .find(|e| e.id == chunk_id)
            .map(|e| e.result.status)
    }

    pub fn result_of(&self, chunk_id: &str) -> Option<&ChunkResult> {
        self.results.iter().find(|e| e.id == chunk_id).map(|e| &e.result)
    }

    /// `(completed, total)` across all chunks in the run.
    pub fn progress(&self) -> (usize, usize) {
        let completed = self
            .results
            .iter()
            .filter(|e| e.result.status == ChunkStatus::Completed)
            .count();
        (completed, self.results.len())
    }

    /// A run can still make forward progress if it isn't already terminal,
    /// no chunk has failed, and at least one chunk is runnable or in
    /// progress.
    pub fn can_continue(&self) -> bool {
        if matches!(self.status, PipelineStatus::Completed | PipelineStatus::Failed) {
            return false;
        }
        if self.results.iter().any(|e| e.result.status == ChunkStatus::Failed) {
            return false;
        }
        self.next_pending_chunk().is_some()
            || self
                .results
                .iter()
                .any(|e| e.result.status == ChunkStatus::InProgress)
    }
}

/// Loads/saves `PipelineState` as `state.json` under the worktree's
/// `.pipeline/` directory.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(worktree: &Path) -> Self {
        Self {
            path: crate::paths::state_path(worktree),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> Result<PipelineState, OrchestratorError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            OrchestratorError::Other(anyhow::anyhow!(
                "failed to read state file at {}: {e}",
                self.path.display()
            ))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            OrchestratorError::Other(anyhow::anyhow!(
                "failed to parse state file at {}: {e}",
                self.path.display()
            ))
        })
    }

    /// Write `state.json` atomically: write to a sibling temp file, then
    /// rename over the real path, so a crash mid-write never leaves a
    /// truncated state file behind.
    pub fn save(&self, state: &PipelineState) -> Result<(), OrchestratorError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                OrchestratorError::Other(anyhow::anyhow!(
                    "failed to create {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(state).map_err(|e| {
            OrchestratorError::Other(anyhow::anyhow!("failed to serialize state: {e}"))
        })?;
        std::fs::write(&tmp_path, body).map_err(|e| {
            OrchestratorError::Other(anyhow::anyhow!(
                "failed to write {}: {e}",
                tmp_path.display()
            ))
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            OrchestratorError::Other(anyhow::anyhow!(
                "failed to rename {} to {}: {e}",
                tmp_path.display(),
                self.path.display()
            ))
        })?;
        tracing::debug!(path = %self.path.display(), "wrote pipeline state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkType;

    fn now() -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc)
    }

    fn chunk(id: &str, depends_on: Vec<&str>) -> Chunk {
        Chunk {
            id: id.to_string(),
            order: 0,
            name: id.to_string(),
            chunk_type: ChunkType::Implementation,
            depends_on: depends_on.into_iter().map(str::to_string).collect(),
            plan_path: format!("{id}.md"),
            estimated_tokens: 10,
            description: String::new(),
            expected_files: vec![],
            expected_modifications: vec![],
        }
    }

    #[test]
    fn initialize_starts_in_initialized_status() {
        let state = PipelineState::initialize("plan.md", "/wt", "adw/run", now());
        assert_eq!(state.status, PipelineStatus::Initialized);
        assert!(state.chunks.is_empty());
    }

    #[test]
    fn start_execution_seeds_pending_results_in_order() {
        let mut state = PipelineState::initialize("plan.md", "/wt", "adw/run", now());
        state.start_chunking(now());
        let chunks = vec![chunk("00-setup", vec![]), chunk("01a-db", vec!["00-setup"])];
        state.start_execution(chunks, now());
        assert_eq!(state.status, PipelineStatus::Executing);
        assert_eq!(state.results.len(), 2);
        assert_eq!(state.results[0].id, "00-setup");
        assert_eq!(state.results[0].result.status, ChunkStatus::Pending);
    }

    #[test]
    fn next_pending_chunk_respects_dependencies() {
        let mut state = PipelineState::initialize("plan.md", "/wt", "adw/run", now());
        let chunks = vec![chunk("00-setup", vec![]), chunk("01a-db", vec!["00-setup"])];
        state.start_execution(chunks, now());

        assert_eq!(state.next_pending_chunk().unwrap().id, "00-setup");

        let mut completed = ChunkResult::pending("00-setup");
        completed.status = ChunkStatus::Completed;
        state.update_chunk_status("00-setup", completed, now()).unwrap();

        assert_eq!(state.next_pending_chunk().unwrap().id, "01a-db");
    }

    #[test]
    fn update_chunk_status_rejects_unknown_chunk() {
        let mut state = PipelineState::initialize("plan.md", "/wt", "adw/run", now());
        let result = state.update_chunk_status("ghost", ChunkResult::pending("ghost"), now());
        assert!(matches!(result, Err(OrchestratorError::UnknownChunk(_))));
    }

    #[test]
    fn progress_counts_completed_chunks() {
        let mut state = PipelineState::initialize("plan.md", "/wt", "adw/run", now());
        let chunks = vec![chunk("00-setup", vec![]), chunk("01a-db", vec!["00-setup"])];
        state.start_execution(chunks, now());
        assert_eq!(state.progress(), (0, 2));

        let mut completed = ChunkResult::pending("00-setup");
        completed.status = ChunkStatus::Completed;
        state.update_chunk_status("00-setup", completed, now()).unwrap();
        assert_eq!(state.progress(), (1, 2));
    }

    #[test]
    fn can_continue_is_false_once_completed() {
        let mut state = PipelineState::initialize("plan.md", "/wt", "adw/run", now());
        state.start_execution(vec![chunk("00-setup", vec![])], now());
        assert!(state.can_continue());
        state.complete(now());
        assert!(!state.can_continue());
    }

    #[test]
    fn can_continue_is_true_while_a_chunk_is_in_progress() {
        let mut state = PipelineState::initialize("plan.md", "/wt", "adw/run", now());
        state.start_execution(vec![chunk("00-setup", vec![])], now());
        let mut in_progress = ChunkResult::pending("00-setup");
        in_progress.status = ChunkStatus::InProgress;
        state.update_chunk_status("00-setup", in_progress, now()).unwrap();
        assert!(state.can_continue());
    }

    #[test]
    fn can_continue_is_false_once_any_chunk_has_failed_even_if_status_is_still_executing() {
        let mut state = PipelineState::initialize("plan.md", "/wt", "adw/run", now());
        state.start_execution(vec![chunk("00-setup", vec![]), chunk("01a-db", vec!["00-setup"])], now());
        let mut failed = ChunkResult::pending("00-setup");
        failed.status = ChunkStatus::Failed;
        state.update_chunk_status("00-setup", failed, now()).unwrap();
        assert_eq!(state.status, PipelineStatus::Executing);
        assert!(!state.can_continue());
    }

    #[test]
    fn save_then_load_round_trips_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        assert!(!store.exists());

        let mut state = PipelineState::initialize("plan.md", dir.path(), "adw/run", now());
        state.start_execution(vec![chunk("00-setup", vec![])], now());
        store.save(&state).unwrap();

        assert!(store.exists());
        let loaded = store.load().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn fail_records_reason_and_status() {
        let mut state = PipelineState::initialize("plan.md", "/wt", "adw/run", now());
        state.fail("worker timed out", now());
        assert_eq!(state.status, PipelineStatus::Failed);
        assert_eq!(state.failure_reason.as_deref(), Some("worker timed out"));
    }

    #[test]
    fn each_run_gets_a_distinct_run_id() {
        let a = PipelineState::initialize("plan.md", "/wt", "adw/run", now());
        let b = PipelineState::initialize("plan.md", "/wt", "adw/run", now());
        assert_ne!(a.run_id, b.run_id);
    }

    #[test]
    fn current_chunk_id_is_set_while_a_chunk_is_in_progress_and_cleared_after() {
        let mut state = PipelineState::initialize("plan.md", "/wt", "adw/run", now());
        state.start_execution(vec![chunk("00-setup", vec![])], now());
        assert_eq!(state.current_chunk_id, None);

        let mut in_progress = ChunkResult::pending("00-setup");
        in_progress.status = ChunkStatus::InProgress;
        state.update_chunk_status("00-setup", in_progress, now()).unwrap();
        assert_eq!(state.current_chunk_id.as_deref(), Some("00-setup"));

        let mut completed = ChunkResult::pending("00-setup");
        completed.status = ChunkStatus::Completed;
        state.update_chunk_status("00-setup", completed, now()).unwrap();
        assert_eq!(state.current_chunk_id, None);
    }

    #[test]
    fn end_time_is_only_set_on_terminal_transitions() {
        let mut state = PipelineState::initialize("plan.md", "/wt", "adw/run", now());
        assert_eq!(state.end_time, None);
        state.start_execution(vec![chunk("00-setup", vec![])], now());
        assert_eq!(state.end_time, None);
        state.complete(now());
        assert_eq!(state.end_time, Some(now()));
    }

    #[test]
    fn end_time_is_set_on_fail() {
        let mut state = PipelineState::initialize("plan.md", "/wt", "adw/run", now());
        state.fail("worker timed out", now());
        assert_eq!(state.end_time, Some(now()));
    }
}
