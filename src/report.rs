//! Builds the human-facing run report printed by `adw status` and at the
//! end of `adw execute`.

use crate::chunk::ChunkStatus;
use crate::state::{PipelineState, PipelineStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub status: PipelineStatus,
    pub completed: usize,
    pub total: usize,
    pub failed_chunks: Vec<String>,
    pub recommendations: Vec<String>,
}

pub fn build_report(state: &PipelineState) -> Report {
    let (completed, total) = state.progress();
    let failed_chunks: Vec<String> = state
        .results
        .iter()
        .filter(|e| e.result.status == ChunkStatus::Failed)
        .map(|e| e.id.clone())
        .collect();

    let mut recommendations = Vec::new();
    match state.status {
        PipelineStatus::Failed => {
            for id in &failed_chunks {
                recommendations.push(format!("run `adw retry {id}` to retry the failed chunk"));
            }
            if failed_chunks.is_empty() {
                if let Some(reason) = &state.failure_reason {
                    recommendations.push(format!("run failed: {reason}"));
                }
            }
        }
        PipelineStatus::Executing => {
            if let Some(next) = state.next_pending_chunk() {
                recommendations.push(format!("next runnable chunk is '{}'", next.id));
            } else if !state.can_continue() && !failed_chunks.is_empty() {
                recommendations.push("one or more chunks are blocked on a failed dependency".to_string());
            }
        }
        PipelineStatus::Completed => {
            recommendations.push("run completed; review the branch and open a pull request".to_string());
        }
        PipelineStatus::Initialized | PipelineStatus::Chunking => {
            recommendations.push("run `adw execute` to continue".to_string());
        }
    }

    Report {
        status: state.status,
        completed,
        total,
        failed_chunks,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{Chunk, ChunkResult, ChunkType};

    fn state_with(statuses: Vec<(&str, ChunkStatus)>, pipeline_status: PipelineStatus) -> PipelineState {
        let now = chrono::Utc::now();
        let chunks: Vec<Chunk> = statuses
            .iter()
            .map(|(id, _)| Chunk {
                id: id.to_string(),
                order: 0,
                name: id.to_string(),
                chunk_type: ChunkType::Implementation,
                depends_on: vec![],
                plan_path: format!("{id}.md"),
                estimated_tokens: 10,
                description: String::new(),
                expected_files: vec![],
                expected_modifications: vec![],
            })
            .collect();
        let mut state = PipelineState::initialize("plan.md", "/wt", "adw/run", now);
        state.start_execution(chunks, now);
        for (id, status) in statuses {
            let mut result = ChunkResult::pending(id);
            result.status = status;
            state.update_chunk_status(id, result, now).unwrap();
        }
        state.status = pipeline_status;
        state
    }

    #[test]
    fn failed_run_recommends_retry_for_each_failed_chunk() {
        let state = state_with(
            vec![("00-setup", ChunkStatus::Completed), ("01a-db", ChunkStatus::Failed)],
            PipelineStatus::Failed,
        );
        let report = build_report(&state);
        assert_eq!(report.failed_chunks, vec!["01a-db".to_string()]);
        assert!(report.recommendations[0].contains("adw retry 01a-db"));
    }

    #[test]
    fn completed_run_has_completed_equal_total() {
        let state = state_with(
            vec![("00-setup", ChunkStatus::Completed), ("01a-db", ChunkStatus::Completed)],
            PipelineStatus::Completed,
        );
        let report = build_report(&state);
        assert_eq!(report.completed, 2);
        assert_eq!(report.total, 2);
        assert!(report.failed_chunks.is_empty());
    }

    #[test]
    fn executing_run_recommends_next_chunk() {
        let state = state_with(
            vec![("00-setup", ChunkStatus::Completed), ("01a-db", ChunkStatus::Pending)],
            PipelineStatus::Executing,
        );
        let report = build_report(&state);
        assert!(report.recommendations[0].contains("01a-db"));
    }
}
