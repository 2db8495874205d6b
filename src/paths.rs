//! Pure path-composition for the `.pipeline/` tree under a worktree.
//!
//! No filesystem I/O happens here — every function only joins strings.
//! Keeping this side-effect free means the orchestrator, the worker
//! supervisor, and tests can all agree on where an artifact lives without
//! any of them having to create it first.

use std::path::{Path, PathBuf};

/// Which of the five fixed phases a chunk id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Context,
    Implementation,
    UnitTests,
    BranchReview,
    FinalValidation,
}

impl Phase {
    /// Map a chunk id's numeric prefix to its phase
    ///
    /// `00-` and `01[a-z]?-` are implementation; `02-`/`02[a-z]-` are unit
    /// tests; `03-` is branch review; `04-` is final validation; anything
    /// else defaults to implementation.
    pub fn for_chunk_id(chunk_id: &str) -> Self {
        let prefix = chunk_id.split('-').next().unwrap_or(chunk_id);
        match prefix {
            "00" => Phase::Implementation,
            "02" => Phase::UnitTests,
            "03" => Phase::BranchReview,
            "04" => Phase::FinalValidation,
            p if p.starts_with("01") => Phase::Implementation,
            p if p.starts_with("02") => Phase::UnitTests,
            _ => Phase::Implementation,
        }
    }
}

pub fn pipeline_dir(worktree: &Path) -> PathBuf {
    worktree.join(".pipeline")
}

pub fn plan_path(worktree: &Path) -> PathBuf {
    pipeline_dir(worktree).join("plan.md")
}

pub fn state_path(worktree: &Path) -> PathBuf {
    pipeline_dir(worktree).join("state.json")
}

pub fn phases_dir(worktree: &Path) -> PathBuf {
    pipeline_dir(worktree).join("Phases")
}

pub fn context_dir(worktree: &Path) -> PathBuf {
    phases_dir(worktree).join("00-CONTEXT")
}

pub fn plan_context_path(worktree: &Path) -> PathBuf {
    context_dir(worktree).join("plan_context.md")
}

pub fn chunks_dir(worktree: &Path) -> PathBuf {
    context_dir(worktree).join("Chunks")
}

pub fn chunk_body_path(worktree: &Path, chunk_id: &str) -> PathBuf {
    chunks_dir(worktree).join(format!("{chunk_id}.md"))
}

/// Implementation chunks each get a subdirectory named after the chunk id
/// with its first dash turned into an underscore.
pub fn implementation_chunk_dir(worktree: &Path, chunk_id: &str) -> PathBuf {
    let dir_name = match chunk_id.split_once('-') {
        Some((head, tail)) => format!("{head}_{tail}"),
        None => chunk_id.to_string(),
    };
    phases_dir(worktree).join("01-IMPLEMENTATION").join(dir_name)
}

pub fn work_prompt_path(worktree: &Path, chunk_id: &str) -> PathBuf {
    implementation_chunk_dir(worktree, chunk_id).join("work_prompt.md")
}

pub fn worker_log_path(worktree: &Path, chunk_id: &str) -> PathBuf {
    match Phase::for_chunk_id(chunk_id) {
        Phase::Implementation => implementation_chunk_dir(worktree, chunk_id).join("worker.log"),
        other => terminal_phase_dir(worktree, other).join("worker.log"),
    }
}

pub fn handoff_path(worktree: &Path, chunk_id: &str) -> PathBuf {
    match Phase::for_chunk_id(chunk_id) {
        Phase::Implementation => implementation_chunk_dir(worktree, chunk_id).join("handoff.md"),
        other => terminal_phase_dir(worktree, other).join("handoff.md"),
    }
}

/// The three terminal phases (unit tests, branch review, final validation)
/// each share one directory — they are single-worker phases, not per-chunk.
pub fn terminal_phase_dir(worktree: &Path, phase: Phase) -> PathBuf {
    let name = match phase {
        Phase::UnitTests => "02-UNIT-TESTS",
        Phase::BranchReview => "03-BRANCH-REVIEW",
        Phase::FinalValidation => "04-FINAL-VALIDATION",
        Phase::Context | Phase::Implementation => {
            unreachable!("terminal_phase_dir called with a non-terminal phase")
        }
    };
    phases_dir(worktree).join(name)
}

pub fn terminal_phase_prompt_path(worktree: &Path, phase: Phase) -> PathBuf {
    terminal_phase_dir(worktree, phase).join("prompt.md")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_for_chunk_id_maps_setup_and_implementation() {
        assert_eq!(Phase::for_chunk_id("00-setup"), Phase::Implementation);
        assert_eq!(Phase::for_chunk_id("01a-database"), Phase::Implementation);
        assert_eq!(Phase::for_chunk_id("01z-cleanup"), Phase::Implementation);
    }

    #[test]
    fn phase_for_chunk_id_maps_terminal_phases() {
        assert_eq!(Phase::for_chunk_id("02-unit-tests"), Phase::UnitTests);
        assert_eq!(Phase::for_chunk_id("02a-extra"), Phase::UnitTests);
        assert_eq!(Phase::for_chunk_id("03-branch-review"), Phase::BranchReview);
        assert_eq!(
            Phase::for_chunk_id("04-final-validation"),
            Phase::FinalValidation
        );
    }

    #[test]
    fn phase_for_chunk_id_defaults_to_implementation() {
        assert_eq!(Phase::for_chunk_id("99-ghost"), Phase::Implementation);
    }

    #[test]
    fn implementation_chunk_dir_replaces_first_dash_only() {
        let wt = Path::new("/repo");
        let dir = implementation_chunk_dir(wt, "01a-phase-1-database");
        assert_eq!(
            dir,
            wt.join(".pipeline/Phases/01-IMPLEMENTATION/01a_phase-1-database")
        );
    }

    #[test]
    fn terminal_phase_paths_share_one_directory() {
        let wt = Path::new("/repo");
        let prompt = terminal_phase_prompt_path(wt, Phase::UnitTests);
        let log = worker_log_path(wt, "02-unit-tests");
        let handoff = handoff_path(wt, "02-unit-tests");
        assert_eq!(prompt.parent(), log.parent());
        assert_eq!(log.parent(), handoff.parent());
        assert_eq!(
            prompt,
            wt.join(".pipeline/Phases/02-UNIT-TESTS/prompt.md")
        );
    }

    #[test]
    fn plan_and_state_paths_are_under_pipeline_dir() {
        let wt = Path::new("/repo");
        assert_eq!(plan_path(wt), wt.join(".pipeline/plan.md"));
        assert_eq!(state_path(wt), wt.join(".pipeline/state.json"));
    }

    #[test]
    fn chunk_body_path_uses_chunk_id_as_filename() {
        let wt = Path::new("/repo");
        assert_eq!(
            chunk_body_path(wt, "01a-database"),
            wt.join(".pipeline/Phases/00-CONTEXT/Chunks/01a-database.md")
        );
    }
}
