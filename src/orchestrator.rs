//! Top-level pipeline driver: chunk a plan, execute chunks in dependency
//! order inside a worktree, run the three terminal phases, and persist
//! state after every step so a crash can resume.

use crate::chunk::{chunk_plan, validate_chunks, ChunkResult, ChunkStatus};
use crate::compile::{detect_build_system, validate_with_self_heal};
use crate::config::PipelineConfig;
use crate::errors::OrchestratorError;
use crate::handoff::{self, Handoff};
use crate::paths::{self, Phase};
use crate::state::{PipelineState, StateStore};
use crate::worker::{self, WorkerSpec};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How the caller reaches an external worker binary. The pipeline itself
/// has no opinion on which AI CLI this is — it only needs a command plus
/// whatever fixed arguments that CLI requires to run non-interactively.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl WorkerCommand {
    /// `ADW_WORKER_COMMAND` / `ADW_WORKER_ARGS` (space-separated), falling
    /// back to `claude --print` if unset.
    pub fn from_env() -> Self {
        let program = std::env::var("ADW_WORKER_COMMAND").unwrap_or_else(|_| "claude".to_string());
        let args = std::env::var("ADW_WORKER_ARGS")
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_else(|_| vec!["--print".to_string()]);
        Self { program, args }
    }
}

pub struct Orchestrator {
    worktree: PathBuf,
    config: PipelineConfig,
    worker_command: WorkerCommand,
}

fn now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

/// Builds the "prior handoff" text threaded into a chunk's prompt from its
/// dependencies' already-persisted `context_for_next`/`integration_notes`.
/// `None` if no dependency left anything worth repeating.
fn prior_handoff_text(state: &PipelineState, chunk: &crate::chunk::Chunk) -> Option<String> {
    let mut parts = Vec::new();
    for dep in &chunk.depends_on {
        let Some(result) = state.result_of(dep) else {
            continue;
        };
        let mut section = String::new();
        if let Some(ctx) = &result.context_for_next {
            if !ctx.trim().is_empty() {
                section.push_str(&format!("**Context for Next Chunk** (from {dep}):\n{ctx}\n\n"));
            }
        }
        if let Some(notes) = &result.integration_notes {
            if !notes.trim().is_empty() {
                section.push_str(&format!("**Integration Notes** (from {dep}):\n{notes}\n"));
            }
        }
        if !section.is_empty() {
            parts.push(section);
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

impl Orchestrator {
    pub fn new(worktree: impl Into<PathBuf>, config: PipelineConfig, worker_command: WorkerCommand) -> Self {
        Self {
            worktree: worktree.into(),
            config,
            worker_command,
        }
    }

    fn store(&self) -> StateStore {
        StateStore::new(&self.worktree)
    }

    /// Load existing state if this worktree already has one (resume), or
    /// initialize a fresh run.
    pub fn load_or_init(&self, plan_path: &str, branch: &str) -> Result<PipelineState, OrchestratorError> {
        let store = self.store();
        if store.exists() {
            tracing::info!(worktree = %self.worktree.display(), "resuming existing pipeline state");
            return store.load();
        }
        let state = PipelineState::initialize(plan_path, &self.worktree, branch, now());
        store.save(&state)?;
        Ok(state)
    }

    /// Chunk the plan (already copied to `.pipeline/plan.md`), write each
    /// chunk's body under `Phases/00-CONTEXT/Chunks/`, and move state into
    /// `Executing`. Returns the chunk validation result so the caller can
    /// decide whether to proceed on warnings-only output.
    pub fn run_chunking(
        &self,
        state: &mut PipelineState,
    ) -> Result<crate::chunk::ValidationResult, OrchestratorError> {
        state.start_chunking(now());
        self.store().save(state)?;

        let plan_text = std::fs::read_to_string(paths::plan_path(&self.worktree)).map_err(|source| {
            crate::errors::ChunkerError::PlanReadFailed {
                path: paths::plan_path(&self.worktree),
                source,
            }
        })?;

        let chunks_with_bodies = chunk_plan(&plan_text);
        let chunks: Vec<_> = chunks_with_bodies.iter().map(|c| c.chunk.clone()).collect();
        let validation = validate_chunks(&chunks, &self.config);

        std::fs::create_dir_all(paths::chunks_dir(&self.worktree)).map_err(|source| {
            crate::errors::ChunkerError::ChunkWriteFailed {
                path: paths::chunks_dir(&self.worktree),
                source,
            }
        })?;
        for c in &chunks_with_bodies {
            let path = paths::chunk_body_path(&self.worktree, &c.chunk.id);
            std::fs::write(&path, &c.body).map_err(|source| crate::errors::ChunkerError::ChunkWriteFailed {
                path: path.clone(),
                source,
            })?;
        }

        let context_path = paths::plan_context_path(&self.worktree);
        if !context_path.exists() {
            let setup_body = chunks_with_bodies
                .iter()
                .find(|c| c.chunk.id == "00-setup")
                .map(|c| c.body.as_str())
                .unwrap_or_default();
            let doc = worker::plan_context_document(&self.config, setup_body);
            std::fs::write(&context_path, doc).map_err(|source| crate::errors::ChunkerError::ChunkWriteFailed {
                path: context_path.clone(),
                source,
            })?;
        }

        if !validation.is_valid() {
            return Ok(validation);
        }

        state.start_execution(chunks, now());
        self.store().save(state)?;
        Ok(validation)
    }

    /// Run every runnable chunk in dependency order, then the three
    /// terminal phases, persisting state after each step. Stops (without
    /// erroring) the moment nothing more is runnable, so a blocked run can
    /// be inspected rather than silently spinning.
    pub async fn run_to_completion(&self, state: &mut PipelineState) -> Result<(), OrchestratorError> {
        while let Some(chunk) = state.next_pending_chunk().cloned() {
            self.execute_chunk(state, &chunk.id).await?;
            self.store().save(state)?;
            if state.status_of(&chunk.id) == Some(ChunkStatus::Failed) {
                state.fail(format!("chunk {} failed", chunk.id), now());
                self.store().save(state)?;
                return Err(OrchestratorError::ChunkFailed {
                    chunk_id: chunk.id.clone(),
                    message: state
                        .result_of(&chunk.id)
                        .and_then(|r| r.error.clone())
                        .unwrap_or_default(),
                });
            }
        }

        for phase in [Phase::UnitTests, Phase::BranchReview, Phase::FinalValidation] {
            self.execute_terminal_phase(state, phase).await?;
            self.store().save(state)?;
        }

        state.complete(now());
        self.store().save(state)
    }

    /// Reset a failed chunk back to pending and run it again.
    pub async fn retry_chunk(&self, state: &mut PipelineState, chunk_id: &str) -> Result<(), OrchestratorError> {
        let status = state
            .status_of(chunk_id)
            .ok_or_else(|| OrchestratorError::UnknownChunk(chunk_id.to_string()))?;
        if status != ChunkStatus::Failed {
            return Err(OrchestratorError::NotFailed(chunk_id.to_string()));
        }
        let mut result = ChunkResult::pending(chunk_id);
        result.retry_count = state
            .result_of(chunk_id)
            .map(|r| r.retry_count + 1)
            .unwrap_or(1);
        state.update_chunk_status(chunk_id, result, now())?;
        self.store().save(state)?;

        self.execute_chunk(state, chunk_id).await?;
        self.store().save(state)
    }

    async fn execute_chunk(&self, state: &mut PipelineState, chunk_id: &str) -> Result<(), OrchestratorError> {
        let chunk = state
            .chunks
            .iter()
            .find(|c| c.id == chunk_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::UnknownChunk(chunk_id.to_string()))?;

        let mut in_progress = state.result_of(chunk_id).cloned().unwrap_or_else(|| ChunkResult::pending(chunk_id));
        in_progress.status = ChunkStatus::InProgress;
        in_progress.start_time = Some(now());
        state.update_chunk_status(chunk_id, in_progress.clone(), now())?;
        self.store().save(state)?;

        let chunk_body = std::fs::read_to_string(paths::chunk_body_path(&self.worktree, chunk_id))
            .unwrap_or_default();
        let plan_context = std::fs::read_to_string(paths::plan_context_path(&self.worktree)).unwrap_or_default();
        let prior_handoff = prior_handoff_text(state, &chunk);
        let prompt = worker::implementation_prompt(&chunk, &chunk_body, &plan_context, prior_handoff.as_deref());

        let work_dir = paths::implementation_chunk_dir(&self.worktree, chunk_id);
        std::fs::create_dir_all(&work_dir).map_err(|source| {
            crate::errors::WorkerError::InputWriteFailed {
                path: work_dir.clone(),
                source,
            }
        })?;
        let prompt_path = paths::work_prompt_path(&self.worktree, chunk_id);
        std::fs::write(&prompt_path, &prompt).map_err(|source| crate::errors::WorkerError::InputWriteFailed {
            path: prompt_path.clone(),
            source,
        })?;

        let log_path = paths::worker_log_path(&self.worktree, chunk_id);
        let handoff_path = paths::handoff_path(&self.worktree, chunk_id);
        if !handoff_path.exists() {
            let next_chunk_id = state
                .chunks
                .iter()
                .find(|c| c.depends_on.iter().any(|d| d == chunk_id))
                .map(|c| c.id.as_str());
            let template = worker::handoff_template(chunk_id, next_chunk_id);
            std::fs::write(&handoff_path, template).map_err(|source| crate::errors::WorkerError::InputWriteFailed {
                path: handoff_path.clone(),
                source,
            })?;
        }

        let outcome = worker::run_worker(WorkerSpec {
            chunk_id,
            command: &self.worker_command.program,
            args: &self.worker_command.args,
            worktree: &self.worktree,
            prompt: &prompt,
            log_path: &log_path,
            handoff_path: &handoff_path,
            timeout: worker::timeout_for_phase(Phase::for_chunk_id(chunk_id)),
        })
        .await?;

        let (handoff, handoff_validation) =
            self.obtain_handoff(&handoff_path, chunk_id, outcome.handoff_written).await?;

        let mut result = in_progress;
        result.end_time = Some(now());
        result.handoff_path = Some(handoff_path.to_string_lossy().to_string());

        let mut failure_reasons = Vec::new();
        if outcome.timed_out {
            failure_reasons.push("worker timed out".to_string());
        }
        if !handoff_validation.is_valid() {
            failure_reasons.extend(handoff_validation.issues.iter().map(|i| i.message.clone()));
        }
        result.context_for_next = Some(handoff.context_for_next.clone());
        result.integration_notes = Some(handoff.integration_notes.clone());

        if chunk.chunk_type == crate::chunk::ChunkType::Implementation {
            match self.run_compile_check(chunk_id, &chunk.name).await {
                Ok(attempts) => result.compile_attempts = attempts,
                Err(message) => failure_reasons.push(message),
            }
        }

        let commit_hash = crate::git_ops::ensure_commit(
            &self.worktree,
            &crate::git_ops::chunk_commit_message(chunk_id, &chunk.name),
        )
        .await
        .map_err(|e| OrchestratorError::GitWorktreeFailed(e.to_string()))?;
        result.commit_hash = commit_hash;

        if failure_reasons.is_empty() {
            result.status = ChunkStatus::Completed;
        } else {
            result.status = ChunkStatus::Failed;
            result.error = Some(failure_reasons.join("; "));
        }

        state.update_chunk_status(chunk_id, result, now())
    }

    /// Runs the self-healing compile-validation loop for an implementation
    /// chunk. Returns the number of build attempts made, or an
    /// error message if the build is still failing once retries are
    /// exhausted.
    async fn run_compile_check(&self, chunk_id: &str, chunk_name: &str) -> Result<u32, String> {
        let build_system = detect_build_system(&self.worktree);
        let max_attempts = self.config.max_compile_fix_retries;
        let worktree = self.worktree.clone();
        let worker_command = self.worker_command.clone();

        let scheme = self.config.xcode_scheme.clone();
        let last_attempt = std::rc::Rc::new(std::cell::Cell::new(0u32));
        let last_attempt_handle = last_attempt.clone();
        let chunk_id_owned = chunk_id.to_string();
        let result = validate_with_self_heal(
            &self.worktree,
            &build_system,
            scheme.as_deref(),
            max_attempts,
            move |compile_result, attempt| {
                last_attempt_handle.set(attempt);
                let worktree = worktree.clone();
                let worker_command = worker_command.clone();
                let raw_output = compile_result.raw_output.clone();
                let chunk_id = chunk_id_owned.clone();
                async move {
                    let modified = crate::git_ops::diff_name_only(&worktree, "HEAD~5..HEAD")
                        .await
                        .unwrap_or_default();
                    let fix_prompt = worker::compile_fix_prompt(&raw_output, &modified, attempt, max_attempts);
                    let log_path = worktree.join(".pipeline/compile-fix.log");
                    let handoff_path = worktree.join(".pipeline/compile-fix-handoff.md");
                    worker::run_worker(WorkerSpec {
                        chunk_id: &format!("{chunk_id}-compile-fix"),
                        command: &worker_command.program,
                        args: &worker_command.args,
                        worktree: &worktree,
                        prompt: &fix_prompt,
                        log_path: &log_path,
                        handoff_path: &handoff_path,
                        timeout: std::time::Duration::from_secs(20 * 60),
                    })
                    .await
                    .map_err(|e| crate::errors::CompileError::FixWorkerSpawnFailed(e.to_string()))?;
                    crate::git_ops::ensure_commit(&worktree, "[compile-fix] address build errors")
                        .await
                        .map_err(|e| crate::errors::CompileError::Other(anyhow::anyhow!(e.to_string())))?;
                    Ok(())
                }
            },
        )
        .await
        .map_err(|e| format!("compile validation errored: {e}"))?;

        let attempts_made = if last_attempt.get() == 0 { 1 } else { last_attempt.get() + 1 };

        if result.success {
            Ok(attempts_made)
        } else {
            tracing::error!(
                chunk_id,
                chunk_name,
                errors = result.diagnostics.errors.len(),
                "build still failing after compile-fix retries exhausted"
            );
            Err(format!(
                "compile validation failed after {attempts_made} attempt(s): {} error(s)",
                result.diagnostics.errors.len()
            ))
        }
    }

    /// Parses the handoff a worker wrote, or synthesizes one from git
    /// history if the worker never actually wrote one. `handoff_created`
    /// is the supervisor's post-exit harvest signal; a
    /// pre-written template always exists on disk (see above), so plain
    /// file existence can't distinguish a real handoff from an untouched
    /// placeholder — only the supervisor's size/checkbox heuristic can.
    async fn obtain_handoff(
        &self,
        handoff_path: &Path,
        chunk_id: &str,
        handoff_created: bool,
    ) -> Result<(Handoff, crate::chunk::ValidationResult), OrchestratorError> {
        if handoff_created {
            if let Ok(raw) = std::fs::read_to_string(handoff_path) {
                let parsed = handoff::parse_handoff(&raw);
                let validation = handoff::validate_handoff(&parsed, &self.config);
                return Ok((parsed, validation));
            }
        }

        tracing::warn!(chunk_id, "no handoff found, recovering from git history");
        let progress = handoff::read_progress_file(&self.worktree);
        let log = crate::git_ops::log_oneline(&self.worktree, 10)
            .await
            .unwrap_or_default();
        let changed = crate::git_ops::diff_name_status(&self.worktree, "HEAD~5..HEAD")
            .await
            .unwrap_or_default();
        let recovered = handoff::recover_handoff(progress.as_deref(), &log, &changed);
        std::fs::write(handoff_path, &recovered.raw).map_err(|source| crate::errors::HandoffError::WriteFailed {
            path: handoff_path.to_path_buf(),
            source,
        })?;
        let validation = handoff::validate_handoff(&recovered, &self.config);
        Ok((recovered, validation))
    }

    async fn execute_terminal_phase(&self, state: &mut PipelineState, phase: Phase) -> Result<(), OrchestratorError> {
        let phase_id = match phase {
            Phase::UnitTests => "02-unit-tests",
            Phase::BranchReview => "03-branch-review",
            Phase::FinalValidation => "04-final-validation",
            _ => unreachable!("execute_terminal_phase called with a non-terminal phase"),
        };

        let instructions = match phase {
            Phase::UnitTests => "Run the full unit test suite and fix any failures you introduced.",
            Phase::BranchReview => "Review the full branch diff against the plan for correctness and completeness.",
            Phase::FinalValidation => "Run a full build and confirm the branch satisfies the plan end to end.",
            _ => unreachable!(),
        };

        let plan_context = std::fs::read_to_string(paths::plan_context_path(&self.worktree)).unwrap_or_default();
        let prompt = worker::terminal_phase_prompt(phase_id, instructions, &plan_context);

        let work_dir = paths::terminal_phase_dir(&self.worktree, phase);
        std::fs::create_dir_all(&work_dir).map_err(|source| crate::errors::WorkerError::InputWriteFailed {
            path: work_dir.clone(),
            source,
        })?;
        let prompt_path = paths::terminal_phase_prompt_path(&self.worktree, phase);
        std::fs::write(&prompt_path, &prompt).map_err(|source| crate::errors::WorkerError::InputWriteFailed {
            path: prompt_path.clone(),
            source,
        })?;

        let log_path = work_dir.join("worker.log");
        let handoff_path = work_dir.join("handoff.md");

        let outcome = worker::run_worker(WorkerSpec {
            chunk_id: phase_id,
            command: &self.worker_command.program,
            args: &self.worker_command.args,
            worktree: &self.worktree,
            prompt: &prompt,
            log_path: &log_path,
            handoff_path: &handoff_path,
            timeout: worker::timeout_for_phase(phase),
        })
        .await?;

        crate::git_ops::ensure_commit(&self.worktree, &format!("[{phase_id}] terminal phase"))
            .await
            .map_err(|e| OrchestratorError::GitWorktreeFailed(e.to_string()))?;

        if phase == Phase::FinalValidation {
            let build_system = detect_build_system(&self.worktree);
            let max_attempts = self.config.max_compile_fix_retries;
            let scheme = self.config.xcode_scheme.clone();
            let worktree = self.worktree.clone();
            let worker_command = self.worker_command.clone();
            let result = validate_with_self_heal(
                &self.worktree,
                &build_system,
                scheme.as_deref(),
                max_attempts,
                move |compile_result, attempt| {
                    let worktree = worktree.clone();
                    let worker_command = worker_command.clone();
                    let raw_output = compile_result.raw_output.clone();
                    async move {
                        let modified = crate::git_ops::diff_name_only(&worktree, "HEAD~5..HEAD")
                            .await
                            .unwrap_or_default();
                        let fix_prompt = worker::compile_fix_prompt(&raw_output, &modified, attempt, max_attempts);
                        let log_path = worktree.join(".pipeline/compile-fix.log");
                        let handoff_path = worktree.join(".pipeline/compile-fix-handoff.md");
                        worker::run_worker(WorkerSpec {
                            chunk_id: "final-validation-compile-fix",
                            command: &worker_command.program,
                            args: &worker_command.args,
                            worktree: &worktree,
                            prompt: &fix_prompt,
                            log_path: &log_path,
                            handoff_path: &handoff_path,
                            timeout: Duration::from_secs(20 * 60),
                        })
                        .await
                        .map_err(|e| crate::errors::CompileError::FixWorkerSpawnFailed(e.to_string()))?;
                        crate::git_ops::ensure_commit(&worktree, "[compile-fix] address build errors")
                            .await
                            .map_err(|e| crate::errors::CompileError::Other(anyhow::anyhow!(e.to_string())))?;
                        Ok(())
                    }
                },
            )
            .await?;

            if !result.success {
                tracing::error!(
                    errors = result.diagnostics.errors.len(),
                    "final validation build still failing after self-heal attempts"
                );
            }
        }

        let mut result = ChunkResult::pending(phase_id);
        result.status = if outcome.timed_out {
            ChunkStatus::Failed
        } else {
            ChunkStatus::Completed
        };
        result.start_time = Some(now());
        result.end_time = Some(now());
        result.handoff_path = Some(handoff_path.to_string_lossy().to_string());

        if !state.results.iter().any(|e| e.id == phase_id) {
            state.results.push(crate::state::ChunkResultEntry {
                id: phase_id.to_string(),
                result,
            });
        } else {
            state.update_chunk_status(phase_id, result, now())?;
        }
        Ok(())
    }
}
