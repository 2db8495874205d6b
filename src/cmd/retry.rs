//! `adw retry <chunkId> [path]`.

use crate::config::PipelineConfig;
use crate::orchestrator::{Orchestrator, WorkerCommand};
use crate::state::StateStore;
use crate::ui;
use anyhow::{bail, Result};
use std::path::PathBuf;

pub async fn run(chunk_id: String, worktree: PathBuf) -> Result<()> {
    let store = StateStore::new(&worktree);
    if !store.exists() {
        bail!("no pipeline state found at {}", worktree.display());
    }

    let config = PipelineConfig::from_env()?;
    let worker_command = WorkerCommand::from_env();
    let orchestrator = Orchestrator::new(worktree, config, worker_command);

    let mut state = store.load()?;
    orchestrator.retry_chunk(&mut state, &chunk_id).await?;

    let report = crate::report::build_report(&state);
    println!("{}", ui::render_report(&report));
    Ok(())
}
