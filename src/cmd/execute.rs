//! `adw execute <plan> [--resume] [--branch <name>] [--repo <path>]`.
//!
//! Resolves the plan's worktree to a fixed location under
//! `<repoRoot>/.worktrees/<planName>` on a `feature/<planName>` branch,
//! created via `git worktree add` if it doesn't exist yet, or attached to
//! as-is on `--resume`.

use crate::config::PipelineConfig;
use crate::orchestrator::{Orchestrator, WorkerCommand};
use crate::paths;
use crate::ui;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// The plan's file stem, used both as its worktree directory name and as
/// the suffix of its default branch name.
fn plan_name(plan: &std::path::Path) -> Result<String> {
    plan.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .with_context(|| format!("plan path {} has no file stem to name a worktree after", plan.display()))
}

pub async fn run(plan: PathBuf, resume: bool, branch: Option<String>, repo: PathBuf) -> Result<()> {
    let name = plan_name(&plan)?;
    let branch = branch.unwrap_or_else(|| format!("feature/{name}"));

    let repo_root = crate::git_ops::repo_root(&repo)
        .await
        .with_context(|| format!("resolving repository root from {}", repo.display()))?;
    let worktree = repo_root.join(".worktrees").join(&name);

    if !resume {
        crate::git_ops::ensure_worktree(&repo_root, &worktree, &branch)
            .await
            .with_context(|| format!("creating worktree at {}", worktree.display()))?;
    } else if !worktree.join(".git").exists() {
        bail!(
            "--resume was given but no worktree was found at {}; run without --resume first",
            worktree.display()
        );
    }

    let plan_dest = paths::plan_path(&worktree);
    if !resume {
        std::fs::create_dir_all(paths::pipeline_dir(&worktree))
            .with_context(|| format!("creating {}", paths::pipeline_dir(&worktree).display()))?;
        let plan_text =
            std::fs::read_to_string(&plan).with_context(|| format!("reading plan at {}", plan.display()))?;
        std::fs::write(&plan_dest, &plan_text)?;
    } else if !plan_dest.exists() {
        bail!(
            "--resume was given but no plan was found at {}; run without --resume first",
            plan_dest.display()
        );
    }

    let config = PipelineConfig::from_env()?;
    let worker_command = WorkerCommand::from_env();
    let orchestrator = Orchestrator::new(worktree.clone(), config, worker_command);

    let mut state = orchestrator.load_or_init(&plan_dest.to_string_lossy(), &branch)?;

    if matches!(state.status, crate::state::PipelineStatus::Initialized) {
        let validation = orchestrator.run_chunking(&mut state)?;
        if !validation.is_valid() {
            for issue in &validation.issues {
                eprintln!("[{}] {}", issue.code, issue.message);
            }
            bail!(
                "plan chunking produced {} error(s); fix the plan and try again",
                validation.error_count()
            );
        }
    }

    orchestrator.run_to_completion(&mut state).await?;

    let report = crate::report::build_report(&state);
    println!("{}", ui::render_report(&report));
    Ok(())
}
