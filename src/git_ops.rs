//! Git operations, all shelled out to the real `git` binary rather than a
//! bindings crate.
//!
//! The worktree-management surface this pipeline needs (`worktree add`,
//! targeted `diff --name-status`, `log --oneline`) maps directly onto git's
//! CLI and not cleanly onto a bindings API, so every call here is built the
//! way a secondary reference crate in this codebase's lineage builds its
//! own `run_command` helper: construct the argument vector, run it with the
//! working directory pinned to the repo, and surface combined stdout+stderr
//! in the error on failure.

use std::path::{Path, PathBuf};
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("failed to spawn git {args}: {source}")]
    Spawn {
        args: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {args} failed: {output}")]
    CommandFailed { args: String, output: String },
}

async fn run(repo: &Path, args: &[&str]) -> Result<String, GitError> {
    let joined = args.join(" ");
    let output = Command::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .await
        .map_err(|source| GitError::Spawn {
            args: joined.clone(),
            source,
        })?;

    if !output.status.success() {
        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        return Err(GitError::CommandFailed {
            args: joined,
            output: combined.trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// `git -C <repo> worktree add -b <branch> <worktree_path> [<start_point>]`
pub async fn worktree_add(
    repo: &Path,
    worktree_path: &Path,
    branch: &str,
    start_point: Option<&str>,
) -> Result<(), GitError> {
    let worktree_str = worktree_path.to_string_lossy().to_string();
    let mut args: Vec<&str> = vec![
        "-C",
        repo_str(repo),
        "worktree",
        "add",
        "-b",
        branch,
        worktree_str.as_str(),
    ];
    if let Some(start) = start_point {
        args.push(start);
    }
    run(repo, &args).await?;
    Ok(())
}

/// `git -C <repo> rev-parse --show-toplevel`
pub async fn repo_root(repo: &Path) -> Result<PathBuf, GitError> {
    let out = run(repo, &["-C", repo_str(repo), "rev-parse", "--show-toplevel"]).await?;
    Ok(PathBuf::from(out))
}

/// Ensure a worktree exists at `worktree_path` on `branch`, creating it if
/// necessary. If the directory is already a worktree
/// (e.g. a resumed run), this is a no-op. `git worktree add -b <branch>`
/// fails when the branch already exists (e.g. a previous run created it);
/// fall back to attaching the existing branch instead
pub async fn ensure_worktree(repo: &Path, worktree_path: &Path, branch: &str) -> Result<(), GitError> {
    if worktree_path.join(".git").exists() {
        return Ok(());
    }
    if worktree_add(repo, worktree_path, branch, None).await.is_ok() {
        return Ok(());
    }
    let worktree_str = worktree_path.to_string_lossy().to_string();
    run(
        repo,
        &["-C", repo_str(repo), "worktree", "add", worktree_str.as_str(), branch],
    )
    .await?;
    Ok(())
}

/// `git -C <repo> worktree remove --force <worktree_path>`
pub async fn worktree_remove(repo: &Path, worktree_path: &Path) -> Result<(), GitError> {
    let worktree_str = worktree_path.to_string_lossy().to_string();
    run(
        repo,
        &[
            "-C",
            repo_str(repo),
            "worktree",
            "remove",
            "--force",
            worktree_str.as_str(),
        ],
    )
    .await?;
    Ok(())
}

/// `git -C <worktree> rev-parse HEAD`
pub async fn head_sha(worktree: &Path) -> Result<String, GitError> {
    run(worktree, &["-C", repo_str(worktree), "rev-parse", "HEAD"]).await
}

/// `git -C <worktree> branch --show-current`
pub async fn current_branch(worktree: &Path) -> Result<String, GitError> {
    run(worktree, &["-C", repo_str(worktree), "branch", "--show-current"]).await
}

/// `git -C <worktree> add -A` then `git -C <worktree> commit -m <message>`.
/// Returns the new commit sha, or `None` if there was nothing to commit.
pub async fn ensure_commit(worktree: &Path, message: &str) -> Result<Option<String>, GitError> {
    run(worktree, &["-C", repo_str(worktree), "add", "-A"]).await?;

    let status = run(worktree, &["-C", repo_str(worktree), "status", "--porcelain"]).await?;
    if status.trim().is_empty() {
        return Ok(None);
    }

    run(worktree, &["-C", repo_str(worktree), "commit", "-m", message]).await?;
    Ok(Some(head_sha(worktree).await?))
}

/// `git -C <worktree> log --oneline -n <count>`
pub async fn log_oneline(worktree: &Path, count: u32) -> Result<String, GitError> {
    let count_str = count.to_string();
    run(
        worktree,
        &["-C", repo_str(worktree), "log", "--oneline", "-n", &count_str],
    )
    .await
}

/// `git -C <worktree> diff --name-status <range>`
pub async fn diff_name_status(worktree: &Path, range: &str) -> Result<Vec<(String, String)>, GitError> {
    let out = run(
        worktree,
        &["-C", repo_str(worktree), "diff", "--name-status", range],
    )
    .await?;
    Ok(out
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let status = parts.next()?;
            let path = parts.next()?;
            Some((status.to_string(), path.to_string()))
        })
        .collect())
}

/// `git -C <worktree> diff --name-only <range>`
pub async fn diff_name_only(worktree: &Path, range: &str) -> Result<Vec<String>, GitError> {
    let out = run(
        worktree,
        &["-C", repo_str(worktree), "diff", "--name-only", range],
    )
    .await?;
    Ok(out.lines().map(str::to_string).collect())
}

fn repo_str(path: &Path) -> &str {
    path.to_str().unwrap_or(".")
}

/// Convenience used by the orchestrator to build a commit message's subject
/// line for a chunk.
pub fn chunk_commit_message(chunk_id: &str, chunk_name: &str) -> String {
    format!("[{chunk_id}] {chunk_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn init_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["-C", repo_str(dir.path()), "init", "-q"])
            .await
            .unwrap();
        run(
            dir.path(),
            &["-C", repo_str(dir.path()), "config", "user.email", "worker@example.com"],
        )
        .await
        .unwrap();
        run(
            dir.path(),
            &["-C", repo_str(dir.path()), "config", "user.name", "Worker"],
        )
        .await
        .unwrap();
        dir
    }

    #[tokio::test]
    async fn ensure_commit_returns_none_when_nothing_changed() {
        let dir = init_repo().await;
        std::fs::write(dir.path().join("README.md"), "hello\n").unwrap();
        let first = ensure_commit(dir.path(), "initial").await.unwrap();
        assert!(first.is_some());

        let second = ensure_commit(dir.path(), "noop").await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn ensure_commit_returns_sha_matching_head() {
        let dir = init_repo().await;
        std::fs::write(dir.path().join("a.txt"), "content\n").unwrap();
        let sha = ensure_commit(dir.path(), "add a.txt").await.unwrap().unwrap();
        let head = head_sha(dir.path()).await.unwrap();
        assert_eq!(sha, head);
    }

    #[tokio::test]
    async fn log_oneline_reflects_commit_count() {
        let dir = init_repo().await;
        std::fs::write(dir.path().join("a.txt"), "1\n").unwrap();
        ensure_commit(dir.path(), "commit one").await.unwrap();
        std::fs::write(dir.path().join("b.txt"), "2\n").unwrap();
        ensure_commit(dir.path(), "commit two").await.unwrap();

        let log = log_oneline(dir.path(), 10).await.unwrap();
        assert_eq!(log.lines().count(), 2);
        assert!(log.contains("commit two"));
    }

    #[tokio::test]
    async fn diff_name_status_reports_added_files() {
        let dir = init_repo().await;
        std::fs::write(dir.path().join("a.txt"), "1\n").unwrap();
        ensure_commit(dir.path(), "commit one").await.unwrap();
        std::fs::write(dir.path().join("b.txt"), "2\n").unwrap();
        ensure_commit(dir.path(), "commit two").await.unwrap();

        let changes = diff_name_status(dir.path(), "HEAD~1..HEAD").await.unwrap();
        assert_eq!(changes, vec![("A".to_string(), "b.txt".to_string())]);
    }

    #[test]
    fn chunk_commit_message_format() {
        assert_eq!(
            chunk_commit_message("01a-database", "Phase 1: Database"),
            "[01a-database] Phase 1: Database"
        );
    }

    #[tokio::test]
    async fn repo_root_matches_init_dir() {
        let dir = init_repo().await;
        std::fs::write(dir.path().join("a.txt"), "1\n").unwrap();
        ensure_commit(dir.path(), "commit one").await.unwrap();

        let root = repo_root(dir.path()).await.unwrap();
        assert_eq!(
            std::fs::canonicalize(&root).unwrap(),
            std::fs::canonicalize(dir.path()).unwrap()
        );
    }

    #[tokio::test]
    async fn ensure_worktree_creates_a_new_branch_and_directory() {
        let dir = init_repo().await;
        std::fs::write(dir.path().join("a.txt"), "1\n").unwrap();
        ensure_commit(dir.path(), "commit one").await.unwrap();

        let worktree_path = dir.path().join(".worktrees").join("my-plan");
        ensure_worktree(dir.path(), &worktree_path, "feature/my-plan").await.unwrap();

        assert!(worktree_path.join(".git").exists());
        let branch = current_branch(&worktree_path).await.unwrap();
        assert_eq!(branch, "feature/my-plan");
    }

    #[tokio::test]
    async fn ensure_worktree_is_a_noop_when_already_attached() {
        let dir = init_repo().await;
        std::fs::write(dir.path().join("a.txt"), "1\n").unwrap();
        ensure_commit(dir.path(), "commit one").await.unwrap();

        let worktree_path = dir.path().join(".worktrees").join("my-plan");
        ensure_worktree(dir.path(), &worktree_path, "feature/my-plan").await.unwrap();
        // second call must not error even though the branch and directory
        // already exist.
        ensure_worktree(dir.path(), &worktree_path, "feature/my-plan").await.unwrap();
        assert!(worktree_path.join(".git").exists());
    }

    #[tokio::test]
    async fn ensure_worktree_attaches_to_a_branch_created_by_a_previous_run() {
        let dir = init_repo().await;
        std::fs::write(dir.path().join("a.txt"), "1\n").unwrap();
        ensure_commit(dir.path(), "commit one").await.unwrap();

        let first_path = dir.path().join(".worktrees").join("my-plan");
        ensure_worktree(dir.path(), &first_path, "feature/my-plan").await.unwrap();
        worktree_remove(dir.path(), &first_path).await.unwrap();

        // the branch now exists but the worktree directory is gone; a second
        // ensure_worktree must fall back to attaching rather than erroring.
        let second_path = dir.path().join(".worktrees").join("my-plan-2");
        ensure_worktree(dir.path(), &second_path, "feature/my-plan").await.unwrap();
        assert!(second_path.join(".git").exists());
    }
}
