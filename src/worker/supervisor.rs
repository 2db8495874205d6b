//! Spawns and supervises one external AI worker subprocess per chunk or
//! terminal phase.
//!
//! Three concerns run concurrently against a single child process, all
//! cancelled together the moment the child exits: draining its stdout/
//! stderr to the phase's `worker.log`, a heartbeat that watches
//! `handoff.md`'s mtime, and the per-phase timeout.

use crate::errors::WorkerError;
use crate::paths::Phase;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

/// How long a worker may run before the supervisor kills it, per phase.
pub fn timeout_for_phase(phase: Phase) -> Duration {
    match phase {
        Phase::Implementation => Duration::from_secs(60 * 60),
        Phase::UnitTests => Duration::from_secs(20 * 60),
        Phase::BranchReview => Duration::from_secs(30 * 60),
        Phase::FinalValidation => Duration::from_secs(15 * 60),
        Phase::Context => Duration::from_secs(60 * 60),
    }
}

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);
/// A worker is `Idle` once `handoff.md` has gone this long without a write.
pub const IDLE_THRESHOLD: Duration = Duration::from_secs(5 * 60);
pub const GRACE_PERIOD: Duration = Duration::from_secs(10);
pub const TIMEOUT_EXIT_CODE: i32 = 124;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatState {
    Starting,
    Running,
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOutcome {
    pub exit_code: i32,
    pub timed_out: bool,
    pub handoff_written: bool,
}

pub struct WorkerSpec<'a> {
    pub chunk_id: &'a str,
    pub command: &'a str,
    pub args: &'a [String],
    pub worktree: &'a Path,
    pub prompt: &'a str,
    pub log_path: &'a Path,
    pub handoff_path: &'a Path,
    pub timeout: Duration,
}

pub async fn run_worker(spec: WorkerSpec<'_>) -> Result<WorkerOutcome, WorkerError> {
    if let Some(parent) = spec.log_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| WorkerError::InputWriteFailed {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let mut child = Command::new(spec.command)
        .args(spec.args)
        .current_dir(spec.worktree)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(|source| WorkerError::SpawnFailed {
            command: spec.command.to_string(),
            source,
        })?;

    write_prompt(&mut child, spec.prompt).await?;

    let log_file = tokio::fs::File::create(spec.log_path)
        .await
        .map_err(|source| WorkerError::InputWriteFailed {
            path: spec.log_path.to_path_buf(),
            source,
        })?;
    let log_file = std::sync::Arc::new(tokio::sync::Mutex::new(log_file));

    let stdout_task = spawn_log_drain(child.stdout.take(), log_file.clone());
    let stderr_task = spawn_log_drain(child.stderr.take(), log_file.clone());

    let handoff_path = spec.handoff_path.to_path_buf();
    let chunk_id = spec.chunk_id.to_string();
    let heartbeat_task = tokio::spawn(async move {
        heartbeat_loop(handoff_path, chunk_id).await;
    });

    let outcome = tokio::select! {
        status = child.wait() => {
            let code = status.map(|s| s.code().unwrap_or(-1)).unwrap_or(-1);
            WorkerOutcome {
                exit_code: code,
                timed_out: false,
                handoff_written: handoff_created(spec.handoff_path),
            }
        }
        _ = tokio::time::sleep(spec.timeout) => {
            tracing::warn!(command = spec.command, "worker timed out, sending graceful shutdown");
            terminate_gracefully(&mut child).await;
            WorkerOutcome {
                exit_code: TIMEOUT_EXIT_CODE,
                timed_out: true,
                handoff_written: handoff_created(spec.handoff_path),
            }
        }
    };

    heartbeat_task.abort();
    stdout_task.abort();
    stderr_task.abort();

    Ok(outcome)
}

async fn write_prompt(child: &mut Child, prompt: &str) -> Result<(), WorkerError> {
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(prompt.as_bytes())
            .await
            .map_err(|source| WorkerError::Other(anyhow::anyhow!("failed to write prompt: {source}")))?;
        stdin
            .shutdown()
            .await
            .map_err(|source| WorkerError::Other(anyhow::anyhow!("failed to close stdin: {source}")))?;
    }
    Ok(())
}

fn spawn_log_drain<R>(
    reader: Option<R>,
    log_file: std::sync::Arc<tokio::sync::Mutex<tokio::fs::File>>,
) -> tokio::task::JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(reader) = reader else { return };
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let mut file = log_file.lock().await;
            let _ = file.write_all(line.as_bytes()).await;
            let _ = file.write_all(b"\n").await;
        }
    })
}

async fn heartbeat_loop(handoff_path: PathBuf, chunk_id: String) {
    let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
    interval.tick().await; // first tick fires immediately; skip it
    loop {
        interval.tick().await;
        let (state, elapsed_secs) = classify_heartbeat(&handoff_path).await;
        tracing::info!(
            chunk_id = %chunk_id,
            elapsed_secs = elapsed_secs.unwrap_or(0),
            ?state,
            path = %handoff_path.display(),
            "worker heartbeat"
        );
    }
}

/// A pre-written handoff template sits on disk for every chunk, so
/// existence alone can't tell a worker that actually wrote a handoff from
/// one that never touched it. A real handoff is either long enough to hold
/// the required sections or shows at least one completed checkbox.
const HANDOFF_CREATED_MIN_BYTES: u64 = 2000;

fn handoff_created(handoff_path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(handoff_path) else {
        return false;
    };
    if metadata.len() > HANDOFF_CREATED_MIN_BYTES {
        return true;
    }
    std::fs::read_to_string(handoff_path)
        .map(|contents| contents.contains("[x]") || contents.contains("[X]"))
        .unwrap_or(false)
}

/// Classify a worker's liveness from `handoff.md`'s mtime, alongside the
/// elapsed seconds since that mtime (`None` if the file doesn't exist yet
/// or its mtime can't be read).
async fn classify_heartbeat(handoff_path: &Path) -> (HeartbeatState, Option<u64>) {
    match tokio::fs::metadata(handoff_path).await {
        Err(_) => (HeartbeatState::Starting, None),
        Ok(meta) => match meta.modified() {
            Ok(modified) => match modified.elapsed() {
                Ok(elapsed) => {
                    let state = if elapsed < IDLE_THRESHOLD {
                        HeartbeatState::Running
                    } else {
                        HeartbeatState::Idle
                    };
                    (state, Some(elapsed.as_secs()))
                }
                Err(_) => (HeartbeatState::Idle, None),
            },
            Err(_) => (HeartbeatState::Idle, None),
        },
    }
}

#[cfg(unix)]
async fn terminate_gracefully(child: &mut Child) {
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as i32, libc::SIGTERM);
        }
    }
    let graceful = tokio::time::timeout(GRACE_PERIOD, child.wait()).await;
    if graceful.is_err() {
        let _ = child.kill().await;
    }
}

#[cfg(not(unix))]
async fn terminate_gracefully(child: &mut Child) {
    let _ = child.kill().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::Phase;

    #[test]
    fn timeout_matches_phase_minutes() {
        assert_eq!(timeout_for_phase(Phase::Implementation), Duration::from_secs(3600));
        assert_eq!(timeout_for_phase(Phase::UnitTests), Duration::from_secs(1200));
        assert_eq!(timeout_for_phase(Phase::BranchReview), Duration::from_secs(1800));
        assert_eq!(timeout_for_phase(Phase::FinalValidation), Duration::from_secs(900));
    }

    #[tokio::test]
    async fn classify_heartbeat_is_starting_before_handoff_exists() {
        let dir = tempfile::tempdir().unwrap();
        let handoff = dir.path().join("handoff.md");
        let (state, elapsed) = classify_heartbeat(&handoff).await;
        assert_eq!(state, HeartbeatState::Starting);
        assert_eq!(elapsed, None);
    }

    #[tokio::test]
    async fn classify_heartbeat_is_running_right_after_write() {
        let dir = tempfile::tempdir().unwrap();
        let handoff = dir.path().join("handoff.md");
        tokio::fs::write(&handoff, "## Summary\n").await.unwrap();
        let (state, elapsed) = classify_heartbeat(&handoff).await;
        assert_eq!(state, HeartbeatState::Running);
        assert!(elapsed.unwrap() < IDLE_THRESHOLD.as_secs());
    }

    #[tokio::test]
    async fn classify_heartbeat_is_idle_once_past_the_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let handoff = dir.path().join("handoff.md");
        std::fs::write(&handoff, "## Summary\n").unwrap();

        let stale = std::time::SystemTime::now() - IDLE_THRESHOLD - Duration::from_secs(30);
        let file = std::fs::File::options().write(true).open(&handoff).unwrap();
        let times = std::fs::FileTimes::new().set_modified(stale);
        file.set_times(times).unwrap();

        let (state, elapsed) = classify_heartbeat(&handoff).await;
        assert_eq!(state, HeartbeatState::Idle);
        assert!(elapsed.unwrap() >= IDLE_THRESHOLD.as_secs());
    }

    #[test]
    fn handoff_created_is_false_for_an_untouched_template() {
        let dir = tempfile::tempdir().unwrap();
        let handoff = dir.path().join("handoff.md");
        std::fs::write(&handoff, crate::worker::handoff_template("00-setup", None)).unwrap();
        assert!(!handoff_created(&handoff));
    }

    #[test]
    fn handoff_created_is_true_once_checkboxes_are_ticked() {
        let dir = tempfile::tempdir().unwrap();
        let handoff = dir.path().join("handoff.md");
        std::fs::write(&handoff, "## What I Completed\n- [x] did the thing\n").unwrap();
        assert!(handoff_created(&handoff));
    }

    #[test]
    fn handoff_created_is_true_past_the_byte_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let handoff = dir.path().join("handoff.md");
        std::fs::write(&handoff, "x".repeat(2500)).unwrap();
        assert!(handoff_created(&handoff));
    }

    #[test]
    fn handoff_created_is_false_when_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let handoff = dir.path().join("handoff.md");
        assert!(!handoff_created(&handoff));
    }

    #[tokio::test]
    async fn run_worker_completes_successfully_for_a_trivial_command() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("worker.log");
        let handoff_path = dir.path().join("handoff.md");

        let spec = WorkerSpec {
            chunk_id: "test-chunk",
            command: "true",
            args: &[],
            worktree: dir.path(),
            prompt: "irrelevant",
            log_path: &log_path,
            handoff_path: &handoff_path,
            timeout: Duration::from_secs(5),
        };

        let outcome = run_worker(spec).await.unwrap();
        assert!(!outcome.timed_out);
        assert_eq!(outcome.exit_code, 0);
    }

    #[tokio::test]
    async fn run_worker_times_out_and_reports_exit_code_124() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("worker.log");
        let handoff_path = dir.path().join("handoff.md");

        let spec = WorkerSpec {
            chunk_id: "test-chunk",
            command: "sleep",
            args: &["5".to_string()],
            worktree: dir.path(),
            prompt: "irrelevant",
            log_path: &log_path,
            handoff_path: &handoff_path,
            timeout: Duration::from_millis(100),
        };

        let outcome = run_worker(spec).await.unwrap();
        assert!(outcome.timed_out);
        assert_eq!(outcome.exit_code, TIMEOUT_EXIT_CODE);
    }
}
