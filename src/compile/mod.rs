//! Build-system detection and the self-healing compile-validation loop.
//!
//! This module never spawns an AI worker itself — the bounded retry loop
//! takes the fix step as a callback, so the orchestrator can wire it to the
//! real worker supervisor while keeping this module's tests hermetic.

pub mod parse;

pub use parse::{parse_diagnostics, Diagnostic, Diagnostics};

use crate::errors::CompileError;
use std::future::Future;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildSystem {
    Xcode { project: PathBuf, is_workspace: bool },
    SwiftPackage { manifest: PathBuf },
    /// No recognized build system — compile validation always succeeds.
    NoOp,
}

/// Look for an `.xcworkspace`/`.xcodeproj` or `Package.swift` up to two
/// directories deep. The first match wins; a workspace is preferred over a
/// bare project if both exist at the same depth.
pub fn detect_build_system(worktree: &Path) -> BuildSystem {
    let mut project: Option<PathBuf> = None;

    for entry in WalkDir::new(worktree)
        .max_depth(2)
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("xcworkspace") {
            return BuildSystem::Xcode {
                project: path.to_path_buf(),
                is_workspace: true,
            };
        }
        if project.is_none() && path.extension().and_then(|e| e.to_str()) == Some("xcodeproj") {
            project = Some(path.to_path_buf());
        }
    }

    if let Some(project) = project {
        return BuildSystem::Xcode {
            project,
            is_workspace: false,
        };
    }

    let manifest = worktree.join("Package.swift");
    if manifest.is_file() {
        return BuildSystem::SwiftPackage { manifest };
    }

    BuildSystem::NoOp
}

fn build_command(
    build_system: &BuildSystem,
    scheme: Option<&str>,
) -> Option<(String, Vec<String>)> {
    match build_system {
        BuildSystem::Xcode {
            project,
            is_workspace,
        } => {
            let flag = if *is_workspace { "-workspace" } else { "-project" };
            let mut args = vec![flag.to_string(), project.to_string_lossy().to_string()];
            if let Some(scheme) = scheme {
                args.push("-scheme".to_string());
                args.push(scheme.to_string());
            }
            args.push("build".to_string());
            Some(("xcodebuild".to_string(), args))
        }
        BuildSystem::SwiftPackage { .. } => Some(("swift".to_string(), vec!["build".to_string()])),
        BuildSystem::NoOp => None,
    }
}

/// Parse the first scheme name out of `xcodebuild -list` output. Schemes are
/// listed one per line under a `Schemes:` heading, ending at the next blank
/// line.
fn parse_first_scheme(list_output: &str) -> Option<String> {
    let mut in_schemes = false;
    for line in list_output.lines() {
        if in_schemes {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return None;
            }
            return Some(trimmed.to_string());
        }
        if line.trim() == "Schemes:" {
            in_schemes = true;
        }
    }
    None
}

/// Ask `xcodebuild -list` for the project/workspace's schemes and return the
/// first one. Returns `None` for a non-Xcode build system or if `xcodebuild`
/// can't be run.
async fn detect_scheme(build_system: &BuildSystem) -> Option<String> {
    let BuildSystem::Xcode {
        project,
        is_workspace,
    } = build_system
    else {
        return None;
    };

    let flag = if *is_workspace { "-workspace" } else { "-project" };
    let output = tokio::process::Command::new("xcodebuild")
        .arg(flag)
        .arg(project)
        .arg("-list")
        .output()
        .await
        .ok()?;
    parse_first_scheme(&String::from_utf8_lossy(&output.stdout))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileResult {
    pub success: bool,
    pub diagnostics: Diagnostics,
    pub raw_output: String,
}

/// Run the detected build command once in `worktree`. A `NoOp` build system
/// always reports success with no diagnostics and spawns nothing.
pub async fn run_build(
    worktree: &Path,
    build_system: &BuildSystem,
    scheme: Option<&str>,
) -> Result<CompileResult, CompileError> {
    let resolved_scheme = match scheme {
        Some(scheme) => Some(scheme.to_string()),
        None => detect_scheme(build_system).await,
    };

    let Some((program, args)) = build_command(build_system, resolved_scheme.as_deref()) else {
        return Ok(CompileResult {
            success: true,
            diagnostics: Diagnostics::default(),
            raw_output: String::new(),
        });
    };

    tracing::info!(program = %program, worktree = %worktree.display(), "running build");

    let output = tokio::process::Command::new(&program)
        .args(&args)
        .current_dir(worktree)
        .output()
        .await
        .map_err(|source| CompileError::SpawnFailed {
            command: format!("{program} {}", args.join(" ")),
            source,
        })?;

    let raw_output = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    let diagnostics = parse_diagnostics(&raw_output);
    let success = output.status.success() && diagnostics.is_clean();

    Ok(CompileResult {
        success,
        diagnostics,
        raw_output,
    })
}

/// Run the build, and if it fails, repeatedly hand the diagnostics to
/// `fix_worker` and rebuild, up to `max_attempts` total build attempts.
/// Returns the last `CompileResult` regardless of outcome — it is the
/// caller's job to decide whether a still-failing result after exhausting
/// attempts should fail the chunk.
pub async fn validate_with_self_heal<F, Fut>(
    worktree: &Path,
    build_system: &BuildSystem,
    scheme: Option<&str>,
    max_attempts: u32,
    mut fix_worker: F,
) -> Result<CompileResult, CompileError>
where
    F: FnMut(&CompileResult, u32) -> Fut,
    Fut: Future<Output = Result<(), CompileError>>,
{
    let mut attempt = 1;
    let mut result = run_build(worktree, build_system, scheme).await?;

    while !result.success && attempt < max_attempts {
        tracing::warn!(
            attempt,
            errors = result.diagnostics.errors.len(),
            "build failed, invoking fix worker"
        );
        fix_worker(&result, attempt).await?;
        attempt += 1;
        result = run_build(worktree, build_system, scheme).await?;
    }

    Ok(result)
}
