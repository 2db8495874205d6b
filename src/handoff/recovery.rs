//! Synthesizes a handoff when a worker exits without writing one. Recovery
//! never fails outright — a recovered handoff is always thinner than a
//! worker-written one, which is exactly what the validator is there to
//! flag.

use super::types::{Handoff, HandoffSource, Section};
use std::path::Path;

/// Paths the recovery synthesis skips when attributing files to a chunk —
/// pipeline bookkeeping, IDE folders, build outputs, and ancillary
/// directories that are never the worker's actual deliverable.
const EXCLUDE_PREFIXES: &[&str] = &[
    ".pipeline/",
    "CONTEXT.md",
    "CHUNK_PLAN.md",
    "PROGRESS.md",
    "HANDOFF.md",
    "plan.md",
    ".claude/",
    ".vscode/",
    ".idea/",
    ".build/",
    "node_modules/",
    ".playwright-mcp/",
    "plans/",
    "archive/",
    "to-remove/",
    "todos/",
];

fn is_excluded(path: &str) -> bool {
    EXCLUDE_PREFIXES.iter().any(|prefix| path == *prefix || path.starts_with(prefix))
}

/// Pull bullet/numbered list items out of a `PROGRESS.md` body, stripping
/// the bullet marker and any `[ ]`/`[x]` checkbox prefix.
fn extract_bullets(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let trimmed = line.trim_start();
            let rest = trimmed
                .strip_prefix("- ")
                .or_else(|| trimmed.strip_prefix("* "))
                .or_else(|| trimmed.strip_prefix("+ "));
            let rest = match rest {
                Some(r) => r,
                None => {
                    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
                    if digits > 0 {
                        trimmed[digits..].strip_prefix(". ").or(trimmed[digits..].strip_prefix(") "))?
                    } else {
                        return None;
                    }
                }
            };
            let rest = rest
                .strip_prefix("[ ] ")
                .or_else(|| rest.strip_prefix("[x] "))
                .or_else(|| rest.strip_prefix("[X] "))
                .unwrap_or(rest);
            let rest = rest.trim();
            if rest.is_empty() {
                None
            } else {
                Some(rest.to_string())
            }
        })
        .collect()
}

/// Build a recovered handoff from whatever evidence survived the worker's
/// exit: an optional `PROGRESS.md` the worker may have updated, `git log`
/// output for the chunk's commits, and `git diff --name-status` pairs of
/// `(status, path)` describing what changed.
pub fn recover_handoff(progress_md: Option<&str>, git_log_oneline: &str, changes: &[(String, String)]) -> Handoff {
    let mut files_created = Vec::new();
    let mut files_modified = Vec::new();
    for (status, path) in changes {
        if is_excluded(path) {
            continue;
        }
        if status.starts_with('A') {
            files_created.push(path.clone());
        } else {
            files_modified.push(path.clone());
        }
    }

    let commits: Vec<&str> = git_log_oneline.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    let progress_bullets = progress_md.map(extract_bullets).unwrap_or_default();

    let summary = if commits.is_empty() {
        "Worker exited without a handoff and left no commits; recovered from repository state only."
            .to_string()
    } else {
        format!(
            "Worker exited without a handoff. Recovered from {} commit(s), {} created file(s), {} modified \
file(s).",
            commits.len(),
            files_created.len(),
            files_modified.len()
        )
    };

    // Completed items come from PROGRESS.md's own bullets when the worker
    // left one behind; a bare commit list is the fallback when it didn't.
    let completed_items: Vec<String> = if !progress_bullets.is_empty() {
        progress_bullets
    } else {
        commits.iter().map(|c| c.to_string()).collect()
    };

    let context_for_next = if git_log_oneline.trim().is_empty() {
        "No git history was available to recover context from. **This is a recovered handoff** — \
treat it as incomplete and inspect the worktree directly before continuing."
            .to_string()
    } else {
        format!(
            "**This is a recovered handoff**, synthesized from git history because the worker did \
not write one. Recent commits:\n\n```\n{}\n```",
            git_log_oneline.trim_end()
        )
    };

    let mut sections = vec![
        Section {
            title: "Summary".to_string(),
            body: summary.clone(),
        },
        Section {
            title: "What I Completed".to_string(),
            body: completed_items.iter().map(|c| format!("- {c}")).collect::<Vec<_>>().join("\n"),
        },
        Section {
            title: "Files Created".to_string(),
            body: files_created.iter().map(|f| format!("- {f}")).collect::<Vec<_>>().join("\n"),
        },
        Section {
            title: "Files Modified".to_string(),
            body: files_modified.iter().map(|f| format!("- {f}")).collect::<Vec<_>>().join("\n"),
        },
        Section {
            title: "Key Decisions Made".to_string(),
            body: "(recovered — no decisions were recorded by the worker)".to_string(),
        },
        Section {
            title: "Context for Next Chunk".to_string(),
            body: context_for_next.clone(),
        },
        Section {
            title: "Integration Notes".to_string(),
            body: "(recovered — verify the worktree builds and the plan's requirements for this chunk are \
met before trusting this summary)"
                .to_string(),
        },
    ];

    if let Some(progress) = progress_md {
        sections.push(Section {
            title: "Remaining Work".to_string(),
            body: progress.trim().to_string(),
        });
    }

    let raw = render(&sections);

    Handoff {
        source: HandoffSource::Recovered,
        from_chunk: None,
        to_chunk: None,
        sections,
        completed_items,
        files_created,
        files_modified,
        decisions: Vec::new(),
        context_for_next,
        integration_notes: "(recovered — verify the worktree builds and the plan's requirements for this \
chunk are met before trusting this summary)"
            .to_string(),
        remaining_work: progress_md.map(|p| p.trim().to_string()),
        blockers: None,
        test_status: None,
        context_usage: None,
        raw,
    }
}

fn render(sections: &[Section]) -> String {
    sections
        .iter()
        .map(|s| format!("## {}\n{}\n", s.title, s.body))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Read `PROGRESS.md` from the worktree root, if it exists.
pub fn read_progress_file(worktree: &Path) -> Option<String> {
    std::fs::read_to_string(worktree.join("PROGRESS.md")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changes(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(s, p)| (s.to_string(), p.to_string())).collect()
    }

    #[test]
    fn recovered_handoff_excludes_pipeline_internal_files() {
        let c = changes(&[
            ("A", "src/new.ts"),
            ("M", ".pipeline/state.json"),
            ("M", ".pipeline/Phases/00-CONTEXT/Chunks/00-setup.md"),
        ]);
        let handoff = recover_handoff(None, "abc123 add schema", &c);
        assert_eq!(handoff.files_created, vec!["src/new.ts".to_string()]);
        assert!(handoff.files_modified.is_empty());
    }

    #[test]
    fn recovered_handoff_splits_created_and_modified_by_status() {
        let c = changes(&[("A", "src/new.ts"), ("M", "src/old.ts")]);
        let handoff = recover_handoff(None, "abc123 feat: x\ndef456 feat: y", &c);
        assert_eq!(handoff.files_created, vec!["src/new.ts".to_string()]);
        assert_eq!(handoff.files_modified, vec!["src/old.ts".to_string()]);
    }

    #[test]
    fn recovered_handoff_is_marked_recovered() {
        let handoff = recover_handoff(None, "", &[]);
        assert!(handoff.is_recovered());
    }

    #[test]
    fn recovered_handoff_lists_commits_as_completed_items() {
        let log = "abc123 add schema\ndef456 add migrations\n";
        let handoff = recover_handoff(None, log, &[]);
        assert_eq!(handoff.completed_items, vec!["abc123 add schema", "def456 add migrations"]);
    }

    #[test]
    fn recovered_handoff_quotes_git_log_in_context_for_next_chunk() {
        let log = "abc123 feat: x\ndef456 feat: y";
        let handoff = recover_handoff(None, log, &[]);
        assert!(handoff.context_for_next.contains("abc123 feat: x"));
        assert!(handoff.context_for_next.contains("def456 feat: y"));
    }

    #[test]
    fn recovered_handoff_prefers_progress_file_bullets_as_completed_items() {
        let progress = "- [x] Created schema\n- Added migrations\n2. Wired routes\n";
        let handoff = recover_handoff(Some(progress), "abc123 feat: x\ndef456 feat: y", &[]);
        assert_eq!(
            handoff.completed_items,
            vec![
                "Created schema".to_string(),
                "Added migrations".to_string(),
                "Wired routes".to_string()
            ]
        );
    }

    #[test]
    fn recovered_handoff_includes_progress_file_as_remaining_work() {
        let handoff = recover_handoff(Some("Finished the schema, started on migrations."), "", &[]);
        assert_eq!(
            handoff.remaining_work.as_deref(),
            Some("Finished the schema, started on migrations.")
        );
    }

    #[test]
    fn recovered_handoff_with_no_evidence_still_has_a_summary() {
        let handoff = recover_handoff(None, "", &[]);
        assert!(handoff.section("Summary").is_some());
        assert!(handoff.completed_items.is_empty());
    }

    #[test]
    fn recovered_handoff_reparses_as_valid_after_being_written_back() {
        use crate::config::{EnvironmentProfile, PipelineConfig};
        use crate::handoff::parser::parse_handoff;
        use crate::handoff::validate::validate_handoff;

        let c = changes(&[("A", "src/new.ts"), ("M", "src/old.ts")]);
        let handoff = recover_handoff(None, "abc123 feat: x\ndef456 feat: y", &c);
        let reparsed = parse_handoff(&handoff.raw);
        let config = PipelineConfig::for_profile(EnvironmentProfile::Api).unwrap();
        let result = validate_handoff(&reparsed, &config);
        assert!(!result.issues.iter().any(|i| i.code.starts_with("MISSING_SECTION")));
    }
}
