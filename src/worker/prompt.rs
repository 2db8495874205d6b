//! Assembles the prompt text a worker subprocess reads from `work_prompt.md`.

use crate::chunk::Chunk;
use crate::config::PipelineConfig;

/// Builds `plan_context.md`: the chunker's setup chunk prefixed with the
/// context-budget table derived from config. Written once per run; callers
/// must not overwrite an existing file.
pub fn plan_context_document(config: &PipelineConfig, setup_body: &str) -> String {
    let thresholds = config.context_thresholds();
    format!(
        "\
# Context Budget

| Level | Tokens |
|---|---|
| normal | 0 – {warning} |
| warning | {warning} – {critical} |
| critical | {critical} – {emergency} |
| emergency | {emergency} – {budget} |

# Plan Setup

{setup_body}
",
        warning = thresholds.warning,
        critical = thresholds.critical,
        emergency = thresholds.emergency,
        budget = config.chunk_context_budget,
    )
}

/// Builds a pre-filled `handoff.md` template with `[ ]` placeholders and
/// explicit per-section requirements. A worker is expected to
/// replace the placeholders, not submit the template verbatim — the
/// validator's warning-level checks exist precisely to catch a submission
/// that never got filled in.
pub fn handoff_template(chunk_id: &str, next_chunk_id: Option<&str>) -> String {
    format!(
        "\
From Chunk: {chunk_id}
To Chunk: {to_chunk}

## What I Completed
<!-- List at least 3 concrete completed items, one per line. -->
- [ ]
- [ ]
- [ ]

## Files Created
<!-- List every file this chunk created. Leave empty (delete the placeholder) if none. -->
- [ ]

## Files Modified
<!-- List every existing file this chunk modified. Leave empty (delete the placeholder) if none. -->
- [ ]

## Key Decisions Made
<!-- At least 2 decisions, each with a rationale and a tradeoff. -->

### Decision 1
**Decision:**
**Rationale:**
**Tradeoff:**

### Decision 2
**Decision:**
**Rationale:**
**Tradeoff:**

## Context for Next Chunk
<!-- At least 300 words. The next worker reads only this section plus the
     plan — be concrete about what exists, what doesn't, and what to do
     next. -->

## Integration Notes
<!-- Include a code example showing how to use what this chunk built. -->

## Remaining Work

## Blockers

## Tests Status

## Context Usage
Final: NN%
Peak: NN%
",
        to_chunk = next_chunk_id.unwrap_or("(none)"),
    )
}

/// Builds the work prompt for an implementation chunk: the chunk's own
/// Markdown body plus a fixed set of instructions every worker gets,
/// mirroring the SPECIFICATION/CRITICAL RULES/TASK sections the base
/// crate's runner assembles for its own iteration prompts.
pub fn implementation_prompt(
    chunk: &Chunk,
    chunk_body: &str,
    plan_context: &str,
    prior_handoff: Option<&str>,
) -> String {
    let handoff_section = match prior_handoff {
        Some(text) if !text.trim().is_empty() => format!(
            "\n## HANDOFF FROM PREVIOUS CHUNK\n\n{text}\n"
        ),
        _ => String::new(),
    };
    format!(
        "\
# TASK

You are implementing one chunk of a larger plan inside an isolated git \
worktree. Work only within this worktree; do not touch files outside it.

## PLAN CONTEXT

{plan_context}

## CHUNK: {name} ({id})

{body}
{handoff_section}
## CRITICAL RULES

1. Commit your work with `git add -A && git commit` before you finish.
2. Write a handoff to `handoff.md` in this directory before exiting. It \
   must contain these sections: What I Completed, Files Created, Files \
   Modified, Key Decisions Made, Context for Next Chunk, Integration \
   Notes. Optionally also: Remaining Work, Blockers, Tests Status, \
   Context Usage.
3. Record each non-trivial decision under its own heading inside Key \
   Decisions Made, with `**Decision:** ... / **Rationale:** ... / \
   **Tradeoff:** ...` lines beneath it.
4. Report context usage at the end of the Context Usage section as \
   `Final: NN%` and, if you tracked it, `Peak: NN%`.
5. Do not modify files listed as out of scope for this chunk.
",
        name = chunk.name,
        id = chunk.id,
        body = chunk_body,
        plan_context = plan_context,
        handoff_section = handoff_section,
    )
}

/// Builds the prompt for one of the three terminal phases (unit tests,
/// branch review, final validation), which operate on the whole worktree
/// rather than one chunk.
pub fn terminal_phase_prompt(phase_name: &str, instructions: &str, plan_context: &str) -> String {
    format!(
        "\
# TASK: {phase_name}

## PLAN CONTEXT

{plan_context}

## INSTRUCTIONS

{instructions}

## CRITICAL RULES

1. Commit your work with `git add -A && git commit` before you finish.
2. Write a handoff to `handoff.md` in this directory before exiting, with \
   the same required sections as an implementation chunk: What I \
   Completed, Files Created, Files Modified, Key Decisions Made, Context \
   for Next Chunk, Integration Notes.
"
    )
}

/// The fix-worker prompt handed to a worker when the compile validator
/// needs a self-healing retry. `modified_files` lists the files
/// touched by the chunk so the fix worker can scope its search.
pub fn compile_fix_prompt(
    raw_build_output: &str,
    modified_files: &[String],
    attempt: u32,
    max_attempts: u32,
) -> String {
    let files_section = if modified_files.is_empty() {
        "(none recorded)".to_string()
    } else {
        modified_files.iter().map(|f| format!("- {f}")).collect::<Vec<_>>().join("\n")
    };
    format!(
        "\
# TASK: Fix build errors

This is fix attempt {attempt} of {max_attempts}. The build failed with the \
following output:

```
{raw_build_output}
```

## Files recently modified

{files_section}

Fix the reported errors only. Do not refactor unrelated code. Commit your \
fix before exiting.
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{Chunk, ChunkType};
    use crate::config::{EnvironmentProfile, PipelineConfig};
    use crate::handoff::{parse_handoff, validate_handoff};

    fn sample_chunk() -> Chunk {
        Chunk {
            id: "01a-database".to_string(),
            order: 1,
            name: "Phase 1: Database".to_string(),
            chunk_type: ChunkType::Implementation,
            depends_on: vec!["00-setup".to_string()],
            plan_path: "01a-database.md".to_string(),
            estimated_tokens: 500,
            description: String::new(),
            expected_files: vec![],
            expected_modifications: vec![],
        }
    }

    #[test]
    fn implementation_prompt_includes_chunk_id_and_body() {
        let prompt = implementation_prompt(&sample_chunk(), "Create the schema.", "Building a widget.", None);
        assert!(prompt.contains("01a-database"));
        assert!(prompt.contains("Create the schema."));
        assert!(prompt.contains("Building a widget."));
        assert!(prompt.contains("Context Usage"));
        assert!(!prompt.contains("HANDOFF FROM PREVIOUS CHUNK"));
    }

    #[test]
    fn implementation_prompt_includes_prior_handoff_section_when_supplied() {
        let prompt = implementation_prompt(
            &sample_chunk(),
            "Create the schema.",
            "Building a widget.",
            Some("**Context for Next Chunk** (from 00-setup):\nThe schema lives in `db/schema.sql`.\n"),
        );
        assert!(prompt.contains("HANDOFF FROM PREVIOUS CHUNK"));
        assert!(prompt.contains("db/schema.sql"));
    }

    #[test]
    fn implementation_prompt_omits_handoff_section_when_text_is_blank() {
        let prompt = implementation_prompt(&sample_chunk(), "Create the schema.", "Building a widget.", Some("   "));
        assert!(!prompt.contains("HANDOFF FROM PREVIOUS CHUNK"));
    }

    #[test]
    fn compile_fix_prompt_includes_attempt_count_and_output() {
        let prompt = compile_fix_prompt(
            "a.swift:1:1: error: boom",
            &["Sources/App/App.swift".to_string()],
            2,
            3,
        );
        assert!(prompt.contains("attempt 2 of 3"));
        assert!(prompt.contains("a.swift:1:1: error: boom"));
        assert!(prompt.contains("Sources/App/App.swift"));
    }

    #[test]
    fn terminal_phase_prompt_includes_instructions() {
        let prompt = terminal_phase_prompt("Unit Tests", "Run the test suite.", "Building a widget.");
        assert!(prompt.contains("Unit Tests"));
        assert!(prompt.contains("Run the test suite."));
    }

    #[test]
    fn plan_context_document_includes_threshold_table_and_setup_body() {
        let config = PipelineConfig::for_profile(EnvironmentProfile::Api).unwrap();
        let doc = plan_context_document(&config, "Build a widget.");
        assert!(doc.contains("Build a widget."));
        assert!(doc.contains(&config.context_thresholds().warning.to_string()));
    }

    #[test]
    fn handoff_template_has_all_required_sections_as_placeholders() {
        let template = handoff_template("01a-database", Some("01b-api"));
        assert!(template.contains("01a-database"));
        assert!(template.contains("01b-api"));
        let handoff = parse_handoff(&template);
        for name in crate::handoff::types::REQUIRED_SECTIONS {
            assert!(handoff.section(name).is_some(), "missing section for '{name}'");
        }
    }

    #[test]
    fn handoff_template_reparses_with_only_warnings_no_missing_sections() {
        let template = handoff_template("01a-database", None);
        let handoff = parse_handoff(&template);
        let config = PipelineConfig::for_profile(EnvironmentProfile::Api).unwrap();
        let result = validate_handoff(&handoff, &config);

        assert!(!result.issues.iter().any(|i| i.code.starts_with("MISSING_SECTION")));
        assert!(!result.issues.iter().any(|i| i.code == "HANDOFF_EMPTY"));
        assert!(result.issues.iter().any(|i| i.code == "NO_COMPLETED_ITEMS"));
        assert!(result.issues.iter().any(|i| i.code == "NO_FILES_LISTED"));
        assert!(result.issues.iter().any(|i| i.code == "THIN_CONTEXT"));
        assert!(result.issues.iter().any(|i| i.code == "THIN_INTEGRATION"));
    }
}
