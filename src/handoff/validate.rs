//! Handoff validation rules. Mirrors the chunk validator's
//! shape: a pure function from data to a list of warnings/errors, never a
//! `Result` — a bad handoff is reported, not raised, so the pipeline can
//! decide whether to proceed, retry, or recover.

use super::types::{Handoff, REQUIRED_SECTIONS};
use crate::chunk::{Severity, ValidationIssue, ValidationResult};
use crate::config::PipelineConfig;

const THIN_CONTEXT_CHARS: usize = 200;
const THIN_INTEGRATION_CHARS: usize = 100;
const DECISION_RATIONALE_MIN_CHARS: usize = 20;

fn error(code: &str, message: String) -> ValidationIssue {
    ValidationIssue {
        code: code.to_string(),
        severity: Severity::Error,
        message,
        chunk_id: None,
    }
}

fn warning(code: &str, message: String) -> ValidationIssue {
    ValidationIssue {
        code: code.to_string(),
        severity: Severity::Warning,
        message,
        chunk_id: None,
    }
}

/// Validate a handoff that does exist on disk. Use [`validate_missing`] for
/// the case where the worker wrote nothing at all.
pub fn validate_handoff(handoff: &Handoff, config: &PipelineConfig) -> ValidationResult {
    let mut issues = Vec::new();

    if handoff.raw.trim().is_empty() {
        issues.push(error("HANDOFF_EMPTY", "handoff file exists but is empty".to_string()));
        return ValidationResult { issues };
    }

    for name in REQUIRED_SECTIONS {
        if handoff.section(name).is_none() {
            issues.push(error(
                &format!("MISSING_SECTION:{name}"),
                format!("missing required section matching '{name}'"),
            ));
        }
    }

    if handoff.completed_items.is_empty() {
        issues.push(warning(
            "NO_COMPLETED_ITEMS",
            "What I Completed lists no items".to_string(),
        ));
    }

    if handoff.files_created.is_empty() && handoff.files_modified.is_empty() {
        issues.push(warning(
            "NO_FILES_LISTED",
            "Files Created and Files Modified both list no files".to_string(),
        ));
    }

    if handoff.decisions.is_empty() {
        issues.push(warning(
            "NO_DECISIONS",
            "Key Decisions Made records no decisions".to_string(),
        ));
    }

    for decision in &handoff.decisions {
        let rationale_len = decision.rationale.as_deref().unwrap_or("").trim().len();
        if rationale_len < DECISION_RATIONALE_MIN_CHARS {
            issues.push(warning(
                "DECISION_NO_RATIONALE",
                format!("decision '{}' has no rationale of useful length", decision.decision),
            ));
        }
    }

    if handoff.context_for_next.len() < THIN_CONTEXT_CHARS {
        issues.push(warning(
            "THIN_CONTEXT",
            "Context for Next Chunk is too short to be useful to the next worker".to_string(),
        ));
    }

    if handoff.integration_notes.len() < THIN_INTEGRATION_CHARS {
        issues.push(warning(
            "THIN_INTEGRATION",
            "Integration Notes is too short to be useful to the next worker".to_string(),
        ));
    }

    let estimated_tokens = crate::chunk::estimate_tokens(&handoff.raw);
    if estimated_tokens > config.handoff_max_size {
        issues.push(warning(
            "HANDOFF_TOO_LARGE",
            format!(
                "handoff is estimated at {} tokens, above the {} token ceiling",
                estimated_tokens, config.handoff_max_size
            ),
        ));
    }

    ValidationResult { issues }
}

/// A worker exited without writing `handoff.md` at all.
pub fn validate_missing() -> ValidationResult {
    ValidationResult {
        issues: vec![error(
            "HANDOFF_MISSING",
            "worker exited without writing a handoff".to_string(),
        )],
    }
}
