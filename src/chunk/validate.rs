//! Structural validation of a chunk list before execution begins.
//!
//! This runs once, right after chunking, and is deliberately independent of
//! any filesystem or worker state — it only looks at the in-memory `Chunk`
//! list the parser produced.

use super::types::{Chunk, ChunkType};
use crate::config::PipelineConfig;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub chunk_id: Option<String>,
}

impl ValidationIssue {
    fn error(code: &str, message: String, chunk_id: Option<&str>) -> Self {
        Self {
            code: code.to_string(),
            severity: Severity::Error,
            message,
            chunk_id: chunk_id.map(str::to_string),
        }
    }

    fn warning(code: &str, message: String, chunk_id: Option<&str>) -> Self {
        Self {
            code: code.to_string(),
            severity: Severity::Warning,
            message,
            chunk_id: chunk_id.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        !self
            .issues
            .iter()
            .any(|issue| issue.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }
}

pub fn validate_chunks(chunks: &[Chunk], config: &PipelineConfig) -> ValidationResult {
    let mut issues = Vec::new();
    let ids: HashSet<&str> = chunks.iter().map(|c| c.id.as_str()).collect();

    match chunks.iter().find(|c| c.chunk_type == ChunkType::Setup) {
        None => issues.push(ValidationIssue::error(
            "MISSING_SETUP",
            "no setup chunk was produced".to_string(),
            None,
        )),
        Some(setup) if setup.order != 0 => issues.push(ValidationIssue::error(
            "SETUP_NOT_FIRST",
            format!("setup chunk '{}' has order {}, expected 0", setup.id, setup.order),
            Some(&setup.id),
        )),
        Some(_) => {}
    }

    if !chunks
        .iter()
        .any(|c| c.chunk_type == ChunkType::Implementation)
    {
        issues.push(ValidationIssue::warning(
            "NO_IMPLEMENTATION",
            "plan produced no implementation chunks".to_string(),
            None,
        ));
    }

    let max_tokens = config.chunk_size_targets().max;
    for chunk in chunks {
        if chunk.estimated_tokens > max_tokens {
            issues.push(ValidationIssue::warning(
                "CHUNK_LARGE",
                format!(
                    "chunk '{}' is estimated at {} tokens, above the {} token target ceiling",
                    chunk.id, chunk.estimated_tokens, max_tokens
                ),
                Some(&chunk.id),
            ));
        }

        for dep in &chunk.depends_on {
            if !ids.contains(dep.as_str()) {
                issues.push(ValidationIssue::error(
                    "MISSING_DEPENDENCY",
                    format!("chunk '{}' depends on unknown chunk '{}'", chunk.id, dep),
                    Some(&chunk.id),
                ));
            }
        }
    }

    ValidationResult { issues }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::types::ChunkType;
    use crate::config::PipelineConfig;

    fn setup_chunk() -> Chunk {
        Chunk {
            id: "00-setup".to_string(),
            order: 0,
            name: "Setup".to_string(),
            chunk_type: ChunkType::Setup,
            depends_on: vec![],
            plan_path: "00-setup.md".to_string(),
            estimated_tokens: 100,
            description: String::new(),
            expected_files: vec![],
            expected_modifications: vec![],
        }
    }

    fn impl_chunk(id: &str, depends_on: Vec<&str>, tokens: u64) -> Chunk {
        Chunk {
            id: id.to_string(),
            order: 1,
            name: id.to_string(),
            chunk_type: ChunkType::Implementation,
            depends_on: depends_on.into_iter().map(str::to_string).collect(),
            plan_path: format!("{id}.md"),
            estimated_tokens: tokens,
            description: String::new(),
            expected_files: vec![],
            expected_modifications: vec![],
        }
    }

    #[test]
    fn well_formed_chunk_list_is_valid() {
        let config = PipelineConfig::for_profile(crate::config::EnvironmentProfile::Api).unwrap();
        let chunks = vec![setup_chunk(), impl_chunk("01a-database", vec!["00-setup"], 500)];
        let result = validate_chunks(&chunks, &config);
        assert!(result.is_valid());
        assert_eq!(result.error_count(), 0);
    }

    #[test]
    fn missing_setup_chunk_is_an_error() {
        let config = PipelineConfig::for_profile(crate::config::EnvironmentProfile::Api).unwrap();
        let chunks = vec![impl_chunk("01a-database", vec![], 500)];
        let result = validate_chunks(&chunks, &config);
        assert!(!result.is_valid());
        assert!(result.issues.iter().any(|i| i.code == "MISSING_SETUP"));
    }

    #[test]
    fn setup_chunk_out_of_order_is_an_error() {
        let config = PipelineConfig::for_profile(crate::config::EnvironmentProfile::Api).unwrap();
        let mut setup = setup_chunk();
        setup.order = 2;
        let chunks = vec![setup];
        let result = validate_chunks(&chunks, &config);
        assert!(result.issues.iter().any(|i| i.code == "SETUP_NOT_FIRST"));
    }

    #[test]
    fn missing_dependency_is_an_error() {
        let config = PipelineConfig::for_profile(crate::config::EnvironmentProfile::Api).unwrap();
        let chunks = vec![
            setup_chunk(),
            impl_chunk("01a-database", vec!["00-setup", "01z-ghost"], 500),
        ];
        let result = validate_chunks(&chunks, &config);
        assert!(result
            .issues
            .iter()
            .any(|i| i.code == "MISSING_DEPENDENCY" && i.chunk_id.as_deref() == Some("01a-database")));
    }

    #[test]
    fn oversized_chunk_is_a_warning_not_an_error() {
        let config = PipelineConfig::for_profile(crate::config::EnvironmentProfile::Api).unwrap();
        let huge_tokens = config.chunk_size_targets().max + 1;
        let chunks = vec![
            setup_chunk(),
            impl_chunk("01a-database", vec!["00-setup"], huge_tokens),
        ];
        let result = validate_chunks(&chunks, &config);
        assert!(result.is_valid());
        assert!(result.issues.iter().any(|i| i.code == "CHUNK_LARGE"));
    }

    #[test]
    fn no_implementation_chunks_is_a_warning() {
        let config = PipelineConfig::for_profile(crate::config::EnvironmentProfile::Api).unwrap();
        let chunks = vec![setup_chunk()];
        let result = validate_chunks(&chunks, &config);
        assert!(result.is_valid());
        assert!(result.issues.iter().any(|i| i.code == "NO_IMPLEMENTATION"));
    }
}
