//! `adw validate <plan>`. Runs the chunker and reports structural
//! issues without writing anything to disk.

use crate::chunk::{chunk_plan, validate_chunks, Severity};
use crate::config::PipelineConfig;
use anyhow::{Context, Result};
use std::path::PathBuf;

pub fn run(plan: PathBuf) -> Result<()> {
    let plan_text =
        std::fs::read_to_string(&plan).with_context(|| format!("reading plan at {}", plan.display()))?;
    let chunks_with_bodies = chunk_plan(&plan_text);
    let chunks: Vec<_> = chunks_with_bodies.iter().map(|c| c.chunk.clone()).collect();

    let config = PipelineConfig::from_env()?;
    let validation = validate_chunks(&chunks, &config);

    if validation.issues.is_empty() {
        println!("plan is valid: {} chunk(s), no issues found", chunks.len());
        return Ok(());
    }

    for issue in &validation.issues {
        let marker = match issue.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN",
        };
        println!("{marker} [{}] {}", issue.code, issue.message);
    }

    println!(
        "{} chunk(s), {} error(s), {} warning(s)",
        chunks.len(),
        validation.error_count(),
        validation.warning_count()
    );

    if !validation.is_valid() {
        anyhow::bail!("plan failed validation");
    }
    Ok(())
}
