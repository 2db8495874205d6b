//! `adw chunk <plan> [--output <dir>]`.
//!
//! Runs the chunker in isolation, without touching git or spawning any
//! worker — useful for previewing how a plan will be split before
//! committing to a full `adw execute` run.

use crate::chunk::{chunk_plan, validate_chunks};
use crate::config::PipelineConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub fn run(plan: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let plan_text =
        std::fs::read_to_string(&plan).with_context(|| format!("reading plan at {}", plan.display()))?;
    let chunks_with_bodies = chunk_plan(&plan_text);
    let chunks: Vec<_> = chunks_with_bodies.iter().map(|c| c.chunk.clone()).collect();

    let config = PipelineConfig::from_env()?;
    let validation = validate_chunks(&chunks, &config);

    for issue in &validation.issues {
        let marker = match issue.severity {
            crate::chunk::Severity::Error => "error",
            crate::chunk::Severity::Warning => "warning",
        };
        eprintln!("[{marker}:{}] {}", issue.code, issue.message);
    }

    if let Some(dir) = output {
        write_chunks(&dir, &chunks_with_bodies)?;
    } else {
        for c in &chunks_with_bodies {
            println!(
                "{:<24} order={:<3} tokens~{:<6} depends_on={:?}",
                c.chunk.id, c.chunk.order, c.chunk.estimated_tokens, c.chunk.depends_on
            );
        }
    }

    if !validation.is_valid() {
        anyhow::bail!("plan has {} validation error(s)", validation.error_count());
    }
    Ok(())
}

fn write_chunks(dir: &Path, chunks_with_bodies: &[crate::chunk::ChunkWithBody]) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    for c in chunks_with_bodies {
        let path = dir.join(c.chunk.body_filename());
        std::fs::write(&path, &c.body).with_context(|| format!("writing {}", path.display()))?;
    }
    let manifest_path = dir.join("manifest.json");
    let manifest: Vec<_> = chunks_with_bodies.iter().map(|c| c.chunk.clone()).collect();
    std::fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)
        .with_context(|| format!("writing {}", manifest_path.display()))?;
    Ok(())
}
