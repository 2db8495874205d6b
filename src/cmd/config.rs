//! `adw config` — prints the resolved pipeline
//! configuration so an operator can see what profile and overrides are in
//! effect before kicking off a run.

use crate::config::PipelineConfig;
use anyhow::Result;

pub fn run() -> Result<()> {
    let config = PipelineConfig::from_env()?;
    let targets = config.chunk_size_targets();
    let thresholds = config.context_thresholds();

    println!("profile: {}", config.profile);
    println!("chunk_context_budget: {}", config.chunk_context_budget);
    println!(
        "chunk_size_targets: min={} target={} max={}",
        targets.min, targets.target, targets.max
    );
    println!(
        "handoff size: target={} max={}",
        config.handoff_target_size, config.handoff_max_size
    );
    println!(
        "context_thresholds: warning={} ({:.0}%) critical={} ({:.0}%) emergency={} ({:.0}%)",
        thresholds.warning,
        config.warning_threshold * 100.0,
        thresholds.critical,
        config.critical_threshold * 100.0,
        thresholds.emergency,
        config.emergency_threshold * 100.0
    );
    println!(
        "retries: max_chunk_retries={} max_compile_fix_retries={}",
        config.max_chunk_retries, config.max_compile_fix_retries
    );
    println!(
        "xcode_scheme: {}",
        config.xcode_scheme.as_deref().unwrap_or("(auto-detect)")
    );
    Ok(())
}
