//! Console-styled output for the CLI surface. Lighter than the base
//! crate's `ui` module — this pipeline has one report to render, not an
//! interactive review flow — but borrows the same `console::style` idiom.

use crate::chunk::ChunkStatus;
use crate::report::Report;
use crate::state::PipelineStatus;
use console::style;

pub fn status_icon(status: ChunkStatus) -> console::StyledObject<&'static str> {
    match status {
        ChunkStatus::Pending => style("o").dim(),
        ChunkStatus::InProgress => style(">").yellow(),
        ChunkStatus::Completed => style("+").green(),
        ChunkStatus::Failed => style("x").red(),
        ChunkStatus::Skipped => style("-").dim(),
    }
}

pub fn pipeline_status_label(status: PipelineStatus) -> console::StyledObject<&'static str> {
    match status {
        PipelineStatus::Initialized => style("initialized").dim(),
        PipelineStatus::Chunking => style("chunking").cyan(),
        PipelineStatus::Executing => style("executing").yellow(),
        PipelineStatus::Completed => style("completed").green(),
        PipelineStatus::Failed => style("failed").red(),
    }
}

pub fn render_report(report: &Report) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "status: {}  ({} / {} chunks completed)\n",
        pipeline_status_label(report.status),
        report.completed,
        report.total
    ));

    if !report.failed_chunks.is_empty() {
        out.push_str(&format!(
            "failed: {}\n",
            report
                .failed_chunks
                .iter()
                .map(|s| style(s.as_str()).red().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    for rec in &report.recommendations {
        out.push_str(&format!("  - {rec}\n"));
    }

    out
}
