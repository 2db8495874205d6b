//! The deterministic, LLM-free Markdown plan chunker.
//!
//! Scans the plan line-by-line for level-3 "implementation container"
//! headings (title containing "implementation changes" or "implementation
//! phases") and splits their level-4 subsections off into ordered,
//! dependency-chained chunks. Everything left over becomes the setup chunk.
//! Two calls on identical input always produce byte-identical output —
//! there is no LLM, no randomness, and no filesystem access in this module.

use super::slug::{letter_sequence, slugify};
use super::types::{Chunk, ChunkType};

const SETUP_ID: &str = "00-setup";
const SETUP_NAME: &str = "Setup & Architecture";
const CHARS_PER_TOKEN: usize = 4;

pub fn estimate_tokens(text: &str) -> u64 {
    ((text.len() + CHARS_PER_TOKEN - 1) / CHARS_PER_TOKEN) as u64
}

#[derive(Debug, Clone)]
struct Line<'a> {
    text: &'a str,
    /// ATX heading level (1-6), or 0 if this line is not a heading.
    level: u8,
}

fn heading_level(line: &str) -> u8 {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|&c| c == '#').count();
    if hashes == 0 || hashes > 6 {
        return 0;
    }
    match trimmed.as_bytes().get(hashes) {
        None => hashes as u8,             // bare "###" at EOF with no trailing newline
        Some(b' ') | Some(b'\t') => hashes as u8,
        Some(b'\n') | Some(b'\r') => hashes as u8, // "###" followed only by a line break
        _ => 0,                           // e.g. "###NoSpace" is not a heading
    }
}

fn heading_title(line: &str, _level: u8) -> String {
    line.trim_start()
        .trim_start_matches('#')
        .trim_end_matches('\n')
        .trim_end_matches('\r')
        .trim()
        .to_string()
}

fn is_container_title(title: &str) -> bool {
    let normalized = title.trim().to_lowercase();
    normalized.contains("implementation changes") || normalized.contains("implementation phases")
}

/// Split the plan into lines, retaining the original line terminator on
/// each element so re-joining reproduces the source exactly.
fn split_lines_keep_ends(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

struct Subsection {
    title: String,
    start_line: usize,
    end_line: usize,
}

struct Container {
    #[allow(dead_code)]
    heading_line: usize,
    end_line: usize,
    subsections: Vec<Subsection>,
}

/// A chunk plus the literal Markdown text that makes up its body.
pub struct ChunkWithBody {
    pub chunk: Chunk,
    pub body: String,
}

pub fn chunk_plan(plan: &str) -> Vec<ChunkWithBody> {
    let lines = split_lines_keep_ends(plan);
    let levels: Vec<u8> = lines.iter().map(|l| heading_level(l)).collect();

    let mut containers = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        if levels[i] == 3 && is_container_title(&heading_title(lines[i], 3)) {
            let end_line = next_heading_at_or_below(&levels, i + 1, 3).unwrap_or(lines.len());
            let mut subsections = Vec::new();
            let mut j = i + 1;
            while j < end_line {
                if levels[j] == 4 {
                    let sub_end =
                        next_heading_at_or_below(&levels, j + 1, 4).unwrap_or(end_line);
                    subsections.push(Subsection {
                        title: heading_title(lines[j], 4),
                        start_line: j,
                        end_line: sub_end.min(end_line),
                    });
                    j = sub_end.min(end_line);
                } else {
                    j += 1;
                }
            }
            containers.push(Container {
                heading_line: i,
                end_line,
                subsections,
            });
        }
        i += 1;
    }

    let all_subsections: Vec<&Subsection> =
        containers.iter().flat_map(|c| c.subsections.iter()).collect();

    if all_subsections.is_empty() {
        let body = plan.trim().to_string();
        let tokens = estimate_tokens(&body);
        return vec![ChunkWithBody {
            chunk: Chunk {
                id: SETUP_ID.to_string(),
                order: 0,
                name: SETUP_NAME.to_string(),
                chunk_type: ChunkType::Setup,
                depends_on: vec![],
                plan_path: format!("{SETUP_ID}.md"),
                estimated_tokens: tokens,
                description: "Full plan (no implementation sections detected)".to_string(),
                expected_files: vec![],
                expected_modifications: vec![],
            },
            body,
        }];
    }

    let mut removed = vec![false; lines.len()];
    for sub in &all_subsections {
        for idx in sub.start_line..sub.end_line {
            removed[idx] = true;
        }
    }

    let setup_body = build_setup_body(&lines, &levels, &removed, &containers);
    let setup_tokens = estimate_tokens(&setup_body);

    let mut results = vec![ChunkWithBody {
        chunk: Chunk {
            id: SETUP_ID.to_string(),
            order: 0,
            name: SETUP_NAME.to_string(),
            chunk_type: ChunkType::Setup,
            depends_on: vec![],
            plan_path: format!("{SETUP_ID}.md"),
            estimated_tokens: setup_tokens,
            description: "Plan content outside implementation sections".to_string(),
            expected_files: vec![],
            expected_modifications: vec![],
        },
        body: setup_body,
    }];

    let mut previous_id = SETUP_ID.to_string();
    for (idx, sub) in all_subsections.iter().enumerate() {
        let letter = letter_sequence(idx);
        let slug = slugify(&sub.title);
        let id = if slug.is_empty() {
            format!("01{letter}-section")
        } else {
            format!("01{letter}-{slug}")
        };
        let body: String = lines[sub.start_line..sub.end_line].concat();
        let tokens = estimate_tokens(&body);
        results.push(ChunkWithBody {
            chunk: Chunk {
                id: id.clone(),
                order: (idx + 1) as u32,
                name: sub.title.clone(),
                chunk_type: ChunkType::Implementation,
                depends_on: vec![previous_id.clone()],
                plan_path: format!("{id}.md"),
                estimated_tokens: tokens,
                description: sub.title.clone(),
                expected_files: vec![],
                expected_modifications: vec![],
            },
            body,
        });
        previous_id = id;
    }

    results
}

/// Find the index of the next line whose heading level is nonzero and
/// `<= max_level`, starting at `from`.
fn next_heading_at_or_below(levels: &[u8], from: usize, max_level: u8) -> Option<usize> {
    (from..levels.len()).find(|&idx| levels[idx] != 0 && levels[idx] <= max_level)
}

fn build_setup_body(
    lines: &[&str],
    levels: &[u8],
    removed: &[bool],
    containers: &[Container],
) -> String {
    let mut kept: Vec<&str> = lines
        .iter()
        .zip(removed.iter())
        .filter_map(|(line, is_removed)| if *is_removed { None } else { Some(*line) })
        .collect();

    // Determine which container headings are now "left empty": the next
    // non-removed line after the container heading is a level-2 heading, or
    // there is no next line (EOF of the surviving text).
    let mut drop_heading_text: Vec<&str> = Vec::new();
    for container in containers {
        let heading_text = lines[container.heading_line];
        let mut next_kept_level: Option<u8> = None;
        for idx in (container.heading_line + 1)..lines.len() {
            if removed[idx] {
                continue;
            }
            let t = lines[idx].trim();
            if t.is_empty() {
                continue;
            }
            next_kept_level = Some(levels[idx]);
            break;
        }
        let left_empty = match next_kept_level {
            None => true,
            Some(lvl) => lvl != 0 && lvl <= 2,
        };
        if left_empty {
            drop_heading_text.push(heading_text);
        }
    }

    if !drop_heading_text.is_empty() {
        kept.retain(|line| !drop_heading_text.contains(line));
    }

    collapse_blank_runs(&kept.concat())
}

/// Collapse runs of 3+ blank lines down to exactly 2.
fn collapse_blank_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0usize;
    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run <= 2 {
                out.push_str(line);
            }
        } else {
            blank_run = 0;
            out.push_str(line);
        }
    }
    out
}
