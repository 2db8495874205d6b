//! Parses a worker-written `handoff.md` into structured [`Handoff`] data.
//!
//! Section detection mirrors the chunker's line-scanning approach; list
//! items and the decision sub-structure are then pulled out of each
//! section's body with a small amount of line-oriented parsing, and context
//! usage is pulled out with a couple of fixed regexes.

use super::types::{ContextUsage, Decision, Handoff, HandoffSource, Section};
use regex::Regex;
use std::sync::LazyLock;

static FINAL_PCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)final\s*:?\s*(\d{1,3})\s*%(?:\s*\((\d+)k\s*tokens\))?").unwrap());
static PEAK_PCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)peak\s*:?\s*(\d{1,3})\s*%(?:\s*\((\d+)k\s*tokens\))?").unwrap());
static BOLD_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-*]?\s*\*\*([A-Za-z][A-Za-z -]*?):\*\*\s*(.*)$").unwrap());
static LEADING_NUMBERING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\d+[.)]\s*").unwrap());
static TRAILING_PARENTHETICAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\([^()]*\)\s*$").unwrap());
static FROM_TO_CHUNK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^from\s*chunk\s*:?\s*(\S+)\s*$|^to\s*chunk\s*:?\s*(\S+)\s*$").unwrap()
});

fn heading_level(line: &str) -> u8 {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|&c| c == '#').count();
    if hashes == 0 || hashes > 6 {
        return 0;
    }
    match trimmed.as_bytes().get(hashes) {
        None | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') => hashes as u8,
        _ => 0,
    }
}

fn heading_title(line: &str) -> String {
    line.trim_start()
        .trim_start_matches('#')
        .trim_end_matches(['\n', '\r'])
        .trim()
        .to_string()
}

/// Strip leading numbering (`1.`/`2)`) and a single trailing parenthetical
/// (`(optional)`) from a raw heading.
fn normalize_heading(title: &str) -> String {
    let without_number = LEADING_NUMBERING.replace(title, "");
    TRAILING_PARENTHETICAL
        .replace(&without_number, "")
        .trim()
        .to_string()
}

/// Split a handoff document into its `##`/`###` sections. A preamble before
/// the first heading (if any) is discarded — handoffs are expected to open
/// straight into a summary heading.
fn split_sections(raw: &str) -> Vec<Section> {
    let lines: Vec<&str> = raw.split_inclusive('\n').collect();
    let levels: Vec<u8> = lines.iter().map(|l| heading_level(l)).collect();

    let mut sections = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        if levels[i] == 2 || levels[i] == 3 {
            let title = normalize_heading(&heading_title(lines[i]));
            let end = (i + 1..lines.len())
                .find(|&j| levels[j] == 2 || levels[j] == 3)
                .unwrap_or(lines.len());
            let body = lines[i + 1..end].concat();
            sections.push(Section { title, body });
            i = end;
        } else {
            i += 1;
        }
    }
    sections
}

/// Strip a leading checkbox marker (`[ ]`/`[x]`/`[X]`) from a list item, if
/// present.
fn strip_checkbox(item: &str) -> &str {
    let trimmed = item.trim_start();
    for prefix in ["[ ]", "[x]", "[X]"] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            return rest.trim_start();
        }
    }
    trimmed
}

fn list_items(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            let stripped = trimmed
                .strip_prefix("- ")
                .or_else(|| trimmed.strip_prefix("* "))
                .or_else(|| {
                    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
                    if digits == 0 {
                        return None;
                    }
                    let rest = &trimmed[digits..];
                    rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") "))
                })?;
            let item = strip_checkbox(stripped).trim();
            if item.is_empty() {
                None
            } else {
                Some(item.to_string())
            }
        })
        .collect()
}

/// Parse a "Key Decisions Made" section body into individual decisions:
/// a level-3 or level-4 heading opens a new decision; bold
/// field markers `**Decision:**`/`**Rationale:**`/`**Tradeoff:**` (also
/// `Trade-off`) direct subsequent lines to the matching field. A decision
/// list may also be flat (no sub-headings, one `**Decision:**` bullet per
/// item) — both shapes are accepted.
fn parse_decisions(body: &str) -> Vec<Decision> {
    let lines: Vec<&str> = body.split_inclusive('\n').collect();
    let levels: Vec<u8> = lines.iter().map(|l| heading_level(l)).collect();
    let has_subheadings = levels.iter().any(|&l| l == 3 || l == 4);

    let mut decisions = Vec::new();
    let mut current: Option<Decision> = None;

    let flush = |current: &mut Option<Decision>, decisions: &mut Vec<Decision>| {
        if let Some(d) = current.take() {
            decisions.push(d);
        }
    };

    for (idx, line) in lines.iter().enumerate() {
        if has_subheadings && (levels[idx] == 3 || levels[idx] == 4) {
            flush(&mut current, &mut decisions);
            let title = heading_title(line);
            if !title.is_empty() {
                current = Some(Decision {
                    decision: title,
                    rationale: None,
                    tradeoff: None,
                });
            }
            continue;
        }

        let Some(caps) = BOLD_LABEL.captures(line) else {
            continue;
        };
        let label = caps[1].trim().to_lowercase();
        let value = caps[2].trim().to_string();
        match label.as_str() {
            // When a heading already opened this decision, a `**Decision:**`
            // line beneath it just fills in the field instead of starting a
            // second one.
            "decision" if has_subheadings => {
                if let Some(d) = current.as_mut() {
                    if !value.is_empty() {
                        d.decision = value;
                    }
                }
            }
            "decision" => {
                flush(&mut current, &mut decisions);
                current = Some(Decision {
                    decision: value,
                    rationale: None,
                    tradeoff: None,
                });
            }
            "rationale" => {
                if let Some(d) = current.as_mut() {
                    d.rationale = Some(value);
                }
            }
            "tradeoff" | "trade-off" => {
                if let Some(d) = current.as_mut() {
                    d.tradeoff = Some(value);
                }
            }
            _ => {}
        }
    }
    flush(&mut current, &mut decisions);
    decisions
}

fn parse_context_usage(body: &str) -> Option<ContextUsage> {
    let final_caps = FINAL_PCT.captures(body);
    let peak_caps = PEAK_PCT.captures(body);
    let final_pct = final_caps.as_ref().and_then(|c| c[1].parse::<u8>().ok());
    let final_tokens = final_caps
        .as_ref()
        .and_then(|c| c.get(2))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map(|k| k * 1000);
    let peak_pct = peak_caps.as_ref().and_then(|c| c[1].parse::<u8>().ok());
    let peak_tokens = peak_caps
        .as_ref()
        .and_then(|c| c.get(2))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map(|k| k * 1000);

    if final_pct.is_none() && peak_pct.is_none() {
        None
    } else {
        Some(ContextUsage {
            final_pct,
            peak_pct,
            final_tokens,
            peak_tokens,
        })
    }
}

fn find_section<'a>(sections: &'a [Section], needle: &str) -> Option<&'a Section> {
    sections.iter().find(|s| s.title.to_lowercase().contains(needle))
}

pub fn parse_handoff(raw: &str) -> Handoff {
    let sections = split_sections(raw);

    let from_chunk = FROM_TO_CHUNK
        .captures_iter(raw)
        .find_map(|c| c.get(1).map(|m| m.as_str().to_string()));
    let to_chunk = FROM_TO_CHUNK
        .captures_iter(raw)
        .find_map(|c| c.get(2).map(|m| m.as_str().to_string()));

    let completed_items = find_section(&sections, "what i completed")
        .map(|s| list_items(&s.body))
        .unwrap_or_default();

    let files_created = find_section(&sections, "files created")
        .map(|s| list_items(&s.body))
        .unwrap_or_default();

    let files_modified = find_section(&sections, "files modified")
        .map(|s| list_items(&s.body))
        .unwrap_or_default();

    let decisions = find_section(&sections, "key decisions made")
        .map(|s| parse_decisions(&s.body))
        .unwrap_or_default();

    let context_for_next = find_section(&sections, "context for next chunk")
        .map(|s| s.body.trim().to_string())
        .unwrap_or_default();

    let integration_notes = find_section(&sections, "integration notes")
        .map(|s| s.body.trim().to_string())
        .unwrap_or_default();

    let remaining_work = find_section(&sections, "remaining work").map(|s| s.body.trim().to_string());
    let blockers = find_section(&sections, "blockers").map(|s| s.body.trim().to_string());
    let test_status = find_section(&sections, "tests status").map(|s| s.body.trim().to_string());

    let context_usage = find_section(&sections, "context usage").and_then(|s| parse_context_usage(&s.body));

    Handoff {
        source: HandoffSource::Worker,
        from_chunk,
        to_chunk,
        sections,
        completed_items,
        files_created,
        files_modified,
        decisions,
        context_for_next,
        integration_notes,
        remaining_work,
        blockers,
        test_status,
        context_usage,
        raw: raw.to_string(),
    }
}
