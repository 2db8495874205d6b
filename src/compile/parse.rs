//! Parses `file:line:col: error|warning: message` diagnostics out of build
//! tool output. Both `xcodebuild` and `swift build` use this
//! clang-style diagnostic format, so one regex covers both.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static DIAGNOSTIC_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?P<file>[^\s:][^:]*):(?P<line>\d+):(?P<col>\d+):\s*(?P<level>error|warning):\s*(?P<message>.+)$")
        .unwrap()
});

/// A bare `error: <message>` line with no `file:line:col` prefix — e.g. a
/// linker error or a tool-level failure that isn't tied to one source
/// location. Only `error`, never `warning`: an unlocated build failure is
/// always an error.
static BARE_ERROR_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^error:\s*(?P<message>.+)$").unwrap());

/// One parsed error or warning line. `file`/`line`/`column` are
/// absent for a bare `error: <message>` line with no source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Diagnostics {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn parse_diagnostics(output: &str) -> Diagnostics {
    let mut diagnostics = Diagnostics::default();
    let mut located_lines: HashSet<&str> = HashSet::new();

    for caps in DIAGNOSTIC_LINE.captures_iter(output) {
        located_lines.insert(caps.get(0).unwrap().as_str());
        let diagnostic = Diagnostic {
            file: Some(caps["file"].to_string()),
            line: caps["line"].parse().ok(),
            column: caps["col"].parse().ok(),
            message: caps["message"].trim().to_string(),
        };
        match &caps["level"] {
            "error" => diagnostics.errors.push(diagnostic),
            _ => diagnostics.warnings.push(diagnostic),
        }
    }

    for caps in BARE_ERROR_LINE.captures_iter(output) {
        let whole = caps.get(0).unwrap().as_str();
        if located_lines.contains(whole) {
            continue;
        }
        diagnostics.errors.push(Diagnostic {
            file: None,
            line: None,
            column: None,
            message: caps["message"].trim().to_string(),
        });
    }

    diagnostics
}
