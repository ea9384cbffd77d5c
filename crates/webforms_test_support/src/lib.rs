//! Shared fixture format and helpers for the webforms test suites.

use std::fmt::Write;

use serde::Deserialize;

/// One corpus fixture: a source document plus what a parse of it must
/// produce. Only the fields a case cares about need to be present.
#[derive(Clone, Debug, Deserialize)]
pub struct CorpusCase {
    pub name: String,
    #[serde(default)]
    pub file_name: Option<String>,
    pub source: String,
    #[serde(default)]
    pub snapshot: Option<String>,
    /// Substrings expected in the error diagnostics, in emission order.
    #[serde(default)]
    pub errors: Vec<String>,
    /// Substrings expected in the warning diagnostics, in emission order.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Expected `WebSubtype` variant name after reconciliation.
    #[serde(default)]
    pub subtype: Option<String>,
    /// The parse must produce no error diagnostics at all.
    #[serde(default)]
    pub clean: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CorpusFile {
    #[serde(rename = "case")]
    pub cases: Vec<CorpusCase>,
}

/// Parse a TOML fixture file, panicking with the fixture name on any shape
/// problem.
pub fn load_corpus(name: &str, content: &str) -> Vec<CorpusCase> {
    let file: CorpusFile = toml::from_str(content)
        .unwrap_or_else(|err| panic!("failed to parse corpus fixture {name}: {err}"));
    file.cases
}

/// Line diff for snapshot mismatches: the first differing line with two
/// lines of context either side, then a length tally. `None` when equal.
pub fn diff_snapshots(expected: &str, actual: &str) -> Option<String> {
    if expected == actual {
        return None;
    }
    let expected_lines: Vec<&str> = expected.lines().collect();
    let actual_lines: Vec<&str> = actual.lines().collect();
    let max = expected_lines.len().max(actual_lines.len());
    let missing = "<missing>";
    let mismatch = (0..max).find(|&i| {
        expected_lines.get(i).copied().unwrap_or(missing)
            != actual_lines.get(i).copied().unwrap_or(missing)
    });

    let mut out = String::new();
    match mismatch {
        Some(at) => {
            let start = at.saturating_sub(2);
            let end = (at + 3).min(max);
            let _ = writeln!(out, "first mismatch at line {}:", at + 1);
            for idx in start..end {
                let left = expected_lines.get(idx).copied().unwrap_or(missing);
                let right = actual_lines.get(idx).copied().unwrap_or(missing);
                let marker = if idx == at { ">" } else { " " };
                let _ = writeln!(out, "{marker} {:>4}  expected: {left}", idx + 1);
                let _ = writeln!(out, "{marker} {:>4}    actual: {right}", idx + 1);
            }
        }
        None => {
            let _ = writeln!(out, "lines match but line endings differ");
        }
    }
    let _ = writeln!(
        out,
        "expected {} lines, actual {} lines",
        expected_lines.len(),
        actual_lines.len()
    );
    Some(out)
}

/// Run one corpus case end to end against the parser and report every
/// divergence from the fixture's expectations.
#[cfg(feature = "corpus")]
pub fn check_case(case: &CorpusCase) -> Result<(), String> {
    use webforms::{ParseOptions, Severity, check_tree, tree_snapshot};

    let options = ParseOptions {
        file_name: case.file_name.as_deref(),
        ..ParseOptions::default()
    };
    let parsed = webforms::parse(&case.source, &options)
        .map_err(|err| format!("{}: parse returned {err}", case.name))?;

    check_tree(&parsed.document)
        .map_err(|err| format!("{}: tree invariant broken: {err}", case.name))?;

    if let Some(expected) = &case.snapshot {
        let actual = tree_snapshot::render(&parsed.document);
        if let Some(diff) = diff_snapshots(expected.trim_end(), actual.trim_end()) {
            return Err(format!("{}: snapshot mismatch\n{diff}", case.name));
        }
    }

    check_messages(case, &parsed.diagnostics, Severity::Error, &case.errors)?;
    check_messages(case, &parsed.diagnostics, Severity::Warning, &case.warnings)?;

    if let Some(subtype) = &case.subtype {
        let actual = format!("{:?}", parsed.page_info.subtype);
        if &actual != subtype {
            return Err(format!(
                "{}: subtype {actual}, expected {subtype}",
                case.name
            ));
        }
    }
    if case.clean && parsed.diagnostics.count(Severity::Error) != 0 {
        return Err(format!(
            "{}: expected no errors, got {:?}",
            case.name,
            parsed.diagnostics.entries()
        ));
    }
    Ok(())
}

/// Every expected substring must appear in some diagnostic of the given
/// severity, in order; extra diagnostics are allowed.
#[cfg(feature = "corpus")]
fn check_messages(
    case: &CorpusCase,
    diagnostics: &webforms::Diagnostics,
    severity: webforms::Severity,
    expected: &[String],
) -> Result<(), String> {
    let mut found = diagnostics
        .entries()
        .iter()
        .filter(move |d| d.severity == severity)
        .map(|d| d.message.as_str());
    for needle in expected {
        if !found.any(|message| message.contains(needle.as_str())) {
            return Err(format!(
                "{}: no {severity} diagnostic containing {needle:?} (have {:?})",
                case.name,
                diagnostics.entries(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corpus_toml_parses_into_cases() {
        let cases = load_corpus(
            "inline",
            r#"
[[case]]
name = "one"
source = "<div></div>"
clean = true

[[case]]
name = "two"
file_name = "a.aspx"
source = "x"
errors = ["File directive is missing"]
"#,
        );
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].name, "one");
        assert!(cases[0].clean);
        assert!(cases[0].snapshot.is_none());
        assert_eq!(cases[1].file_name.as_deref(), Some("a.aspx"));
        assert_eq!(cases[1].errors.len(), 1);
    }

    #[test]
    fn diff_reports_the_first_mismatching_line() {
        let diff = diff_snapshots("a\nb\nc\nd", "a\nb\nX\nd").unwrap();
        assert!(diff.contains("first mismatch at line 3"), "{diff}");
        assert!(diff.contains("expected: c"));
        assert!(diff.contains("actual: X"));
    }

    #[test]
    fn equal_snapshots_produce_no_diff() {
        assert!(diff_snapshots("a\nb", "a\nb").is_none());
    }

    #[test]
    fn length_difference_is_reported() {
        let diff = diff_snapshots("a\nb", "a").unwrap();
        assert!(diff.contains("expected 2 lines, actual 1 lines"), "{diff}");
    }
}
