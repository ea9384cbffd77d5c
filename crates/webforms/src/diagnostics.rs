//! Ordered parse diagnostics.
//!
//! The collector is created per parse session and threaded through the lexer
//! and engine by mutable reference, so every component appends to one ordered
//! list. Nothing is deduplicated; the order is emission order.

use crate::token::Location;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// One recorded problem, positioned where it was detected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Location,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} at {}", self.severity, self.message, self.location)
    }
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, message: impl Into<String>, location: Location) {
        self.record(Severity::Error, message, location);
    }

    pub fn warning(&mut self, message: impl Into<String>, location: Location) {
        self.record(Severity::Warning, message, location);
    }

    pub fn record(&mut self, severity: Severity, message: impl Into<String>, location: Location) {
        self.entries.push(Diagnostic {
            severity,
            message: message.into(),
            location,
        });
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries
            .iter()
            .filter(|diagnostic| diagnostic.severity == severity)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_keep_emission_order() {
        let mut diags = Diagnostics::new();
        diags.warning("first", Location::START);
        diags.error("second", Location { line: 2, column: 5 });
        diags.warning("third", Location { line: 9, column: 1 });

        let messages: Vec<&str> = diags.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, ["first", "second", "third"]);
        assert_eq!(diags.count(Severity::Error), 1);
        assert_eq!(diags.count(Severity::Warning), 2);
    }

    #[test]
    fn duplicates_are_not_collapsed() {
        let mut diags = Diagnostics::new();
        diags.error("same", Location::START);
        diags.error("same", Location::START);
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn diagnostic_display_names_severity_and_position() {
        let mut diags = Diagnostics::new();
        diags.error("unclosed element <p>", Location { line: 4, column: 2 });
        assert_eq!(
            diags.entries()[0].to_string(),
            "error: unclosed element <p> at 4:2"
        );
    }
}
