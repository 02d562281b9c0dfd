//! Error handling for the checked header generator
//!
//! This module defines the error taxonomy shared by every phase of the
//! generator, plus the diagnostic reporter the driver uses to summarize
//! a multi-header run.

use crate::source_loc::{SourceLocation, SourceSpan};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main generator error type that encompasses all phases of generation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeneratorError {
    #[error("Lexical error at {location}: {message}")]
    LexError {
        location: SourceLocation,
        message: String,
    },

    #[error("Parse error at {location}: {message}")]
    ParseError {
        location: SourceLocation,
        message: String,
    },

    #[error("Unsupported typedef '{name}' at {location}: {message}")]
    UnsupportedTypedef {
        name: String,
        location: SourceLocation,
        message: String,
    },

    #[error("Cyclic typedef '{name}' at {location}: {}", .chain.join(" -> "))]
    CyclicTypedef {
        name: String,
        location: SourceLocation,
        chain: Vec<String>,
    },

    #[error("Cannot classify '{name}' at {location}: {message}")]
    Classification {
        name: String,
        location: SourceLocation,
        message: String,
    },

    #[error("IO error: {message}")]
    IoError { message: String },

    #[error("Internal generator error: {message}")]
    InternalError { message: String },
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// A diagnostic message with location and severity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: SourceSpan,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: String, span: SourceSpan) -> Self {
        Self {
            severity: Severity::Error,
            message,
            span,
            notes: Vec::new(),
        }
    }

    pub fn warning(message: String, span: SourceSpan) -> Self {
        Self {
            severity: Severity::Warning,
            message,
            span,
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)?;

        for note in &self.notes {
            write!(f, "\n  note: {}", note)?;
        }

        Ok(())
    }
}

/// Error reporter for collecting and displaying diagnostics
pub struct ErrorReporter {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
            error_count: 0,
            warning_count: 0,
        }
    }

    /// Record a diagnostic, updating the counters for its severity
    pub fn report(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
            Severity::Note => {}
        }
        self.diagnostics.push(diagnostic);
    }

    /// Report an error diagnostic
    pub fn error(&mut self, message: String, span: SourceSpan) {
        self.report(Diagnostic::error(message, span));
    }

    /// Report a warning diagnostic
    pub fn warning(&mut self, message: String, span: SourceSpan) {
        self.report(Diagnostic::warning(message, span));
    }

    /// Check if any errors have been reported
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Print all diagnostics to stderr
    pub fn print_diagnostics(&self) {
        for diagnostic in &self.diagnostics {
            eprintln!("{}", diagnostic);
        }
    }

    /// Create a summary string
    pub fn summary(&self) -> String {
        match (self.error_count, self.warning_count) {
            (0, 0) => "No errors or warnings".to_string(),
            (0, w) => format!("{} warning{}", w, if w == 1 { "" } else { "s" }),
            (e, 0) => format!("{} error{}", e, if e == 1 { "" } else { "s" }),
            (e, w) => format!(
                "{} error{} and {} warning{}",
                e,
                if e == 1 { "" } else { "s" },
                w,
                if w == 1 { "" } else { "s" }
            ),
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneratorError {
    /// Create a lexer error
    pub fn lexer_error(message: String, location: SourceLocation) -> Self {
        GeneratorError::LexError { location, message }
    }

    /// Create a parse error
    pub fn parse_error(message: String, location: SourceLocation) -> Self {
        GeneratorError::ParseError { location, message }
    }

    /// Create a classification error for a declaration
    pub fn classification(name: &str, message: String, location: SourceLocation) -> Self {
        GeneratorError::Classification {
            name: name.to_string(),
            location,
            message,
        }
    }

    /// Create an unsupported typedef error
    pub fn unsupported_typedef(name: &str, message: String, location: SourceLocation) -> Self {
        GeneratorError::UnsupportedTypedef {
            name: name.to_string(),
            location,
            message,
        }
    }

    /// Location of the offending declaration, when the error has one
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            GeneratorError::LexError { location, .. }
            | GeneratorError::ParseError { location, .. }
            | GeneratorError::UnsupportedTypedef { location, .. }
            | GeneratorError::CyclicTypedef { location, .. }
            | GeneratorError::Classification { location, .. } => Some(location),
            GeneratorError::IoError { .. } | GeneratorError::InternalError { .. } => None,
        }
    }

    /// Convert into a diagnostic for the driver's reporter
    pub fn to_diagnostic(&self) -> Diagnostic {
        let span = self
            .location()
            .cloned()
            .map(SourceSpan::from_location)
            .unwrap_or_else(SourceSpan::dummy);
        Diagnostic::error(self.to_string(), span)
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for GeneratorError {
    fn from(err: std::io::Error) -> Self {
        GeneratorError::IoError {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> SourceSpan {
        SourceSpan::new(
            SourceLocation::new("api.h", 1, 1),
            SourceLocation::new("api.h", 1, 5),
        )
    }

    #[test]
    fn test_error_reporter() {
        let mut reporter = ErrorReporter::new();

        assert!(!reporter.has_errors());
        assert_eq!(reporter.error_count(), 0);

        reporter.error("Test error".to_string(), span());
        assert!(reporter.has_errors());
        assert_eq!(reporter.error_count(), 1);
    }

    #[test]
    fn test_diagnostic_with_notes() {
        let diag = Diagnostic::error("Test error".to_string(), span())
            .with_note("first".to_string())
            .with_note("second".to_string());

        assert_eq!(diag.notes.len(), 2);
        assert_eq!(format!("{}", diag), "error: Test error\n  note: first\n  note: second");
    }

    #[test]
    fn test_summary() {
        let mut reporter = ErrorReporter::new();
        assert_eq!(reporter.summary(), "No errors or warnings");

        reporter.error("Error 1".to_string(), span());
        assert_eq!(reporter.summary(), "1 error");

        reporter.error("Error 2".to_string(), span());
        assert_eq!(reporter.summary(), "2 errors");

        reporter.warning("Warning 1".to_string(), span());
        assert_eq!(reporter.summary(), "2 errors and 1 warning");
    }

    #[test]
    fn test_cyclic_typedef_message_names_chain() {
        let err = GeneratorError::CyclicTypedef {
            name: "A".to_string(),
            location: SourceLocation::new("api.h", 3, 13),
            chain: vec!["A".to_string(), "B".to_string(), "A".to_string()],
        };
        assert_eq!(err.to_string(), "Cyclic typedef 'A' at api.h:3:13: A -> B -> A");
    }

    #[test]
    fn test_error_to_diagnostic_keeps_location() {
        let err = GeneratorError::classification(
            "cb",
            "function pointer parameter".to_string(),
            SourceLocation::new("api.h", 7, 1),
        );
        let diag = err.to_diagnostic();
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.span.start.line, 7);
        assert!(diag.message.starts_with("Cannot classify 'cb' at api.h:7:1"));
    }

    #[test]
    fn test_io_error_has_no_location() {
        let err: GeneratorError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.location().is_none());
        assert_eq!(err.to_string(), "IO error: gone");
    }
}
