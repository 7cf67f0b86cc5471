//! Syntax error type shared by the lexer and the parser
//!
//! A syntax error is fatal for the file that produced it: the parsing
//! context records it and the file is skipped for resolution and rule
//! evaluation. There is no intra-file recovery.

use crate::common::{AnalyzerError, Position};
use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// A fatal error raised while tokenizing or parsing one file
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("syntax error at line {}, column {}: {message}", .position.line + 1, .position.column + 1)]
#[diagnostic(code(qmlint::syntax_error))]
pub struct SyntaxError {
    pub position: Position,
    pub message: String,
}

impl SyntaxError {
    pub fn new(position: Position, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }

    /// Attach the file the error occurred in, producing a reportable diagnostic
    pub fn into_analyzer_error(self, path: &Path) -> AnalyzerError {
        AnalyzerError::in_file(path, self.position, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_one_based() {
        let err = SyntaxError::new(Position::new(2, 7), "unexpected character: '@'");
        assert_eq!(
            err.to_string(),
            "syntax error at line 3, column 8: unexpected character: '@'"
        );
    }

    #[test]
    fn test_into_analyzer_error() {
        let err = SyntaxError::new(Position::new(0, 0), "unterminated string");
        let diag = err.into_analyzer_error(Path::new("a.qml"));
        assert_eq!(diag.to_string(), "a.qml (1, 1) : unterminated string");
    }
}
