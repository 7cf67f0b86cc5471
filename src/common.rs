//! Common types used throughout the analyzer

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Source position (0-based line and column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Rendered 1-based
        write!(f, "{}, {}", self.line + 1, self.column + 1)
    }
}

/// A literal value carried by a token or an AST entity
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Real(f64),
    String(String),
}

impl Value {
    /// Canonical type name, as used by the `Type` rule attribute
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Real(_) => "real",
            Value::String(_) => "string",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            // Keep a decimal point so a real never reads back as an integer
            Value::Real(r) if r.fract() == 0.0 && r.is_finite() => write!(f, "{:.1}", r),
            Value::Real(r) => write!(f, "{}", r),
            Value::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// A diagnostic reported by the analyzer: a rule violation, an unreferenced
/// symbol or a syntax error, attached to a position in one source file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnalyzerError {
    pub file_name: String,
    pub position: Position,
    pub text: String,
}

impl AnalyzerError {
    pub fn new(file_name: impl Into<String>, position: Position, text: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            position,
            text: text.into(),
        }
    }

    pub fn in_file(path: &Path, position: Position, text: impl Into<String>) -> Self {
        Self::new(path.display().to_string(), position, text)
    }
}

impl fmt::Display for AnalyzerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) : {}", self.file_name, self.position, self.text)
    }
}
