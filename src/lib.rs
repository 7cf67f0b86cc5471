//! QML static analyzer
//!
//! Parses QML files (and their embedded JavaScript) into an entity tree,
//! resolves identifier references, evaluates an XML-expressed rule grammar
//! against the tree and reports lint diagnostics. Optionally re-emits
//! formatted source.
//!
//! # Architecture
//!
//! ```text
//! Source → Lexer → Parser → Entity tree → Resolver → Rule engine → Diagnostics
//!                                      ↘ Formatter → rewritten source
//! ```
//!
//! # Example
//!
//! ```no_run
//! use qmlint::{Analyzer, RuleDocument};
//!
//! let rules = RuleDocument::parse(r#"<Root>
//!   <Check Class="QMLPropertyAssignment">
//!     <Reject Member="content" Class="QMLEntity" Text="No hardcoded colors allowed">
//!       <Condition Member="name" Value="color"/>
//!     </Reject>
//!   </Check>
//! </Root>"#).unwrap();
//!
//! let mut analyzer = Analyzer::new();
//! analyzer.set_file("Main.qml");
//! analyzer.analyze(&rules);
//! for error in analyzer.errors() {
//!     eprintln!("{}", error);
//! }
//! ```

pub mod analyze;
pub mod ast;
pub mod common;
pub mod context;
pub mod fmt;
pub mod grammar;
pub mod lexer;
pub mod parser;
pub mod resolve;

pub use analyze::{AnalysisHandle, Analyzer, AnalyzerObserver};
pub use common::{AnalyzerError, Position, Value};
pub use context::{ParseEvent, ParseOutcome, TreeContext};
pub use grammar::RuleDocument;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parse and resolve one in-memory source buffer
pub fn parse_source(
    source: &str,
    path: &std::path::Path,
) -> Result<ast::File, parser::errors::SyntaxError> {
    let mut file = parser::parse_source(source, path)?;
    resolve::resolve(&mut file);
    Ok(file)
}

/// Reformat one in-memory source buffer
pub fn format_source(
    source: &str,
    path: &std::path::Path,
) -> Result<String, parser::errors::SyntaxError> {
    let file = parser::parse_source(source, path)?;
    Ok(fmt::emit_file(&file))
}
