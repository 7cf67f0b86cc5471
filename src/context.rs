//! Parsing context: the file collection and parse orchestration
//!
//! The context owns every `File` produced by a run. `parse` works through
//! all not-yet-parsed files, runs the resolver passes on each successful
//! parse, and (when imports are included) queues transitively imported
//! files behind the file that named them. One file's failure never stops
//! the others; the most recent error is kept as the context error.

use crate::ast::File;
use crate::common::{AnalyzerError, Position};
use crate::parser;
use crate::resolve;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Result of a parse run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    Success,
    /// Nothing was added to the context
    NoFile,
    SyntaxError,
}

/// Progress notifications emitted during `parse`
#[derive(Debug, Clone)]
pub enum ParseEvent {
    ParsingStarted(PathBuf),
    ParsingFinished(PathBuf),
    ImportParsingStarted(PathBuf),
}

/// The collection of files under analysis
#[derive(Debug, Default)]
pub struct TreeContext {
    files: Vec<File>,
    folder: PathBuf,
    include_imports: bool,
    error: Option<AnalyzerError>,
}

impl TreeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, string-path imports of parsed files are parsed too
    pub fn set_include_imports(&mut self, value: bool) {
        self.include_imports = value;
    }

    /// Directory of the file most recently parsed
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn files(&self) -> &[File] {
        &self.files
    }

    pub fn files_mut(&mut self) -> &mut [File] {
        &mut self.files
    }

    /// Register a file for parsing (no-op if already known)
    pub fn add_file(&mut self, path: &Path) {
        self.file_index(path);
    }

    /// Index of the file for `path`, creating it on demand
    fn file_index(&mut self, path: &Path) -> usize {
        if let Some(index) = self.files.iter().position(|f| f.path == path) {
            return index;
        }
        self.files.push(File::new(path.to_path_buf()));
        self.files.len() - 1
    }

    pub fn file(&self, path: &Path) -> Option<&File> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn file_parsed(&self, path: &Path) -> bool {
        self.file(path).is_some_and(|f| f.parsed)
    }

    /// The most recent error of the current run
    pub fn error(&self) -> Option<&AnalyzerError> {
        self.error.as_ref()
    }

    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    /// Parse every file that has not been parsed yet. Cancellation is
    /// honored at file boundaries.
    pub fn parse(
        &mut self,
        cancel: &AtomicBool,
        notify: &mut dyn FnMut(ParseEvent),
    ) -> ParseOutcome {
        if self.files.is_empty() {
            return ParseOutcome::NoFile;
        }

        let mut outcome = ParseOutcome::Success;
        let mut index = 0;

        while index < self.files.len() {
            if cancel.load(Ordering::Relaxed) {
                return outcome;
            }
            if self.files[index].parsed {
                index += 1;
                continue;
            }

            let path = self.files[index].path.clone();
            if let Some(parent) = path.parent() {
                self.folder = parent.to_path_buf();
            }

            notify(ParseEvent::ParsingStarted(path.clone()));

            if let Err(error) = self.parse_one(index, &path, notify) {
                tracing::debug!("{}", error);
                self.files[index].parsed = true;
                self.files[index].error = Some(error.clone());
                self.error = Some(error);
                outcome = ParseOutcome::SyntaxError;
            }

            notify(ParseEvent::ParsingFinished(path));
            index += 1;
        }

        outcome
    }

    fn parse_one(
        &mut self,
        index: usize,
        path: &Path,
        notify: &mut dyn FnMut(ParseEvent),
    ) -> Result<(), AnalyzerError> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            AnalyzerError::in_file(path, Position::default(), format!("cannot open file: {}", e))
        })?;

        let mut file =
            parser::parse_source(&source, path).map_err(|e| e.into_analyzer_error(path))?;
        resolve::resolve(&mut file);

        let imports = if self.include_imports {
            file.import_paths()
        } else {
            Vec::new()
        };

        self.files[index] = file;

        for import in imports {
            if import.is_file() && self.file(&import).is_none() {
                notify(ParseEvent::ImportParsingStarted(import.clone()));
                self.add_file(&import);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn no_cancel() -> AtomicBool {
        AtomicBool::new(false)
    }

    #[test]
    fn test_parse_with_no_files() {
        let mut context = TreeContext::new();
        assert_eq!(
            context.parse(&no_cancel(), &mut |_| {}),
            ParseOutcome::NoFile
        );
    }

    #[test]
    fn test_parse_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Main.qml");
        fs::write(&path, "Item { width: 5 }").unwrap();

        let mut context = TreeContext::new();
        context.add_file(&path);

        let mut events = Vec::new();
        let outcome = context.parse(&no_cancel(), &mut |e| events.push(e));

        assert_eq!(outcome, ParseOutcome::Success);
        assert!(context.file_parsed(&path));
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ParseEvent::ParsingStarted(_)));
        assert!(matches!(events[1], ParseEvent::ParsingFinished(_)));
    }

    #[test]
    fn test_imports_are_followed_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let imported = dir.path().join("Helper.qml");
        fs::write(&imported, "Item { }").unwrap();
        let main = dir.path().join("Main.qml");
        fs::write(&main, "import \"Helper.qml\"\nItem { }").unwrap();

        let mut context = TreeContext::new();
        context.set_include_imports(true);
        context.add_file(&main);

        let mut import_events = 0;
        context.parse(&no_cancel(), &mut |e| {
            if matches!(e, ParseEvent::ImportParsingStarted(_)) {
                import_events += 1;
            }
        });

        assert_eq!(import_events, 1);
        assert!(context.file_parsed(&imported));
    }

    #[test]
    fn test_imports_are_ignored_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let imported = dir.path().join("Helper.qml");
        fs::write(&imported, "Item { }").unwrap();
        let main = dir.path().join("Main.qml");
        fs::write(&main, "import \"Helper.qml\"\nItem { }").unwrap();

        let mut context = TreeContext::new();
        context.add_file(&main);
        context.parse(&no_cancel(), &mut |_| {});

        assert!(!context.file_parsed(&imported));
    }

    #[test]
    fn test_error_in_one_file_does_not_stop_others() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("Bad.qml");
        fs::write(&bad, "Item {").unwrap();
        let good = dir.path().join("Good.qml");
        fs::write(&good, "Item { }").unwrap();

        let mut context = TreeContext::new();
        context.add_file(&bad);
        context.add_file(&good);

        let outcome = context.parse(&no_cancel(), &mut |_| {});
        assert_eq!(outcome, ParseOutcome::SyntaxError);
        assert!(context.error().is_some());
        assert!(context.file(&bad).unwrap().error.is_some());
        assert!(context.file(&good).unwrap().error.is_none());
        assert!(context.file_parsed(&good));
    }

    #[test]
    fn test_missing_file_reports_open_error() {
        let mut context = TreeContext::new();
        context.add_file(Path::new("/nonexistent/never.qml"));

        let outcome = context.parse(&no_cancel(), &mut |_| {});
        assert_eq!(outcome, ParseOutcome::SyntaxError);
        assert!(context.error().unwrap().text.contains("cannot open file"));
    }

    #[test]
    fn test_cancellation_stops_at_file_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("A.qml");
        fs::write(&a, "Item { }").unwrap();
        let b = dir.path().join("B.qml");
        fs::write(&b, "Item { }").unwrap();

        let mut context = TreeContext::new();
        context.add_file(&a);
        context.add_file(&b);

        let cancel = AtomicBool::new(true);
        context.parse(&cancel, &mut |_| {});
        assert!(!context.file_parsed(&a));
        assert!(!context.file_parsed(&b));
    }
}
