//! Analyzer orchestration
//!
//! `Analyzer` ties the pipeline together: it collects the configured files
//! (a single file, or a folder walked recursively), parses and resolves
//! them through a shared `TreeContext`, evaluates the rule document over
//! every successfully parsed file, and optionally rewrites sources from
//! the tree. The core is synchronous; `start_background` runs the same
//! pipeline on a worker thread with a cooperative cancellation flag
//! checked at file boundaries.

pub mod engine;

use crate::common::AnalyzerError;
use crate::context::{ParseEvent, ParseOutcome, TreeContext};
use crate::grammar::RuleDocument;
use crate::resolve;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use walkdir::WalkDir;

/// Receives progress notifications from an analysis run. Notifications
/// are delivered synchronously from the running thread, so observers must
/// be thread-safe.
pub trait AnalyzerObserver: Send + Sync {
    fn parsing_started(&self, _path: &Path) {}
    fn parsing_finished(&self, _path: &Path) {}
    fn import_parsing_started(&self, _path: &Path) {}
    fn diagnostic_emitted(&self, _error: &AnalyzerError) {}
}

type PostProcess = Arc<dyn Fn(String) -> String + Send + Sync>;

/// The analyzer: configuration, the parsing context and the diagnostics
/// collected by the last run
pub struct Analyzer {
    folder: Option<PathBuf>,
    file: Option<PathBuf>,
    include_imports: bool,
    include_subfolders: bool,
    rewrite_files: bool,
    remove_unreferenced_symbols: bool,
    observers: Vec<Arc<dyn AnalyzerObserver>>,
    post_process: Option<PostProcess>,
    context: Arc<Mutex<TreeContext>>,
    errors: Vec<AnalyzerError>,
    cancel: Arc<AtomicBool>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            folder: None,
            file: None,
            include_imports: false,
            include_subfolders: false,
            rewrite_files: false,
            remove_unreferenced_symbols: false,
            observers: Vec::new(),
            post_process: None,
            context: Arc::new(Mutex::new(TreeContext::new())),
            errors: Vec::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Analyze every `*.qml`/`*.js` file under `folder`
    pub fn set_folder(&mut self, folder: impl Into<PathBuf>) {
        self.folder = Some(folder.into());
    }

    /// Analyze a single file
    pub fn set_file(&mut self, file: impl Into<PathBuf>) {
        self.file = Some(file.into());
    }

    /// Parse and check imported files transitively
    pub fn set_include_imports(&mut self, value: bool) {
        self.include_imports = value;
    }

    /// Recurse into subfolders in folder mode
    pub fn set_include_subfolders(&mut self, value: bool) {
        self.include_subfolders = value;
    }

    /// Serialize the tree back to the source path after analysis
    pub fn set_rewrite_files(&mut self, value: bool) {
        self.rewrite_files = value;
    }

    /// When rewriting, prune unused declarations first
    pub fn set_remove_unreferenced_symbols(&mut self, value: bool) {
        self.remove_unreferenced_symbols = value;
    }

    pub fn add_observer(&mut self, observer: Arc<dyn AnalyzerObserver>) {
        self.observers.push(observer);
    }

    /// Transform applied to the emitted text before it is written back
    pub fn set_post_process(
        &mut self,
        transform: impl Fn(String) -> String + Send + Sync + 'static,
    ) {
        self.post_process = Some(Arc::new(transform));
    }

    /// Diagnostics of the last run
    pub fn errors(&self) -> &[AnalyzerError] {
        &self.errors
    }

    /// The parsing context, for progress observation
    pub fn context(&self) -> Arc<Mutex<TreeContext>> {
        self.context.clone()
    }

    /// Drop the parsing context and collected diagnostics
    pub fn clear(&mut self) {
        self.context = Arc::new(Mutex::new(TreeContext::new()));
        self.errors.clear();
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Run the analysis synchronously. Returns false only when neither a
    /// folder nor a file has been configured.
    pub fn analyze(&mut self, rules: &RuleDocument) -> bool {
        if self.folder.is_none() && self.file.is_none() {
            return false;
        }

        self.clear();

        if let Some(folder) = self.folder.clone() {
            self.analyze_folder(&folder, rules);
        } else if let Some(file) = self.file.clone() {
            self.analyze_file(&file, rules);
        }

        true
    }

    /// Run the analysis on a worker thread; the returned handle can stop
    /// it cooperatively and collect the analyzer back.
    pub fn start_background(self, rules: RuleDocument) -> AnalysisHandle {
        let cancel = self.cancel.clone();
        let mut analyzer = self;
        let handle = std::thread::spawn(move || {
            analyzer.analyze(&rules);
            analyzer
        });

        AnalysisHandle { cancel, handle }
    }

    fn analyze_folder(&mut self, folder: &Path, rules: &RuleDocument) {
        let max_depth = if self.include_subfolders { usize::MAX } else { 1 };

        let walk = WalkDir::new(folder).max_depth(max_depth).sort_by_file_name();
        for entry in walk {
            if self.cancelled() {
                return;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    tracing::warn!("skipping unreadable directory entry: {}", error);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let is_source = entry
                .path()
                .extension()
                .is_some_and(|ext| ext == "qml" || ext == "js");
            if is_source {
                self.analyze_file(&entry.path().to_path_buf(), rules);
            }
        }
    }

    fn analyze_file(&mut self, path: &Path, rules: &RuleDocument) {
        if self.cancelled() {
            return;
        }

        tracing::debug!("analyzing {}", path.display());

        let mut events = Vec::new();
        let outcome;
        {
            let mut context = self.context.lock().unwrap();
            context.set_include_imports(self.include_imports);
            context.add_file(path);
            outcome = context.parse(&self.cancel, &mut |event| events.push(event));
        }

        // Notifications are delivered with the context lock released
        for event in &events {
            for observer in &self.observers {
                match event {
                    ParseEvent::ParsingStarted(path) => observer.parsing_started(path),
                    ParseEvent::ParsingFinished(path) => observer.parsing_finished(path),
                    ParseEvent::ImportParsingStarted(path) => {
                        observer.import_parsing_started(path)
                    }
                }
            }
        }

        let mut diagnostics = Vec::new();
        let mut rewrites: Vec<(PathBuf, String)> = Vec::new();
        {
            let mut context = self.context.lock().unwrap();

            if outcome == ParseOutcome::SyntaxError {
                if let Some(error) = context.error() {
                    diagnostics.push(error.clone());
                }
            }

            let pending: Vec<usize> = context
                .files()
                .iter()
                .enumerate()
                .filter(|(_, f)| f.parsed && f.error.is_none() && !f.checked)
                .map(|(i, _)| i)
                .collect();

            for index in pending {
                context.files_mut()[index].checked = true;

                let file = &context.files()[index];
                engine::run_rules(file, rules, &mut |d| diagnostics.push(d));

                if self.rewrite_files {
                    if self.remove_unreferenced_symbols {
                        resolve::prune_unreferenced(&mut context.files_mut()[index]);
                    }
                    let file = &context.files()[index];
                    let mut text = crate::fmt::emit_file(file);
                    if let Some(post_process) = &self.post_process {
                        text = post_process(text);
                    }
                    rewrites.push((file.path.clone(), text));
                }
            }
        }

        for (path, text) in rewrites {
            if let Err(error) = std::fs::write(&path, text) {
                tracing::warn!("cannot rewrite {}: {}", path.display(), error);
            }
        }

        for diagnostic in diagnostics {
            for observer in &self.observers {
                observer.diagnostic_emitted(&diagnostic);
            }
            self.errors.push(diagnostic);
        }
    }
}

/// A running background analysis
pub struct AnalysisHandle {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<Analyzer>,
}

impl AnalysisHandle {
    /// Ask the worker to stop at the next file boundary
    pub fn request_stop(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Stop cooperatively and wait for the worker
    pub fn stop(self) -> Analyzer {
        self.request_stop();
        self.wait()
    }

    /// Wait for the run to finish and take the analyzer back
    pub fn wait(self) -> Analyzer {
        let analyzer = self.handle.join().expect("analyzer thread panicked");
        analyzer.cancel.store(false, Ordering::Relaxed);
        analyzer
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_without_configuration_returns_false() {
        let mut analyzer = Analyzer::new();
        assert!(!analyzer.analyze(&RuleDocument::default()));
    }

    #[test]
    fn test_analyze_single_file_collects_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Main.qml");
        std::fs::write(&path, "Item { property int unused: 1 }").unwrap();

        let mut analyzer = Analyzer::new();
        analyzer.set_file(&path);
        assert!(analyzer.analyze(&RuleDocument::default()));

        assert_eq!(analyzer.errors().len(), 1);
        assert_eq!(analyzer.errors()[0].text, "Unreferenced property");
    }

    #[test]
    fn test_folder_mode_respects_subfolder_flag() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("A.qml"), "Item { property int a: 1 }").unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("B.qml"), "Item { property int b: 1 }").unwrap();

        let mut analyzer = Analyzer::new();
        analyzer.set_folder(dir.path());
        analyzer.analyze(&RuleDocument::default());
        assert_eq!(analyzer.errors().len(), 1);

        analyzer.set_include_subfolders(true);
        analyzer.analyze(&RuleDocument::default());
        assert_eq!(analyzer.errors().len(), 2);
    }
}
