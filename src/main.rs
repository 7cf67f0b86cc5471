//! qmlint CLI
//!
//! Main entry point for the `qmlint` command.

use clap::{Parser, Subcommand};
use miette::Result;
use qmlint::{Analyzer, AnalyzerError, AnalyzerObserver, RuleDocument};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "qmlint")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A rule-driven static analyzer and formatter for QML")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check QML sources against a rule document
    Analyze {
        /// Input file or folder
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Rule document (XML)
        #[arg(short, long, value_name = "FILE")]
        rules: PathBuf,

        /// Parse and check imported files transitively
        #[arg(long)]
        include_imports: bool,

        /// Recurse into subfolders
        #[arg(long)]
        include_subfolders: bool,

        /// Rewrite analyzed files from the parsed tree
        #[arg(long)]
        rewrite: bool,

        /// When rewriting, remove unreferenced symbols first
        #[arg(long)]
        remove_unreferenced: bool,
    },

    /// Reformat a QML or JavaScript file
    Fmt {
        /// Input file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Check formatting without modifying the file
        #[arg(long)]
        check: bool,

        /// Write the result back instead of printing it
        #[arg(short, long)]
        write: bool,
    },
}

/// Prints diagnostics as they are emitted
struct ConsoleObserver {
    verbose: bool,
}

impl AnalyzerObserver for ConsoleObserver {
    fn parsing_started(&self, path: &Path) {
        if self.verbose {
            tracing::info!("parsing {}", path.display());
        }
    }

    fn import_parsing_started(&self, path: &Path) {
        if self.verbose {
            tracing::info!("parsing import {}", path.display());
        }
    }

    fn diagnostic_emitted(&self, error: &AnalyzerError) {
        println!("{}", error);
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new(if cli.verbose { "debug" } else { "warn" })
            }),
        )
        .init();

    match cli.command {
        Commands::Analyze {
            path,
            rules,
            include_imports,
            include_subfolders,
            rewrite,
            remove_unreferenced,
        } => run_analyze(
            path,
            rules,
            include_imports,
            include_subfolders,
            rewrite,
            remove_unreferenced,
            cli.verbose,
        ),
        Commands::Fmt { file, check, write } => run_fmt(file, check, write),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_analyze(
    path: PathBuf,
    rules: PathBuf,
    include_imports: bool,
    include_subfolders: bool,
    rewrite: bool,
    remove_unreferenced: bool,
    verbose: bool,
) -> Result<ExitCode> {
    let rules = RuleDocument::from_file(&rules)?;

    let mut analyzer = Analyzer::new();
    if path.is_dir() {
        analyzer.set_folder(&path);
    } else {
        analyzer.set_file(&path);
    }
    analyzer.set_include_imports(include_imports);
    analyzer.set_include_subfolders(include_subfolders);
    analyzer.set_rewrite_files(rewrite);
    analyzer.set_remove_unreferenced_symbols(remove_unreferenced);
    analyzer.add_observer(Arc::new(ConsoleObserver { verbose }));

    if !analyzer.analyze(&rules) {
        return Err(miette::miette!("nothing to analyze"));
    }

    let count = analyzer.errors().len();
    if count > 0 {
        tracing::info!("{} diagnostic(s)", count);
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn run_fmt(file: PathBuf, check: bool, write: bool) -> Result<ExitCode> {
    let source = std::fs::read_to_string(&file)
        .map_err(|e| miette::miette!("cannot read {}: {}", file.display(), e))?;
    let formatted = qmlint::format_source(&source, &file)
        .map_err(|e| miette::miette!("{}: {}", file.display(), e))?;

    if check {
        if formatted != source {
            println!("{} needs formatting", file.display());
            return Ok(ExitCode::FAILURE);
        }
        return Ok(ExitCode::SUCCESS);
    }

    if write {
        std::fs::write(&file, formatted)
            .map_err(|e| miette::miette!("cannot write {}: {}", file.display(), e))?;
    } else {
        print!("{}", formatted);
    }
    Ok(ExitCode::SUCCESS)
}
