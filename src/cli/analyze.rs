//! `craftcheck analyze`

use super::OutputFormat;
use anyhow::{Context, Result};
use craftcheck::{AdapterSet, AnalysisConfig, AnalysisReport, Engine, Severity, SourceFile};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub fn run(
    paths: &[PathBuf],
    config: &AnalysisConfig,
    format: OutputFormat,
    fail_on: Option<Severity>,
) -> Result<i32> {
    let engine = Engine::with_builtins(config).context("Invalid configuration")?;
    let adapters = AdapterSet::builtin();

    let files = collect_files(paths, &adapters)?;
    info!("Collected {} files", files.len());

    let report = engine.analyze(&files)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_text(&report),
    }

    let failed = fail_on.is_some_and(|min| report.diagnostics.iter().any(|d| d.severity >= min));
    Ok(if failed { 1 } else { 0 })
}

/// Explicit files are always analyzed (so unsupported ones show up as
/// parse errors); directories contribute only files some adapter handles.
fn collect_files(paths: &[PathBuf], adapters: &AdapterSet) -> Result<Vec<SourceFile>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let walker = WalkBuilder::new(path)
                .hidden(false)
                .git_ignore(true)
                .build();
            let mut found: Vec<PathBuf> = walker
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .filter(|e| adapters.for_path(e.path()).is_some())
                .map(|e| e.path().to_path_buf())
                .collect();
            found.sort();
            debug!("{}: {} analyzable files", path.display(), found.len());
            for file in found {
                match SourceFile::read(&file) {
                    Ok(source) => files.push(source),
                    Err(e) => warn!("Skipping unreadable {}: {}", file.display(), e),
                }
            }
        } else {
            files.push(read(path)?);
        }
    }
    Ok(files)
}

fn read(path: &Path) -> Result<SourceFile> {
    SourceFile::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_text(report: &AnalysisReport) {
    for d in &report.diagnostics {
        println!(
            "{}:{}:{}: {} [{}] {}",
            d.file.display(),
            d.start_line,
            d.start_col,
            d.severity,
            d.rule_id,
            d.message
        );
        for related in &d.related_ranges {
            println!(
                "    see {}:{}:{}",
                related.file.display(),
                related.span.start_line,
                related.span.start_col
            );
        }
    }
    let s = &report.summary;
    println!(
        "\n{} files, {} diagnostics ({} critical, {} high, {} medium, {} low, {} info)",
        report.files_analyzed, s.total, s.critical, s.high, s.medium, s.low, s.info
    );
    if report.files_failed > 0 {
        println!("{} files could not be analyzed", report.files_failed);
    }
}
