//! Analysis engine
//!
//! Orchestrates one run:
//! 1. Resolve configuration against the rule catalog (fatal on error)
//! 2. Per file, in parallel: adapter (bounded by the per-file timeout),
//!    resolver, metrics, node rules, suppression markers, fingerprints
//! 3. Barrier, then corpus-wide duplication clustering
//! 4. Aggregate into sorted, deduplicated diagnostics
//!
//! A file whose adapter fails, times out or returns an invalid model
//! contributes exactly one diagnostic and nothing else. Cancellation is
//! checked before each file starts and at every stage boundary; work
//! already in flight is allowed to finish.

use crate::config::{AnalysisConfig, ResolvedConfig};
use crate::detectors::{panic_message, RuleEvaluator, RuleRegistry};
use crate::diagnostics::{collect_suppressions, Aggregator, Suppression};
use crate::duplication::{self, FileFingerprints};
use crate::errors::{ConfigError, EngineError, ParseError};
use crate::ir::{Span, StructuralModel};
use crate::metrics;
use crate::models::{
    Diagnostic, DiagnosticsSummary, Severity, SourceRange, Violation, MODEL_INVARIANT, PARSE_ERROR,
};
use crate::parsers::{Adapter, AdapterSet};
use crate::symbols;
use crossbeam_channel::{bounded, RecvTimeoutError};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One input file
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub contents: String,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }

    pub fn read(path: &Path) -> std::io::Result<Self> {
        Ok(Self::new(path, std::fs::read_to_string(path)?))
    }
}

/// Cooperative cancellation flag shared with the caller
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of a completed run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub diagnostics: Vec<Diagnostic>,
    pub summary: DiagnosticsSummary,
    pub files_analyzed: usize,
    /// Files that produced a ParseError or ModelInvariant diagnostic
    pub files_failed: usize,
    pub duration_ms: u64,
}

/// What one file's worker hands to the merge step
#[derive(Default)]
struct FileOutcome {
    violations: Vec<Violation>,
    suppressions: Vec<Suppression>,
    fingerprints: Option<FileFingerprints>,
    failed: bool,
}

impl FileOutcome {
    fn failed(violation: Violation) -> Self {
        Self {
            violations: vec![violation],
            failed: true,
            ..Default::default()
        }
    }
}

/// A configured analysis engine
///
/// Holds its own registry, adapters and resolved configuration, so
/// engines with different configurations can run side by side.
pub struct Engine {
    registry: RuleRegistry,
    adapters: AdapterSet,
    config: ResolvedConfig,
    cancel: CancellationToken,
}

impl Engine {
    /// Validate `config` against the registry's catalog
    pub fn new(
        registry: RuleRegistry,
        adapters: AdapterSet,
        config: &AnalysisConfig,
    ) -> Result<Self, ConfigError> {
        let config = config.resolve(&registry.catalog())?;
        debug!(
            "Engine ready: {} node rules, {} workers, {}ms per-file timeout",
            registry.len(),
            config.workers,
            config.per_file_timeout_ms
        );
        Ok(Self {
            registry,
            adapters,
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Engine with the built-in rules and adapters
    pub fn with_builtins(config: &AnalysisConfig) -> Result<Self, ConfigError> {
        Self::new(RuleRegistry::builtin(), AdapterSet::builtin(), config)
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Token that cancels runs of this engine
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn check_cancelled(&self) -> Result<(), EngineError> {
        if self.cancel.is_cancelled() {
            info!("Analysis cancelled");
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }

    /// Analyze a set of files
    pub fn analyze(&self, files: &[SourceFile]) -> Result<AnalysisReport, EngineError> {
        let start = Instant::now();
        self.check_cancelled()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .build()
            .map_err(|e| EngineError::ThreadPool(e.to_string()))?;

        let outcomes: Vec<Option<FileOutcome>> = pool.install(|| {
            files
                .par_iter()
                .map(|file| {
                    if self.cancel.is_cancelled() {
                        return None;
                    }
                    Some(self.analyze_file(file))
                })
                .collect()
        });
        self.check_cancelled()?;

        let mut aggregator = Aggregator::new();
        let mut fingerprints = Vec::new();
        let mut files_failed = 0;
        for outcome in outcomes.into_iter().flatten() {
            if outcome.failed {
                files_failed += 1;
            }
            aggregator.add_violations(outcome.violations);
            aggregator.add_suppressions(outcome.suppressions);
            fingerprints.extend(outcome.fingerprints);
        }

        // Barrier passed: every file's fingerprints are in
        let duplicates = pool.install(|| duplication::detect(&fingerprints, &self.config));
        aggregator.add_violations(duplicates);
        self.check_cancelled()?;

        let diagnostics = aggregator.finish();
        let summary = DiagnosticsSummary::from_diagnostics(&diagnostics);
        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Analyzed {} files in {}ms: {} diagnostics ({} files failed)",
            files.len(),
            duration_ms,
            diagnostics.len(),
            files_failed
        );

        Ok(AnalysisReport {
            diagnostics,
            summary,
            files_analyzed: files.len(),
            files_failed,
            duration_ms,
        })
    }

    fn analyze_file(&self, file: &SourceFile) -> FileOutcome {
        let Some(adapter) = self.adapters.for_path(&file.path) else {
            let err = ParseError::NoAdapter {
                path: file.path.clone(),
            };
            return FileOutcome::failed(file_failure(&file.path, &err));
        };

        let model = match parse_with_timeout(
            Arc::clone(&adapter),
            file,
            self.config.per_file_timeout(),
        ) {
            Ok(model) => model,
            Err(err) => {
                warn!("Skipping {}: {}", file.path.display(), err);
                return FileOutcome::failed(file_failure(&file.path, &err));
            }
        };

        let symbols = symbols::resolve(&model);
        let metrics = metrics::compute(&model, &symbols);
        let mut violations = RuleEvaluator::new(&self.registry, &self.config).evaluate(
            &model,
            &symbols,
            &metrics,
            adapter.as_ref(),
        );
        let (suppressions, unknown) = collect_suppressions(&model, &self.config);
        violations.extend(unknown);

        let fingerprints = duplication::RULES
            .iter()
            .any(|r| self.config.is_enabled(r.id))
            .then(|| duplication::extract(&model, self.config.min_duplicate_statements));

        debug!(
            "{}: {} nodes, {} violations, {} suppressions",
            file.path.display(),
            model.len(),
            violations.len(),
            suppressions.len()
        );
        FileOutcome {
            violations,
            suppressions,
            fingerprints,
            failed: false,
        }
    }
}

/// The single diagnostic a failed file contributes, anchored at 1:1
fn file_failure(path: &Path, err: &ParseError) -> Violation {
    let rule_id = match err {
        ParseError::Model(_) => MODEL_INVARIANT,
        _ => PARSE_ERROR,
    };
    Violation::new(
        rule_id,
        Severity::High,
        SourceRange::new(path, Span::new(1, 1, 1, 1)),
        err.to_string(),
    )
}

/// Run the adapter on its own thread, giving up after `timeout`
///
/// A timed-out adapter thread is detached: its eventual result is dropped
/// and it never touches the run's state.
pub fn parse_with_timeout(
    adapter: Arc<dyn Adapter>,
    file: &SourceFile,
    timeout: Duration,
) -> Result<StructuralModel, ParseError> {
    let (tx, rx) = bounded(1);
    let contents = file.contents.clone();
    let path = file.path.clone();
    let worker = Arc::clone(&adapter);

    let spawned = std::thread::Builder::new()
        .name(format!("adapter-{}", adapter.name()))
        .spawn(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                worker.parse(&contents, &path)
            }));
            // The receiver is gone after a timeout; nothing left to tell
            let _ = tx.send(result.map_err(|p| panic_message(p.as_ref())));
        });
    if let Err(e) = spawned {
        return Err(ParseError::Failed {
            adapter: adapter.name().to_string(),
            path: file.path.clone(),
            message: format!("could not start adapter thread: {e}"),
        });
    }

    match rx.recv_timeout(timeout) {
        Ok(Ok(result)) => result,
        Ok(Err(panic_msg)) => Err(ParseError::Failed {
            adapter: adapter.name().to_string(),
            path: file.path.clone(),
            message: format!("adapter panicked: {panic_msg}"),
        }),
        Err(RecvTimeoutError::Timeout) => Err(ParseError::Timeout {
            path: file.path.clone(),
            timeout_ms: timeout.as_millis() as u64,
        }),
        Err(RecvTimeoutError::Disconnected) => Err(ParseError::Disconnected {
            path: file.path.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ModelBuilder;

    struct SleepyAdapter(Duration);

    impl Adapter for SleepyAdapter {
        fn name(&self) -> &'static str {
            "sleepy"
        }

        fn extensions(&self) -> &'static [&'static str] {
            &["slow"]
        }

        fn parse(&self, _contents: &str, path: &Path) -> Result<StructuralModel, ParseError> {
            std::thread::sleep(self.0);
            let mut b = ModelBuilder::new(path);
            b.module("slow");
            Ok(b.build()?)
        }
    }

    struct PanickyAdapter;

    impl Adapter for PanickyAdapter {
        fn name(&self) -> &'static str {
            "panicky"
        }

        fn extensions(&self) -> &'static [&'static str] {
            &["boom"]
        }

        fn parse(&self, _contents: &str, _path: &Path) -> Result<StructuralModel, ParseError> {
            panic!("grammar exploded")
        }
    }

    #[test]
    fn test_parse_with_timeout() {
        let file = SourceFile::new("a.slow", "");
        let fast = parse_with_timeout(
            Arc::new(SleepyAdapter(Duration::from_millis(0))),
            &file,
            Duration::from_secs(5),
        );
        assert!(fast.is_ok());

        let slow = parse_with_timeout(
            Arc::new(SleepyAdapter(Duration::from_secs(2))),
            &file,
            Duration::from_millis(20),
        );
        assert!(matches!(slow, Err(ParseError::Timeout { timeout_ms: 20, .. })));
    }

    #[test]
    fn test_adapter_panic_becomes_parse_error() {
        let file = SourceFile::new("a.boom", "");
        let result = parse_with_timeout(Arc::new(PanickyAdapter), &file, Duration::from_secs(5));
        match result {
            Err(ParseError::Failed { message, .. }) => assert!(message.contains("grammar exploded")),
            other => panic!("expected a failure, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_extension_is_one_parse_error() {
        let engine = Engine::with_builtins(&AnalysisConfig::default()).unwrap();
        let report = engine
            .analyze(&[SourceFile::new("notes.txt", "hello")])
            .unwrap();
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].rule_id, PARSE_ERROR);
        assert_eq!(report.files_failed, 1);
    }

    #[test]
    fn test_cancelled_engine_returns_no_diagnostics() {
        let engine = Engine::with_builtins(&AnalysisConfig::default()).unwrap();
        engine.cancellation_token().cancel();
        let result = engine.analyze(&[SourceFile::new("a.json", "{}")]);
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }
}
