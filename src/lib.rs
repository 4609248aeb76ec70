//! craftcheck - rule-based code quality analysis
//!
//! Adapters turn source files into a language-neutral [`ir::StructuralModel`].
//! The engine resolves symbols, computes metrics, runs the rule catalog and
//! the corpus-wide duplication detector, then merges everything into a
//! sorted, suppression-aware list of [`models::Diagnostic`]s.
//!
//! ```ignore
//! use craftcheck::{AnalysisConfig, Engine, SourceFile};
//!
//! let engine = Engine::with_builtins(&AnalysisConfig::default())?;
//! let report = engine.analyze(&[SourceFile::read("model.ir.json".as_ref())?])?;
//! for d in &report.diagnostics {
//!     println!("{}:{} {} {}", d.file.display(), d.start_line, d.rule_id, d.message);
//! }
//! ```

pub mod config;
pub mod detectors;
pub mod diagnostics;
pub mod duplication;
pub mod errors;
pub mod ir;
pub mod metrics;
pub mod models;
pub mod parsers;
pub mod pipeline;
pub mod symbols;

pub use config::{AnalysisConfig, ResolvedConfig};
pub use detectors::{Rule, RuleContext, RuleRegistry};
pub use errors::{ConfigError, EngineError, ModelError, ParseError};
pub use models::{Category, Diagnostic, DiagnosticsSummary, Severity, SourceRange};
pub use parsers::{Adapter, AdapterSet};
pub use pipeline::{AnalysisReport, CancellationToken, Engine, SourceFile};
