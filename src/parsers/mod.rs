//! Adapter interface
//!
//! Adapters turn the contents of one source file into a [`StructuralModel`].
//! The core never parses a concrete grammar itself; it only dispatches by
//! file extension to whatever adapters the caller registered.

mod json_model;

pub use json_model::{JsonModelAdapter, ModelDocument};

use crate::errors::ParseError;
use crate::ir::StructuralModel;
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::Arc;

/// A per-language front end producing structural models
pub trait Adapter: Send + Sync {
    /// Unique adapter name, used in diagnostics and logs
    fn name(&self) -> &'static str;

    /// File extensions (without the dot) this adapter handles
    fn extensions(&self) -> &'static [&'static str];

    /// Parse one file
    fn parse(&self, contents: &str, path: &Path) -> Result<StructuralModel, ParseError>;

    /// Whether a comment's text reads like a statement of the host grammar
    ///
    /// Used to spot commented-out code. The default says no, so adapters
    /// that cannot tell never produce false positives.
    fn looks_like_code(&self, _comment: &str) -> bool {
        false
    }
}

/// Adapters keyed by file extension
#[derive(Clone, Default)]
pub struct AdapterSet {
    by_extension: FxHashMap<String, Arc<dyn Adapter>>,
}

impl AdapterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set with the bundled adapters registered
    pub fn builtin() -> Self {
        let mut set = Self::new();
        set.register(Arc::new(JsonModelAdapter::new()));
        set
    }

    /// Register an adapter for all of its extensions; later registrations win
    pub fn register(&mut self, adapter: Arc<dyn Adapter>) {
        for ext in adapter.extensions() {
            self.by_extension
                .insert(ext.to_ascii_lowercase(), Arc::clone(&adapter));
        }
    }

    /// Adapter for a path, matching the longest dotted suffix first
    /// (`foo.ir.json` prefers `ir.json` over `json`)
    pub fn for_path(&self, path: &Path) -> Option<Arc<dyn Adapter>> {
        let file_name = path.file_name()?.to_str()?.to_ascii_lowercase();
        let mut rest = file_name.as_str();
        while let Some(pos) = rest.find('.') {
            rest = &rest[pos + 1..];
            if let Some(adapter) = self.by_extension.get(rest) {
                return Some(Arc::clone(adapter));
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.by_extension.is_empty()
    }
}
