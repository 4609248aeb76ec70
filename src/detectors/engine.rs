//! Rule registry and evaluator
//!
//! The registry indexes rules by the node kinds they subscribe to. The
//! evaluator walks a file's arena once and, at every node, runs only the
//! rules subscribed to that node's kind. Each (rule, node) evaluation is
//! isolated with `catch_unwind`, so a panicking rule costs one
//! `InternalRuleError` diagnostic instead of the whole file.

use super::base::{Rule, RuleContext, RuleInfo};
use crate::config::ResolvedConfig;
use crate::ir::{NodeKind, StructuralModel};
use crate::metrics::MetricTable;
use crate::models::{Severity, Violation, INTERNAL_RULE_ERROR};
use crate::parsers::Adapter;
use crate::symbols::SymbolTable;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Catalog of node rules, built once per engine
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<Arc<dyn Rule>>,
    by_kind: FxHashMap<NodeKind, Vec<usize>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in rule
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for rule in super::builtin_rules() {
            registry.register(rule);
        }
        registry
    }

    /// Register a rule; a rule with the same id replaces the earlier one
    pub fn register(&mut self, rule: Arc<dyn Rule>) {
        debug!("Registering rule: {}", rule.id());
        match self.rules.iter().position(|r| r.id() == rule.id()) {
            Some(i) => {
                warn!("Rule {} registered twice; keeping the later one", rule.id());
                self.rules[i] = rule;
            }
            None => self.rules.push(rule),
        }
        self.reindex();
    }

    fn reindex(&mut self) {
        self.by_kind.clear();
        for (i, rule) in self.rules.iter().enumerate() {
            for kind in rule.subscribed_kinds() {
                let slot = self.by_kind.entry(*kind).or_default();
                if !slot.contains(&i) {
                    slot.push(i);
                }
            }
        }
    }

    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Rule>> {
        self.rules.iter().find(|r| r.id() == id)
    }

    /// Indexes of the rules subscribed to a node kind
    pub fn rules_for(&self, kind: NodeKind) -> &[usize] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every configurable rule: node rules plus corpus-level duplication rules
    pub fn catalog(&self) -> Vec<RuleInfo> {
        let mut catalog: Vec<RuleInfo> = self.rules.iter().map(|r| r.info()).collect();
        for info in crate::duplication::RULES {
            if !catalog.iter().any(|c| c.id == info.id) {
                catalog.push(*info);
            }
        }
        catalog
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Runs the enabled node rules over one resolved file
pub struct RuleEvaluator<'a> {
    registry: &'a RuleRegistry,
    config: &'a ResolvedConfig,
}

impl<'a> RuleEvaluator<'a> {
    pub fn new(registry: &'a RuleRegistry, config: &'a ResolvedConfig) -> Self {
        Self { registry, config }
    }

    pub fn evaluate(
        &self,
        model: &StructuralModel,
        symbols: &SymbolTable,
        metrics: &MetricTable,
        adapter: &dyn Adapter,
    ) -> Vec<Violation> {
        // One context per enabled rule; disabled rules get none
        let contexts: Vec<Option<RuleContext<'_>>> = self
            .registry
            .rules
            .iter()
            .map(|rule| {
                self.config
                    .settings(rule.id())
                    .filter(|s| s.enabled)
                    .map(|settings| RuleContext {
                        model,
                        symbols,
                        metrics,
                        settings,
                        adapter,
                    })
            })
            .collect();

        let mut violations = Vec::new();
        for node in model.nodes() {
            for &i in self.registry.rules_for(node.kind) {
                let Some(ctx) = &contexts[i] else { continue };
                let rule = &self.registry.rules[i];

                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    rule.evaluate(node, ctx)
                }));
                match result {
                    Ok(found) => violations.extend(found),
                    Err(panic_info) => {
                        let panic_msg = panic_message(panic_info.as_ref());
                        error!(
                            "Rule {} panicked on node {} in {}: {}",
                            rule.id(),
                            node.id,
                            model.path().display(),
                            panic_msg
                        );
                        violations.push(ctx.violation(
                            INTERNAL_RULE_ERROR,
                            Severity::Low,
                            node,
                            format!(
                                "Rule {} failed on {:?} node {}: {}",
                                rule.id(),
                                node.kind,
                                node.id,
                                panic_msg
                            ),
                        ));
                    }
                }
            }
        }

        debug!(
            "Evaluated {} rules on {}: {} violations",
            contexts.iter().filter(|c| c.is_some()).count(),
            model.path().display(),
            violations.len()
        );
        violations
    }
}

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
