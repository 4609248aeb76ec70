//! Base rule trait and types
//!
//! This module defines the core abstractions for rule evaluation:
//! - `Rule` trait that every node rule implements
//! - `RuleContext` carrying one file's model, symbols and metrics
//! - `ThresholdSpec` / `RuleInfo` describing what a rule can be configured with

use crate::config::RuleSettings;
use crate::ir::{Node, NodeKind, StructuralModel};
use crate::metrics::MetricTable;
use crate::models::{Category, Severity, SourceRange, Violation};
use crate::parsers::Adapter;
use crate::symbols::SymbolTable;

/// A configurable numeric knob of a rule
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdSpec {
    pub name: &'static str,
    pub default: f64,
    pub min: f64,
    pub max: Option<f64>,
    /// Only whole numbers are accepted
    pub integer: bool,
}

impl ThresholdSpec {
    /// Non-negative whole number
    pub const fn count(name: &'static str, default: f64) -> Self {
        Self {
            name,
            default,
            min: 0.0,
            max: None,
            integer: true,
        }
    }

    /// Real number within `[min, max]`
    pub const fn real(name: &'static str, default: f64, min: f64, max: f64) -> Self {
        Self {
            name,
            default,
            min,
            max: Some(max),
            integer: false,
        }
    }

    /// Check a configured value, returning why it is unacceptable
    pub fn check(&self, value: f64) -> Result<(), String> {
        if !value.is_finite() {
            return Err("must be a finite number".to_string());
        }
        if self.integer && value.fract() != 0.0 {
            return Err(format!("must be a whole number, got {value}"));
        }
        if value < self.min {
            return Err(format!("must be at least {}, got {value}", self.min));
        }
        if let Some(max) = self.max {
            if value > max {
                return Err(format!("must be at most {max}, got {value}"));
            }
        }
        Ok(())
    }
}

/// Static description of a catalog entry
#[derive(Debug, Clone, Copy)]
pub struct RuleInfo {
    pub id: &'static str,
    pub category: Category,
    pub description: &'static str,
    pub thresholds: &'static [ThresholdSpec],
}

/// Everything a rule may look at while evaluating one node
pub struct RuleContext<'a> {
    pub model: &'a StructuralModel,
    pub symbols: &'a SymbolTable,
    pub metrics: &'a MetricTable,
    pub settings: &'a RuleSettings,
    /// Adapter that produced the model, for grammar-specific predicates
    pub adapter: &'a dyn Adapter,
}

impl<'a> RuleContext<'a> {
    /// Configured value of a threshold, falling back to its default
    pub fn threshold(&self, spec: &ThresholdSpec) -> f64 {
        self.settings.threshold(spec.name).unwrap_or(spec.default)
    }

    pub fn range(&self, node: &Node) -> SourceRange {
        SourceRange::new(self.model.path(), node.span)
    }

    /// Violation anchored at `node`
    pub fn violation(
        &self,
        rule_id: &str,
        severity: Severity,
        node: &Node,
        message: impl Into<String>,
    ) -> Violation {
        Violation::new(rule_id, severity, self.range(node), message).with_node(node.id)
    }
}

/// Trait for all node rules
///
/// Rules are pure: they read the context, never mutate shared state, and
/// signal "cannot evaluate" by returning no violations.
///
/// # Example Implementation
///
/// ```ignore
/// pub struct MyRule;
///
/// impl Rule for MyRule {
///     fn id(&self) -> &'static str { "MyRule" }
///     fn description(&self) -> &'static str { "Detects my specific smell" }
///     fn category(&self) -> Category { Category::Structure }
///     fn subscribed_kinds(&self) -> &'static [NodeKind] { &[NodeKind::Function] }
///
///     fn evaluate(&self, node: &Node, ctx: &RuleContext<'_>) -> Vec<Violation> {
///         vec![]
///     }
/// }
/// ```
pub trait Rule: Send + Sync {
    /// Stable rule id, as used in configuration and suppression markers
    fn id(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn category(&self) -> Category;

    /// Severity for violations that are not scaled by a threshold
    fn severity(&self) -> Severity {
        Severity::Medium
    }

    /// Node kinds the evaluator dispatches to this rule
    fn subscribed_kinds(&self) -> &'static [NodeKind];

    fn thresholds(&self) -> &'static [ThresholdSpec] {
        &[]
    }

    fn evaluate(&self, node: &Node, ctx: &RuleContext<'_>) -> Vec<Violation>;

    fn info(&self) -> RuleInfo {
        RuleInfo {
            id: self.id(),
            category: self.category(),
            description: self.description(),
            thresholds: self.thresholds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_checks() {
        let spec = ThresholdSpec::count("maxParams", 3.0);
        assert!(spec.check(5.0).is_ok());
        assert!(spec.check(-1.0).is_err());
        assert!(spec.check(2.5).is_err());
        assert!(spec.check(f64::NAN).is_err());

        let ratio = ThresholdSpec::real("overlapThreshold", 0.7, 0.0, 1.0);
        assert!(ratio.check(0.5).is_ok());
        assert!(ratio.check(1.5).is_err());
    }
}
