//! Feature envy detector
//!
//! A function that reaches into one collaborator's accessors more than it
//! touches its own data probably belongs on that collaborator. Own data is
//! fields of the enclosing class plus reads of local variables, parameters
//! and constants that are not themselves the envied object.

use super::base::{Rule, RuleContext, ThresholdSpec};
use crate::ir::{Node, NodeKind};
use crate::models::{Category, Violation};
use crate::symbols::{Resolution, SymbolId, SymbolKind};
use std::collections::BTreeMap;

fn is_data(kind: SymbolKind) -> bool {
    matches!(
        kind,
        SymbolKind::Variable | SymbolKind::Parameter | SymbolKind::Constant
    )
}

pub struct FeatureEnvyRule;

impl FeatureEnvyRule {
    pub const RATIO: ThresholdSpec = ThresholdSpec::real("ratio", 2.0, 0.0, f64::MAX);
    pub const MIN_FOREIGN: ThresholdSpec = ThresholdSpec::count("minForeignAccesses", 3.0);
}

impl Rule for FeatureEnvyRule {
    fn id(&self) -> &'static str {
        "FeatureEnvy"
    }

    fn description(&self) -> &'static str {
        "Detects functions more interested in another object's data than their own"
    }

    fn category(&self) -> Category {
        Category::Structure
    }

    fn subscribed_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Function]
    }

    fn thresholds(&self) -> &'static [ThresholdSpec] {
        &[Self::RATIO, Self::MIN_FOREIGN]
    }

    fn evaluate(&self, node: &Node, ctx: &RuleContext<'_>) -> Vec<Violation> {
        // Direct accessor uses per collaborator; BTreeMap keeps ties stable
        let mut foreign: BTreeMap<SymbolId, usize> = BTreeMap::new();
        for access in ctx.symbols.foreign_accesses_in(node.id) {
            if access.depth != 1 {
                continue;
            }
            let Some(root) = access.root else { continue };
            if ctx.symbols.symbol(root).is_some_and(|s| is_data(s.kind)) {
                *foreign.entry(root).or_default() += 1;
            }
        }
        let Some((&envied, &count)) = foreign
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        else {
            return vec![];
        };

        let min_foreign = ctx.threshold(&Self::MIN_FOREIGN) as usize;
        if count < min_foreign {
            return vec![];
        }

        let fields = ctx.symbols.field_accesses_in(node.id).count();
        let locals = ctx
            .model
            .within_function(node.id)
            .into_iter()
            .filter(|n| n.kind == NodeKind::Identifier)
            .filter(|n| match ctx.symbols.resolution(n.id) {
                Some(Resolution::Local(s)) => {
                    !foreign.contains_key(&s)
                        && ctx.symbols.symbol(s).is_some_and(|s| is_data(s.kind))
                }
                _ => false,
            })
            .count();
        let own = fields + locals;

        let ratio = ctx.threshold(&Self::RATIO);
        if count as f64 <= ratio * own as f64 {
            return vec![];
        }

        let Some(symbol) = ctx.symbols.symbol(envied) else {
            return vec![];
        };
        let target = symbol.declared_type.as_deref().unwrap_or(&symbol.name);
        let mut violation = ctx.violation(
            self.id(),
            self.severity(),
            node,
            format!(
                "Function `{}` uses {} accessors of `{}` ({}) but only {} of its own; consider moving it to {}",
                node.name_str(),
                count,
                symbol.name,
                target,
                own,
                target
            ),
        );
        if let Some(decl) = ctx.model.node(symbol.declaration) {
            violation = violation.with_related(vec![ctx.range(decl)]);
        }
        vec![violation]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::detectors::test_support::{run_rule, run_rule_with};
    use crate::ir::{ModelBuilder, StatementKind, StructuralModel};
    use std::sync::Arc;

    /// `def pay(e: Employee)` reading five of `e`'s accessors
    fn envious_model(own_reads: usize) -> StructuralModel {
        let mut b = ModelBuilder::new("payroll.py");
        let m = b.module("payroll");
        let f = b.function(m, "pay");
        b.parameter(f, "e", Some("Employee"));
        b.parameter(f, "bonus", None);
        let body = b.block(f);
        for accessor in ["salary", "grade", "tenure", "region", "title"] {
            let stmt = b.statement(body, StatementKind::Expression);
            b.method_call(stmt, "e", accessor);
        }
        for _ in 0..own_reads {
            let stmt = b.statement(body, StatementKind::Expression);
            let call = b.call(stmt, "log");
            b.ident(call, "bonus");
        }
        b.build().unwrap()
    }

    #[test]
    fn test_envy_names_declared_type() {
        let model = envious_model(0);
        let found = run_rule(Arc::new(FeatureEnvyRule), &model);
        assert_eq!(found.len(), 1);
        assert!(found[0].message.contains("Employee"));
        assert_eq!(found[0].related.len(), 1);
    }

    #[test]
    fn test_enough_own_data_clears_envy() {
        // 5 foreign vs 3 own: 5 <= 2 * 3
        let model = envious_model(3);
        assert!(run_rule(Arc::new(FeatureEnvyRule), &model).is_empty());
    }

    #[test]
    fn test_min_foreign_accesses() {
        let model = envious_model(0);
        let config = AnalysisConfig::default().with_threshold("FeatureEnvy", "minForeignAccesses", 6.0);
        assert!(run_rule_with(Arc::new(FeatureEnvyRule), &model, config).is_empty());
    }
}
