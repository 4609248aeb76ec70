//! Output argument detector
//!
//! Flags by-reference parameters that the function writes to. Callers
//! expect arguments to be inputs; results belong in the return value or
//! in the state of the object the function belongs to.

use super::base::{Rule, RuleContext};
use crate::ir::{Node, NodeKind};
use crate::models::{Category, Severity, Violation};
use crate::symbols::Access;

pub struct OutputArgumentRule;

impl Rule for OutputArgumentRule {
    fn id(&self) -> &'static str {
        "OutputArgument"
    }

    fn description(&self) -> &'static str {
        "Detects by-reference parameters used to return results"
    }

    fn category(&self) -> Category {
        Category::Functions
    }

    fn subscribed_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Function]
    }

    fn evaluate(&self, node: &Node, ctx: &RuleContext<'_>) -> Vec<Violation> {
        let mut violations = Vec::new();
        for param in ctx.model.parameters(node.id) {
            if !param.attrs.by_reference {
                continue;
            }
            let Some(symbol) = ctx.symbols.declared_by(param.id) else {
                continue;
            };

            let direct = symbol
                .references
                .iter()
                .any(|r| r.access == Access::Write && r.node != param.id);
            let through_member = symbol
                .accessor_calls
                .iter()
                .filter_map(|i| ctx.symbols.foreign_accesses().get(*i))
                .any(|a| a.is_write && a.depth == 1);

            if direct || through_member {
                violations.push(ctx.violation(
                    self.id(),
                    Severity::Medium,
                    param,
                    format!(
                        "`{}` writes its argument `{}`; return the result instead",
                        node.name_str(),
                        param.name_str()
                    ),
                ));
            }
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::run_rule;
    use crate::ir::{ModelBuilder, StatementKind};
    use std::sync::Arc;

    fn fill(by_reference: bool) -> crate::ir::StructuralModel {
        let mut b = ModelBuilder::new("fill.cs");
        let m = b.module("fill");
        let f = b.function(m, "fill_report");
        let param = b.parameter(f, "report", Some("Report"));
        b.attrs_mut(param).unwrap().by_reference = by_reference;
        let body = b.block(f);
        let assign = b.statement(body, StatementKind::Assign);
        let target = b.member(assign, "title");
        b.ident(target, "report");
        b.string(assign, "Weekly");
        b.build().unwrap()
    }

    #[test]
    fn test_written_reference_parameter() {
        let found = run_rule(Arc::new(OutputArgumentRule), &fill(true));
        assert_eq!(found.len(), 1);
        assert!(found[0].message.contains("report"));
    }

    #[test]
    fn test_value_parameter_is_clean() {
        assert!(run_rule(Arc::new(OutputArgumentRule), &fill(false)).is_empty());
    }
}
