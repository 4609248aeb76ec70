//! Rule catalog
//!
//! Node rules grouped by the smell they look for. Each rule declares the
//! node kinds it wants to see; [`RuleEvaluator`] dispatches them in a single
//! walk over each file. Duplication is corpus-wide and lives in
//! [`crate::duplication`] instead.
//!
//! # Rules
//!
//! | Id | Looks at |
//! |----|----------|
//! | `LongFunction` | function line count |
//! | `DeepNesting` | control-statement nesting depth |
//! | `TooManyArguments` | parameter count |
//! | `SelectorArgument` | boolean / small-enum parameters that pick a branch |
//! | `OutputArgument` | by-reference parameters written in the body |
//! | `QueryAndMutate` | functions that both change state and answer a question |
//! | `MixedAbstraction` | helpers mixed with low-level operations |
//! | `ShortName`, `EncodedName` | declaration names |
//! | `SimilarNames` | near-identical names in one scope |
//! | `RedundantComment`, `CommentedOutCode` | comment hygiene |
//! | `MagicLiteral` | unexplained literals |
//! | `FeatureEnvy` | functions living off another object's data |
//! | `TransitiveNavigation` | `a.getB().getC()` chains |
//! | `VerticalSeparation` | declarations far from their first use |
//! | `TemporalCoupling` | hidden call-order dependencies between methods |
//! | `NegativeConditional` | negated conditions with an else branch |

mod base;
mod comments;
mod deep_nesting;
mod engine;
mod feature_envy;
mod long_function;
mod long_parameter;
mod magic_literal;
mod message_chain;
mod mixed_abstraction;
mod naming;
mod negative_conditional;
mod output_argument;
mod query_and_mutate;
mod selector_argument;
mod similar_names;
mod temporal_coupling;
mod vertical_separation;

pub use base::{Rule, RuleContext, RuleInfo, ThresholdSpec};
pub use comments::{CommentedOutCodeRule, RedundantCommentRule};
pub use deep_nesting::DeepNestingRule;
pub use engine::{RuleEvaluator, RuleRegistry};
pub(crate) use engine::panic_message;
pub use feature_envy::FeatureEnvyRule;
pub use long_function::LongFunctionRule;
pub use long_parameter::TooManyArgumentsRule;
pub use magic_literal::MagicLiteralRule;
pub use message_chain::TransitiveNavigationRule;
pub use mixed_abstraction::MixedAbstractionRule;
pub use naming::{EncodedNameRule, ShortNameRule};
pub use negative_conditional::NegativeConditionalRule;
pub use output_argument::OutputArgumentRule;
pub use query_and_mutate::QueryAndMutateRule;
pub use selector_argument::SelectorArgumentRule;
pub use similar_names::{levenshtein, SimilarNamesRule};
pub use temporal_coupling::TemporalCouplingRule;
pub use vertical_separation::VerticalSeparationRule;

use crate::ir::{Node, NodeKind, StructuralModel};
use std::sync::Arc;

/// Create all built-in rules
pub fn builtin_rules() -> Vec<Arc<dyn Rule>> {
    vec![
        // Functions
        Arc::new(LongFunctionRule),
        Arc::new(DeepNestingRule),
        Arc::new(TooManyArgumentsRule),
        Arc::new(SelectorArgumentRule),
        Arc::new(OutputArgumentRule),
        Arc::new(QueryAndMutateRule),
        Arc::new(MixedAbstractionRule),
        // Naming
        Arc::new(ShortNameRule),
        Arc::new(EncodedNameRule),
        Arc::new(SimilarNamesRule),
        // Comments
        Arc::new(RedundantCommentRule),
        Arc::new(CommentedOutCodeRule),
        // Structure
        Arc::new(MagicLiteralRule),
        Arc::new(FeatureEnvyRule),
        Arc::new(TransitiveNavigationRule),
        Arc::new(VerticalSeparationRule),
        Arc::new(TemporalCouplingRule),
        Arc::new(NegativeConditionalRule),
    ]
}

/// Names that conventionally denote constructors
const CONSTRUCTOR_NAMES: &[&str] = &["__init__", "constructor", "new", "init", "initialize"];

/// Whether a function is a constructor of its enclosing class
pub(crate) fn is_constructor(model: &StructuralModel, function: &Node) -> bool {
    let name = function.name_str();
    if CONSTRUCTOR_NAMES.contains(&name) {
        return true;
    }
    model
        .parent(function.id)
        .is_some_and(|p| p.kind == NodeKind::Class && p.name_str() == name)
}

/// Split an identifier into lowercase words (`parseHTTPRequest`,
/// `parse_http_request` -> `parse`, `http`, `request`)
pub(crate) fn split_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = name.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev_lower = chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit();
            let acronym_end = chars[i - 1].is_uppercase()
                && chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev_lower || acronym_end {
                words.push(std::mem::take(&mut current));
            }
        }
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Run a single rule over a model with default or overridden thresholds

    use super::*;
    use crate::config::AnalysisConfig;
    use crate::metrics;
    use crate::models::Violation;
    use crate::parsers::JsonModelAdapter;
    use crate::symbols;

    pub fn run_rule(rule: Arc<dyn Rule>, model: &StructuralModel) -> Vec<Violation> {
        run_rule_with(rule, model, AnalysisConfig::default())
    }

    pub fn run_rule_with(
        rule: Arc<dyn Rule>,
        model: &StructuralModel,
        config: AnalysisConfig,
    ) -> Vec<Violation> {
        let mut registry = RuleRegistry::new();
        registry.register(rule);
        let config = config
            .resolve(&registry.catalog())
            .expect("test config should resolve");
        let symbols = symbols::resolve(model);
        let metrics = metrics::compute(model, &symbols);
        RuleEvaluator::new(&registry, &config).evaluate(
            model,
            &symbols,
            &metrics,
            &JsonModelAdapter,
        )
    }
}
