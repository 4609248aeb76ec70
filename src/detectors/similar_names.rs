//! Similar names detector
//!
//! Two functions or classes visible in the same scope whose names differ by one or two
//! edits (`getAccount` / `getAccounts`, `userData` / `usersData`) force the
//! reader to stop and work out which is which. Pairs whose signatures are
//! identical are left alone; those are usually deliberate variants.

use super::base::{Rule, RuleContext, ThresholdSpec};
use crate::ir::{Node, NodeKind, StructuralModel};
use crate::models::{Category, Severity, Violation};
use crate::symbols::{Scope, Symbol, SymbolKind};

/// Edit distance between two strings, two-row dynamic programming
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// What a caller has to know to use a declaration
#[derive(PartialEq)]
struct Signature<'a> {
    kind: SymbolKind,
    params: Vec<Option<&'a str>>,
    returns: Option<&'a str>,
}

fn signature<'a>(model: &'a StructuralModel, symbol: &'a Symbol) -> Signature<'a> {
    let params = if symbol.kind == SymbolKind::Function {
        model
            .parameters(symbol.declaration)
            .map(|p| p.attrs.type_name.as_deref())
            .collect()
    } else {
        Vec::new()
    };
    Signature {
        kind: symbol.kind,
        params,
        returns: symbol.declared_type.as_deref(),
    }
}

pub struct SimilarNamesRule;

impl SimilarNamesRule {
    pub const MAX_EDIT_DISTANCE: ThresholdSpec = ThresholdSpec::count("maxEditDistance", 2.0);
    pub const MIN_NAME_LENGTH: ThresholdSpec = ThresholdSpec::count("minNameLength", 5.0);
}

impl Rule for SimilarNamesRule {
    fn id(&self) -> &'static str {
        "SimilarNames"
    }

    fn description(&self) -> &'static str {
        "Detects near-identical function and class names visible in one scope"
    }

    fn category(&self) -> Category {
        Category::Naming
    }

    fn severity(&self) -> Severity {
        Severity::Low
    }

    fn subscribed_kinds(&self) -> &'static [NodeKind] {
        // Statements: blocks that open their own scope
        &[
            NodeKind::Module,
            NodeKind::Class,
            NodeKind::Function,
            NodeKind::Statement,
        ]
    }

    fn thresholds(&self) -> &'static [ThresholdSpec] {
        &[Self::MAX_EDIT_DISTANCE, Self::MIN_NAME_LENGTH]
    }

    fn evaluate(&self, node: &Node, ctx: &RuleContext<'_>) -> Vec<Violation> {
        let Some(scope) = ctx.symbols.scope_opened_by(node.id) else {
            return vec![];
        };
        let max_distance = ctx.threshold(&Self::MAX_EDIT_DISTANCE) as usize;
        let min_length = ctx.threshold(&Self::MIN_NAME_LENGTH) as usize;

        let own = candidates(ctx, scope, min_length);
        if own.is_empty() {
            return vec![];
        }

        let mut violations = Vec::new();
        for (i, first) in own.iter().enumerate() {
            for second in &own[i + 1..] {
                violations.extend(self.compare(ctx, first, second, max_distance));
            }
        }

        // Declarations of enclosing scopes are visible here too; each such
        // pair is reported once, at the inner declaration.
        let mut outer = scope.parent.and_then(|id| ctx.symbols.scope(id));
        while let Some(enclosing) = outer {
            for visible in candidates(ctx, enclosing, min_length) {
                for inner in &own {
                    violations.extend(self.compare(ctx, &visible, inner, max_distance));
                }
            }
            outer = enclosing.parent.and_then(|id| ctx.symbols.scope(id));
        }
        violations
    }
}

/// A function or class declaration eligible for comparison
struct Candidate<'a> {
    symbol: &'a Symbol,
    key: String,
    decl: &'a Node,
}

fn candidates<'a>(ctx: &RuleContext<'a>, scope: &'a Scope, min_length: usize) -> Vec<Candidate<'a>> {
    scope
        .symbols
        .iter()
        .filter_map(|id| ctx.symbols.symbol(*id))
        .filter(|s| matches!(s.kind, SymbolKind::Function | SymbolKind::Class))
        .filter(|s| s.name.chars().count() >= min_length)
        .filter_map(|s| {
            let decl = ctx.model.node(s.declaration)?;
            (!decl.attrs.is_override).then(|| Candidate {
                symbol: s,
                key: s.name.to_lowercase(),
                decl,
            })
        })
        .collect()
}

impl SimilarNamesRule {
    /// Violation at `second` when its name collides with `first`
    fn compare(
        &self,
        ctx: &RuleContext<'_>,
        first: &Candidate<'_>,
        second: &Candidate<'_>,
        max_distance: usize,
    ) -> Option<Violation> {
        let distance = levenshtein(&first.key, &second.key);
        if distance == 0 || distance > max_distance {
            return None;
        }
        if signature(ctx.model, first.symbol) == signature(ctx.model, second.symbol) {
            return None;
        }
        Some(
            ctx.violation(
                self.id(),
                self.severity(),
                second.decl,
                format!(
                    "`{}` differs from `{}` by {} character{}; choose names that make the difference obvious",
                    second.symbol.name,
                    first.symbol.name,
                    distance,
                    if distance == 1 { "" } else { "s" }
                ),
            )
            .with_related(vec![ctx.range(first.decl)]),
        )
    }
}
