//! Naming detectors
//!
//! - `ShortName`: declarations whose names are too short to reveal intent.
//!   Loop counters, lambda parameters and catch variables live in tiny
//!   scopes and are allowed to be short.
//! - `EncodedName`: member prefixes (`m_`, `s_`, `g_`), Hungarian type
//!   prefixes (`strName`, `nCount`) and interface/class prefixes (`IUser`).

use super::base::{Rule, RuleContext, ThresholdSpec};
use crate::ir::{ExprKind, Node, NodeKind, StatementKind, StructuralModel};
use crate::models::{Category, Severity, Violation};
use regex::Regex;
use std::sync::OnceLock;

const NAMED_KINDS: &[NodeKind] = &[
    NodeKind::Function,
    NodeKind::Class,
    NodeKind::Parameter,
    NodeKind::Statement,
];

/// Declared name of a node this family looks at
fn declared_name(node: &Node) -> Option<&str> {
    let declares = match node.kind {
        NodeKind::Function | NodeKind::Class | NodeKind::Parameter => true,
        NodeKind::Statement => matches!(
            node.statement,
            Some(StatementKind::VarDecl | StatementKind::ConstDecl)
        ),
        _ => false,
    };
    if !declares {
        return None;
    }
    node.name.as_deref().filter(|n| !n.is_empty())
}

/// Declarations whose scope is a handful of lines by construction
fn short_name_allowed(model: &StructuralModel, node: &Node) -> bool {
    let Some(parent) = model.parent(node.id) else {
        return false;
    };
    match node.kind {
        NodeKind::Parameter => parent.is_expression(ExprKind::Lambda),
        NodeKind::Statement => {
            parent.is_statement(StatementKind::For) || parent.is_statement(StatementKind::Try)
        }
        _ => false,
    }
}

pub struct ShortNameRule;

impl ShortNameRule {
    pub const MIN_LENGTH: ThresholdSpec = ThresholdSpec::count("minNameLength", 2.0);
}

impl Rule for ShortNameRule {
    fn id(&self) -> &'static str {
        "ShortName"
    }

    fn description(&self) -> &'static str {
        "Detects names too short to reveal intent"
    }

    fn category(&self) -> Category {
        Category::Naming
    }

    fn severity(&self) -> Severity {
        Severity::Low
    }

    fn subscribed_kinds(&self) -> &'static [NodeKind] {
        NAMED_KINDS
    }

    fn thresholds(&self) -> &'static [ThresholdSpec] {
        &[Self::MIN_LENGTH]
    }

    fn evaluate(&self, node: &Node, ctx: &RuleContext<'_>) -> Vec<Violation> {
        let Some(name) = declared_name(node) else {
            return vec![];
        };
        let bare = name.trim_matches('_');
        if bare.is_empty() || short_name_allowed(ctx.model, node) {
            return vec![];
        }
        let min = ctx.threshold(&Self::MIN_LENGTH) as usize;
        if bare.chars().count() >= min {
            return vec![];
        }
        vec![ctx.violation(
            self.id(),
            self.severity(),
            node,
            format!("Name `{name}` is too short to say what it holds; use a descriptive name"),
        )]
    }
}

static ENCODING: OnceLock<Option<Regex>> = OnceLock::new();
static CLASS_PREFIX: OnceLock<Option<Regex>> = OnceLock::new();

fn encoding_pattern() -> Option<&'static Regex> {
    ENCODING
        .get_or_init(|| {
            Regex::new(r"^(?:[msg]_[A-Za-z]|(?:str|sz|psz|lpsz|lp|dw|arr|obj|bln|b|n|f|c)[A-Z][a-z])").ok()
        })
        .as_ref()
}

fn class_prefix_pattern() -> Option<&'static Regex> {
    CLASS_PREFIX
        .get_or_init(|| Regex::new(r"^[IC][A-Z][a-z]").ok())
        .as_ref()
}

pub struct EncodedNameRule;

impl Rule for EncodedNameRule {
    fn id(&self) -> &'static str {
        "EncodedName"
    }

    fn description(&self) -> &'static str {
        "Detects type or scope information encoded in names"
    }

    fn category(&self) -> Category {
        Category::Naming
    }

    fn severity(&self) -> Severity {
        Severity::Low
    }

    fn subscribed_kinds(&self) -> &'static [NodeKind] {
        NAMED_KINDS
    }

    fn evaluate(&self, node: &Node, ctx: &RuleContext<'_>) -> Vec<Violation> {
        let Some(name) = declared_name(node) else {
            return vec![];
        };
        let pattern = if node.kind == NodeKind::Class {
            class_prefix_pattern()
        } else {
            encoding_pattern()
        };
        if !pattern.is_some_and(|re| re.is_match(name)) {
            return vec![];
        }
        vec![ctx.violation(
            self.id(),
            self.severity(),
            node,
            format!("Name `{name}` encodes its type or scope; drop the prefix"),
        )]
    }
}
