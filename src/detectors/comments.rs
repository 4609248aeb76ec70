//! Comment detectors
//!
//! - `RedundantComment`: a comment that only restates the code it sits on
//!   (`// increment the counter` over `counter += 1`). Measured as the
//!   share of the comment's content words that already appear as words of
//!   identifiers in the commented declaration or statement.
//! - `CommentedOutCode`: a comment whose text parses like code, as judged
//!   by the adapter that produced the model.

use super::base::{Rule, RuleContext, ThresholdSpec};
use super::split_words;
use crate::ir::{Node, NodeKind, StructuralModel};
use crate::models::{Category, Severity, Violation};
use regex::Regex;
use rustc_hash::FxHashSet;
use std::sync::OnceLock;

/// Words that carry no meaning of their own in a comment
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "this", "that", "these", "those", "of", "to", "for", "in", "on", "at",
    "by", "with", "from", "into", "and", "or", "is", "are", "be", "it", "its", "we", "our",
    "then", "here", "now", "just", "do", "does", "so",
];

/// Comments that carry intent and are never redundant
static INTENT_MARKER: OnceLock<Option<Regex>> = OnceLock::new();

fn intent_marker() -> Option<&'static Regex> {
    INTENT_MARKER
        .get_or_init(|| Regex::new(r"(?i)\b(todo|fixme|hack|xxx|note|warning|suppress:)").ok())
        .as_ref()
}

fn normalize(word: &str) -> String {
    let word = word.to_lowercase();
    match word.strip_suffix('s') {
        Some(stem) if stem.len() > 2 && !stem.ends_with('s') => stem.to_string(),
        _ => word,
    }
}

/// Content words of a comment, in order, duplicates removed
fn comment_words(text: &str) -> Vec<String> {
    let mut seen = FxHashSet::default();
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .flat_map(split_words)
        .filter(|w| w.chars().any(char::is_alphabetic))
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .map(|w| normalize(&w))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

/// Words of every identifier a comment could be restating
fn code_words(model: &StructuralModel, owner: &Node) -> FxHashSet<String> {
    let names: Vec<&str> = match owner.kind {
        // A declaration's comment restates its signature, not its body
        NodeKind::Function | NodeKind::Class | NodeKind::Module => {
            let mut names = vec![owner.name_str()];
            for param in model.parameters(owner.id) {
                names.push(param.name_str());
                names.extend(param.attrs.type_name.as_deref());
            }
            names.extend(owner.attrs.return_type.as_deref());
            names
        }
        _ => model
            .descendants(owner.id)
            .flat_map(|n| [n.name.as_deref(), n.attrs.type_name.as_deref()])
            .flatten()
            .collect(),
    };
    names
        .into_iter()
        .flat_map(split_words)
        .map(|w| normalize(&w))
        .collect()
}

/// Comment directly above, or trailing on the same line as, its owner
fn is_adjacent(comment: &Node, owner: &Node) -> bool {
    let gap = owner.span.start_line.saturating_sub(comment.span.end_line);
    gap <= 1 || comment.span.start_line == owner.span.end_line
}

pub struct RedundantCommentRule;

impl RedundantCommentRule {
    pub const OVERLAP: ThresholdSpec = ThresholdSpec::real("overlapThreshold", 0.7, 0.0, 1.0);
    pub const MIN_WORDS: ThresholdSpec = ThresholdSpec::count("minWords", 2.0);
}

impl Rule for RedundantCommentRule {
    fn id(&self) -> &'static str {
        "RedundantComment"
    }

    fn description(&self) -> &'static str {
        "Detects comments that restate the code they describe"
    }

    fn category(&self) -> Category {
        Category::Comments
    }

    fn severity(&self) -> Severity {
        Severity::Low
    }

    fn subscribed_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Comment]
    }

    fn thresholds(&self) -> &'static [ThresholdSpec] {
        &[Self::OVERLAP, Self::MIN_WORDS]
    }

    fn evaluate(&self, node: &Node, ctx: &RuleContext<'_>) -> Vec<Violation> {
        let Some(text) = node.text.as_deref() else {
            return vec![];
        };
        if intent_marker().is_some_and(|re| re.is_match(text)) {
            return vec![];
        }
        let Some(owner) = ctx.model.comment_owner(node.id) else {
            return vec![];
        };
        if !is_adjacent(node, owner) {
            return vec![];
        }

        let words = comment_words(text);
        let min_words = ctx.threshold(&Self::MIN_WORDS) as usize;
        if words.is_empty() || words.len() < min_words {
            return vec![];
        }
        let known = code_words(ctx.model, owner);
        let restated = words.iter().filter(|w| known.contains(*w)).count();
        let overlap = restated as f64 / words.len() as f64;
        if overlap < ctx.threshold(&Self::OVERLAP) {
            return vec![];
        }

        vec![ctx.violation(
            self.id(),
            self.severity(),
            node,
            format!(
                "Comment only restates the code ({:.0}% of its words are identifiers below it); explain why, or delete it",
                overlap * 100.0
            ),
        )]
    }
}

pub struct CommentedOutCodeRule;

impl Rule for CommentedOutCodeRule {
    fn id(&self) -> &'static str {
        "CommentedOutCode"
    }

    fn description(&self) -> &'static str {
        "Detects code left behind in comments"
    }

    fn category(&self) -> Category {
        Category::Comments
    }

    fn severity(&self) -> Severity {
        Severity::Low
    }

    fn subscribed_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Comment]
    }

    fn evaluate(&self, node: &Node, ctx: &RuleContext<'_>) -> Vec<Violation> {
        let Some(text) = node.text.as_deref() else {
            return vec![];
        };
        if !ctx.adapter.looks_like_code(text) {
            return vec![];
        }
        vec![ctx.violation(
            self.id(),
            self.severity(),
            node,
            "Commented-out code; delete it, version control remembers",
        )]
    }
}
