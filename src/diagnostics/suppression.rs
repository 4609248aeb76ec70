//! Suppression markers
//!
//! A comment containing `suppress: <ruleId>[, <ruleId>...]` or
//! `suppress: *` silences those rules inside the declaration or statement
//! the comment is attached to. Rule ids match in any spelling the config
//! accepts (`TooManyArguments`, `too-many-arguments`, ...).

use crate::config::ResolvedConfig;
use crate::ir::{NodeKind, StructuralModel};
use crate::models::{Severity, SourceRange, Violation, UNKNOWN_SUPPRESSION};
use regex::Regex;
use std::sync::OnceLock;

static MARKER: OnceLock<Option<Regex>> = OnceLock::new();

fn marker() -> Option<&'static Regex> {
    MARKER
        .get_or_init(|| {
            Regex::new(r"(?i)\bsuppress:\s*(\*|[A-Za-z][\w-]*(?:\s*,\s*[A-Za-z][\w-]*)*)").ok()
        })
        .as_ref()
}

/// Rules a marker silences
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuppressedRules {
    All,
    Only(Vec<&'static str>),
}

/// One parsed marker and the range it covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suppression {
    pub scope: SourceRange,
    pub rules: SuppressedRules,
    /// Where the marker itself is written
    pub marker: SourceRange,
}

impl Suppression {
    pub fn suppresses(&self, rule_id: &str, range: &SourceRange) -> bool {
        if !self.scope.covers(range) {
            return false;
        }
        match &self.rules {
            SuppressedRules::All => true,
            SuppressedRules::Only(ids) => ids.iter().any(|id| *id == rule_id),
        }
    }
}

/// Rule ids named by a comment, or `None` when it carries no marker
pub fn parse_marker(text: &str) -> Option<Vec<String>> {
    let captures = marker()?.captures(text)?;
    let list = captures.get(1)?.as_str();
    Some(
        list.split(',')
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect(),
    )
}

/// Markers of one file, plus an `UnknownSuppression` violation for every id
/// that is not in the catalog
pub fn collect_suppressions(
    model: &StructuralModel,
    config: &ResolvedConfig,
) -> (Vec<Suppression>, Vec<Violation>) {
    let mut suppressions = Vec::new();
    let mut unknown = Vec::new();

    for comment in model.nodes_of_kind(NodeKind::Comment) {
        let Some(ids) = comment.text.as_deref().and_then(parse_marker) else {
            continue;
        };
        let marker = SourceRange::new(model.path(), comment.span);
        let scope = model
            .comment_owner(comment.id)
            .map(|owner| SourceRange::new(model.path(), owner.span))
            .unwrap_or_else(|| marker.clone());

        let rules = if ids.iter().any(|id| id == "*") {
            SuppressedRules::All
        } else {
            let mut known = Vec::new();
            for id in &ids {
                match config.canonical_rule_id(id) {
                    Some(canonical) => known.push(canonical),
                    None => unknown.push(Violation::new(
                        UNKNOWN_SUPPRESSION,
                        Severity::Low,
                        marker.clone(),
                        format!("Suppression references unknown rule `{id}`"),
                    )),
                }
            }
            if known.is_empty() {
                continue;
            }
            SuppressedRules::Only(known)
        };

        suppressions.push(Suppression {
            scope,
            rules,
            marker,
        });
    }
    (suppressions, unknown)
}
