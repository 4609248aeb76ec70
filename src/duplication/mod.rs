//! Duplication Detector
//!
//! Corpus-wide, so it runs in two halves. [`extract`] runs inside each
//! file's worker and copies out fingerprints. [`detect`] runs once every
//! file is done and clusters them.
//!
//! | Rule | Cluster key | Severity |
//! |------|-------------|----------|
//! | `DuplicateCode` | exact normalized fingerprint | Medium |
//! | `SimilarStructure` | control-flow shape plus bigram Jaccard >= `duplicationSimilarityThreshold` | Low |
//! | `DuplicateConditional` | identical if/else-if or select predicates in two or more functions | Medium |
//!
//! Clusters are processed in parallel per hash bucket. Members are sorted
//! by file and position and every member lists every other member as
//! related, so the output does not depend on worker order.

mod fingerprint;

pub use fingerprint::{
    extract, jaccard, Candidate, CandidateKind, ConditionalChain, FileFingerprints,
};

use crate::config::ResolvedConfig;
use crate::detectors::{RuleInfo, ThresholdSpec};
use crate::models::{Category, Severity, SourceRange, Violation};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

pub const DUPLICATE_CODE: &str = "DuplicateCode";
pub const SIMILAR_STRUCTURE: &str = "SimilarStructure";
pub const DUPLICATE_CONDITIONAL: &str = "DuplicateConditional";

pub const MIN_CHAIN_LENGTH: ThresholdSpec = ThresholdSpec::count("minChainLength", 2.0);

/// Catalog entries for the corpus-level rules
pub const RULES: &[RuleInfo] = &[
    RuleInfo {
        id: DUPLICATE_CODE,
        category: Category::Duplication,
        description: "Detects functions and blocks that are copies of each other",
        thresholds: &[],
    },
    RuleInfo {
        id: SIMILAR_STRUCTURE,
        category: Category::Duplication,
        description: "Detects code with the same control flow but different surface tokens",
        thresholds: &[],
    },
    RuleInfo {
        id: DUPLICATE_CONDITIONAL,
        category: Category::Duplication,
        description: "Detects the same if/else or switch chain repeated across functions",
        thresholds: &[MIN_CHAIN_LENGTH],
    },
];

/// Cluster fingerprints from every file into violations
pub fn detect(files: &[FileFingerprints], config: &ResolvedConfig) -> Vec<Violation> {
    let candidates: Vec<&Candidate> = files.iter().flat_map(|f| &f.candidates).collect();

    let exact = exact_clusters(&candidates);
    let mut violations = Vec::new();

    if config.is_enabled(DUPLICATE_CODE) {
        violations.extend(exact.par_iter().flat_map_iter(|c| duplicate_code(c)).collect::<Vec<_>>());
    }

    if config.is_enabled(SIMILAR_STRUCTURE) {
        let clustered: Vec<&SourceRange> = exact.iter().flatten().map(|c| &c.range).collect();
        let threshold = config.duplication_similarity_threshold;
        let similar = similar_clusters(&candidates, &clustered, threshold);
        violations.extend(similar.iter().flat_map(|c| similar_structure(c)));
    }

    if config.is_enabled(DUPLICATE_CONDITIONAL) {
        let min_chain = config
            .threshold(DUPLICATE_CONDITIONAL, MIN_CHAIN_LENGTH.name)
            .unwrap_or(MIN_CHAIN_LENGTH.default) as usize;
        violations.extend(duplicate_conditionals(files, min_chain));
    }

    debug!(
        "Duplication: {} candidates in {} files, {} exact clusters, {} violations",
        candidates.len(),
        files.len(),
        exact.len(),
        violations.len()
    );
    violations
}

fn sort_members(members: &mut [&Candidate]) {
    members.sort_by(|a, b| a.range.sort_key().cmp(&b.range.sort_key()));
}

/// Groups of at least two candidates sharing an exact fingerprint
///
/// A copied function's copied blocks are the same finding: members nested
/// inside members of one enclosing cluster collapse to a single
/// representative, so the block cluster survives only if it also has a
/// copy outside that enclosing cluster.
fn exact_clusters<'a>(candidates: &[&'a Candidate]) -> Vec<Vec<&'a Candidate>> {
    let mut buckets: BTreeMap<u64, Vec<&Candidate>> = BTreeMap::new();
    for candidate in candidates {
        buckets.entry(candidate.exact).or_default().push(candidate);
    }
    let clusters: Vec<Vec<&Candidate>> = buckets.into_values().filter(|m| m.len() >= 2).collect();

    clusters
        .par_iter()
        .enumerate()
        .filter_map(|(index, members)| {
            let mut members = members.clone();
            sort_members(&mut members);
            let mut seen_outer: Vec<usize> = Vec::new();
            let kept: Vec<&Candidate> = members
                .into_iter()
                .filter(|m| match enclosing_cluster(&clusters, index, &m.range) {
                    None => true,
                    Some(outer) if seen_outer.contains(&outer) => false,
                    Some(outer) => {
                        seen_outer.push(outer);
                        true
                    }
                })
                .collect();
            (kept.len() >= 2).then_some(kept)
        })
        .collect()
}

/// Lowest-indexed other cluster with a member strictly enclosing `range`
fn enclosing_cluster(clusters: &[Vec<&Candidate>], own: usize, range: &SourceRange) -> Option<usize> {
    clusters
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != own)
        .find(|(_, members)| members.iter().any(|m| m.range != *range && m.range.covers(range)))
        .map(|(i, _)| i)
}

/// Whether `range` sits strictly inside one of `others`
fn is_nested_in(range: &SourceRange, others: &[&SourceRange]) -> bool {
    others.iter().any(|o| *o != range && o.covers(range))
}

/// Near-duplicate groups: same control-flow shape, different exact
/// fingerprint, bigram similarity at or above the threshold
fn similar_clusters<'a>(
    candidates: &[&'a Candidate],
    exact_members: &[&SourceRange],
    threshold: f64,
) -> Vec<Vec<&'a Candidate>> {
    let mut buckets: BTreeMap<u64, Vec<&Candidate>> = BTreeMap::new();
    for candidate in candidates {
        let Some(shape) = candidate.shape else { continue };
        if exact_members.iter().any(|r| r.covers(&candidate.range)) {
            continue;
        }
        buckets.entry(shape).or_default().push(candidate);
    }

    let clusters: Vec<Vec<&Candidate>> = buckets
        .into_values()
        .filter(|m| m.len() >= 2)
        .collect::<Vec<_>>()
        .into_par_iter()
        .flat_map_iter(|mut members| {
            sort_members(&mut members);
            link_similar(members, threshold)
        })
        .collect();

    let clustered: Vec<&SourceRange> = clusters.iter().flatten().map(|c| &c.range).collect();
    clusters
        .into_iter()
        .filter_map(|members| {
            let kept: Vec<&Candidate> = members
                .into_iter()
                .filter(|m| !is_nested_in(&m.range, &clustered))
                .collect();
            (kept.len() >= 2).then_some(kept)
        })
        .collect()
}

/// Connected components of the "similar enough" relation within a bucket
fn link_similar(members: Vec<&Candidate>, threshold: f64) -> Vec<Vec<&Candidate>> {
    let n = members.len();
    let mut parent: Vec<usize> = (0..n).collect();
    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for i in 0..n {
        for j in i + 1..n {
            if members[i].exact == members[j].exact {
                continue;
            }
            if jaccard(&members[i].bigrams, &members[j].bigrams) >= threshold {
                let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                if a != b {
                    parent[b.max(a)] = a.min(b);
                }
            }
        }
    }

    let mut groups: BTreeMap<usize, Vec<&Candidate>> = BTreeMap::new();
    for (i, member) in members.into_iter().enumerate() {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(member);
    }
    groups.into_values().filter(|g| g.len() >= 2).collect()
}

fn describe(candidate: &Candidate) -> String {
    match (&candidate.kind, &candidate.name) {
        (CandidateKind::Function, Some(name)) => format!("Function `{name}`"),
        _ => format!("Block of {} statements", candidate.statements),
    }
}

/// One violation per member, each relating to every other member
fn per_member(
    members: &[&Candidate],
    rule_id: &str,
    severity: Severity,
    message: impl Fn(&Candidate, usize) -> String,
) -> Vec<Violation> {
    members
        .iter()
        .enumerate()
        .map(|(i, member)| {
            let related = members
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, other)| other.range.clone())
                .collect();
            Violation::new(
                rule_id,
                severity,
                member.range.clone(),
                message(*member, members.len() - 1),
            )
            .with_related(related)
        })
        .collect()
}

fn duplicate_code(members: &[&Candidate]) -> Vec<Violation> {
    per_member(members, DUPLICATE_CODE, Severity::Medium, |member, others| {
        format!(
            "{} is duplicated in {} other location{}; extract the shared code",
            describe(member),
            others,
            if others == 1 { "" } else { "s" }
        )
    })
}

fn similar_structure(members: &[&Candidate]) -> Vec<Violation> {
    per_member(members, SIMILAR_STRUCTURE, Severity::Low, |member, others| {
        format!(
            "{} follows the same algorithm as {} other location{} with different names or values; consider a shared abstraction",
            describe(member),
            others,
            if others == 1 { "" } else { "s" }
        )
    })
}

/// Same predicate chain in at least two different functions
fn duplicate_conditionals(files: &[FileFingerprints], min_chain: usize) -> Vec<Violation> {
    let mut buckets: BTreeMap<u64, Vec<&ConditionalChain>> = BTreeMap::new();
    for chain in files.iter().flat_map(|f| &f.chains) {
        if chain.branches >= min_chain.max(1) {
            buckets.entry(chain.key).or_default().push(chain);
        }
    }

    let mut violations = Vec::new();
    for mut members in buckets.into_values() {
        let owners: BTreeSet<&SourceRange> = members.iter().map(|c| &c.owner).collect();
        if owners.len() < 2 {
            continue;
        }
        members.sort_by(|a, b| a.range.sort_key().cmp(&b.range.sort_key()));
        for (i, chain) in members.iter().enumerate() {
            let related: Vec<SourceRange> = members
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, other)| other.range.clone())
                .collect();
            violations.push(
                Violation::new(
                    DUPLICATE_CONDITIONAL,
                    Severity::Medium,
                    chain.range.clone(),
                    format!(
                        "The same {}-branch conditional appears in {} other place{}; replace it with polymorphism or a lookup",
                        chain.branches,
                        related.len(),
                        if related.len() == 1 { "" } else { "s" }
                    ),
                )
                .with_related(related),
            );
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::detectors::RuleRegistry;
    use crate::ir::{ModelBuilder, NodeId, StatementKind, StructuralModel};

    fn config() -> ResolvedConfig {
        AnalysisConfig::default()
            .resolve(&RuleRegistry::builtin().catalog())
            .unwrap()
    }

    /// Function with a loop holding a branch, parameterized by names and
    /// by the operator used in the branch
    fn looping(b: &mut ModelBuilder, module: NodeId, name: &str, var: &str, op: &str) {
        let f = b.function(module, name);
        b.parameter(f, "items", None);
        let body = b.block(f);
        let total = b.var_decl(body, var);
        b.int(total, 0);
        let lp = b.statement(body, StatementKind::For);
        b.var_decl(lp, "item");
        b.ident(lp, "items");
        let each = b.block(lp);
        let check = b.statement(each, StatementKind::If);
        let cmp = b.binary(check, ">");
        b.ident(cmp, "item");
        b.int(cmp, 0);
        let then = b.block(check);
        let assign = b.statement(then, StatementKind::Assign);
        b.ident(assign, var);
        let sum = b.binary(assign, op);
        b.ident(sum, var);
        b.ident(sum, "item");
        let ret = b.statement(body, StatementKind::Return);
        b.ident(ret, var);
    }

    fn file(path: &str, build: impl FnOnce(&mut ModelBuilder, NodeId)) -> StructuralModel {
        let mut b = ModelBuilder::new(path);
        let m = b.module("m");
        build(&mut b, m);
        b.build().unwrap()
    }

    #[test]
    fn test_cross_file_duplicates_are_symmetric() {
        let a = file("a.py", |b, m| looping(b, m, "sum_positive", "total", "+"));
        let c = file("c.py", |b, m| looping(b, m, "count_positive", "count", "+"));
        let prints = vec![extract(&a, 3), extract(&c, 3)];

        let found = detect(&prints, &config());
        let dups: Vec<&Violation> = found.iter().filter(|v| v.rule_id == DUPLICATE_CODE).collect();
        assert_eq!(dups.len(), 2);
        assert_eq!(dups[0].related, vec![dups[1].range.clone()]);
        assert_eq!(dups[1].related, vec![dups[0].range.clone()]);
        assert_eq!(dups[0].range.file.to_str(), Some("a.py"));
    }

    #[test]
    fn test_detection_is_deterministic() {
        let a = file("a.py", |b, m| looping(b, m, "one", "x", "+"));
        let c = file("b.py", |b, m| {
            looping(b, m, "two", "y", "+");
            looping(b, m, "three", "z", "+");
        });
        let forward = detect(&[extract(&a, 3), extract(&c, 3)], &config());
        let backward = detect(&[extract(&c, 3), extract(&a, 3)], &config());
        let key = |vs: &[Violation]| {
            let mut vs = vs.to_vec();
            vs.sort_by(|x, y| x.range.sort_key().cmp(&y.range.sort_key()));
            vs
        };
        assert_eq!(key(&forward), key(&backward));
        assert_eq!(forward.iter().filter(|v| v.rule_id == DUPLICATE_CODE).count(), 3);
    }

    #[test]
    fn test_same_shape_different_operator_is_similar_structure() {
        let model = file("s.py", |b, m| {
            looping(b, m, "sum_positive", "total", "+");
            looping(b, m, "product_positive", "total", "*");
        });
        let found = detect(&[extract(&model, 3)], &config());
        assert!(found.iter().all(|v| v.rule_id != DUPLICATE_CODE));
        let similar: Vec<&Violation> = found
            .iter()
            .filter(|v| v.rule_id == SIMILAR_STRUCTURE)
            .collect();
        assert_eq!(similar.len(), 2);
        assert!(similar.iter().all(|v| v.severity == Severity::Low));
    }

    #[test]
    fn test_conditional_chain_repeated_across_functions() {
        let chain = |b: &mut ModelBuilder, m: NodeId, name: &str| {
            let f = b.function(m, name);
            b.parameter(f, "plan", None);
            let body = b.block(f);
            let first = b.statement(body, StatementKind::If);
            let eq = b.binary(first, "==");
            b.ident(eq, "plan");
            b.string(eq, "gold");
            b.block(first);
            let second = b.statement(first, StatementKind::If);
            let eq = b.binary(second, "==");
            b.ident(eq, "plan");
            b.string(eq, "silver");
            b.block(second);
        };
        let model = file("plans.py", |b, m| {
            chain(b, m, "fee");
            chain(b, m, "discount");
        });
        let found = detect(&[extract(&model, 3)], &config());
        let repeated: Vec<&Violation> = found
            .iter()
            .filter(|v| v.rule_id == DUPLICATE_CONDITIONAL)
            .collect();
        assert_eq!(repeated.len(), 2);
        assert_eq!(repeated[0].related.len(), 1);
    }

    /// `if ready { load(); parse(); store(); }`
    fn guarded_pipeline(b: &mut ModelBuilder, body: NodeId) -> NodeId {
        let check = b.statement(body, StatementKind::If);
        b.ident(check, "ready");
        let then = b.block(check);
        for step in ["load", "parse", "store"] {
            let stmt = b.statement(then, StatementKind::Expression);
            b.call(stmt, step);
        }
        then
    }

    #[test]
    fn test_blocks_inside_copied_functions_collapse_into_function_finding() {
        let model = file("copy.py", |b, m| {
            for name in ["first", "second"] {
                let f = b.function(m, name);
                let body = b.block(f);
                guarded_pipeline(b, body);
            }
        });
        let found = detect(&[extract(&model, 3)], &config());
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|v| v.message.starts_with("Function")));
    }

    #[test]
    fn test_block_shared_with_unrelated_function_survives_enclosing_cluster() {
        let mut first_block = None;
        let mut third_block = None;
        let model = file("shared.py", |b, m| {
            for name in ["first", "second"] {
                let f = b.function(m, name);
                let body = b.block(f);
                let block = guarded_pipeline(b, body);
                first_block.get_or_insert(block);
            }
            let f = b.function(m, "third");
            b.parameter(f, "retries", None);
            let body = b.block(f);
            let warm = b.statement(body, StatementKind::Expression);
            b.call(warm, "warm_up");
            third_block = Some(guarded_pipeline(b, body));
        });
        let found = detect(&[extract(&model, 3)], &config());

        let span = |id: Option<NodeId>| model.node(id.unwrap()).unwrap().span;
        let blocks: Vec<&Violation> = found
            .iter()
            .filter(|v| v.message.starts_with("Block"))
            .collect();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].range.span, span(first_block));
        assert_eq!(blocks[1].range.span, span(third_block));
        assert_eq!(blocks[1].related, vec![blocks[0].range.clone()]);
        assert_eq!(
            found.iter().filter(|v| v.message.starts_with("Function")).count(),
            2
        );
    }
}
