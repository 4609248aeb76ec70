//! Ingestion checks for adapter output
//!
//! A model that fails here is dropped for that file only; the caller turns
//! the [`ModelError`] into a diagnostic.

use super::{Node, NodeId, NodeKind};
use crate::errors::ModelError;
use rustc_hash::{FxHashMap, FxHashSet};

/// Lookup tables derived while validating
pub(super) struct Links {
    pub index: FxHashMap<NodeId, usize>,
    pub parents: FxHashMap<NodeId, NodeId>,
    pub comment_owners: FxHashMap<NodeId, NodeId>,
}

pub(super) fn validate(
    root: NodeId,
    nodes: &[Node],
    line_count: Option<u32>,
) -> Result<Links, ModelError> {
    if nodes.is_empty() {
        return Err(ModelError::Empty);
    }

    let mut index = FxHashMap::default();
    index.reserve(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        if index.insert(node.id, i).is_some() {
            return Err(ModelError::DuplicateId(node.id));
        }
    }

    let root_node = index
        .get(&root)
        .map(|&i| &nodes[i])
        .ok_or(ModelError::MissingRoot(root))?;
    if root_node.kind != NodeKind::Module {
        return Err(ModelError::RootNotModule(root));
    }

    let mut parents: FxHashMap<NodeId, NodeId> = FxHashMap::default();
    let mut comment_owners: FxHashMap<NodeId, NodeId> = FxHashMap::default();

    for node in nodes {
        if !node.span.is_ordered() {
            return Err(ModelError::InvertedSpan(node.id));
        }
        if let Some(limit) = line_count {
            if node.span.end_line > limit {
                return Err(ModelError::OutOfBounds {
                    node: node.id,
                    line: node.span.end_line,
                    line_count: limit,
                });
            }
        }

        let mut previous: Option<&Node> = None;
        for child_id in &node.children {
            let child = index
                .get(child_id)
                .map(|&i| &nodes[i])
                .ok_or(ModelError::DanglingReference {
                    parent: node.id,
                    missing: *child_id,
                })?;
            if *child_id == root {
                return Err(ModelError::RootHasParent(root));
            }
            if let Some(first) = parents.insert(*child_id, node.id) {
                return Err(ModelError::MultipleParents {
                    node: *child_id,
                    first,
                    second: node.id,
                });
            }
            if !node.span.contains(&child.span) {
                return Err(ModelError::ChildOutsideParent {
                    parent: node.id,
                    child: *child_id,
                });
            }
            if let Some(prev) = previous {
                if prev.span.end() > child.span.start() {
                    return Err(ModelError::SiblingOrder {
                        first: prev.id,
                        second: child.id,
                    });
                }
            }
            previous = Some(child);
        }

        for comment_id in &node.comments {
            let comment = index
                .get(comment_id)
                .map(|&i| &nodes[i])
                .ok_or(ModelError::DanglingReference {
                    parent: node.id,
                    missing: *comment_id,
                })?;
            if comment.kind != NodeKind::Comment {
                return Err(ModelError::NotAComment {
                    owner: node.id,
                    comment: *comment_id,
                });
            }
            if let Some(first) = comment_owners.insert(*comment_id, node.id) {
                return Err(ModelError::CommentAttachedTwice {
                    comment: *comment_id,
                    first,
                    second: node.id,
                });
            }
        }
    }

    // Single parents plus reachability from the root rules out cycles.
    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        if let Some(&i) = index.get(&id) {
            stack.extend(nodes[i].children.iter().copied());
        }
    }
    if let Some(orphan) = nodes
        .iter()
        .find(|n| n.kind != NodeKind::Comment && !seen.contains(&n.id))
    {
        return Err(ModelError::Orphan(orphan.id));
    }

    Ok(Links {
        index,
        parents,
        comment_owners,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Span, StructuralModel};

    fn node(id: u32, kind: NodeKind, span: Span, children: &[u32]) -> Node {
        let mut n = Node::new(NodeId(id), kind, span);
        n.children = children.iter().map(|c| NodeId(*c)).collect();
        n
    }

    fn build(nodes: Vec<Node>) -> Result<StructuralModel, ModelError> {
        StructuralModel::new("t.py", NodeId(0), nodes, Some(100))
    }

    #[test]
    fn test_accepts_valid_tree() {
        let nodes = vec![
            node(0, NodeKind::Module, Span::new(1, 1, 10, 1), &[1, 2]),
            node(1, NodeKind::Function, Span::new(1, 1, 3, 1), &[]),
            node(2, NodeKind::Function, Span::new(4, 1, 6, 1), &[]),
        ];
        assert!(build(nodes).is_ok());
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let nodes = vec![
            node(0, NodeKind::Module, Span::new(1, 1, 10, 1), &[1]),
            node(1, NodeKind::Function, Span::new(1, 1, 3, 1), &[]),
            node(1, NodeKind::Function, Span::new(4, 1, 6, 1), &[]),
        ];
        assert_eq!(build(nodes).unwrap_err(), ModelError::DuplicateId(NodeId(1)));
    }

    #[test]
    fn test_rejects_two_parents() {
        let nodes = vec![
            node(0, NodeKind::Module, Span::new(1, 1, 10, 1), &[1, 2]),
            node(1, NodeKind::Class, Span::new(1, 1, 4, 1), &[3]),
            node(2, NodeKind::Class, Span::new(5, 1, 9, 1), &[3]),
            node(3, NodeKind::Function, Span::new(2, 1, 3, 1), &[]),
        ];
        assert!(matches!(
            build(nodes).unwrap_err(),
            ModelError::MultipleParents { .. } | ModelError::ChildOutsideParent { .. }
        ));
    }

    #[test]
    fn test_rejects_overlapping_siblings() {
        let nodes = vec![
            node(0, NodeKind::Module, Span::new(1, 1, 10, 1), &[1, 2]),
            node(1, NodeKind::Function, Span::new(1, 1, 5, 1), &[]),
            node(2, NodeKind::Function, Span::new(4, 1, 6, 1), &[]),
        ];
        assert_eq!(
            build(nodes).unwrap_err(),
            ModelError::SiblingOrder {
                first: NodeId(1),
                second: NodeId(2)
            }
        );
    }

    #[test]
    fn test_rejects_orphans_and_bad_root() {
        let nodes = vec![
            node(0, NodeKind::Module, Span::new(1, 1, 10, 1), &[]),
            node(1, NodeKind::Function, Span::new(1, 1, 5, 1), &[]),
        ];
        assert_eq!(build(nodes).unwrap_err(), ModelError::Orphan(NodeId(1)));

        let nodes = vec![node(0, NodeKind::Function, Span::new(1, 1, 10, 1), &[])];
        assert_eq!(build(nodes).unwrap_err(), ModelError::RootNotModule(NodeId(0)));
        assert_eq!(build(vec![]).unwrap_err(), ModelError::Empty);
    }

    #[test]
    fn test_rejects_out_of_bounds_and_inverted() {
        let nodes = vec![node(0, NodeKind::Module, Span::new(1, 1, 200, 1), &[])];
        assert!(matches!(
            build(nodes).unwrap_err(),
            ModelError::OutOfBounds { line: 200, .. }
        ));

        let nodes = vec![node(0, NodeKind::Module, Span::new(5, 1, 2, 1), &[])];
        assert_eq!(build(nodes).unwrap_err(), ModelError::InvertedSpan(NodeId(0)));
    }

    #[test]
    fn test_comment_attachment_must_target_comments() {
        let mut owner = node(1, NodeKind::Function, Span::new(2, 1, 5, 1), &[]);
        owner.comments = vec![NodeId(2)];
        let nodes = vec![
            node(0, NodeKind::Module, Span::new(1, 1, 10, 1), &[1, 2]),
            owner,
            node(2, NodeKind::Function, Span::new(6, 1, 7, 1), &[]),
        ];
        assert_eq!(
            build(nodes).unwrap_err(),
            ModelError::NotAComment {
                owner: NodeId(1),
                comment: NodeId(2)
            }
        );
    }
}
