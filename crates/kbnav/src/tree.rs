//! The parent-indexed tree built from a flat row batch.

use crate::error::{DataIntegrityError, NotFound};
use crate::types::{Node, NodeId, Row};
use std::collections::{HashMap, HashSet};

/// An immutable, validated index over all nodes of one dataset.
///
/// Built once per load by [`Tree::build`] and never mutated afterwards;
/// replacing the dataset means building a new `Tree` and swapping it into
/// the [`TreeStore`](crate::TreeStore).
///
/// Guarantees after a successful build:
///
/// - every id is unique
/// - every non-null parent id names a node in the tree
/// - following parent links from any node ends at a null parent
/// - children are ordered by source row order
/// - the root is the node of the first row
///
/// # Example
///
/// ```
/// use kbnav::{NodeId, Row, Tree};
///
/// let tree = Tree::build(vec![
///     Row::new(1, "Root").with_text("R"),
///     Row::new(2, "A").with_parent(1),
///     Row::new(3, "B").with_parent(1),
/// ])
/// .unwrap();
///
/// assert_eq!(tree.root(), NodeId::new(1));
/// let names: Vec<&str> = tree
///     .children(NodeId::new(1))
///     .unwrap()
///     .into_iter()
///     .map(|(_, name)| name)
///     .collect();
/// assert_eq!(names, ["A", "B"]);
/// assert_eq!(tree.parent(NodeId::new(3)).unwrap(), Some(NodeId::new(1)));
/// ```
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: HashMap<NodeId, Node>,
    children: HashMap<NodeId, Vec<NodeId>>,
    order: Vec<NodeId>,
    root: NodeId,
}

impl Tree {
    /// Validate a row batch and index it.
    ///
    /// Rows are never dropped silently: the first problem found fails the
    /// whole batch. Checks run in this order: missing id, duplicate id,
    /// empty batch, dangling parent, cycle.
    pub fn build<I>(rows: I) -> Result<Self, DataIntegrityError>
    where
        I: IntoIterator<Item = Row>,
    {
        let mut nodes: HashMap<NodeId, Node> = HashMap::new();
        let mut order = Vec::new();

        for (idx, row) in rows.into_iter().enumerate() {
            let row_no = idx + 1;
            let id = row
                .id
                .ok_or(DataIntegrityError::MissingId { row: row_no })?;
            if nodes.contains_key(&id) {
                return Err(DataIntegrityError::DuplicateId { id, row: row_no });
            }
            nodes.insert(
                id,
                Node {
                    id,
                    name: row.name,
                    text: row.text,
                    parent: row.parent,
                },
            );
            order.push(id);
        }

        let Some(&root) = order.first() else {
            return Err(DataIntegrityError::Empty);
        };

        let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for id in &order {
            let Some(parent) = nodes.get(id).and_then(|n| n.parent) else {
                continue;
            };
            if !nodes.contains_key(&parent) {
                return Err(DataIntegrityError::DanglingParent { id: *id, parent });
            }
            children.entry(parent).or_default().push(*id);
        }

        check_acyclic(&nodes, &order)?;

        Ok(Self {
            nodes,
            children,
            order,
            root,
        })
    }

    /// The node of the first source row.
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Result<&Node, NotFound> {
        self.nodes.get(&id).ok_or(NotFound(id))
    }

    /// Children of `id` as `(id, name)` pairs, in source row order.
    pub fn children(&self, id: NodeId) -> Result<Vec<(NodeId, &str)>, NotFound> {
        Ok(self
            .child_nodes(id)?
            .map(|child| (child.id, child.name.as_str()))
            .collect())
    }

    /// Children of `id` as nodes, in source row order.
    pub fn child_nodes(&self, id: NodeId) -> Result<impl Iterator<Item = &Node>, NotFound> {
        if !self.contains(id) {
            return Err(NotFound(id));
        }
        Ok(self
            .children
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter_map(|child| self.nodes.get(child)))
    }

    /// Whether `child` is a direct child of `parent`.
    pub fn is_child(&self, parent: NodeId, child: NodeId) -> bool {
        self.nodes
            .get(&child)
            .is_some_and(|node| node.parent == Some(parent))
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, NotFound> {
        self.get(id).map(|node| node.parent)
    }

    /// Walk parent links from `id` up to a parentless node.
    ///
    /// The result starts at `id` and ends at the topmost ancestor.
    pub fn ancestors(&self, id: NodeId) -> Result<Vec<NodeId>, NotFound> {
        let mut chain = vec![id];
        let mut cursor = self.parent(id)?;
        while let Some(parent) = cursor {
            chain.push(parent);
            cursor = self.parent(parent)?;
        }
        Ok(chain)
    }

    /// Number of parent links between `id` and its topmost ancestor.
    pub fn depth(&self, id: NodeId) -> Result<usize, NotFound> {
        self.ancestors(id).map(|chain| chain.len() - 1)
    }

    /// Nodes reachable from the root in pre-order, with their depth below it.
    pub fn walk(&self) -> Vec<(usize, &Node)> {
        let mut out = Vec::with_capacity(self.order.len());
        let mut stack = vec![(0usize, self.root)];
        while let Some((depth, id)) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            out.push((depth, node));
            if let Some(kids) = self.children.get(&id) {
                for child in kids.iter().rev() {
                    stack.push((depth + 1, *child));
                }
            }
        }
        out
    }

    /// All nodes in source row order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Fail if any chain of parent links loops back on itself.
///
/// Each node is visited once overall: chains that already reached a null
/// parent are remembered in `settled`.
fn check_acyclic(nodes: &HashMap<NodeId, Node>, order: &[NodeId]) -> Result<(), DataIntegrityError> {
    let mut settled: HashSet<NodeId> = HashSet::with_capacity(order.len());

    for &start in order {
        let mut trail = Vec::new();
        let mut on_trail = HashSet::new();
        let mut cursor = Some(start);

        while let Some(id) = cursor {
            if settled.contains(&id) {
                break;
            }
            if !on_trail.insert(id) {
                return Err(DataIntegrityError::Cycle { id });
            }
            trail.push(id);
            cursor = nodes.get(&id).and_then(|n| n.parent);
        }

        settled.extend(trail);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: i64) -> NodeId {
        NodeId::new(raw)
    }

    fn sample() -> Vec<Row> {
        vec![
            Row::new(1, "Root").with_text("R"),
            Row::new(2, "A").with_parent(1).with_text("a"),
            Row::new(3, "B").with_parent(1).with_text("b"),
            Row::new(4, "A1").with_parent(2),
        ]
    }

    #[test]
    fn test_build_root_is_first_row() {
        let tree = Tree::build(sample()).unwrap();
        assert_eq!(tree.root(), id(1));
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_root_follows_row_order_not_parentless() {
        // A child row listed first still becomes the root.
        let rows = vec![
            Row::new(2, "A").with_parent(1),
            Row::new(1, "Root"),
        ];
        let tree = Tree::build(rows).unwrap();
        assert_eq!(tree.root(), id(2));
        assert_eq!(tree.parent(id(2)).unwrap(), Some(id(1)));
    }

    #[test]
    fn test_children_keep_source_order() {
        let rows = vec![
            Row::new(1, "Root"),
            Row::new(9, "Zeta").with_parent(1),
            Row::new(5, "Alpha").with_parent(1),
            Row::new(7, "Mid").with_parent(1),
        ];
        let tree = Tree::build(rows).unwrap();
        let kids = tree.children(id(1)).unwrap();
        assert_eq!(kids, vec![(id(9), "Zeta"), (id(5), "Alpha"), (id(7), "Mid")]);
    }

    #[test]
    fn test_children_of_leaf_is_empty() {
        let tree = Tree::build(sample()).unwrap();
        assert!(tree.children(id(3)).unwrap().is_empty());
    }

    #[test]
    fn test_lookups_not_found() {
        let tree = Tree::build(sample()).unwrap();
        assert_eq!(tree.get(id(99)).unwrap_err(), NotFound(id(99)));
        assert_eq!(tree.children(id(99)).unwrap_err(), NotFound(id(99)));
        assert_eq!(tree.parent(id(99)).unwrap_err(), NotFound(id(99)));
    }

    #[test]
    fn test_parent_of_root_is_none() {
        let tree = Tree::build(sample()).unwrap();
        assert_eq!(tree.parent(id(1)).unwrap(), None);
        assert_eq!(tree.parent(id(4)).unwrap(), Some(id(2)));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(
            Tree::build(Vec::new()).unwrap_err(),
            DataIntegrityError::Empty
        );
    }

    #[test]
    fn test_missing_id() {
        let rows = vec![Row::new(1, "Root"), Row::without_id("Orphan")];
        assert_eq!(
            Tree::build(rows).unwrap_err(),
            DataIntegrityError::MissingId { row: 2 }
        );
    }

    #[test]
    fn test_duplicate_id() {
        let rows = vec![
            Row::new(1, "Root"),
            Row::new(2, "A").with_parent(1),
            Row::new(2, "A again").with_parent(1),
        ];
        assert_eq!(
            Tree::build(rows).unwrap_err(),
            DataIntegrityError::DuplicateId { id: id(2), row: 3 }
        );
    }

    #[test]
    fn test_dangling_parent() {
        let rows = vec![Row::new(1, "Root"), Row::new(2, "A").with_parent(42)];
        assert_eq!(
            Tree::build(rows).unwrap_err(),
            DataIntegrityError::DanglingParent {
                id: id(2),
                parent: id(42)
            }
        );
    }

    #[test]
    fn test_cycle_detected() {
        let rows = vec![
            Row::new(1, "Root"),
            Row::new(2, "A").with_parent(3),
            Row::new(3, "B").with_parent(2),
        ];
        assert!(matches!(
            Tree::build(rows).unwrap_err(),
            DataIntegrityError::Cycle { .. }
        ));
    }

    #[test]
    fn test_self_parent_is_cycle() {
        let rows = vec![Row::new(1, "Root"), Row::new(2, "A").with_parent(2)];
        assert_eq!(
            Tree::build(rows).unwrap_err(),
            DataIntegrityError::Cycle { id: id(2) }
        );
    }

    #[test]
    fn test_extra_parentless_rows_are_kept() {
        let rows = vec![
            Row::new(1, "Root"),
            Row::new(2, "A").with_parent(1),
            Row::new(10, "Detached"),
            Row::new(11, "Detached child").with_parent(10),
        ];
        let tree = Tree::build(rows).unwrap();
        assert_eq!(tree.len(), 4);
        assert!(tree.contains(id(11)));
        let walked: Vec<NodeId> = tree.walk().into_iter().map(|(_, n)| n.id).collect();
        assert_eq!(walked, vec![id(1), id(2)]);
    }

    #[test]
    fn test_is_child() {
        let tree = Tree::build(sample()).unwrap();
        assert!(tree.is_child(id(1), id(2)));
        assert!(!tree.is_child(id(1), id(4)));
        assert!(!tree.is_child(id(1), id(99)));
    }

    #[test]
    fn test_ancestors_and_depth() {
        let tree = Tree::build(sample()).unwrap();
        assert_eq!(tree.ancestors(id(4)).unwrap(), vec![id(4), id(2), id(1)]);
        assert_eq!(tree.depth(id(4)).unwrap(), 2);
        assert_eq!(tree.depth(id(1)).unwrap(), 0);
    }

    #[test]
    fn test_walk_preorder() {
        let tree = Tree::build(sample()).unwrap();
        let walked: Vec<(usize, NodeId)> =
            tree.walk().into_iter().map(|(d, n)| (d, n.id)).collect();
        assert_eq!(
            walked,
            vec![(0, id(1)), (1, id(2)), (2, id(4)), (1, id(3))]
        );
    }

    #[test]
    fn test_nodes_in_load_order() {
        let tree = Tree::build(sample()).unwrap();
        let names: Vec<&str> = tree.nodes().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["Root", "A", "B", "A1"]);
    }
}
