//! The active tree snapshot and its atomic replacement.

use crate::error::{DataIntegrityError, Result, StoreError};
use crate::tree::Tree;
use crate::types::{Node, NodeId, Row};
use std::sync::{Arc, PoisonError, RwLock};

/// Holds the authoritative tree behind a single swappable pointer.
///
/// Readers call [`TreeStore::snapshot`] once per event and work against
/// that `Arc<Tree>` for the rest of the event, so a concurrent reload is
/// seen either entirely or not at all. The write lock is held only for
/// the pointer swap, never while rows are fetched or validated.
#[derive(Debug, Default)]
pub struct TreeStore {
    active: RwLock<Option<Arc<Tree>>>,
}

/// What a successful reload swapped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadSummary {
    pub nodes: usize,
    pub root: NodeId,
    /// Node count of the tree that was replaced, if there was one.
    pub previous_nodes: Option<usize>,
}

impl TreeStore {
    /// An empty store: the "no data" state.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that starts with `tree` active.
    pub fn with_tree(tree: Tree) -> Self {
        Self {
            active: RwLock::new(Some(Arc::new(tree))),
        }
    }

    /// Validate rows into a tree without touching the active one.
    pub fn build<I>(rows: I) -> std::result::Result<Tree, DataIntegrityError>
    where
        I: IntoIterator<Item = Row>,
    {
        Tree::build(rows)
    }

    /// The current tree, or `None` if nothing was ever loaded.
    pub fn snapshot(&self) -> Option<Arc<Tree>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in `tree`, returning the one it replaced.
    pub fn replace(&self, tree: Tree) -> Option<Arc<Tree>> {
        let next = Arc::new(tree);
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        active.replace(next)
    }

    /// Build a tree from `rows` and make it active.
    ///
    /// On failure the active tree is left exactly as it was.
    pub fn reload_from<I>(&self, rows: I) -> std::result::Result<ReloadSummary, DataIntegrityError>
    where
        I: IntoIterator<Item = Row>,
    {
        let tree = match Tree::build(rows) {
            Ok(tree) => tree,
            Err(e) => {
                tracing::warn!(error = %e, "dataset rejected, keeping active tree");
                return Err(e);
            }
        };

        let nodes = tree.len();
        let root = tree.root();
        let previous = self.replace(tree);
        let summary = ReloadSummary {
            nodes,
            root,
            previous_nodes: previous.map(|t| t.len()),
        };
        tracing::info!(
            nodes = summary.nodes,
            root = %summary.root,
            previous = ?summary.previous_nodes,
            "dataset reloaded"
        );
        Ok(summary)
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_none()
    }

    pub fn root(&self) -> Result<NodeId> {
        Ok(self.require()?.root())
    }

    pub fn get(&self, id: NodeId) -> Result<Node> {
        Ok(self.require()?.get(id)?.clone())
    }

    pub fn children(&self, id: NodeId) -> Result<Vec<(NodeId, String)>> {
        let tree = self.require()?;
        let kids = tree.children(id)?;
        Ok(kids
            .into_iter()
            .map(|(child, name)| (child, name.to_string()))
            .collect())
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.require()?.parent(id)?)
    }

    fn require(&self) -> Result<Arc<Tree>> {
        self.snapshot().ok_or(StoreError::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotFound;
    use std::thread;

    fn rows() -> Vec<Row> {
        vec![
            Row::new(1, "Root").with_text("R"),
            Row::new(2, "A").with_parent(1).with_text("a"),
            Row::new(3, "B").with_parent(1).with_text("b"),
        ]
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = TreeStore::new();
        assert!(store.is_empty());
        assert_eq!(store.root().unwrap_err(), StoreError::Empty);
        assert_eq!(store.get(NodeId::new(1)).unwrap_err(), StoreError::Empty);
    }

    #[test]
    fn test_reload_success() {
        let store = TreeStore::new();
        let summary = store.reload_from(rows()).unwrap();
        assert_eq!(summary.nodes, 3);
        assert_eq!(summary.root, NodeId::new(1));
        assert_eq!(summary.previous_nodes, None);
        assert_eq!(store.root().unwrap(), NodeId::new(1));
    }

    #[test]
    fn test_failed_reload_keeps_active_tree() {
        let store = TreeStore::new();
        store.reload_from(rows()).unwrap();

        let bad = vec![Row::new(7, "New root"), Row::new(8, "X").with_parent(99)];
        let err = store.reload_from(bad).unwrap_err();
        assert!(matches!(err, DataIntegrityError::DanglingParent { .. }));

        assert_eq!(store.root().unwrap(), NodeId::new(1));
        assert_eq!(store.get(NodeId::new(2)).unwrap().name, "A");
        assert_eq!(store.snapshot().unwrap().len(), 3);
    }

    #[test]
    fn test_failed_first_load_stays_empty() {
        let store = TreeStore::new();
        assert!(store.reload_from(Vec::new()).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_replace_reports_previous() {
        let store = TreeStore::new();
        store.reload_from(rows()).unwrap();
        let summary = store.reload_from(vec![Row::new(5, "Only")]).unwrap();
        assert_eq!(summary.previous_nodes, Some(3));
        assert_eq!(store.root().unwrap(), NodeId::new(5));
        assert_eq!(
            store.get(NodeId::new(1)).unwrap_err(),
            StoreError::NotFound(NotFound(NodeId::new(1)))
        );
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let store = TreeStore::with_tree(Tree::build(rows()).unwrap());
        let held = store.snapshot().unwrap();
        store.reload_from(vec![Row::new(5, "Only")]).unwrap();

        // The reader that took the old snapshot still sees the whole old tree.
        assert_eq!(held.root(), NodeId::new(1));
        assert_eq!(held.children(NodeId::new(1)).unwrap().len(), 2);
        assert_eq!(store.root().unwrap(), NodeId::new(5));
    }

    #[test]
    fn test_children_and_parent() {
        let store = TreeStore::with_tree(Tree::build(rows()).unwrap());
        let kids = store.children(NodeId::new(1)).unwrap();
        assert_eq!(
            kids,
            vec![(NodeId::new(2), "A".to_string()), (NodeId::new(3), "B".to_string())]
        );
        assert_eq!(store.parent(NodeId::new(3)).unwrap(), Some(NodeId::new(1)));
        assert_eq!(store.parent(NodeId::new(1)).unwrap(), None);
    }

    #[test]
    fn test_readers_never_see_mixed_tree() {
        let store = Arc::new(TreeStore::new());
        store.reload_from(rows()).unwrap();

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for round in 0..200 {
                    let batch = if round % 2 == 0 {
                        vec![Row::new(10, "Other"), Row::new(11, "O1").with_parent(10)]
                    } else {
                        rows()
                    };
                    store.reload_from(batch).unwrap();
                }
            })
        };

        for _ in 0..2000 {
            let tree = store.snapshot().unwrap();
            let root = tree.root();
            // Whatever the root is, its children come from the same batch.
            for (child, _) in tree.children(root).unwrap() {
                assert_eq!(tree.parent(child).unwrap(), Some(root));
            }
        }

        writer.join().unwrap();
    }
}
